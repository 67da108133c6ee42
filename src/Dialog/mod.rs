mod dialog_service;
mod messaging;

pub mod layout;
pub mod message_log;
pub mod poller;
pub mod registry;
pub mod session;

pub use layout::{DialogId, Pid, TERMINATION_SENTINEL};
pub use poller::{MessageObserver, PollExit, Poller, PollerHandle};
pub use registry::DialogSummary;
pub use session::{Delivery, Receipt, Session, Teardown};
