// Module naming follows project convention (Core = OS plumbing, Dialog = the protocol)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Dialog;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;

pub use config::RegionConfig;
pub use error::{DialogError, Lookup, Resource, Result};
pub use Core::{RegionStats, SharedRegion};
pub use Dialog::{Delivery, DialogId, Pid, Receipt, Session, Teardown, TERMINATION_SENTINEL};
