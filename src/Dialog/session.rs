use std::sync::Arc;

use super::layout::{DialogId, Pid};
use crate::Core::region::SharedRegion;

/// One participant's view of the region: an attachment plus the identity it
/// speaks as.
///
/// The identity defaults to the OS process id, which is what other processes
/// see in the participant tables. [`Session::with_pid`] lets one process speak
/// for several participants, which is how the tests simulate many processes.
#[derive(Clone)]
pub struct Session {
    region: Arc<SharedRegion>,
    pid: Pid,
}

impl Session {
    pub fn new(region: Arc<SharedRegion>) -> Self {
        Self::with_pid(region, std::process::id())
    }

    pub fn with_pid(region: Arc<SharedRegion>, pid: Pid) -> Self {
        Self { region, pid }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }
}

/// A message handed to the caller by `receive_messages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub dialog_id: DialogId,
    pub sender: Pid,
    pub text: String,
    pub is_termination: bool,
}

/// How far the teardown cascade went during a receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Teardown {
    #[default]
    None,
    DialogClosed,
    RegionDestroyed,
}

/// Result of one `receive_messages` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Newly delivered messages, in message-table order.
    pub deliveries: Vec<Delivery>,
    /// A termination sentinel was consumed; the caller is now inactive.
    pub terminated: bool,
    pub teardown: Teardown,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_session(self, f)
    }
}
