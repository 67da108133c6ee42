use crate::Core::region::{RegionGuard, SharedRegion};
use crate::Dialog::Session;
use std::fmt;

/// Debug function for SharedRegion
///
/// Provides a safe debug representation that shows:
/// - Names of the shared memory object and the gate
/// - Layout pointer location
/// - Initialization status
///
/// The tables are not read: that would need the gate.
pub fn debug_shared_region(region: &SharedRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedRegion")
        .field("shm", &region.config().shm_name())
        .field("gate", &region.gate_name())
        .field("layout", &format_args!("{:p}", region.layout_ptr()))
        .field("initialized", &region.is_initialized())
        .finish()
}

/// Debug function for RegionGuard
///
/// The guard holds the gate, so the table summary is safe to read here.
pub fn debug_region_guard(guard: &RegionGuard<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegionGuard")
        .field("shm", &guard.region().config().shm_name())
        .field("next_dialog_id", &guard.next_dialog_id)
        .field("open_dialogs", &guard.open_dialogs())
        .field("messages_in_use", &guard.messages_in_use())
        .finish()
}

/// Debug function for Session
pub fn debug_session(session: &Session, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Session")
        .field("pid", &session.pid())
        .field("region", &session.region().config().shm_name())
        .finish_non_exhaustive()
}
