use log::{debug, info};

use super::layout::DialogId;
use super::registry::DialogSummary;
use super::session::Session;
use crate::error::Result;

impl Session {
    /// Create a dialog with this session as participant 0 and return its id.
    pub fn create_dialog(&self) -> Result<DialogId> {
        let mut region = self.region().lock()?;
        let id = region.allocate_dialog(self.pid())?;
        info!("pid {} created dialog {id}", self.pid());
        Ok(id)
    }

    /// Append this session to dialog `dialog_id` and return its participant index.
    ///
    /// The index is informational; later calls find it again by PID.
    pub fn join_dialog(&self, dialog_id: DialogId) -> Result<usize> {
        let mut region = self.region().lock()?;
        let index = region.dialog_mut(dialog_id)?.append_participant(self.pid())?;
        debug!("pid {} joined dialog {dialog_id} at index {index}", self.pid());
        Ok(index)
    }

    /// Open dialogs, in table order.
    pub fn list_dialogs(&self) -> Result<Vec<DialogSummary>> {
        Ok(self.region().lock()?.open_dialogs())
    }
}
