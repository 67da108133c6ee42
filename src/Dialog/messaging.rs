use log::{debug, info};

use super::layout::{DialogId, RegionTables, TERMINATION_SENTINEL};
use super::session::{Delivery, Receipt, Session, Teardown};
use crate::error::{DialogError, Lookup, Result};

impl Session {
    /// Broadcast `text` to every current member of `dialog_id`, sender included.
    ///
    /// Text longer than a payload slot is truncated. Members that join later
    /// never see the message.
    pub fn send_message(&self, dialog_id: DialogId, text: &str) -> Result<()> {
        {
            let mut region = self.region().lock()?;
            let width = region
                .find_dialog(dialog_id)
                .ok_or(DialogError::NotFound(Lookup::Dialog(dialog_id)))?
                .members()
                .len();
            region.allocate_message(dialog_id, self.pid(), text, width)?;
        }
        self.region().notify();
        Ok(())
    }

    /// Announce that this participant is leaving `dialog_id`.
    pub fn send_termination(&self, dialog_id: DialogId) -> Result<()> {
        self.send_message(dialog_id, TERMINATION_SENTINEL)
    }

    /// Consume every message of `dialog_id` not yet acknowledged by this session.
    ///
    /// Each delivered message gets this participant's bit and is reclaimed once
    /// every member that is still active has acknowledged it. Consuming a
    /// termination sentinel makes this participant inactive; if that leaves the
    /// dialog without active members it is closed, and if no dialog is left
    /// open the whole region is destroyed before the gate is released.
    pub fn receive_messages(&self, dialog_id: DialogId) -> Result<Receipt> {
        let mut region = self.region().lock()?;
        let mut receipt = Receipt::default();

        let tables: &mut RegionTables = &mut region;
        // Borrow the dialog through its field so the message table stays free.
        let dialog = tables
            .dialogs
            .iter_mut()
            .find(|d| d.in_use != 0 && d.id == dialog_id)
            .ok_or(DialogError::NotFound(Lookup::Dialog(dialog_id)))?;
        let me = dialog
            .index_of(self.pid())
            .ok_or(DialogError::NotFound(Lookup::Participant {
                dialog_id,
                pid: self.pid(),
            }))?;

        for (slot, message) in tables.messages.iter_mut().enumerate() {
            if !message.is_pending_for(dialog_id, me) {
                continue;
            }

            message.acknowledge(me);
            let is_termination = message.is_termination();
            receipt.deliveries.push(Delivery {
                dialog_id,
                sender: message.sender,
                text: message.text(),
                is_termination,
            });

            if is_termination {
                dialog.deactivate(me);
                receipt.terminated = true;
            }

            if message.acknowledged_by_all(dialog) {
                message.reclaim();
                debug!("message slot {slot} of dialog {dialog_id} reclaimed");
            }
        }

        if receipt.terminated && !dialog.has_active() {
            dialog.close();
            receipt.teardown = Teardown::DialogClosed;
            info!("dialog {dialog_id} closed, last participant left");

            if !tables.any_dialog_open() {
                region.destroy();
                receipt.teardown = Teardown::RegionDestroyed;
            }
        }

        debug!(
            "pid {} received {} message(s) from dialog {dialog_id}",
            self.pid(),
            receipt.deliveries.len()
        );
        Ok(receipt)
    }
}
