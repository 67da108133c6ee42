// Operations over the global message table: slot allocation, the per-message
// acknowledgment bitmap and reclamation. Gate held by the caller.

use log::{debug, warn};

use super::layout::{
    DialogEntry, DialogId, MessageEntry, Pid, RegionTables, MAX_PARTICIPANTS, MAX_PAYLOAD,
    TERMINATION_SENTINEL,
};
use crate::error::{DialogError, Resource, Result};

/// Longest prefix of `text` that fits a payload slot, cut on a char boundary.
pub fn truncate_payload(text: &str) -> &str {
    let limit = MAX_PAYLOAD - 1;
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl RegionTables {
    /// Store a message in the first free slot and return the slot index.
    ///
    /// Every bit below `ack_width` starts cleared, the sender's included.
    pub fn allocate_message(
        &mut self,
        dialog_id: DialogId,
        sender: Pid,
        text: &str,
        ack_width: usize,
    ) -> Result<usize> {
        let Some(slot) = self.messages.iter().position(|m| m.in_use == 0) else {
            warn!("message table full, dropping message for dialog {dialog_id}");
            return Err(DialogError::ResourceExhausted(Resource::Messages));
        };

        let body = truncate_payload(text).as_bytes();
        let message = &mut self.messages[slot];
        message.dialog_id = dialog_id;
        message.sender = sender;
        message.payload = [0; MAX_PAYLOAD];
        message.payload[..body.len()].copy_from_slice(body);
        message.payload_len = body.len() as u32;
        message.ack_width = ack_width.min(MAX_PARTICIPANTS) as u32;
        message.read_by = 0;
        message.in_use = 1;

        debug!(
            "message slot {slot} <- dialog {dialog_id}, sender {sender}, {} bytes, width {}",
            body.len(),
            message.ack_width
        );
        Ok(slot)
    }

    pub fn messages_in_use(&self) -> usize {
        self.messages.iter().filter(|m| m.in_use != 0).count()
    }
}

impl MessageEntry {
    pub fn body(&self) -> &[u8] {
        let len = (self.payload_len as usize).min(MAX_PAYLOAD - 1);
        &self.payload[..len]
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    pub fn is_termination(&self) -> bool {
        self.body() == TERMINATION_SENTINEL.as_bytes()
    }

    /// Whether participant `index` had joined when the message was sent.
    pub fn expects(&self, index: usize) -> bool {
        index < self.ack_width as usize
    }

    pub fn is_acknowledged_by(&self, index: usize) -> bool {
        self.expects(index) && self.read_by & (1 << index) != 0
    }

    /// Pending for `index`: live, within its ack width and not yet acknowledged.
    pub fn is_pending_for(&self, dialog_id: DialogId, index: usize) -> bool {
        self.in_use != 0
            && self.dialog_id == dialog_id
            && self.expects(index)
            && !self.is_acknowledged_by(index)
    }

    pub fn acknowledge(&mut self, index: usize) {
        if self.expects(index) {
            self.read_by |= 1 << index;
        }
    }

    /// True when every participant that is active right now and was present at
    /// send time has acknowledged. Inactive participants are not waited for.
    pub fn acknowledged_by_all(&self, dialog: &DialogEntry) -> bool {
        dialog
            .members()
            .iter()
            .enumerate()
            .take(self.ack_width as usize)
            .all(|(index, p)| p.active == 0 || self.is_acknowledged_by(index))
    }

    pub fn reclaim(&mut self) {
        self.in_use = 0;
    }
}
