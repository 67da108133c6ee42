// Operations over the fixed-capacity dialog table.
//
// Everything here runs with the gate held; the callers in `dialog_service` and
// `messaging` own the locking.

use log::{debug, warn};

use super::layout::{DialogEntry, DialogId, ParticipantEntry, Pid, RegionTables, MAX_PARTICIPANTS};
use crate::error::{DialogError, Lookup, Resource, Result};

/// Point-in-time view of an open dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogSummary {
    pub id: DialogId,
    pub participants: usize,
    pub active: usize,
}

impl RegionTables {
    /// Claim the first free dialog slot for `creator`, who becomes participant 0.
    pub fn allocate_dialog(&mut self, creator: Pid) -> Result<DialogId> {
        let Some(slot) = self.dialogs.iter().position(|d| d.in_use == 0) else {
            warn!("dialog table full, cannot create dialog for pid {creator}");
            return Err(DialogError::ResourceExhausted(Resource::Dialogs));
        };

        let id = self.next_dialog_id;
        self.next_dialog_id += 1;

        let dialog = &mut self.dialogs[slot];
        *dialog = DialogEntry::default();
        dialog.in_use = 1;
        dialog.id = id;
        dialog.participants[0] = ParticipantEntry { pid: creator, active: 1 };
        dialog.participant_count = 1;

        debug!("dialog {id} allocated in slot {slot}");
        Ok(id)
    }

    pub fn find_dialog(&self, id: DialogId) -> Option<&DialogEntry> {
        self.dialogs.iter().find(|d| d.in_use != 0 && d.id == id)
    }

    pub fn find_dialog_mut(&mut self, id: DialogId) -> Option<&mut DialogEntry> {
        self.dialogs.iter_mut().find(|d| d.in_use != 0 && d.id == id)
    }

    /// Like [`find_dialog_mut`](Self::find_dialog_mut) but with the NotFound error attached.
    pub fn dialog_mut(&mut self, id: DialogId) -> Result<&mut DialogEntry> {
        self.find_dialog_mut(id)
            .ok_or(DialogError::NotFound(Lookup::Dialog(id)))
    }

    pub fn any_dialog_open(&self) -> bool {
        self.dialogs.iter().any(|d| d.in_use != 0)
    }

    /// Open dialogs in table order.
    pub fn open_dialogs(&self) -> Vec<DialogSummary> {
        self.dialogs
            .iter()
            .filter(|d| d.in_use != 0)
            .map(|d| DialogSummary {
                id: d.id,
                participants: d.members().len(),
                active: d.active_count(),
            })
            .collect()
    }
}

impl DialogEntry {
    /// The appended participants, in index order.
    pub fn members(&self) -> &[ParticipantEntry] {
        let count = (self.participant_count as usize).min(MAX_PARTICIPANTS);
        &self.participants[..count]
    }

    /// Append `pid` as an active participant and return its index.
    ///
    /// Indices are append-only: a process joining twice gets a second index and
    /// the PID lookup keeps resolving to the first one.
    pub fn append_participant(&mut self, pid: Pid) -> Result<usize> {
        let index = self.participant_count as usize;
        if index >= MAX_PARTICIPANTS {
            warn!("dialog {} is full, pid {pid} cannot join", self.id);
            return Err(DialogError::ResourceExhausted(Resource::Participants));
        }
        self.participants[index] = ParticipantEntry { pid, active: 1 };
        self.participant_count += 1;
        Ok(index)
    }

    /// Participant index of `pid`, found by linear scan.
    pub fn index_of(&self, pid: Pid) -> Option<usize> {
        self.members().iter().position(|p| p.pid == pid)
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.members().get(index).is_some_and(|p| p.active != 0)
    }

    pub fn deactivate(&mut self, index: usize) {
        if index < self.members().len() {
            self.participants[index].active = 0;
        }
    }

    pub fn active_count(&self) -> usize {
        self.members().iter().filter(|p| p.active != 0).count()
    }

    pub fn has_active(&self) -> bool {
        self.members().iter().any(|p| p.active != 0)
    }

    pub fn close(&mut self) {
        self.in_use = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dialog::layout::MAX_DIALOGS;

    #[test]
    fn ids_increase_across_closures() {
        let mut tables = RegionTables::boxed();
        let first = tables.allocate_dialog(100).unwrap();
        let second = tables.allocate_dialog(100).unwrap();
        tables.find_dialog_mut(first).unwrap().close();
        let third = tables.allocate_dialog(100).unwrap();

        assert_eq!((first, second, third), (1, 2, 3));
        assert!(tables.find_dialog(first).is_none());
        // The freed slot is reused, the id is not.
        assert_eq!(tables.dialogs[0].id, third);
    }

    #[test]
    fn full_table_is_left_untouched() {
        let mut tables = RegionTables::boxed();
        for _ in 0..MAX_DIALOGS {
            tables.allocate_dialog(7).unwrap();
        }
        let next_before = tables.next_dialog_id;

        let err = tables.allocate_dialog(7).unwrap_err();
        assert!(matches!(err, DialogError::ResourceExhausted(Resource::Dialogs)));
        assert_eq!(tables.next_dialog_id, next_before);
        assert_eq!(tables.open_dialogs().len(), MAX_DIALOGS);
    }

    #[test]
    fn participants_are_append_only() {
        let mut tables = RegionTables::boxed();
        let id = tables.allocate_dialog(10).unwrap();
        let dialog = tables.find_dialog_mut(id).unwrap();

        assert_eq!(dialog.append_participant(11).unwrap(), 1);
        assert_eq!(dialog.append_participant(12).unwrap(), 2);
        dialog.deactivate(1);

        assert_eq!(dialog.index_of(12), Some(2));
        assert_eq!(dialog.active_count(), 2);
        assert!(!dialog.is_active(1));
        assert_eq!(dialog.append_participant(13).unwrap(), 3);
    }

    #[test]
    fn participant_table_overflow() {
        let mut tables = RegionTables::boxed();
        let id = tables.allocate_dialog(1).unwrap();
        let dialog = tables.find_dialog_mut(id).unwrap();
        for pid in 2..=MAX_PARTICIPANTS as Pid {
            dialog.append_participant(pid).unwrap();
        }

        let err = dialog.append_participant(99).unwrap_err();
        assert!(matches!(err, DialogError::ResourceExhausted(Resource::Participants)));
        assert_eq!(dialog.members().len(), MAX_PARTICIPANTS);
        assert_eq!(dialog.index_of(99), None);
    }

    #[test]
    fn lookup_of_unknown_dialog() {
        let mut tables = RegionTables::boxed();
        assert!(matches!(
            tables.dialog_mut(42),
            Err(DialogError::NotFound(Lookup::Dialog(42)))
        ));
    }
}
