use crossbeam_utils::CachePadded;
use std::sync::atomic::AtomicU32;

/// Process identifier as stored in shared memory.
pub type Pid = u32;

/// Dialog identifier. Ids start at 1 and are never reused within a region's lifetime.
pub type DialogId = u32;

/// Number of dialog slots in the region.
pub const MAX_DIALOGS: usize = 10;

/// Number of participants a single dialog can hold.
pub const MAX_PARTICIPANTS: usize = 10;

/// Number of message slots, shared by every dialog in the region.
pub const MAX_MESSAGES: usize = 100;

/// Size of the inline payload buffer, terminator included.
pub const MAX_PAYLOAD: usize = 256;

/// Reserved payload announcing that the sender is leaving the dialog.
pub const TERMINATION_SENTINEL: &str = "TERMINATE";

pub const REGION_MAGIC: u64 = 0x4449_414C_4F47_5348; // "DIALOGSH"
pub const LAYOUT_VERSION: u32 = 1;

/// Values of [`RegionTables::state`].
pub const REGION_UNINIT: u32 = 0;
pub const REGION_LIVE: u32 = 1;
pub const REGION_DESTROYED: u32 = 2;

// The acknowledgment vector is a single u32 bitmap.
const _: () = assert!(MAX_PARTICIPANTS <= u32::BITS as usize);

/// One member of a dialog. Its position in [`DialogEntry::participants`] is its
/// participant index and never changes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantEntry {
    pub pid: Pid,
    /// 1 while the participant takes part in the dialog, 0 once it left.
    pub active: u32,
}

/// A slot of the dialog table.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct DialogEntry {
    pub in_use: u32,
    pub id: DialogId,
    /// Number of appended participants; entries past this are garbage.
    pub participant_count: u32,
    pub reserved: u32,
    pub participants: [ParticipantEntry; MAX_PARTICIPANTS],
}

/// A slot of the global message table.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct MessageEntry {
    pub in_use: u32,
    pub dialog_id: DialogId,
    pub sender: Pid,
    /// Length of the text in `payload`, excluding the terminator.
    pub payload_len: u32,
    /// Participant count of the dialog when the message was sent. Indices at or
    /// past this width have no acknowledgment bit.
    pub ack_width: u32,
    /// Acknowledgment bitmap, bit `i` set once participant index `i` consumed the message.
    pub read_by: u32,
    pub payload: [u8; MAX_PAYLOAD],
}

impl Default for MessageEntry {
    fn default() -> Self {
        Self {
            in_use: 0,
            dialog_id: 0,
            sender: 0,
            payload_len: 0,
            ack_width: 0,
            read_by: 0,
            payload: [0; MAX_PAYLOAD],
        }
    }
}

/// Everything that is only touched while holding the gate.
#[repr(C)]
pub struct RegionTables {
    /// One of `REGION_UNINIT`, `REGION_LIVE`, `REGION_DESTROYED`.
    pub state: u32,
    pub next_dialog_id: DialogId,
    pub dialogs: [DialogEntry; MAX_DIALOGS],
    pub messages: [MessageEntry; MAX_MESSAGES],
}

/// The block mapped by every attached process.
///
/// `magic` and `version` are written once by the creator before it releases the
/// gate. `signal` is bumped after every send and is the futex word pollers sleep
/// on; it is the only field read outside the gate, so it lives outside
/// [`RegionTables`] and never aliases a guarded borrow.
#[repr(C, align(128))]
pub struct RegionLayout {
    pub magic: u64,
    pub version: u32,
    pub reserved: u32,
    pub signal: CachePadded<AtomicU32>,
    pub tables: RegionTables,
}

impl RegionTables {
    /// Reset the tables to an empty, live region.
    pub fn reset(&mut self) {
        self.state = REGION_LIVE;
        self.next_dialog_id = 1;
        self.dialogs = [DialogEntry::default(); MAX_DIALOGS];
        self.messages = [MessageEntry::default(); MAX_MESSAGES];
    }

    /// Heap-allocated empty tables, used by in-process tests of the table logic.
    pub fn boxed() -> Box<Self> {
        let mut tables = Box::new(Self {
            state: REGION_UNINIT,
            next_dialog_id: 0,
            dialogs: [DialogEntry::default(); MAX_DIALOGS],
            messages: [MessageEntry::default(); MAX_MESSAGES],
        });
        tables.reset();
        tables
    }
}
