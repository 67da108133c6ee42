pub mod SharedMemory;
pub mod futex;
pub mod region;
pub mod semaphore;

pub use region::{RegionGuard, RegionStats, SharedRegion};
pub use semaphore::{GateGuard, MutualExclusionGate, NamedSemaphore};
pub use SharedMemory::{
    attach_shared_memory, create_shared_memory, unlink_shared_memory, SharedMemoryBackend,
};
