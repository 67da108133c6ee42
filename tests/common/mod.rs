// Shared helpers for the integration tests. Every test gets its own object
// names so tests can run in parallel without stepping on each other.
#![allow(dead_code)]

use dialog_shm::Core::{unlink_shared_memory, NamedSemaphore};
use dialog_shm::{RegionConfig, SharedRegion};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Unique names; unlinks whatever is left behind when dropped.
pub struct Scratch {
    pub config: RegionConfig,
}

impl Scratch {
    pub fn new() -> Self {
        let tag = format!("dialog_test_{}_{:x}", std::process::id(), fastrand::u64(..));
        let config = RegionConfig::new()
            .with_shm_name(tag.clone())
            .with_sem_name(format!("/{tag}"))
            .with_poll_interval(Duration::from_millis(10));
        Self { config }
    }

    pub fn region(&self) -> Arc<SharedRegion> {
        Arc::new(SharedRegion::create_or_attach(&self.config).expect("create region"))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = unlink_shared_memory(self.config.shm_name());
        let _ = NamedSemaphore::unlink(self.config.sem_name());
    }
}

/// Poll `cond` until it holds or five seconds pass.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
