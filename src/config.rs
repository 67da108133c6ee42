use log::warn;
use std::time::Duration;

pub const DEFAULT_SHM_NAME: &str = "dialog_shm";
pub const DEFAULT_SEM_NAME: &str = "/dialog_shm_sem";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub const ENV_SHM_NAME: &str = "DIALOG_SHM_NAME";
pub const ENV_SEM_NAME: &str = "DIALOG_SEM_NAME";
pub const ENV_POLL_MS: &str = "DIALOG_POLL_MS";

/// Names and timings shared by every process that talks over the same region.
///
/// Capacities are not configurable: they fix the shared layout and every
/// process must agree on them at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    shm_name: String,
    sem_name: String,
    poll_interval: Duration,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            shm_name: DEFAULT_SHM_NAME.to_string(),
            sem_name: DEFAULT_SEM_NAME.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl RegionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DIALOG_SHM_NAME`, `DIALOG_SEM_NAME` and `DIALOG_POLL_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(ENV_SHM_NAME) {
            config = config.with_shm_name(name);
        }
        if let Ok(name) = std::env::var(ENV_SEM_NAME) {
            config = config.with_sem_name(name);
        }
        if let Ok(raw) = std::env::var(ENV_POLL_MS) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => config = config.with_poll_interval(Duration::from_millis(ms)),
                _ => warn!("ignoring invalid {ENV_POLL_MS}={raw:?}"),
            }
        }
        config
    }

    /// Name of the shared memory object (a file under `/dev/shm`).
    pub fn with_shm_name(mut self, name: impl Into<String>) -> Self {
        self.shm_name = name.into();
        self
    }

    /// Name of the semaphore guarding the region. A leading `/` is added if missing.
    pub fn with_sem_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.sem_name = if name.starts_with('/') {
            name
        } else {
            format!("/{name}")
        };
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn shm_name(&self) -> &str {
        &self.shm_name
    }

    pub fn sem_name(&self) -> &str {
        &self.sem_name
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
