use crate::config::RegionConfig;
use crate::Core::futex::{futex_wait, futex_wake_all};
use crate::Core::semaphore::{GateGuard, MutualExclusionGate, NamedSemaphore};
use crate::Core::SharedMemory::{
    attach_shared_memory, create_shared_memory, unlink_shared_memory, SharedMemoryBackend,
};
use crate::Dialog::layout::{
    DialogId, RegionLayout, RegionTables, LAYOUT_VERSION, REGION_DESTROYED, REGION_LIVE,
    REGION_MAGIC,
};
use crate::error::{DialogError, Result};
use log::{debug, info, warn};
use std::io;
use std::ops::{Deref, DerefMut};
use std::ptr::{addr_of, addr_of_mut};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;
mod debug;
mod getters;

/// How often `create_or_attach` retries when the region disappears under it.
const ATTACH_ATTEMPTS: u32 = 3;
/// Pause before retry `n` is `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);
/// How long an opener waits for a creator to finish initializing the region.
const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

/// A process's attachment to the shared dialog region.
///
/// Holds the mapping and an open handle on the gate; dropping it detaches
/// (munmap + sem_close) without touching the region's contents. All access to
/// the tables goes through [`SharedRegion::lock`].
pub struct SharedRegion {
    shm: Box<dyn SharedMemoryBackend>,
    layout: *mut RegionLayout,
    gate: MutualExclusionGate,
    config: RegionConfig,
}

/// Occupancy snapshot taken under the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionStats {
    pub open_dialogs: usize,
    pub messages_in_use: usize,
    pub next_dialog_id: DialogId,
}

impl SharedRegion {
    /// Attach to the region named by `config`, creating it if nobody has yet.
    ///
    /// Whoever creates the gate creates the region, and holds the gate until
    /// the region is initialized. Everyone else opens the gate and waits on it,
    /// so an opener never observes a half-built region and never mistakes a
    /// creator in progress for a leftover.
    pub fn create_or_attach(config: &RegionConfig) -> Result<Self> {
        let sem_name = config.sem_name();

        for attempt in 1..=ATTACH_ATTEMPTS {
            if attempt > 1 {
                thread::sleep(RETRY_BACKOFF * attempt);
            }

            let gate = match MutualExclusionGate::create_held(sem_name) {
                Ok(gate) => return Self::initialize(gate, config),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    match MutualExclusionGate::open(sem_name) {
                        Ok(gate) => gate,
                        // Unlinked between our two opens: the region was just torn down.
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(DialogError::attach(sem_name, e)),
                    }
                }
                Err(e) => return Err(DialogError::attach(sem_name, e)),
            };

            if let Some(region) = Self::open_with(gate, config)? {
                return Ok(region);
            }
            debug!("region {} missing behind gate, retrying", config.shm_name());
        }

        Err(DialogError::attach(
            config.shm_name(),
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("gate {sem_name} exists but no region appeared behind it"),
            ),
        ))
    }

    /// Attach to an existing region. Fails with `AttachFailure` if there is none.
    pub fn attach(config: &RegionConfig) -> Result<Self> {
        let gate = MutualExclusionGate::open(config.sem_name())
            .map_err(|e| DialogError::attach(config.sem_name(), e))?;

        Self::open_with(gate, config)?.ok_or_else(|| {
            DialogError::attach(
                config.shm_name(),
                io::Error::new(io::ErrorKind::NotFound, "no shared region behind the gate"),
            )
        })
    }

    /// Build the region behind a gate this process just created held.
    ///
    /// On failure the gate's name is unlinked before the permit is released,
    /// so waiting openers find nothing and the next creator starts clean.
    fn initialize(gate: MutualExclusionGate, config: &RegionConfig) -> Result<Self> {
        let name = config.shm_name();
        let guard = gate.assume_held();

        let shm = match Self::build_region(name) {
            Ok(shm) => shm,
            Err(e) => {
                if let Err(unlink) = NamedSemaphore::unlink(gate.name()) {
                    warn!("failed to unlink gate {}: {unlink}", gate.name());
                }
                drop(guard);
                return Err(e);
            }
        };
        drop(guard);

        info!(
            "created shared region {name} ({} bytes) guarded by {}",
            shm.size(),
            gate.name()
        );
        Ok(Self::from_parts(shm, gate, config))
    }

    /// Create, map and stamp a fresh region object. Caller holds the gate.
    fn build_region(name: &str) -> Result<Box<dyn SharedMemoryBackend>> {
        let size = std::mem::size_of::<RegionLayout>();

        let shm = match create_shared_memory(size, name) {
            Ok(shm) => shm,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // A leftover with no gate. Unlinked rather than truncated, so any
                // process still mapping it keeps its bytes.
                warn!("replacing stale shared region {name}");
                unlink_shared_memory(name).map_err(|e| DialogError::attach(name, e))?;
                create_shared_memory(size, name).map_err(|e| DialogError::attach(name, e))?
            }
            Err(e) => return Err(DialogError::attach(name, e)),
        };

        let layout = match Self::checked_layout(&*shm, name) {
            Ok(layout) => layout,
            Err(e) => {
                let _ = unlink_shared_memory(name);
                return Err(e);
            }
        };
        // Safety: freshly mapped, zero-filled, and nobody else can touch it
        // while we hold the gate.
        unsafe {
            (*layout).magic = REGION_MAGIC;
            (*layout).version = LAYOUT_VERSION;
            (*layout).signal.store(0, Ordering::Relaxed);
            (*addr_of_mut!((*layout).tables)).reset();
        }
        Ok(shm)
    }

    /// Map the region behind `gate` and validate its header. `Ok(None)` when
    /// the shared memory object does not exist.
    fn open_with(gate: MutualExclusionGate, config: &RegionConfig) -> Result<Option<Self>> {
        let name = config.shm_name();
        let size = std::mem::size_of::<RegionLayout>();

        let shm = {
            let _guard = gate
                .acquire_timeout(ATTACH_TIMEOUT)
                .map_err(|e| DialogError::attach(gate.name(), e))?
                .ok_or_else(|| {
                    DialogError::attach(
                        gate.name(),
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            "gate still held, its creator may have died",
                        ),
                    )
                })?;

            let shm = match attach_shared_memory(name, size) {
                Ok(shm) => shm,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(DialogError::attach(name, e)),
            };

            let layout = Self::checked_layout(&*shm, name)?;
            // Safety: mapped with the full layout size, gate held.
            let (magic, version, state) =
                unsafe { ((*layout).magic, (*layout).version, (*layout).tables.state) };
            if magic != REGION_MAGIC || version != LAYOUT_VERSION {
                return Err(DialogError::attach(
                    name,
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("bad region header: magic {magic:#x}, version {version}"),
                    ),
                ));
            }
            if state != REGION_LIVE {
                return Err(DialogError::attach(
                    name,
                    io::Error::new(io::ErrorKind::InvalidData, "region is not live"),
                ));
            }
            shm
        };

        info!("attached to shared region {name}");
        Ok(Some(Self::from_parts(shm, gate, config)))
    }

    fn checked_layout(shm: &dyn SharedMemoryBackend, name: &str) -> Result<*mut RegionLayout> {
        let layout = shm.as_ptr() as *mut RegionLayout;
        if (layout as usize) % std::mem::align_of::<RegionLayout>() != 0 {
            return Err(DialogError::attach(
                name,
                io::Error::new(io::ErrorKind::InvalidData, "Shared memory not properly aligned"),
            ));
        }
        Ok(layout)
    }

    fn from_parts(
        shm: Box<dyn SharedMemoryBackend>,
        gate: MutualExclusionGate,
        config: &RegionConfig,
    ) -> Self {
        let layout = shm.as_ptr() as *mut RegionLayout;
        Self {
            shm,
            layout,
            gate,
            config: config.clone(),
        }
    }

    /// Acquire the gate and borrow the tables for the length of the guard.
    ///
    /// Fails with `RegionDestroyed` once the teardown cascade has run, even for
    /// processes that are still mapped.
    pub fn lock(&self) -> Result<RegionGuard<'_>> {
        let gate = self
            .gate
            .acquire()
            .map_err(|e| DialogError::attach(self.gate.name(), e))?;

        // Safety: the mapping outlives `self`, and the gate makes this the only
        // live reference to the tables across all processes and threads.
        let tables = unsafe { addr_of_mut!((*self.layout).tables) };
        if unsafe { (*tables).state } != REGION_LIVE {
            return Err(DialogError::RegionDestroyed);
        }

        Ok(RegionGuard {
            region: self,
            tables,
            _gate: gate,
        })
    }

    pub fn stats(&self) -> Result<RegionStats> {
        let guard = self.lock()?;
        Ok(RegionStats {
            open_dialogs: guard.open_dialogs().len(),
            messages_in_use: guard.messages_in_use(),
            next_dialog_id: guard.next_dialog_id,
        })
    }

    fn signal(&self) -> &AtomicU32 {
        // Safety: `signal` is only ever accessed atomically and sits outside `tables`.
        unsafe { &*addr_of!((*self.layout).signal) }
    }

    /// Current value of the wake-up word, to be passed to [`wait_for_signal`](Self::wait_for_signal).
    pub fn signal_value(&self) -> u32 {
        self.signal().load(Ordering::Acquire)
    }

    /// Wake every poller waiting on this region, in every process.
    pub fn notify(&self) {
        let signal = self.signal();
        signal.fetch_add(1, Ordering::Release);
        futex_wake_all(signal);
    }

    /// Sleep until the signal moves past `seen` or `timeout` elapses.
    pub fn wait_for_signal(&self, seen: u32, timeout: Duration) {
        futex_wait(self.signal(), seen, timeout);
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        debug!("detaching from shared region {}", self.config.shm_name());
    }
}

// The raw layout pointer is only dereferenced under the gate or atomically.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

/// Exclusive access to the region's tables; releases the gate on drop.
pub struct RegionGuard<'a> {
    region: &'a SharedRegion,
    tables: *mut RegionTables,
    _gate: GateGuard<'a>,
}

impl RegionGuard<'_> {
    /// Mark the region destroyed and unlink its names, still under the gate.
    ///
    /// Other attached processes keep a valid mapping but every later `lock`
    /// fails with `RegionDestroyed`; new processes find nothing to attach to.
    pub fn destroy(&mut self) {
        self.state = REGION_DESTROYED;

        let config = &self.region.config;
        if let Err(e) = unlink_shared_memory(config.shm_name()) {
            warn!("failed to unlink shared region {}: {e}", config.shm_name());
        }
        if let Err(e) = NamedSemaphore::unlink(config.sem_name()) {
            warn!("failed to unlink gate {}: {e}", config.sem_name());
        }
        info!("destroyed shared region {}", config.shm_name());

        // Pollers sleeping on the old region should notice right away.
        self.region.notify();
    }

    pub fn region(&self) -> &SharedRegion {
        self.region
    }
}

impl Deref for RegionGuard<'_> {
    type Target = RegionTables;

    fn deref(&self) -> &RegionTables {
        // Safety: see `SharedRegion::lock`.
        unsafe { &*self.tables }
    }
}

impl DerefMut for RegionGuard<'_> {
    fn deref_mut(&mut self) -> &mut RegionTables {
        // Safety: see `SharedRegion::lock`.
        unsafe { &mut *self.tables }
    }
}
