// Named POSIX semaphore and the binary gate built on top of it.

use log::error;
use std::ffi::CString;
use std::io;
use std::time::Duration;

const SEM_MODE: libc::c_uint = 0o600;

/// Handle to a named POSIX semaphore. Dropping it closes the handle; the
/// semaphore itself lives until [`NamedSemaphore::unlink`] and the last close.
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

// sem_wait/sem_post are thread-safe on a shared handle
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("semaphore name {name:?} contains a NUL byte"),
        )
    })
}

impl NamedSemaphore {
    /// Create a new semaphore, failing with `AlreadyExists` if the name is taken.
    pub fn create(name: &str, initial: u32) -> io::Result<Self> {
        let c = c_name(name)?;
        let sem = unsafe {
            libc::sem_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                SEM_MODE,
                initial as libc::c_uint,
            )
        };
        Self::checked(sem, name)
    }

    /// Open an existing semaphore, failing with `NotFound` if there is none.
    pub fn open(name: &str) -> io::Result<Self> {
        let c = c_name(name)?;
        let sem = unsafe { libc::sem_open(c.as_ptr(), 0) };
        Self::checked(sem, name)
    }

    fn checked(sem: *mut libc::sem_t, name: &str) -> io::Result<Self> {
        if sem == libc::SEM_FAILED {
            let err = io::Error::last_os_error();
            return Err(io::Error::new(
                err.kind(),
                format!("sem_open({name}) failed: {err}"),
            ));
        }
        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    /// Decrement, blocking while the count is zero. Retries on EINTR.
    pub fn wait(&self) -> io::Result<()> {
        loop {
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. `Ok(false)` on timeout.
    #[cfg(target_os = "linux")]
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let mut deadline = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // sem_timedwait takes an absolute CLOCK_REALTIME deadline
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let nanos = deadline.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
        deadline.tv_sec += (timeout.as_secs() + nanos / 1_000_000_000) as libc::time_t;
        deadline.tv_nsec = (nanos % 1_000_000_000) as libc::c_long;

        loop {
            if unsafe { libc::sem_timedwait(self.sem, &deadline) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::ETIMEDOUT) => return Ok(false),
                _ => return Err(err),
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn wait_timeout(&self, _timeout: Duration) -> io::Result<bool> {
        self.wait().map(|()| true)
    }

    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.sem) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Remove the name so later opens fail. Open handles keep working.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c = c_name(name)?;
        if unsafe { libc::sem_unlink(c.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

/// Binary lock over a named semaphore.
///
/// Not reentrant: acquiring twice from the same thread deadlocks.
#[derive(Debug)]
pub struct MutualExclusionGate {
    sem: NamedSemaphore,
}

impl MutualExclusionGate {
    /// Create the gate already held: the count starts at 0, so every opener
    /// blocks until the creator adopts the permit with [`assume_held`](Self::assume_held)
    /// and drops the guard.
    pub fn create_held(name: &str) -> io::Result<Self> {
        Ok(Self {
            sem: NamedSemaphore::create(name, 0)?,
        })
    }

    pub fn open(name: &str) -> io::Result<Self> {
        Ok(Self {
            sem: NamedSemaphore::open(name)?,
        })
    }

    /// Block until the gate is ours. Released when the guard drops.
    pub fn acquire(&self) -> io::Result<GateGuard<'_>> {
        self.sem.wait()?;
        Ok(GateGuard { gate: self })
    }

    /// Acquire, or `Ok(None)` if the gate stays taken for `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> io::Result<Option<GateGuard<'_>>> {
        Ok(self
            .sem
            .wait_timeout(timeout)?
            .then_some(GateGuard { gate: self }))
    }

    /// Guard for the permit a [`create_held`](Self::create_held) caller owns.
    /// Must be called at most once, and only by the creator.
    pub fn assume_held(&self) -> GateGuard<'_> {
        GateGuard { gate: self }
    }

    pub fn name(&self) -> &str {
        self.sem.name()
    }
}

#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    gate: &'a MutualExclusionGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.gate.sem.post() {
            error!("failed to release gate {}: {e}", self.gate.name());
        }
    }
}
