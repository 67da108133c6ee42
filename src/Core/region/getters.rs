use super::*;

/// Accessors for the private fields of SharedRegion, used by the Debug
/// impls and by tests that need to look at the mapping itself.
impl SharedRegion {
    /// Get a reference to the underlying shared memory backend
    ///
    /// # Safety
    /// Reading the mapped bytes without holding the gate races with other processes
    pub unsafe fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Get the raw pointer to the mapped layout
    pub fn layout_ptr(&self) -> *const RegionLayout {
        self.layout
    }

    /// Names and poll interval this region was attached with
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub fn gate_name(&self) -> &str {
        self.gate.name()
    }

    /// Check if the mapping carries a valid header
    ///
    /// Magic and version are written once before the creator releases the gate
    /// and never change afterwards, so they can be read without it.
    pub fn is_initialized(&self) -> bool {
        unsafe {
            !self.layout.is_null()
                && (*self.layout).magic == REGION_MAGIC
                && (*self.layout).version == LAYOUT_VERSION
        }
    }
}
