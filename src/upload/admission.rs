//! Global cap on the number of uploads writing to disk at once.
//!
//! The writing count is never stored separately: it is recounted from the
//! records' `writing` flags, so it always equals the number of records that
//! hold a slot, and evicting a record frees its slot.

use super::registry::UploadRegistry;
use super::UploadResult;

/// Outcome of asking for a write slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The record now holds a slot and may start writing.
    Granted,
    /// The record already holds a slot; its running pump will see new fragments.
    AlreadyWriting,
    /// The ceiling is reached; try again after another upload releases its slot.
    Denied,
}

impl Admission {
    /// Check if the caller should start pumping.
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Admission policy for disk writers.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    max_concurrent_writers: usize,
}

impl AdmissionController {
    /// Create a controller admitting at most `max_concurrent_writers` writers,
    /// but always at least one.
    pub fn new(max_concurrent_writers: usize) -> Self {
        Self {
            max_concurrent_writers: max_concurrent_writers.max(1),
        }
    }

    pub fn max_concurrent_writers(&self) -> usize {
        self.max_concurrent_writers
    }

    /// Number of records currently holding a slot.
    pub fn writing_count(&self, registry: &UploadRegistry) -> usize {
        registry.records().filter(|r| r.is_writing()).count()
    }

    /// Whether one more record could start writing right now.
    pub fn may_start_writing(&self, registry: &UploadRegistry) -> bool {
        self.writing_count(registry) < self.max_concurrent_writers
    }

    /// Check the ceiling and take a slot for `path` in one step.
    ///
    /// Callers hold the registry exclusively across the call, so two records
    /// can never both pass the check for the last slot.
    pub fn try_acquire(
        &self,
        registry: &mut UploadRegistry,
        path: &str,
    ) -> UploadResult<Admission> {
        if registry.get(path)?.is_writing() {
            return Ok(Admission::AlreadyWriting);
        }
        if !self.may_start_writing(registry) {
            return Ok(Admission::Denied);
        }

        registry.get_mut(path)?.writing = true;
        Ok(Admission::Granted)
    }

    /// Give up the slot held by `path`.
    ///
    /// Returns `false` when the record is gone or held no slot.
    pub fn release(&self, registry: &mut UploadRegistry, path: &str) -> bool {
        match registry.get_mut(path) {
            Ok(record) if record.writing => {
                record.writing = false;
                true
            }
            _ => false,
        }
    }

    /// Set the `writing` flag of `path`.
    ///
    /// Setting it goes through `try_acquire`, so the ceiling still holds;
    /// returns the resulting flag.
    pub fn set_writing(
        &self,
        registry: &mut UploadRegistry,
        path: &str,
        value: bool,
    ) -> UploadResult<bool> {
        if value {
            let admission = self.try_acquire(registry, path)?;
            Ok(admission != Admission::Denied)
        } else {
            registry.get(path)?;
            self.release(registry, path);
            Ok(false)
        }
    }

    /// Declared size of every registered upload, summed.
    ///
    /// The quota check adds this to the bytes already on disk before
    /// admitting a new upload.
    pub fn reserved_bytes(&self, registry: &UploadRegistry) -> u64 {
        registry.records().map(|r| r.size()).sum()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(1)
    }
}
