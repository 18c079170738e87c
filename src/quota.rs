//! Storage quota for Nimbus.
//!
//! A new upload is admitted only while the bytes already on disk, plus the
//! declared size of every upload still in flight, plus the new upload's size
//! fit in the dedicated space. Counting in-flight uploads at their declared
//! size keeps concurrent uploads from overcommitting space they have not
//! written yet.

use serde::Serialize;

use crate::file::FileStorage;
use crate::upload::{UploadError, UploadResult};
use crate::Result;

/// Source of disk usage figures.
pub trait Quota {
    /// Bytes currently committed to disk.
    fn used_bytes(&self) -> Result<u64>;

    /// Space set aside for stored files.
    fn dedicated_bytes(&self) -> u64;
}

/// Quota over a [`FileStorage`] directory with a fixed dedicated size.
#[derive(Debug, Clone)]
pub struct StorageQuota {
    storage: FileStorage,
    dedicated: u64,
}

impl StorageQuota {
    /// Create a quota for `storage` with `dedicated` bytes of space.
    pub fn new(storage: FileStorage, dedicated: u64) -> Self {
        Self { storage, dedicated }
    }
}

impl Quota for StorageQuota {
    fn used_bytes(&self) -> Result<u64> {
        self.storage.used_bytes()
    }

    fn dedicated_bytes(&self) -> u64 {
        self.dedicated
    }
}

/// Point-in-time usage figures, as shown to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaReport {
    /// Bytes on disk.
    pub used: u64,
    /// Declared bytes of uploads in flight.
    pub reserved: u64,
    /// Dedicated space.
    pub dedicated: u64,
}

impl QuotaReport {
    /// Read the current figures from `quota`.
    pub fn collect(quota: &impl Quota, reserved: u64) -> Result<Self> {
        Ok(Self {
            used: quota.used_bytes()?,
            reserved,
            dedicated: quota.dedicated_bytes(),
        })
    }

    /// Bytes still free for new uploads.
    pub fn available(&self) -> u64 {
        self.dedicated
            .saturating_sub(self.used.saturating_add(self.reserved))
    }

    /// Refuse `requested` bytes if they do not fit in what is available.
    pub fn check(&self, requested: u64) -> UploadResult<()> {
        let available = self.available();
        if requested > available {
            return Err(UploadError::QuotaExceeded {
                requested,
                available,
            });
        }
        Ok(())
    }
}
