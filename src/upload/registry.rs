//! The set of uploads currently in flight, keyed by destination path.

use std::collections::HashMap;

use super::queue::Fragment;
use super::record::{UploadHandle, UploadRecord, UploadStatus};
use super::{UploadError, UploadResult};

/// Keyed collection of upload records.
///
/// A path stays registered from `initialize` until `remove`; there is no
/// implicit expiry.
#[derive(Debug, Default)]
pub struct UploadRegistry {
    records: HashMap<String, UploadRecord>,
}

impl UploadRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new upload for `path`.
    ///
    /// Fails with `AlreadyActive` if the path is already registered; the
    /// existing record is left untouched.
    pub fn initialize(
        &mut self,
        path: &str,
        size: u64,
        owner_id: i64,
        client_path: &str,
    ) -> UploadResult<UploadHandle> {
        if self.records.contains_key(path) {
            return Err(UploadError::AlreadyActive(path.to_string()));
        }

        let record = UploadRecord::new(path, size, owner_id, client_path);
        let handle = record.handle();
        self.records.insert(path.to_string(), record);
        Ok(handle)
    }

    /// Append a fragment to the record's queue.
    ///
    /// Fragments reaching past the declared size are refused with `OutOfBounds`.
    pub fn enqueue_fragment(&mut self, path: &str, fragment: Fragment) -> UploadResult<()> {
        let record = self.get_mut(path)?;

        let fits = fragment
            .position
            .checked_add(fragment.len())
            .is_some_and(|end| end <= record.size);
        if !fits {
            return Err(UploadError::OutOfBounds {
                path: path.to_string(),
                position: fragment.position,
                len: fragment.len(),
                size: record.size,
            });
        }

        record.enqueue(fragment);
        Ok(())
    }

    /// Evict the record for `path`, returning it if it was present.
    ///
    /// Removing an absent path is a no-op.
    pub fn remove(&mut self, path: &str) -> Option<UploadRecord> {
        self.records.remove(path)
    }

    /// Snapshot of the record for `path`.
    pub fn status(&self, path: &str) -> UploadResult<UploadStatus> {
        self.get(path).map(UploadRecord::status)
    }

    /// Currently registered paths, sorted.
    pub fn active_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.records.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &str) -> UploadResult<&UploadRecord> {
        self.records
            .get(path)
            .ok_or_else(|| UploadError::UnknownUpload(path.to_string()))
    }

    pub fn get_mut(&mut self, path: &str) -> UploadResult<&mut UploadRecord> {
        self.records
            .get_mut(path)
            .ok_or_else(|| UploadError::UnknownUpload(path.to_string()))
    }

    /// Iterate over all records.
    pub fn records(&self) -> impl Iterator<Item = &UploadRecord> {
        self.records.values()
    }
}
