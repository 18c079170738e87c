//! Test helpers for upload engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use nimbus::{FileStorage, UploadEngine};
use tempfile::TempDir;

/// Largest declared size accepted by test engines.
pub const TEST_MAX_UPLOAD: u64 = 16 * 1024 * 1024;

/// Create an engine over a fresh temporary storage directory.
///
/// The `TempDir` must be kept alive for as long as the engine is used.
pub fn setup_engine(max_concurrent_writers: usize) -> (TempDir, Arc<UploadEngine>) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path()).unwrap();
    let engine = UploadEngine::new(storage, max_concurrent_writers, TEST_MAX_UPLOAD, 64);
    (temp_dir, Arc::new(engine))
}

/// Deterministic payload of `len` bytes starting at `position`.
pub fn payload(position: u64, len: usize) -> Vec<u8> {
    (0..len as u64).map(|i| ((position + i) % 251) as u8).collect()
}

/// Read a destination file back from storage.
pub fn read_stored(engine: &UploadEngine, path: &str) -> Vec<u8> {
    std::fs::read(engine.storage().resolve(path).unwrap()).unwrap()
}
