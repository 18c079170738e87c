//! Notifications emitted by the upload engine.

use serde::Serialize;

/// Lifecycle notification for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// Written bytes reached the declared size.
    Completed { path: String, size: u64 },
    /// The write of `len` bytes at `position` failed and was not counted.
    Failed {
        path: String,
        position: u64,
        len: u64,
        message: String,
    },
    /// The upload was removed from the registry.
    Removed { path: String },
}
