//! Resumable chunked upload engine.
//!
//! Fragments of a file arrive in any order, wait in a per-upload queue and
//! are written positionally by a pump that holds one of a bounded number of
//! write slots:
//! - `registry`: the uploads in flight, keyed by destination path
//! - `queue`: fragments received but not yet written
//! - `writer`: one positional write at a time, honoring backpressure
//! - `coverage`: bytes confirmed written per upload
//! - `admission`: the global writer ceiling and reserved-bytes figure
//! - `engine`: everything above behind one shared, lockable object

mod admission;
mod coverage;
mod engine;
mod event;
mod queue;
mod record;
mod registry;
mod writer;

pub use admission::{Admission, AdmissionController};
pub use coverage::{covered_bytes, CoverageTracker, WrittenRange};
pub use engine::{PumpOutcome, UploadEngine};
pub use event::UploadEvent;
pub use queue::{BlobQueue, Fragment};
pub use record::{UploadHandle, UploadId, UploadRecord, UploadStatus};
pub use registry::UploadRegistry;
pub use writer::DiskWriter;

use thiserror::Error;

/// Errors returned by the upload engine.
///
/// Every error concerns a single upload; none of them affect other uploads.
#[derive(Error, Debug)]
pub enum UploadError {
    /// An upload is already registered for the path.
    #[error("upload already active for {0}")]
    AlreadyActive(String),

    /// No upload is registered for the path.
    #[error("no active upload for {0}")]
    UnknownUpload(String),

    /// The positional write of `len` bytes at `position` failed; the
    /// fragment was not counted and may be resubmitted.
    #[error("write of {len} bytes at {position} failed for {path}: {source}")]
    WriteFailure {
        path: String,
        position: u64,
        len: u64,
        #[source]
        source: std::io::Error,
    },

    /// A fragment reaches past the declared size.
    #[error("fragment at {position} (+{len}) exceeds size {size} of {path}")]
    OutOfBounds {
        path: String,
        position: u64,
        len: u64,
        size: u64,
    },

    /// The declared size is larger than the configured maximum.
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// The destination path cannot be used as a storage path.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// The dedicated space cannot hold the upload.
    #[error("quota exceeded: {requested} bytes requested, {available} available")]
    QuotaExceeded { requested: u64, available: u64 },
}

/// Result type alias for upload engine operations.
pub type UploadResult<T> = std::result::Result<T, UploadError>;
