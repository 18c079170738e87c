//! Nimbus - personal cloud file store.
//!
//! This crate holds the storage side of the file store: the resumable
//! chunked upload engine, the physical file storage it writes into, and the
//! quota check that admits new uploads.

pub mod config;
pub mod error;
pub mod file;
pub mod logging;
pub mod quota;
pub mod upload;

pub use config::Config;
pub use error::{NimbusError, Result};
pub use file::FileStorage;
pub use quota::{Quota, QuotaReport, StorageQuota};
pub use upload::{
    Admission, AdmissionController, PumpOutcome, UploadEngine, UploadError, UploadEvent,
    UploadHandle, UploadResult, UploadStatus,
};
