//! Per-file upload state.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::coverage::{CoverageTracker, WrittenRange};
use super::queue::{BlobQueue, Fragment};

/// Identifies one initialization of an upload path.
///
/// A path that is removed and initialized again gets a new id, which lets a
/// pump tell its own record apart from a successor at the same path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned to the caller of a successful initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHandle {
    /// Id of this initialization.
    pub id: UploadId,
    /// Destination storage path.
    pub path: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Owning user.
    pub owner_id: i64,
}

/// State of one in-flight upload.
#[derive(Debug)]
pub struct UploadRecord {
    pub(crate) id: UploadId,
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) size: u64,
    pub(crate) received_bytes: u64,
    pub(crate) coverage: CoverageTracker,
    pub(crate) completed: bool,
    pub(crate) writing: bool,
    pub(crate) queue: BlobQueue,
    pub(crate) owner_id: i64,
    pub(crate) client_path: String,
    pub(crate) started_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Create an empty record for `path`.
    pub fn new(
        path: impl Into<String>,
        size: u64,
        owner_id: i64,
        client_path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let name = display_name(&path);
        let coverage = CoverageTracker::new();
        Self {
            id: UploadId::new(),
            path,
            name,
            size,
            received_bytes: 0,
            completed: coverage.is_complete(size),
            coverage,
            writing: false,
            queue: BlobQueue::new(),
            owner_id,
            client_path: client_path.into(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> UploadId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes accepted into the queue so far.
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    /// Bytes confirmed written, summed over written ranges.
    pub fn saved(&self) -> u64 {
        self.coverage.saved()
    }

    pub fn written_ranges(&self) -> &[WrittenRange] {
        self.coverage.ranges()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether this record holds a disk-write admission slot.
    pub fn is_writing(&self) -> bool {
        self.writing
    }

    pub fn queued_fragments(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn enqueue(&mut self, fragment: Fragment) {
        self.received_bytes += fragment.len();
        self.queue.push(fragment);
    }

    /// Account a finished write of `[from, to)` and refresh `completed`.
    pub(crate) fn record_write(&mut self, from: u64, to: u64) {
        self.coverage.record(from, to);
        self.completed = self.coverage.is_complete(self.size);
    }

    pub(crate) fn handle(&self) -> UploadHandle {
        UploadHandle {
            id: self.id,
            path: self.path.clone(),
            size: self.size,
            owner_id: self.owner_id,
        }
    }

    /// Take a point-in-time snapshot.
    pub fn status(&self) -> UploadStatus {
        UploadStatus {
            name: self.name.clone(),
            size: self.size,
            received: self.received_bytes,
            saved: self.saved(),
            completed: self.completed,
            fragments_queued: self.queue.len(),
            bytes_queued: self.queue.queued_bytes(),
            writing: self.writing,
            owner_id: self.owner_id,
            client_path: self.client_path.clone(),
            started_at: self.started_at,
        }
    }
}

/// Snapshot of an upload's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadStatus {
    /// Display name, the last component of the path.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Bytes accepted into the queue.
    pub received: u64,
    /// Bytes confirmed written.
    pub saved: u64,
    /// Whether `saved >= size`.
    pub completed: bool,
    /// Fragments waiting to be written.
    pub fragments_queued: usize,
    /// Payload bytes waiting to be written.
    pub bytes_queued: u64,
    /// Whether the upload currently holds a write slot.
    pub writing: bool,
    /// Owning user.
    pub owner_id: i64,
    /// Path as the client named it.
    pub client_path: String,
    /// When the upload was initialized.
    pub started_at: DateTime<Utc>,
}

impl UploadStatus {
    /// Serialize the snapshot for transport to clients.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("photos/2024/beach.jpg"), "beach.jpg");
        assert_eq!(display_name("a.bin"), "a.bin");
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = UploadRecord::new("docs/report.pdf", 100, 7, "/home/me/report.pdf");

        assert_eq!(record.path(), "docs/report.pdf");
        assert_eq!(record.size(), 100);
        assert_eq!(record.received_bytes(), 0);
        assert_eq!(record.saved(), 0);
        assert!(!record.is_completed());
        assert!(!record.is_writing());
        assert_eq!(record.queued_fragments(), 0);
    }

    #[test]
    fn test_received_tracks_ingress_not_durability() {
        let mut record = UploadRecord::new("a.bin", 10, 1, "a.bin");
        record.enqueue(Fragment::new(0, vec![0; 4]));
        record.enqueue(Fragment::new(4, vec![0; 6]));

        assert_eq!(record.received_bytes(), 10);
        assert_eq!(record.saved(), 0);
        assert_eq!(record.queued_fragments(), 2);
    }

    #[test]
    fn test_record_write_flips_completed() {
        let mut record = UploadRecord::new("a.bin", 10, 1, "a.bin");

        record.record_write(5, 10);
        assert!(!record.is_completed());

        record.record_write(0, 5);
        assert!(record.is_completed());
        assert_eq!(record.written_ranges(), &[(5, 10), (0, 5)]);
    }

    #[test]
    fn test_zero_size_record_is_complete() {
        let record = UploadRecord::new("empty.txt", 0, 1, "empty.txt");

        assert!(record.is_completed());
        assert!(record.status().completed);
        assert_eq!(record.saved(), 0);
    }

    #[test]
    fn test_each_record_gets_fresh_id() {
        let a = UploadRecord::new("a.bin", 1, 1, "a.bin");
        let b = UploadRecord::new("a.bin", 1, 1, "a.bin");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.handle().id, a.id());
    }

    #[test]
    fn test_status_json() {
        let mut record = UploadRecord::new("dir/b.bin", 100, 3, "b.bin");
        record.enqueue(Fragment::new(0, vec![0; 40]));

        let json: serde_json::Value = serde_json::from_str(&record.status().to_json()).unwrap();

        assert_eq!(json["name"], "b.bin");
        assert_eq!(json["size"], 100);
        assert_eq!(json["received"], 40);
        assert_eq!(json["saved"], 0);
        assert_eq!(json["completed"], false);
        assert_eq!(json["fragments_queued"], 1);
        assert_eq!(json["bytes_queued"], 40);
        assert_eq!(json["owner_id"], 3);
    }
}
