//! The upload engine shared by every request handler.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::fs::File;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::admission::{Admission, AdmissionController};
use super::event::UploadEvent;
use super::queue::Fragment;
use super::record::{UploadHandle, UploadId, UploadRecord, UploadStatus};
use super::registry::UploadRegistry;
use super::writer::DiskWriter;
use super::{UploadError, UploadResult};
use crate::config::Config;
use crate::file::FileStorage;
use crate::quota::{Quota, QuotaReport};
use crate::{NimbusError, Result};

/// What a pump attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The queue was written out and the slot released.
    Drained { saved: u64, completed: bool },
    /// No write slot was free; fragments stay queued until the next pump.
    Deferred,
    /// Another task is already pumping this upload and will write the queue.
    Busy,
    /// The upload was removed while pumping; later results were discarded.
    Cancelled,
}

/// Resumable upload engine.
///
/// All bookkeeping lives in one registry behind a mutex that is only held
/// between awaits, so writes to different files proceed concurrently while
/// each file has at most one write outstanding.
pub struct UploadEngine {
    registry: Mutex<UploadRegistry>,
    admission: AdmissionController,
    storage: FileStorage,
    max_upload_size: u64,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadEngine {
    /// Create an engine writing into `storage`.
    pub fn new(
        storage: FileStorage,
        max_concurrent_writers: usize,
        max_upload_size: u64,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            registry: Mutex::new(UploadRegistry::new()),
            admission: AdmissionController::new(max_concurrent_writers),
            storage,
            max_upload_size,
            events,
        }
    }

    /// Create an engine from configuration, creating the storage directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let storage = FileStorage::new(&config.storage.path)?;
        Ok(Self::new(
            storage,
            config.upload.max_concurrent_writers,
            config.storage.max_upload_size_bytes(),
            config.upload.event_capacity,
        ))
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Receive completion, failure and removal events.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, UploadRegistry> {
        // Every critical section leaves the registry consistent, so a
        // poisoned lock is still safe to use.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Register an upload of `size` bytes to `path`.
    pub fn init_upload(
        &self,
        path: &str,
        size: u64,
        owner_id: i64,
        client_path: &str,
    ) -> UploadResult<UploadHandle> {
        self.validate_init(path, size)?;
        let handle = self.lock().initialize(path, size, owner_id, client_path)?;
        info!(path, size, owner_id, "Upload initialized");
        self.announce_if_empty(&handle);
        Ok(handle)
    }

    /// Register an upload only if the dedicated space can hold it.
    ///
    /// The quota figures are read first; the reservation check and the
    /// registration then happen under one lock, so concurrent inits cannot
    /// both claim the same free space.
    pub fn init_upload_within(
        &self,
        quota: &impl Quota,
        path: &str,
        size: u64,
        owner_id: i64,
        client_path: &str,
    ) -> Result<UploadHandle> {
        self.validate_init(path, size)?;
        let used = quota.used_bytes()?;
        let dedicated = quota.dedicated_bytes();

        let handle = {
            let mut registry = self.lock();
            let report = QuotaReport {
                used,
                reserved: self.admission.reserved_bytes(&registry),
                dedicated,
            };
            report.check(size)?;
            registry.initialize(path, size, owner_id, client_path)?
        };
        info!(path, size, owner_id, "Upload initialized within quota");
        self.announce_if_empty(&handle);
        Ok(handle)
    }

    /// A zero-byte upload is complete as soon as it is registered.
    fn announce_if_empty(&self, handle: &UploadHandle) {
        if handle.size == 0 {
            info!(path = %handle.path, "Upload completed");
            self.emit(UploadEvent::Completed {
                path: handle.path.clone(),
                size: 0,
            });
        }
    }

    fn validate_init(&self, path: &str, size: u64) -> UploadResult<()> {
        if self.storage.resolve(path).is_err() {
            return Err(UploadError::InvalidPath(path.to_string()));
        }
        if size > self.max_upload_size {
            return Err(UploadError::TooLarge {
                size,
                limit: self.max_upload_size,
            });
        }
        Ok(())
    }

    /// Queue a fragment and try to write it out.
    ///
    /// Returns once the queue has been drained by this call, or immediately
    /// with `Deferred` or `Busy` if this call did not get to pump. A `Busy`
    /// caller's fragment is written by the pump already running; if that
    /// write fails, the caller learns of it from the `Failed` event on
    /// [`subscribe`](Self::subscribe), which names the fragment's position.
    pub async fn submit_fragment(
        &self,
        path: &str,
        position: u64,
        bytes: impl Into<Vec<u8>>,
    ) -> UploadResult<PumpOutcome> {
        let fragment = Fragment::new(position, bytes);
        let len = fragment.len();
        self.lock().enqueue_fragment(path, fragment)?;
        debug!(path, position, len, "Fragment queued");

        self.pump(path).await
    }

    /// Take a write slot for `path` and drain its queue.
    pub async fn pump(&self, path: &str) -> UploadResult<PumpOutcome> {
        let id = {
            let mut registry = self.lock();
            match self.admission.try_acquire(&mut registry, path)? {
                Admission::Granted => registry.get(path)?.id(),
                Admission::AlreadyWriting => return Ok(PumpOutcome::Busy),
                Admission::Denied => {
                    debug!(path, "Write slot denied, fragments stay queued");
                    return Ok(PumpOutcome::Deferred);
                }
            }
        };

        let mut slot = SlotGuard {
            engine: self,
            path,
            id,
            held: true,
        };
        self.drain(&mut slot).await
    }

    /// Write out the queue until it is empty.
    ///
    /// A failed write is reported with a `Failed` event and the pump moves
    /// on to the next fragment, so nothing is left queued without a pump.
    /// The first failure is returned once the queue is empty.
    async fn drain(&self, slot: &mut SlotGuard<'_>) -> UploadResult<PumpOutcome> {
        let path = slot.path;
        let mut writer: Option<DiskWriter<File>> = None;
        let mut failure: Option<UploadError> = None;

        loop {
            let fragment = {
                let mut registry = self.lock();
                let Some(record) = owned(&mut registry, path, slot.id) else {
                    slot.held = false;
                    return Ok(PumpOutcome::Cancelled);
                };
                match record.queue.pop() {
                    Some(fragment) => fragment,
                    None => {
                        // Released under the same lock as the empty check, so a
                        // fragment queued afterwards finds the slot free.
                        record.writing = false;
                        slot.held = false;
                        debug!(
                            path,
                            written = writer.as_ref().map_or(0, DiskWriter::bytes_written),
                            saved = record.saved(),
                            "Queue drained"
                        );
                        if let Some(failure) = failure {
                            return Err(failure);
                        }
                        return Ok(PumpOutcome::Drained {
                            saved: record.saved(),
                            completed: record.is_completed(),
                        });
                    }
                }
            };

            let result = self.write_fragment(&mut writer, path, &fragment).await;

            let mut registry = self.lock();
            let Some(record) = owned(&mut registry, path, slot.id) else {
                slot.held = false;
                warn!(
                    path,
                    position = fragment.position,
                    "Upload removed during write, result discarded"
                );
                return Ok(PumpOutcome::Cancelled);
            };

            if let Err(source) = result {
                drop(registry);
                // Reopen before the next fragment.
                writer = None;
                warn!(
                    path,
                    position = fragment.position,
                    len = fragment.len(),
                    "Write failed: {}",
                    source
                );
                self.emit(UploadEvent::Failed {
                    path: path.to_string(),
                    position: fragment.position,
                    len: fragment.len(),
                    message: source.to_string(),
                });
                if failure.is_none() {
                    failure = Some(UploadError::WriteFailure {
                        path: path.to_string(),
                        position: fragment.position,
                        len: fragment.len(),
                        source,
                    });
                }
                continue;
            }

            let was_completed = record.is_completed();
            record.record_write(fragment.position, fragment.end());
            debug!(
                path,
                position = fragment.position,
                len = fragment.len(),
                saved = record.saved(),
                "Fragment written"
            );

            if record.is_completed() && !was_completed {
                let size = record.size();
                drop(registry);
                info!(path, size, "Upload completed");
                self.emit(UploadEvent::Completed {
                    path: path.to_string(),
                    size,
                });
            }
        }
    }

    async fn write_fragment(
        &self,
        writer: &mut Option<DiskWriter<File>>,
        path: &str,
        fragment: &Fragment,
    ) -> io::Result<()> {
        let writer = match writer {
            Some(writer) => writer,
            empty @ None => {
                let file = self
                    .storage
                    .open_for_write(path)
                    .await
                    .map_err(|e| match e {
                        NimbusError::Io(e) => e,
                        other => io::Error::other(other.to_string()),
                    })?;
                empty.insert(DiskWriter::new(file))
            }
        };
        writer.write_at(fragment.position, &fragment.bytes).await
    }

    /// Try to pump every upload that has queued fragments and no slot.
    ///
    /// Pumps run concurrently; the writer ceiling decides which of them get
    /// to write.
    pub async fn pump_pending(&self) -> Vec<(String, UploadResult<PumpOutcome>)> {
        let paths = self.pending_paths();
        let results = join_all(paths.iter().map(|path| self.pump(path))).await;
        paths.into_iter().zip(results).collect()
    }

    /// Uploads with queued fragments that are not currently writing.
    pub fn pending_paths(&self) -> Vec<String> {
        let registry = self.lock();
        let mut paths: Vec<String> = registry
            .records()
            .filter(|r| !r.is_writing() && r.queued_fragments() > 0)
            .map(|r| r.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    /// Snapshot of an upload's progress.
    pub fn get_status(&self, path: &str) -> UploadResult<UploadStatus> {
        self.lock().status(path)
    }

    /// Forget the upload at `path`. Removing an unknown path does nothing.
    ///
    /// A pump still running for it stops before its next write.
    pub fn remove_upload(&self, path: &str) {
        let removed = self.lock().remove(path);
        if let Some(record) = removed {
            info!(
                path,
                saved = record.saved(),
                completed = record.is_completed(),
                "Upload removed"
            );
            self.emit(UploadEvent::Removed {
                path: path.to_string(),
            });
        }
    }

    /// Remove the upload and delete whatever was written of it.
    ///
    /// Returns `true` if a partial file was deleted.
    pub fn discard_upload(&self, path: &str) -> Result<bool> {
        self.remove_upload(path);
        self.storage.delete(path)
    }

    /// Declared bytes of every upload in flight.
    pub fn reserved_bytes(&self) -> u64 {
        self.admission.reserved_bytes(&self.lock())
    }

    /// Usage figures combining `quota` with the current reservations.
    pub fn quota_report(&self, quota: &impl Quota) -> Result<QuotaReport> {
        QuotaReport::collect(quota, self.reserved_bytes())
    }

    pub fn is_uploading(&self, path: &str) -> bool {
        self.lock().contains(path)
    }

    pub fn active_paths(&self) -> Vec<String> {
        self.lock().active_paths()
    }

    /// Whether another upload could get a write slot right now.
    pub fn may_start_writing(&self) -> bool {
        self.admission.may_start_writing(&self.lock())
    }

    /// Number of uploads holding a write slot.
    pub fn writing_count(&self) -> usize {
        self.admission.writing_count(&self.lock())
    }
}

/// The record at `path`, if it is still the one the pump started with.
fn owned<'a>(
    registry: &'a mut UploadRegistry,
    path: &str,
    id: UploadId,
) -> Option<&'a mut UploadRecord> {
    registry.get_mut(path).ok().filter(|record| record.id() == id)
}

/// Releases a pump's write slot if the pump future is dropped mid-write.
struct SlotGuard<'a> {
    engine: &'a UploadEngine,
    path: &'a str,
    id: UploadId,
    held: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let mut registry = self.engine.lock();
        if let Some(record) = owned(&mut registry, self.path, self.id) {
            record.writing = false;
            debug!(path = self.path, "Write slot released by dropped pump");
        }
    }
}
