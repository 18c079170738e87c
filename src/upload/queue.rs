//! Pending fragments of one upload, held until the write pump takes them.

use std::collections::VecDeque;

/// A byte range of an upload as it arrived from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Absolute offset of the first byte in the destination file.
    pub position: u64,
    /// Fragment payload.
    pub bytes: Vec<u8>,
}

impl Fragment {
    /// Create a new fragment.
    pub fn new(position: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            position,
            bytes: bytes.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.position + self.len()
    }
}

/// FIFO holding area for received fragments.
///
/// Fragments leave in arrival order, not offset order: the destination is
/// written positionally, so arrival order has no bearing on the final content.
#[derive(Debug, Default)]
pub struct BlobQueue {
    fragments: VecDeque<Fragment>,
    queued_bytes: u64,
}

impl BlobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment at the back.
    pub fn push(&mut self, fragment: Fragment) {
        self.queued_bytes += fragment.len();
        self.fragments.push_back(fragment);
    }

    /// Take the oldest fragment.
    pub fn pop(&mut self) -> Option<Fragment> {
        let fragment = self.fragments.pop_front()?;
        self.queued_bytes -= fragment.len();
        Some(fragment)
    }

    /// Number of queued fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether no fragments are queued.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Total payload bytes waiting in the queue.
    pub fn queued_bytes(&self) -> u64 {
        self.queued_bytes
    }
}
