//! Accounting of byte ranges confirmed written for one upload.

/// Half-open byte interval `[from, to)` that was durably written.
pub type WrittenRange = (u64, u64);

/// Written-range ledger for a single destination file.
///
/// Ranges are appended once per successful write and never merged, so
/// overlapping writes are counted twice and `saved` may exceed the file size.
#[derive(Debug, Clone, Default)]
pub struct CoverageTracker {
    ranges: Vec<WrittenRange>,
    saved: u64,
}

impl CoverageTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed write of `[from, to)` and return the new total.
    pub fn record(&mut self, from: u64, to: u64) -> u64 {
        self.ranges.push((from, to));
        self.saved = covered_bytes(&self.ranges);
        self.saved
    }

    /// Sum of the lengths of all recorded ranges.
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Recorded ranges in completion order.
    pub fn ranges(&self) -> &[WrittenRange] {
        &self.ranges
    }

    /// Whether the recorded bytes reach `size`.
    pub fn is_complete(&self, size: u64) -> bool {
        self.saved >= size
    }
}

/// Sum `to - from` over `ranges`.
pub fn covered_bytes(ranges: &[WrittenRange]) -> u64 {
    ranges
        .iter()
        .map(|&(from, to)| to.saturating_sub(from))
        .sum()
}
