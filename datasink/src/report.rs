use std::fmt;
use tracing::{info, warn};

/// Counters for a single pass over the input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub lines: u64,
    pub metadata_lines: u64,
    /// lines that parsed as a benchmark result
    pub benchmarks: u64,
    /// benchmarks that made it to the store
    pub encoded: u64,
    pub missing_ns_per_op: u64,
    /// lines that were neither metadata nor a benchmark result
    pub ignored_lines: u64,
    pub failed_writes: u64,
}

impl ScanReport {
    pub fn log(&self) {
        if self.failed_writes > 0 {
            warn!(
                failed_writes = self.failed_writes,
                "Some writes to the store failed"
            );
        }

        info!(
            lines = self.lines,
            benchmarks = self.benchmarks,
            encoded = self.encoded,
            missing_ns_per_op = self.missing_ns_per_op,
            ignored = self.ignored_lines,
            "{}",
            self
        );
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stored {}/{} benchmarks from {} lines ({} without ns/op, {} ignored, {} failed writes)",
            self.encoded,
            self.benchmarks,
            self.lines,
            self.missing_ns_per_op,
            self.ignored_lines,
            self.failed_writes
        )
    }
}
