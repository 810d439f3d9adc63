use std::time::Instant;

use crate::progress::{ProgressStats, progress_stats};

/// A URL the user asked to relay, as learned by the prober.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Source URL.
    pub source: String,
    /// Name suggested by the server or derived from the URL.
    pub suggested_name: String,
    /// Advertised size in bytes. 0 means unknown, not empty.
    pub size_bytes: u64,
}

impl TransferRequest {
    pub fn new(source: impl Into<String>, probe: ProbeResult) -> Self {
        Self {
            source: source.into(),
            suggested_name: probe.file_name,
            size_bytes: probe.size_bytes,
        }
    }

    /// Returns `true` when the server did not advertise a length.
    pub fn size_unknown(&self) -> bool {
        self.size_bytes == 0
    }
}

/// Result of a metadata-only probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// `Content-Length` of the resource (0 when the header is missing).
    pub size_bytes: u64,
    /// Sanitized file name.
    pub file_name: String,
}

/// One progress observation.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub started_at: Instant,
}

impl ProgressSample {
    /// Derived statistics using the time elapsed since `started_at`.
    pub fn stats(&self) -> ProgressStats {
        progress_stats(
            self.bytes_done,
            self.bytes_total,
            self.started_at.elapsed().as_secs_f64(),
        )
    }
}
