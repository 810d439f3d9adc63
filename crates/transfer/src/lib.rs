//! Chunked URL downloads with progress reporting.
//!
//! The pipeline is: [`Prober`] learns the size and name of a remote file,
//! [`Downloader`] streams it to disk in fixed-size chunks, and
//! [`ProgressReporter`] turns per-chunk samples into status text pushed to a
//! [`StatusSink`] on a best-effort basis.

mod chunked;
mod probe;
mod progress;
mod types;
mod validation;
mod workspace;

pub use chunked::Downloader;
pub use probe::{Prober, filename_from_disposition, filename_from_url};
pub use progress::{
    PROGRESS_BAR_WIDTH, ProgressReporter, ProgressStats, SinkError, StatusSink, format_eta,
    format_size, format_speed, progress_bar, progress_stats, render_progress,
};
pub use types::{ProbeResult, ProgressSample, TransferRequest};
pub use validation::{
    DEFAULT_FILE_NAME, rename_preserving_extension, sanitize_file_name, validate_file_name,
};
pub use workspace::TransferWorkspace;

/// Download chunk size: 1 KiB.
///
/// The progress callback fires once per chunk, so this also sets the
/// reporting granularity.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe failed for {url}: {reason}")]
    Probe { url: String, reason: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("download interrupted after {received} bytes: {source}")]
    Interrupted {
        received: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid file name: {0}")]
    InvalidName(String),
}
