//! Relay data types.

use std::path::PathBuf;
use std::time::Duration;

use linkdrop_protocol::{DeliveryKind, MediaInfo};
use linkdrop_transfer::{PROGRESS_BAR_WIDTH, TransferRequest, sanitize_file_name};

/// Largest file the relay accepts by default: 2 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// An uploaded media object waiting for a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub file_id: String,
    /// Declared name, sanitized.
    pub file_name: String,
    /// Declared size in bytes (0 when unknown).
    pub size_bytes: u64,
    /// How the file was originally uploaded.
    pub kind: DeliveryKind,
}

impl From<MediaInfo> for MediaRequest {
    fn from(info: MediaInfo) -> Self {
        let kind = info.delivery_kind();
        Self {
            file_name: sanitize_file_name(info.file_name.as_deref().unwrap_or_default()),
            file_id: info.file_id,
            size_bytes: info.file_size,
            kind,
        }
    }
}

/// Value held by both session registries.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingTransfer {
    Url(TransferRequest),
    Media(MediaRequest),
}

impl PendingTransfer {
    pub fn file_name(&self) -> &str {
        match self {
            PendingTransfer::Url(req) => &req.suggested_name,
            PendingTransfer::Media(media) => &media.file_name,
        }
    }
}

/// Relay behavior settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Files larger than this are refused before any body transfer.
    pub max_file_size: u64,
    /// Root of the per-transfer slot directories.
    pub download_dir: PathBuf,
    /// Minimum delay between two status message edits.
    pub progress_interval: Duration,
    pub progress_bar_width: usize,
    /// Offer links whose size the server does not advertise.
    pub allow_unknown_size: bool,
    /// Deadline covering download and upload of one transfer.
    pub transfer_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            download_dir: PathBuf::from("downloads"),
            progress_interval: Duration::from_secs(2),
            progress_bar_width: PROGRESS_BAR_WIDTH,
            allow_unknown_size: false,
            transfer_timeout: None,
        }
    }
}
