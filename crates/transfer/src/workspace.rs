use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::TransferError;
use crate::validation::validate_file_name;

/// Download directory split into one slot per transfer.
///
/// Each transfer writes to `<root>/<slot>/<file_name>`, so two transfers
/// with the same file name never share a destination.
#[derive(Debug, Clone)]
pub struct TransferWorkspace {
    root: PathBuf,
}

impl TransferWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by `slot`. Not created until something is written.
    pub fn slot_dir(&self, slot: &str) -> PathBuf {
        self.root.join(slot)
    }

    /// Destination path for `file_name` inside `slot`.
    pub fn destination(&self, slot: &str, file_name: &str) -> Result<PathBuf, TransferError> {
        validate_file_name(slot)?;
        validate_file_name(file_name)?;
        Ok(self.slot_dir(slot).join(file_name))
    }

    /// Removes the slot and everything in it.
    ///
    /// Missing slots are fine; other failures are logged and ignored.
    pub async fn release(&self, slot: &str) {
        if validate_file_name(slot).is_err() {
            warn!(slot, "refusing to release invalid slot");
            return;
        }

        let dir = self.slot_dir(slot);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "transfer slot released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "transfer slot already gone")
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to release transfer slot"),
        }
    }
}
