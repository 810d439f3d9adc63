use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::probe::content_length;
use crate::{DOWNLOAD_CHUNK_SIZE, TransferError};

/// Streams remote resources to local files in fixed-size chunks.
#[derive(Clone)]
pub struct Downloader {
    http: reqwest::Client,
    chunk_size: usize,
}

impl Downloader {
    /// Creates a downloader writing [`DOWNLOAD_CHUNK_SIZE`] bytes per chunk.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            chunk_size: DOWNLOAD_CHUNK_SIZE,
        }
    }

    /// Downloads `url` into `dest` and returns the path written.
    ///
    /// - Creates the parent directory if needed and truncates `dest`.
    /// - Calls `progress(bytes_so_far, total_expected)` after every chunk;
    ///   `total_expected` is the response `Content-Length` (0 when absent).
    /// - A non-success status fails before `dest` is created.
    /// - A failure mid-stream flushes what was received and returns
    ///   [`TransferError::Interrupted`]; the partial file is left for the
    ///   caller to remove.
    ///
    /// No size limit is enforced here and nothing is resumed: every call
    /// starts from byte zero.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        mut progress: Option<&mut (dyn FnMut(u64, u64) + Send)>,
    ) -> Result<PathBuf, TransferError> {
        let mut response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "download rejected by server");
            return Err(TransferError::Status(status));
        }

        let total = content_length(response.headers());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;

        debug!(url, dest = %dest.display(), total, "download started");

        let mut pending: Vec<u8> = Vec::with_capacity(self.chunk_size * 2);
        let mut written: u64 = 0;

        loop {
            let bytes = match response.chunk().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(source) => {
                    // Keep every received byte so the file size matches `received`.
                    file.write_all(&pending).await?;
                    file.flush().await?;
                    let received = written + pending.len() as u64;
                    warn!(url, received, error = %source, "download interrupted");
                    return Err(TransferError::Interrupted { received, source });
                }
            };

            pending.extend_from_slice(&bytes);

            let mut consumed = 0;
            while pending.len() - consumed >= self.chunk_size {
                let chunk = &pending[consumed..consumed + self.chunk_size];
                file.write_all(chunk).await?;
                consumed += self.chunk_size;
                written += self.chunk_size as u64;
                if let Some(cb) = progress.as_deref_mut() {
                    cb(written, total);
                }
            }
            pending.drain(..consumed);
        }

        // Trailing partial chunk.
        if !pending.is_empty() {
            file.write_all(&pending).await?;
            written += pending.len() as u64;
            if let Some(cb) = progress.as_deref_mut() {
                cb(written, total);
            }
        }
        file.flush().await?;

        info!(url, dest = %dest.display(), bytes = written, "download finished");
        Ok(dest.to_path_buf())
    }
}
