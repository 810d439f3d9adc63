use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderMap};
use tracing::debug;

use crate::TransferError;
use crate::types::ProbeResult;
use crate::validation::sanitize_file_name;

static QUOTED_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename="(.+?)""#).expect("static regex"));

static BARE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename=([^;"\s]+)"#).expect("static regex"));

/// Issues header-only requests to learn a resource's size and name.
#[derive(Clone)]
pub struct Prober {
    http: reqwest::Client,
}

impl Prober {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Probes `url` with a HEAD request.
    ///
    /// `size_bytes` is 0 when the server omits `Content-Length`; callers
    /// must read that as "unknown". Unreachable hosts and non-success
    /// statuses fail with [`TransferError::Probe`].
    pub async fn probe(&self, url: &str) -> Result<ProbeResult, TransferError> {
        let response = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|e| TransferError::Probe {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Probe {
                url: url.to_string(),
                reason: format!("status {status}"),
            });
        }

        let size_bytes = content_length(response.headers());
        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .map(|name| sanitize_file_name(&name))
            .unwrap_or_else(|| filename_from_url(url));

        debug!(url, size_bytes, file_name = %file_name, "probed remote file");
        Ok(ProbeResult {
            size_bytes,
            file_name,
        })
    }
}

/// Reads `Content-Length` straight from the headers (0 when absent or invalid).
///
/// The header is read directly because a HEAD response carries no body for
/// the client to size.
pub(crate) fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Extracts the file name from a `Content-Disposition` value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    QUOTED_FILENAME
        .captures(value)
        .or_else(|| BARE_FILENAME.captures(value))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Derives a file name from the last path segment of `url`.
///
/// Query string and fragment are ignored and the segment is percent-decoded.
pub fn filename_from_url(url: &str) -> String {
    let segment = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    }
    .unwrap_or_default();

    let decoded = percent_decode_str(&segment).decode_utf8_lossy();
    sanitize_file_name(&decoded)
}
