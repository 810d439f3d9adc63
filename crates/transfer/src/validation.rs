use std::path::Path;

use crate::TransferError;

/// Name used when neither the server nor the URL yields one.
pub const DEFAULT_FILE_NAME: &str = "download.bin";

/// Validates a bare file name used inside the download directory.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - `.` and `..`
/// - Path separators (`/`, `\`) and NUL bytes
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!(
            "reserved name not allowed: {name}"
        )));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    if name.contains('\0') {
        return Err(TransferError::InvalidName("NUL byte not allowed".into()));
    }

    Ok(())
}

/// Reduces a remote-supplied name to something [`validate_file_name`] accepts.
///
/// Keeps only the last path component, drops control characters, and falls
/// back to [`DEFAULT_FILE_NAME`].
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Builds `<new_stem>.<ext>` keeping the extension of `original`.
///
/// `report.pdf` renamed to `q3` becomes `q3.pdf`; a name without an
/// extension is used as-is.
pub fn rename_preserving_extension(original: &str, new_stem: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{new_stem}.{ext}"),
        _ => new_stem.to_string(),
    }
}
