//! User-facing texts.

use linkdrop_protocol::DeliveryKind;
use linkdrop_transfer::format_size;

use crate::error::RelayError;

pub const START: &str = "Hello! 👋\n\n\
    I'm here to help you manage files. Send a file or URL, and I'll assist \
    with downloading, renaming, or converting it.\n\n\
    Type /help for more options.";

pub const HELP: &str = "Help Menu\n\n\
    • Send a URL or file: I will assist with renaming, downloading, or converting.\n\
    Commands:\n\
    /start - Start the bot\n\
    /help - Show this help message";

pub const INFO_NOT_AVAILABLE: &str = "File information is not available for this link.";
pub const ASK_NEW_NAME: &str = "Send the new name for the file.";
pub const DOWNLOADING: &str = "📥 Downloading...";
pub const UPLOADING: &str = "📤 Uploading...";

pub const LABEL_DEFAULT: &str = "Default";
pub const LABEL_RENAME: &str = "Rename";

/// Label of the convert button for a file uploaded as `kind`.
pub fn convert_label(kind: DeliveryKind) -> &'static str {
    match kind.converted() {
        DeliveryKind::Document => "Convert to Document",
        DeliveryKind::Video => "Convert to Video",
    }
}

fn size_text(size_bytes: u64) -> String {
    if size_bytes == 0 {
        "unknown".to_string()
    } else {
        format_size(size_bytes)
    }
}

pub fn url_offer(file_name: &str, size_bytes: u64) -> String {
    format!(
        "📤 How would you like to upload?\n\nName: {file_name}\nSize: {}",
        size_text(size_bytes)
    )
}

pub fn media_offer(file_name: &str, size_bytes: u64) -> String {
    format!(
        "What do you want to do with this file?\n\nName: {file_name}\nSize: {}",
        size_text(size_bytes)
    )
}

/// Reply text for a failed request, or `None` when no reply should be sent.
pub fn error_reply(err: &RelayError) -> Option<String> {
    let text = match err {
        RelayError::Probe(e) => format!("Error: could not read file information ({e})."),
        RelayError::Transfer(e) => format!("Error: {e}"),
        RelayError::SizeLimitExceeded { size, limit } => format!(
            "File is too large: {} (limit {}).",
            format_size(*size),
            format_size(*limit)
        ),
        RelayError::InvalidSelection(_) => "Invalid action.".to_string(),
        RelayError::InvalidName(_) => "Invalid filename. Send another name.".to_string(),
        RelayError::TimedOut(_) => "Transfer timed out.".to_string(),
        RelayError::Session(e) => format!("Error: {e}"),
        RelayError::Client(_) => return None,
    };
    Some(text)
}
