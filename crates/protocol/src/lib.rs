//! Chat-facing types shared by the relay and its front ends.
//!
//! The messaging platform is an external collaborator: this crate only
//! describes what arrives from it (events, selection payloads, commands)
//! and what is handed back to it (delivery kinds, message references).

pub mod command;
pub mod events;
pub mod selection;

// Re-export primary types for convenience.
pub use command::{Command, parse_command};
pub use events::{ChatEvent, ChatId, DeliveryKind, MediaInfo, MessageRef};
pub use selection::{SELECTION_SEPARATOR, Selection, SelectionAction, SessionKey};

/// Errors produced while decoding inbound payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed selection payload: {0}")]
    MalformedSelection(String),

    #[error("unknown selection action: {0}")]
    UnknownAction(String),

    #[error("invalid session key: {0}")]
    InvalidKey(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
