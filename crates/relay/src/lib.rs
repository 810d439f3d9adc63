//! Link and media relay: the bot's business logic.
//!
//! This crate has no transport of its own. A front end feeds
//! [`ChatEvent`](linkdrop_protocol::ChatEvent)s into [`Relay::handle_event`]
//! and provides a [`ChatClient`] that talks to the messaging platform.
//!
//! # Flow
//!
//! 1. **Offer**: a link is probed (or an upload inspected) and the user gets
//!    a prompt whose buttons carry `tag|key` payloads
//! 2. **Select**: the payload is decoded and its session consumed exactly once
//! 3. **Rename** (optional): the next text from that chat becomes the new name
//! 4. **Transfer**: download to a private slot, upload, delete the status
//!    message, release the slot

pub mod client;
pub mod error;
pub mod messages;
pub mod relay;
pub mod types;

// Re-export primary types for convenience.
pub use client::{ChatClient, Choice, ClientFuture, ProgressFn, StatusMessage};
pub use error::{ClientError, RelayError};
pub use relay::{PendingStore, Relay, RenameStore, detect_url};
pub use types::{DEFAULT_MAX_FILE_SIZE, MediaRequest, PendingTransfer, RelayConfig};
