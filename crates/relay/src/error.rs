//! Relay error types.

use std::time::Duration;

use linkdrop_protocol::ProtocolError;
use linkdrop_session::SessionError;
use linkdrop_transfer::TransferError;

/// Failure reported by a [`ChatClient`](crate::ChatClient) implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ClientError(pub String);

/// Errors produced while handling a chat event.
///
/// Every variant ends the triggering request; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Probe(#[source] TransferError),

    #[error("transfer failed: {0}")]
    Transfer(#[source] TransferError),

    #[error("file is {size} bytes, limit is {limit}")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("transfer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("chat client error: {0}")]
    Client(#[from] ClientError),
}

impl RelayError {
    /// Returns `true` when the user should get a reply explaining the failure.
    ///
    /// Client failures are excluded: the platform that failed is the one
    /// the reply would go through.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, RelayError::Client(_))
    }
}

impl From<TransferError> for RelayError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Probe { .. } => RelayError::Probe(e),
            TransferError::InvalidName(reason) => RelayError::InvalidName(reason),
            other => RelayError::Transfer(other),
        }
    }
}

impl From<ProtocolError> for RelayError {
    fn from(e: ProtocolError) -> Self {
        RelayError::InvalidSelection(e.to_string())
    }
}
