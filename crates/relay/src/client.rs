//! Chat platform abstraction.
//!
//! The front end implements [`ChatClient`] on top of the real messaging
//! platform. The relay only ever talks to it through this trait, which
//! keeps the flows testable with an in-memory mock.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use linkdrop_protocol::{ChatId, DeliveryKind, MessageRef};
use linkdrop_transfer::{SinkError, StatusSink};

use crate::error::ClientError;

/// Boxed future returned by [`ChatClient`] methods.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Progress callback: `(bytes_done, bytes_total)`; total is 0 when unknown.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// A labelled button whose `data` comes back as a selection event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Operations the relay needs from the messaging platform.
pub trait ChatClient: Send + Sync {
    /// Sends a plain message.
    fn send_text<'a>(&'a self, chat: ChatId, text: &'a str) -> ClientFuture<'a, MessageRef>;

    /// Sends a message with choice buttons.
    fn send_choices<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
        choices: &'a [Choice],
    ) -> ClientFuture<'a, MessageRef>;

    /// Replaces the text of a message (and drops its buttons).
    fn edit_text<'a>(&'a self, message: MessageRef, text: &'a str) -> ClientFuture<'a, ()>;

    fn delete_message(&self, message: MessageRef) -> ClientFuture<'_, ()>;

    /// Fetches an uploaded file into `dest` and returns the bytes written.
    fn download_media<'a>(
        &'a self,
        file_id: &'a str,
        dest: &'a Path,
        progress: &'a ProgressFn<'a>,
    ) -> ClientFuture<'a, u64>;

    /// Sends a local file to `chat` as `file_name`.
    fn send_file<'a>(
        &'a self,
        chat: ChatId,
        path: &'a Path,
        file_name: &'a str,
        kind: DeliveryKind,
        progress: &'a ProgressFn<'a>,
    ) -> ClientFuture<'a, ()>;
}

/// [`StatusSink`] that edits one chat message in place.
pub struct StatusMessage {
    client: Arc<dyn ChatClient>,
    message: MessageRef,
}

impl StatusMessage {
    pub fn new(client: Arc<dyn ChatClient>, message: MessageRef) -> Self {
        Self { client, message }
    }
}

impl StatusSink for StatusMessage {
    fn update(&self, text: String) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .edit_text(self.message, &text)
                .await
                .map_err(|e| SinkError(e.to_string()))
        })
    }
}
