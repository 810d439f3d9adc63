//! Event handling: offer, confirm, rename, convert, deliver.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use linkdrop_protocol::{
    ChatEvent, ChatId, Command, DeliveryKind, MediaInfo, MessageRef, Selection, SelectionAction,
    SessionKey, parse_command,
};
use linkdrop_session::{InMemoryStore, SessionStore};
use linkdrop_transfer::{
    Downloader, ProgressReporter, Prober, StatusSink, TransferError, TransferRequest,
    TransferWorkspace, rename_preserving_extension, validate_file_name,
};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::client::{ChatClient, Choice, StatusMessage};
use crate::error::RelayError;
use crate::messages;
use crate::types::{MediaRequest, PendingTransfer, RelayConfig};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").expect("static regex"));

/// Sessions waiting for the user's choice, keyed by the payload key.
pub type PendingStore = Arc<dyn SessionStore<SessionKey, PendingTransfer>>;

/// Sessions waiting for a new name, keyed by chat.
pub type RenameStore = Arc<dyn SessionStore<ChatId, PendingTransfer>>;

/// Returns `text` if it is a single absolute http(s) URL.
pub fn detect_url(text: &str) -> Option<&str> {
    let candidate = text.trim();
    if !URL_PATTERN.is_match(candidate) {
        return None;
    }
    reqwest::Url::parse(candidate)
        .ok()
        .filter(|url| url.host_str().is_some())
        .map(|_| candidate)
}

/// Where the bytes of a transfer come from.
#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    Url(&'a str),
    Media(&'a str),
}

/// Turns chat events into transfers.
///
/// A URL or upload first produces a choice prompt backed by a pending
/// session. Picking a choice consumes the session exactly once. Renames
/// park the session per chat until the next text message arrives.
pub struct Relay {
    client: Arc<dyn ChatClient>,
    prober: Prober,
    downloader: Downloader,
    workspace: TransferWorkspace,
    pending: PendingStore,
    renames: RenameStore,
    config: RelayConfig,
}

impl Relay {
    /// Creates a relay with unbounded in-memory session stores.
    pub fn new(client: Arc<dyn ChatClient>, http: reqwest::Client, config: RelayConfig) -> Self {
        Self {
            client,
            prober: Prober::new(http.clone()),
            downloader: Downloader::new(http),
            workspace: TransferWorkspace::new(config.download_dir.clone()),
            pending: Arc::new(InMemoryStore::<SessionKey, PendingTransfer>::new()),
            renames: Arc::new(InMemoryStore::<ChatId, PendingTransfer>::new()),
            config,
        }
    }

    /// Replaces both session stores.
    pub fn with_stores(mut self, pending: PendingStore, renames: RenameStore) -> Self {
        self.pending = pending;
        self.renames = renames;
        self
    }

    /// Number of prompts still waiting for a choice.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if the next text from `chat` will be read as a name.
    pub fn awaiting_rename(&self, chat: ChatId) -> bool {
        self.renames.peek(&chat)
    }

    /// Drops expired sessions from both stores.
    pub fn evict_expired(&self) -> usize {
        self.pending.evict_expired() + self.renames.evict_expired()
    }

    /// Handles one inbound event.
    ///
    /// User-facing failures are answered in the chat before being returned;
    /// the caller only needs to log.
    pub async fn handle_event(&self, event: ChatEvent) -> Result<(), RelayError> {
        let chat_id = event.chat_id();
        let (result, origin) = match event {
            ChatEvent::Text { text, .. } => (self.on_text(chat_id, &text).await, None),
            ChatEvent::Media { media, .. } => (self.on_media(chat_id, media).await, None),
            ChatEvent::Selection { message, data, .. } => (
                self.on_selection(chat_id, message, &data).await,
                Some(message),
            ),
        };

        if let Err(e) = &result {
            self.report_failure(chat_id, origin, e).await;
        }
        result
    }

    async fn report_failure(&self, chat_id: ChatId, origin: Option<MessageRef>, err: &RelayError) {
        let Some(text) = messages::error_reply(err) else {
            return;
        };
        warn!(chat_id, error = %err, "request failed");

        // Selection failures replace the prompt, like the prompt's answer would.
        let sent = match origin {
            Some(message) => self.client.edit_text(message, &text).await,
            None => self.client.send_text(chat_id, &text).await.map(|_| ()),
        };
        if let Err(e) = sent {
            warn!(chat_id, error = %e, "failed to send error reply");
        }
    }

    // -----------------------------------------------------------------------
    // Inbound flows
    // -----------------------------------------------------------------------

    async fn on_text(&self, chat_id: ChatId, text: &str) -> Result<(), RelayError> {
        let text = text.trim();

        if self.renames.peek(&chat_id) {
            return self.on_rename_reply(chat_id, text).await;
        }

        if let Some(command) = parse_command(text) {
            let reply = match command {
                Command::Start => messages::START,
                Command::Help => messages::HELP,
            };
            self.client.send_text(chat_id, reply).await?;
            return Ok(());
        }

        match detect_url(text) {
            Some(url) => self.offer_url(chat_id, url).await,
            None => {
                debug!(chat_id, "ignoring free text");
                Ok(())
            }
        }
    }

    async fn offer_url(&self, chat_id: ChatId, url: &str) -> Result<(), RelayError> {
        let probe = self.prober.probe(url).await?;
        let request = TransferRequest::new(url, probe);

        if request.size_unknown() && !self.config.allow_unknown_size {
            info!(chat_id, url, "link does not advertise its size");
            self.client
                .send_text(chat_id, messages::INFO_NOT_AVAILABLE)
                .await?;
            return Ok(());
        }
        self.check_size(request.size_bytes)?;

        let text = messages::url_offer(&request.suggested_name, request.size_bytes);
        let key = SessionKey::generate();
        let choices = [
            Choice::new(
                messages::LABEL_DEFAULT,
                Selection::new(SelectionAction::UseDefault, key).encode(),
            ),
            Choice::new(
                messages::LABEL_RENAME,
                Selection::new(SelectionAction::RenameUrl, key).encode(),
            ),
        ];

        self.pending.put(key, PendingTransfer::Url(request))?;
        self.offer(chat_id, key, &text, &choices).await
    }

    async fn on_media(&self, chat_id: ChatId, media: MediaInfo) -> Result<(), RelayError> {
        let request = MediaRequest::from(media);
        self.check_size(request.size_bytes)?;

        let text = messages::media_offer(&request.file_name, request.size_bytes);
        let key = SessionKey::generate();
        let choices = [
            Choice::new(
                messages::LABEL_RENAME,
                Selection::new(SelectionAction::RenameMedia, key).encode(),
            ),
            Choice::new(
                messages::convert_label(request.kind),
                Selection::new(SelectionAction::Convert, key).encode(),
            ),
        ];

        self.pending.put(key, PendingTransfer::Media(request))?;
        self.offer(chat_id, key, &text, &choices).await
    }

    async fn offer(
        &self,
        chat_id: ChatId,
        key: SessionKey,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), RelayError> {
        if let Err(e) = self.client.send_choices(chat_id, text, choices).await {
            // Nobody can ever select an unsent prompt.
            self.pending.take(&key);
            return Err(e.into());
        }
        debug!(chat_id, %key, "choices offered");
        Ok(())
    }

    async fn on_selection(
        &self,
        chat_id: ChatId,
        message: MessageRef,
        data: &str,
    ) -> Result<(), RelayError> {
        let selection = Selection::parse(data)?;
        let pending = self.pending.take(&selection.key).ok_or_else(|| {
            RelayError::InvalidSelection(format!("no pending session {}", selection.key))
        })?;

        debug!(
            chat_id,
            key = %selection.key,
            action = selection.action.tag(),
            "selection accepted"
        );

        match (selection.action, pending) {
            (SelectionAction::UseDefault, PendingTransfer::Url(request)) => {
                self.run_transfer(
                    chat_id,
                    Source::Url(&request.source),
                    &request.suggested_name,
                    DeliveryKind::Document,
                )
                .await
            }
            (SelectionAction::RenameUrl, pending @ PendingTransfer::Url(_))
            | (SelectionAction::RenameMedia, pending @ PendingTransfer::Media(_)) => {
                self.await_rename(chat_id, message, pending).await
            }
            (SelectionAction::Convert, PendingTransfer::Media(media)) => {
                self.run_transfer(
                    chat_id,
                    Source::Media(&media.file_id),
                    &media.file_name,
                    media.kind.converted(),
                )
                .await?;
                if let Err(e) = self.client.delete_message(message).await {
                    debug!(chat_id, error = %e, "prompt not deleted");
                }
                Ok(())
            }
            (action, pending) => {
                // The session itself is fine; keep it selectable.
                if let Err(e) = self.pending.put(selection.key, pending) {
                    warn!(chat_id, key = %selection.key, error = %e, "session not restored");
                }
                Err(RelayError::InvalidSelection(format!(
                    "{} does not apply to this session",
                    action.tag()
                )))
            }
        }
    }

    async fn await_rename(
        &self,
        chat_id: ChatId,
        prompt: MessageRef,
        pending: PendingTransfer,
    ) -> Result<(), RelayError> {
        if let Some(previous) = self.renames.replace(chat_id, pending) {
            debug!(chat_id, file_name = previous.file_name(), "earlier rename abandoned");
        }
        self.client.edit_text(prompt, messages::ASK_NEW_NAME).await?;
        Ok(())
    }

    async fn on_rename_reply(&self, chat_id: ChatId, text: &str) -> Result<(), RelayError> {
        let stem = text.trim();
        // Rejected names leave the rename pending so the user can retry.
        validate_file_name(stem)?;

        let Some(pending) = self.renames.take(&chat_id) else {
            return Err(RelayError::InvalidSelection("no rename in progress".into()));
        };

        match pending {
            PendingTransfer::Url(request) => {
                let name = rename_preserving_extension(&request.suggested_name, stem);
                self.run_transfer(
                    chat_id,
                    Source::Url(&request.source),
                    &name,
                    DeliveryKind::Document,
                )
                .await
            }
            PendingTransfer::Media(media) => {
                let name = rename_preserving_extension(&media.file_name, stem);
                self.run_transfer(
                    chat_id,
                    Source::Media(&media.file_id),
                    &name,
                    DeliveryKind::Document,
                )
                .await
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    fn check_size(&self, size: u64) -> Result<(), RelayError> {
        if size > self.config.max_file_size {
            return Err(RelayError::SizeLimitExceeded {
                size,
                limit: self.config.max_file_size,
            });
        }
        Ok(())
    }

    fn reporter(&self, sink: Arc<dyn StatusSink>, action: &str) -> ProgressReporter {
        ProgressReporter::spawn(
            sink,
            action,
            self.config.progress_interval,
            self.config.progress_bar_width,
        )
    }

    /// Downloads into a fresh slot, delivers, and always cleans up.
    async fn run_transfer(
        &self,
        chat_id: ChatId,
        source: Source<'_>,
        file_name: &str,
        kind: DeliveryKind,
    ) -> Result<(), RelayError> {
        let slot = SessionKey::generate().to_string();
        let dest = self.workspace.destination(&slot, file_name)?;
        let status = self.client.send_text(chat_id, messages::DOWNLOADING).await?;

        let legs = self.transfer_legs(chat_id, status, source, &dest, file_name, kind);
        let result = match self.config.transfer_timeout {
            Some(limit) => tokio::time::timeout(limit, legs)
                .await
                .unwrap_or_else(|_| Err(RelayError::TimedOut(limit))),
            None => legs.await,
        };

        self.workspace.release(&slot).await;
        if let Err(e) = self.client.delete_message(status).await {
            debug!(chat_id, error = %e, "status message not deleted");
        }

        if result.is_ok() {
            info!(chat_id, file_name, ?kind, "file delivered");
        }
        result
    }

    async fn transfer_legs(
        &self,
        chat_id: ChatId,
        status: MessageRef,
        source: Source<'_>,
        dest: &Path,
        file_name: &str,
        kind: DeliveryKind,
    ) -> Result<(), RelayError> {
        let sink: Arc<dyn StatusSink> = Arc::new(StatusMessage::new(self.client.clone(), status));

        let reporter = self.reporter(sink.clone(), "Downloading");
        let downloaded = match source {
            Source::Url(url) => {
                let mut observe = |done: u64, total: u64| reporter.observe(done, total);
                self.downloader
                    .download(url, dest, Some(&mut observe))
                    .await
                    .map(|_| ())
                    .map_err(RelayError::from)
            }
            Source::Media(file_id) => {
                let observe = |done: u64, total: u64| reporter.observe(done, total);
                self.client
                    .download_media(file_id, dest, &observe)
                    .await
                    .map(|_| ())
                    .map_err(RelayError::from)
            }
        };
        reporter.finish().await;
        downloaded?;

        // Links of unknown size are only measured once on disk.
        let size = tokio::fs::metadata(dest)
            .await
            .map_err(TransferError::from)?
            .len();
        self.check_size(size)?;

        if let Err(e) = self.client.edit_text(status, messages::UPLOADING).await {
            debug!(chat_id, error = %e, "status message not updated");
        }

        let reporter = self.reporter(sink, "Uploading");
        let observe = |done: u64, total: u64| reporter.observe(done, total);
        let sent = self
            .client
            .send_file(chat_id, dest, file_name, kind, &observe)
            .await;
        reporter.finish().await;
        sent?;

        Ok(())
    }
}
