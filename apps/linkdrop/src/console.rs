//! Console chat front end.
//!
//! Input lines are turned into chat events; outbound messages are printed
//! and delivered files are copied into an outbox directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use linkdrop_protocol::{ChatEvent, ChatId, DeliveryKind, MediaInfo, MessageRef, ProtocolError};
use linkdrop_relay::{ChatClient, Choice, ClientError, ClientFuture, ProgressFn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Chat id used for everything typed on the console.
pub const CONSOLE_CHAT: ChatId = 1;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// A complete event (free text or a JSON-encoded event).
    Event(ChatEvent),
    /// `/select <payload>`: press a button on the last prompt.
    Select(String),
    /// `/upload <path> [mime]`: offer a local file as uploaded media.
    Upload { path: PathBuf, mime: Option<String> },
    Empty,
}

/// Parses one input line.
///
/// Lines starting with `{` must be JSON [`ChatEvent`]s.
pub fn parse_line(line: &str) -> Result<ConsoleInput, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    if line.starts_with('{') {
        return ChatEvent::from_json(line).map(ConsoleInput::Event);
    }

    if let Some(rest) = strip_command(line, "/select") {
        return Ok(ConsoleInput::Select(rest.to_string()));
    }

    if let Some(rest) = strip_command(line, "/upload") {
        let mut parts = rest.split_whitespace();
        if let Some(path) = parts.next() {
            return Ok(ConsoleInput::Upload {
                path: PathBuf::from(path),
                mime: parts.next().map(str::to_string),
            });
        }
    }

    Ok(ConsoleInput::Event(ChatEvent::Text {
        chat_id: CONSOLE_CHAT,
        text: line.to_string(),
    }))
}

fn strip_command<'a>(line: &'a str, command: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(command)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Builds the media event for a local file.
pub async fn upload_event(path: &Path, mime: Option<String>) -> std::io::Result<ChatEvent> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(ChatEvent::Media {
        chat_id: CONSOLE_CHAT,
        media: MediaInfo {
            file_id: path.display().to_string(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            file_size: metadata.len(),
            mime_type: Some(mime.unwrap_or_else(|| guess_mime(path).to_string())),
        },
    })
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// [`ChatClient`] printing to stdout and delivering into a directory.
pub struct ConsoleClient {
    outbox: PathBuf,
    next_id: AtomicI64,
    last_prompt: Mutex<HashMap<ChatId, MessageRef>>,
}

impl ConsoleClient {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
            next_id: AtomicI64::new(0),
            last_prompt: Mutex::new(HashMap::new()),
        }
    }

    /// The most recent prompt shown in `chat`.
    pub fn last_prompt(&self, chat: ChatId) -> Option<MessageRef> {
        self.last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .copied()
    }

    /// Selection event for `data` on the last prompt of `chat`.
    pub fn selection(&self, chat: ChatId, data: String) -> ChatEvent {
        let message = self.last_prompt(chat).unwrap_or(MessageRef {
            chat_id: chat,
            message_id: 0,
        });
        ChatEvent::Selection {
            chat_id: chat,
            message,
            data,
        }
    }

    fn next_message(&self, chat: ChatId) -> MessageRef {
        MessageRef {
            chat_id: chat,
            message_id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }
}

impl ChatClient for ConsoleClient {
    fn send_text<'a>(&'a self, chat: ChatId, text: &'a str) -> ClientFuture<'a, MessageRef> {
        Box::pin(async move {
            let message = self.next_message(chat);
            println!("[{chat} #{}] {text}", message.message_id);
            Ok(message)
        })
    }

    fn send_choices<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
        choices: &'a [Choice],
    ) -> ClientFuture<'a, MessageRef> {
        Box::pin(async move {
            let message = self.next_message(chat);
            let mut out = format!("[{chat} #{}] {text}", message.message_id);
            for choice in choices {
                out.push_str(&format!("\n    {}: /select {}", choice.label, choice.data));
            }
            println!("{out}");

            self.last_prompt
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(chat, message);
            Ok(message)
        })
    }

    fn edit_text<'a>(&'a self, message: MessageRef, text: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            println!("[{} #{} edited] {text}", message.chat_id, message.message_id);
            Ok(())
        })
    }

    fn delete_message(&self, message: MessageRef) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            println!("[{} #{} deleted]", message.chat_id, message.message_id);
            Ok(())
        })
    }

    fn download_media<'a>(
        &'a self,
        file_id: &'a str,
        dest: &'a Path,
        progress: &'a ProgressFn<'a>,
    ) -> ClientFuture<'a, u64> {
        Box::pin(async move {
            copy_with_progress(Path::new(file_id), dest, progress)
                .await
                .map_err(|e| ClientError(format!("fetching {file_id}: {e}")))
        })
    }

    fn send_file<'a>(
        &'a self,
        chat: ChatId,
        path: &'a Path,
        file_name: &'a str,
        kind: DeliveryKind,
        progress: &'a ProgressFn<'a>,
    ) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let target = self.outbox.join(file_name);
            let bytes = copy_with_progress(path, &target, progress)
                .await
                .map_err(|e| ClientError(format!("delivering {file_name}: {e}")))?;

            println!(
                "[{chat}] delivered {kind:?} {} ({bytes} bytes)",
                target.display()
            );
            Ok(())
        })
    }
}

/// Copies `src` to `dst` (creating parents) and reports progress per buffer.
async fn copy_with_progress(
    src: &Path,
    dst: &Path,
    progress: &ProgressFn<'_>,
) -> std::io::Result<u64> {
    let mut input = tokio::fs::File::open(src).await?;
    let total = input.metadata().await?.len();

    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut output = tokio::fs::File::create(dst).await?;

    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await?;
        copied += n as u64;
        progress(copied, total);
    }
    output.flush().await?;

    Ok(copied)
}
