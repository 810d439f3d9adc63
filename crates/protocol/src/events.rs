//! Inbound chat events and outbound delivery types.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Platform chat identifier.
pub type ChatId = i64;

/// Reference to a message previously sent or received in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// A media object uploaded by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Platform identifier used to fetch the file again.
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Declared size in bytes (0 when the platform did not say).
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl MediaInfo {
    /// Returns `true` when the declared MIME type is `video/*`.
    pub fn is_video(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("video/"))
    }

    /// The delivery kind matching how the file was uploaded.
    pub fn delivery_kind(&self) -> DeliveryKind {
        if self.is_video() {
            DeliveryKind::Video
        } else {
            DeliveryKind::Document
        }
    }
}

/// An event delivered by the messaging platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Free text: a URL, a command, or a reply to a rename prompt.
    Text { chat_id: ChatId, text: String },
    /// A choice button was pressed on `message`.
    Selection {
        chat_id: ChatId,
        message: MessageRef,
        data: String,
    },
    /// A file was uploaded.
    Media { chat_id: ChatId, media: MediaInfo },
}

impl ChatEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            ChatEvent::Text { chat_id, .. }
            | ChatEvent::Selection { chat_id, .. }
            | ChatEvent::Media { chat_id, .. } => *chat_id,
        }
    }

    /// Decodes one JSON-encoded event (one line of an event feed).
    pub fn from_json(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// How a file is handed back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    /// Generic document payload.
    Document,
    /// Media-typed (streamable video) payload.
    Video,
}

impl DeliveryKind {
    /// The other kind, used by the convert action.
    pub fn converted(self) -> Self {
        match self {
            DeliveryKind::Document => DeliveryKind::Video,
            DeliveryKind::Video => DeliveryKind::Document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_from_json() {
        let ev = ChatEvent::from_json(r#"{"type":"text","chat_id":7,"text":"hi"}"#).unwrap();
        assert_eq!(
            ev,
            ChatEvent::Text {
                chat_id: 7,
                text: "hi".into()
            }
        );
        assert_eq!(ev.chat_id(), 7);
    }

    #[test]
    fn media_event_defaults_optional_fields() {
        let ev =
            ChatEvent::from_json(r#"{"type":"media","chat_id":1,"media":{"file_id":"abc"}}"#)
                .unwrap();
        let ChatEvent::Media { media, .. } = ev else {
            panic!("expected media event");
        };
        assert_eq!(media.file_id, "abc");
        assert_eq!(media.file_size, 0);
        assert!(media.file_name.is_none());
        assert_eq!(media.delivery_kind(), DeliveryKind::Document);
    }

    #[test]
    fn selection_event_carries_message_ref() {
        let json = serde_json::json!({
            "type": "selection",
            "chat_id": 3,
            "message": {"chat_id": 3, "message_id": 42},
            "data": "default|x",
        });
        let ev = ChatEvent::from_json(&json.to_string()).unwrap();
        let ChatEvent::Selection { message, data, .. } = ev else {
            panic!("expected selection event");
        };
        assert_eq!(message.message_id, 42);
        assert_eq!(data, "default|x");
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!(ChatEvent::from_json(r#"{"type":"sticker","chat_id":1}"#).is_err());
    }

    #[test]
    fn video_mime_detection() {
        let media = MediaInfo {
            file_id: "f".into(),
            file_name: Some("clip.mp4".into()),
            file_size: 10,
            mime_type: Some("video/mp4".into()),
        };
        assert!(media.is_video());
        assert_eq!(media.delivery_kind(), DeliveryKind::Video);
        assert_eq!(media.delivery_kind().converted(), DeliveryKind::Document);
    }
}
