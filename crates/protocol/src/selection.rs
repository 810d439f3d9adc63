//! Selection payloads attached to choice buttons.
//!
//! A payload is an action tag and a session key joined by a single
//! separator, e.g. `default|3f2b...`. Decoding is strict: anything that is
//! not exactly `<known tag>|<uuid>` is rejected.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::ProtocolError;

/// Separator between the action tag and the session key.
pub const SELECTION_SEPARATOR: char = '|';

/// Opaque key of a pending transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(Uuid);

impl SessionKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Simple form keeps payloads well under platform callback limits.
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SessionKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidKey(s.to_string()))
    }
}

/// Closed set of actions a user can pick from a choice prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionAction {
    /// Download the URL and deliver it under its suggested name.
    UseDefault,
    /// Ask for a new name before downloading the URL.
    RenameUrl,
    /// Ask for a new name before re-sending an uploaded file.
    RenameMedia,
    /// Re-send an uploaded file as the other delivery kind.
    Convert,
}

impl SelectionAction {
    pub const ALL: [SelectionAction; 4] = [
        SelectionAction::UseDefault,
        SelectionAction::RenameUrl,
        SelectionAction::RenameMedia,
        SelectionAction::Convert,
    ];

    /// Wire tag used in selection payloads.
    pub fn tag(self) -> &'static str {
        match self {
            SelectionAction::UseDefault => "default",
            SelectionAction::RenameUrl => "rename_url",
            SelectionAction::RenameMedia => "rename_file",
            SelectionAction::Convert => "convert_file",
        }
    }

    /// Looks up an action by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.tag() == tag)
    }
}

/// A decoded selection event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub action: SelectionAction,
    pub key: SessionKey,
}

impl Selection {
    pub fn new(action: SelectionAction, key: SessionKey) -> Self {
        Self { action, key }
    }

    /// Encodes the payload as `tag|key`.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.action.tag(), SELECTION_SEPARATOR, self.key)
    }

    /// Decodes a `tag|key` payload.
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (tag, key) = data
            .split_once(SELECTION_SEPARATOR)
            .ok_or_else(|| ProtocolError::MalformedSelection(data.to_string()))?;

        if tag.is_empty() || key.is_empty() || key.contains(SELECTION_SEPARATOR) {
            return Err(ProtocolError::MalformedSelection(data.to_string()));
        }

        let action = SelectionAction::from_tag(tag)
            .ok_or_else(|| ProtocolError::UnknownAction(tag.to_string()))?;
        let key = key.parse()?;

        Ok(Self { action, key })
    }
}

impl FromStr for Selection {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
