use serde::{Deserialize, Serialize};

use crate::types::{Message, Metadata};

/// Partial update for a [`Session`](crate::types::Session).
///
/// Present fields replace the session's fields wholesale; absent fields are
/// left alone.  The id and creation time cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Replacement message list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,

    /// New archived flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,

    /// Replacement metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl SessionPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the message list.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Set the archived flag.
    pub fn with_archived(mut self, is_archived: bool) -> Self {
        self.is_archived = Some(is_archived);
        self
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&SessionPatch::new()).unwrap(), "{}");
    }

    #[test]
    fn deserialize_partial() {
        let patch: SessionPatch = serde_json::from_str(r#"{"isArchived":true}"#).unwrap();
        assert_eq!(patch.is_archived, Some(true));
        assert!(patch.title.is_none());
    }
}
