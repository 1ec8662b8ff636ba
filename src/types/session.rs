use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Message, Metadata, SessionPatch};

/// A chat conversation thread.
///
/// Field names follow the backend's camelCase JSON.  Sessions listed by the
/// backend may omit everything except `id` and `title`; missing timestamps
/// fall back to the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Messages in chronological (insertion) order.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// When the session was created.
    #[serde(default = "epoch", with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// When the session or its messages last changed.
    #[serde(default = "epoch", with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,

    /// Whether the session is archived.
    #[serde(default)]
    pub is_archived: bool,

    /// Free-form, string-keyed metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

impl Session {
    /// Create an empty, unarchived session created at `now`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            is_archived: false,
            metadata: Metadata::new(),
        }
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Shallow-merge `patch` into this session and bump `updated_at`.
    pub fn apply_patch(&mut self, patch: SessionPatch, now: OffsetDateTime) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(messages) = patch.messages {
            self.messages = messages;
        }
        if let Some(is_archived) = patch.is_archived {
            self.is_archived = is_archived;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.updated_at = now;
    }

    /// Returns true if the title or any message text contains `needle`,
    /// ignoring case.  `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.messages.iter().any(|m| m.mentions(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;
    use time::macros::datetime;

    #[test]
    fn deserialize_minimal_session() {
        let session: Session = serde_json::from_str(r#"{"id":"1","title":"Test Session"}"#).unwrap();
        assert_eq!(session.id, "1");
        assert_eq!(session.title, "Test Session");
        assert!(session.messages.is_empty());
        assert!(!session.is_archived);
        assert_eq!(session.created_at, OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn serializes_camel_case() {
        let session = Session::new("s1", "Title", datetime!(2024-03-01 00:00:00 UTC));
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["createdAt"], "2024-03-01T00:00:00Z");
        assert_eq!(value["isArchived"], false);
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let created = datetime!(2024-03-01 00:00:00 UTC);
        let later = datetime!(2024-03-02 00:00:00 UTC);
        let mut session = Session::new("s1", "Title", created);
        session.messages.push(Message::new("m1", "hello", Sender::User));

        session.apply_patch(SessionPatch::new().with_title("Renamed"), later);
        assert_eq!(session.title, "Renamed");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.created_at, created);
        assert_eq!(session.updated_at, later);
    }

    #[test]
    fn matches_title_or_message_text() {
        let mut session = Session::new("s1", "Mixing notes", OffsetDateTime::UNIX_EPOCH);
        session.messages.push(Message::new("m1", "Normalize the STEMS", Sender::User));
        assert!(session.matches("mixing"));
        assert!(session.matches("stems"));
        assert!(!session.matches("mastering"));
    }
}
