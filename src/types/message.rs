use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Sender;

/// A single chat message.
///
/// Messages are immutable once created; the only way to change one is to
/// replace the message list of its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique within the owning session.
    pub id: String,

    /// The message body.
    pub text: String,

    /// Who wrote the message.
    pub sender: Sender,

    /// When the message was written, if known.
    #[serde(
        default,
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl Message {
    /// Create a new message without a timestamp.
    pub fn new(id: impl Into<String>, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender,
            timestamp: None,
        }
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns a copy of this message with `fragment` appended to its text.
    pub fn extended(&self, fragment: &str) -> Self {
        let mut text = String::with_capacity(self.text.len() + fragment.len());
        text.push_str(&self.text);
        text.push_str(fragment);
        Self {
            text,
            ..self.clone()
        }
    }

    /// Returns true if the text contains `needle`, ignoring case.
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn mentions(&self, needle: &str) -> bool {
        self.text.to_lowercase().contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn deserialize_backend_message() {
        let json = r#"{"id":"m1","text":"Hi there","sender":"bot","timestamp":"2024-01-02T03:04:05Z"}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.sender, Sender::Bot);
        assert_eq!(message.timestamp, Some(datetime!(2024-01-02 03:04:05 UTC)));
    }

    #[test]
    fn deserialize_timestamp_without_offset() {
        let json = r#"{"id":"m1","text":"Hi","sender":"bot","timestamp":"2024-01-02T03:04:05.123456"}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(
            message.timestamp,
            Some(datetime!(2024-01-02 03:04:05.123456 UTC))
        );
    }

    #[test]
    fn timestamp_is_optional() {
        let message: Message =
            serde_json::from_str(r#"{"id":"m1","text":"Hi","sender":"user"}"#).unwrap();
        assert!(message.timestamp.is_none());
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("timestamp"));
    }

    #[test]
    fn extended_keeps_identity() {
        let message = Message::new("m1", "Hel", Sender::Bot);
        let longer = message.extended("lo");
        assert_eq!(longer.text, "Hello");
        assert_eq!(longer.id, "m1");
        assert_eq!(message.text, "Hel");
    }
}
