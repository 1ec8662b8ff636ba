use serde::{Deserialize, Serialize};

/// Request body shared by the `/send` and `/stream` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// The session the message belongs to.
    pub session_id: String,

    /// The user's message text.
    pub message: String,
}

impl SendMessageRequest {
    /// Create a new request body.
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
        }
    }
}
