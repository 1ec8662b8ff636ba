use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one streamed exchange with the chat backend.
///
/// `Idle -> Requesting -> Streaming -> Completed`.  Both `Requesting` and
/// `Streaming` may also end in `Failed` (the request or body broke) or
/// `Cancelled` (the caller gave up).  There is no way back to `Idle`;
/// a new exchange needs a new call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// Nothing has been sent yet.
    Idle,

    /// The request is in flight and no response has arrived.
    Requesting,

    /// The response body is being read.
    Streaming,

    /// The body ended normally.
    Completed,

    /// The request or the body failed.
    Failed,

    /// The caller cancelled the stream.
    Cancelled,
}

impl StreamPhase {
    /// Returns true for phases that end the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::Failed | StreamPhase::Cancelled
        )
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: StreamPhase) -> bool {
        use StreamPhase::*;
        matches!(
            (self, next),
            (Idle, Requesting)
                | (Requesting, Streaming)
                | (Requesting, Failed)
                | (Requesting, Cancelled)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Streaming, Cancelled)
        )
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPhase::Idle => write!(f, "idle"),
            StreamPhase::Requesting => write!(f, "requesting"),
            StreamPhase::Streaming => write!(f, "streaming"),
            StreamPhase::Completed => write!(f, "completed"),
            StreamPhase::Failed => write!(f, "failed"),
            StreamPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}
