//! Logging trait for chat backend traffic.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all interactions passing through the [`ChatClient`](crate::ChatClient).

use crate::types::{Message, Session, StreamPhase};

/// A trait for logging chat client operations.
///
/// # Example
///
/// ```rust,ignore
/// use parlance::{ClientLogger, Message, Session, StreamPhase};
///
/// struct StderrLogger;
///
/// impl ClientLogger for StderrLogger {
///     fn log_sessions(&self, sessions: &[Session]) {
///         eprintln!("listed {} sessions", sessions.len());
///     }
///
///     fn log_response(&self, message: &Message) {
///         eprintln!("reply {}: {}", message.id, message.text);
///     }
///
///     fn log_stream_chunk(&self, chunk: &str) {
///         eprintln!("chunk {chunk:?}");
///     }
///
///     fn log_stream_phase(&self, phase: StreamPhase) {
///         eprintln!("stream is now {phase}");
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log the result of a successful `get_sessions` call.
    fn log_sessions(&self, sessions: &[Session]);

    /// Log the reply of a successful `send_message` call.
    fn log_response(&self, message: &Message);

    /// Log one chunk of a streamed reply, before it reaches the caller.
    fn log_stream_chunk(&self, chunk: &str);

    /// Log a transition of a streamed exchange.
    fn log_stream_phase(&self, phase: StreamPhase);
}
