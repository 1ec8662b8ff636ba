// Public modules
pub mod audio_file_record;
pub mod message;
pub mod send_message_request;
pub mod sender;
pub mod session;
pub mod session_patch;
pub mod stream_phase;

// Re-exports
pub use audio_file_record::AudioFileRecord;
pub use message::Message;
pub use send_message_request::SendMessageRequest;
pub use sender::Sender;
pub use session::Session;
pub use session_patch::SessionPatch;
pub use stream_phase::StreamPhase;

/// Open, string-keyed metadata attached to sessions and audio files.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
