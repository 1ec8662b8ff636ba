//! Client-side core of an audio file manager with a chat assistant.
//!
//! - [`ChatStore`] holds chat sessions, the active-session pointer and the
//!   typing indicator.
//! - [`AudioFileStore`] holds audio file records with selection and
//!   playback pointers; only the selection is persisted.
//! - [`ChatClient`] talks to the chat backend, including streamed replies.
//! - [`AppContext`] bundles all three for injection into a UI.

// Public modules
pub mod audio_store;
pub mod chat;
pub mod chat_store;
pub mod chunks;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod observability;
pub mod persist;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use audio_store::{AudioAction, AudioFileState, AudioFileStore, PersistedAudioSelection};
pub use chat_store::{ChatAction, ChatState, ChatStore};
pub use chunks::{ChunkStream, Utf8ChunkDecoder};
pub use client::{ChatClient, StreamSummary};
pub use client_logger::ClientLogger;
pub use config::ClientConfig;
pub use context::AppContext;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use persist::{JsonFileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use store::{Reducer, Store, Subscription};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
