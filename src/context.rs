//! The application's state and backend client, bundled for injection.
//!
//! There are no globals: whoever builds the UI creates one [`AppContext`]
//! and hands out clones of the `Arc` it lives in.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audio_store::AudioFileStore;
use crate::chat_store::ChatStore;
use crate::client::{ChatClient, StreamSummary};
use crate::client_logger::ClientLogger;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::persist::{JsonFileKeyValueStore, KeyValueStore};

/// Chat state, audio state and the backend client.
#[derive(Debug)]
pub struct AppContext {
    /// Sessions and messages.
    pub chat: ChatStore,
    /// Audio files and the playback pointer.
    pub audio: AudioFileStore,
    /// Chat backend client.
    pub client: ChatClient,
}

impl AppContext {
    /// Build a context whose audio selection is kept in `kv`.
    pub fn new(config: ClientConfig, kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self {
            chat: ChatStore::new(),
            audio: AudioFileStore::with_persistence(kv)?,
            client: ChatClient::from_config(config)?,
        })
    }

    /// Build a context that keeps persisted state as JSON files in `dir`.
    pub fn open(config: ClientConfig, dir: impl AsRef<Path>) -> Result<Self> {
        let kv = Arc::new(JsonFileKeyValueStore::open(dir)?);
        Self::new(config, kv)
    }

    /// Build a context that persists nothing.
    pub fn ephemeral(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            chat: ChatStore::new(),
            audio: AudioFileStore::new(),
            client: ChatClient::from_config(config)?,
        })
    }

    /// Route the client's traffic through `logger`.
    pub fn set_client_logger(&mut self, logger: Arc<dyn ClientLogger>) {
        self.client = self.client.clone().with_logger(logger);
    }

    /// Replace the local sessions with the backend's listing.
    pub async fn sync_sessions(&self) -> Result<usize> {
        let sessions = self.client.get_sessions().await?;
        let count = sessions.len();
        self.chat.replace_sessions(sessions);
        Ok(count)
    }

    /// Send `text` in the active session, creating one if needed, and
    /// stream the reply into it.
    pub async fn send_streaming(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<StreamSummary> {
        let session_id = match self.chat.active_session() {
            Some(session) => session.id,
            None => self.chat.create_session(default_title(text)),
        };
        self.chat
            .ingest_stream(&self.client, &session_id, text, cancel)
            .await
    }
}

/// Title for a session started by `text`: its first line, shortened.
fn default_title(text: &str) -> String {
    const MAX_TITLE_CHARS: usize = 40;
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return "New chat".to_string();
    }
    let mut title: String = first_line.chars().take(MAX_TITLE_CHARS).collect();
    if first_line.chars().count() > MAX_TITLE_CHARS {
        title.push('…');
    }
    title
}
