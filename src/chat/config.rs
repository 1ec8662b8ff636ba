//! Configuration types for the chat REPL.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration built from it.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::ClientConfig;

/// Command-line arguments for the parlance-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base address of the chat backend.
    #[arrrg(optional, "Chat backend base URL (default: http://localhost:5000/api/chat)", "URL")]
    pub base_url: Option<String>,

    /// Timeout for non-streaming requests.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Directory for persisted state.
    #[arrrg(optional, "Directory for persisted state (default: none)", "DIR")]
    pub state_dir: Option<String>,

    /// Title of the session opened at startup.
    #[arrrg(optional, "Title for the first session", "TITLE")]
    pub title: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for the chat REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend connection settings.
    pub client: ClientConfig,

    /// Where persisted state lives; `None` keeps everything in memory.
    pub state_dir: Option<PathBuf>,

    /// Title of the session opened at startup.
    pub initial_title: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            client: ClientConfig::new(),
            state_dir: None,
            initial_title: None,
            use_color: true,
        }
    }

    /// Sets the backend connection settings.
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Sets the state directory.
    pub fn with_state_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.state_dir = dir;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let mut client = ClientConfig::new();
        if let Some(base_url) = args.base_url {
            client = client.with_base_url(base_url);
        }
        if let Some(secs) = args.timeout_secs {
            client = client.with_request_timeout(Duration::from_secs(secs));
        }

        ChatConfig {
            client,
            state_dir: args.state_dir.map(PathBuf::from),
            initial_title: args.title,
            use_color: !args.no_color,
        }
    }
}
