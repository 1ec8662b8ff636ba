//! Connection settings for the chat backend.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Base address of the chat backend when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/chat";

/// Default per-request timeout for `get_sessions` and `send_message`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for a [`ChatClient`](crate::ChatClient).
///
/// Streaming requests are bounded only by `connect_timeout`; a stream may
/// legitimately run for a long time and is stopped by cancelling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base address; endpoint paths are appended to it.
    pub base_url: String,

    /// Total time allowed for a non-streaming request.
    pub request_timeout: Duration,

    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Creates a new ClientConfig with default values.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the base address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check the base address and return it without a trailing slash.
    pub fn validated_base_url(&self) -> Result<String> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::url(
                format!("unsupported scheme {:?} in {}", url.scheme(), self.base_url),
                None,
            ));
        }
        Ok(self.base_url.trim_end_matches('/').to_string())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::new();
        assert_eq!(config.base_url, "http://localhost:5000/api/chat");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_pattern() {
        let config = ClientConfig::new()
            .with_base_url("https://chat.example.com/api/chat/")
            .with_request_timeout(Duration::from_secs(5))
            .with_connect_timeout(Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(
            config.validated_base_url().unwrap(),
            "https://chat.example.com/api/chat"
        );
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(ClientConfig::new().with_base_url("not a url").validated_base_url().is_err());
        assert!(ClientConfig::new().with_base_url("ftp://host/x").validated_base_url().is_err());
    }
}
