use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use crate::chunks::{ChunkStream, decode_chunks};
use crate::client_logger::ClientLogger;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_DURATION, STREAM_TTFB,
};
use crate::types::{Message, SendMessageRequest, Session, StreamPhase};

/// What a completed stream delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of chunks handed to the callback.
    pub chunks: usize,
    /// Total length of those chunks in bytes.
    pub bytes: usize,
    /// Time from sending the request to the end of the body.
    pub elapsed: Duration,
}

/// Client for the chat backend.
#[derive(Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: String,
    request_timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl ChatClient {
    /// Create a client for the default local backend.
    pub fn new() -> Result<Self> {
        Self::from_config(ClientConfig::default())
    }

    /// Create a client with custom settings.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let base_url = config.validated_base_url()?;
        let client = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout,
            logger: None,
        })
    }

    /// Attach a logger that sees every response, chunk and phase change.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The base address requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request, mapping transport failures onto our Error type.
    async fn execute(&self, request: RequestBuilder, timeout: Option<Duration>) -> Result<Response> {
        CLIENT_REQUESTS.click();
        request.send().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {}", e),
                    timeout.map(|t| t.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })
    }

    /// Reject non-success responses with a static message.
    fn check_status(response: Response, message: &'static str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            CLIENT_REQUEST_ERRORS.click();
            Err(Error::network(message, status.as_u16()))
        }
    }

    /// List every session known to the backend.
    pub async fn get_sessions(&self) -> Result<Vec<Session>> {
        let started = Instant::now();
        let request = self
            .client
            .get(self.endpoint("sessions"))
            .timeout(self.request_timeout);
        let response = self.execute(request, Some(self.request_timeout)).await?;
        let response = Self::check_status(response, "Failed to fetch sessions")?;

        let sessions = response.json::<Vec<Session>>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse sessions: {}", e),
                Some(Box::new(e)),
            )
        })?;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        if let Some(logger) = &self.logger {
            logger.log_sessions(&sessions);
        }
        Ok(sessions)
    }

    /// Send a message and wait for the complete reply.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Message> {
        let started = Instant::now();
        let request = self
            .client
            .post(self.endpoint("send"))
            .timeout(self.request_timeout)
            .json(&SendMessageRequest::new(session_id, text));
        let response = self.execute(request, Some(self.request_timeout)).await?;
        let response = Self::check_status(response, "Failed to send message")?;

        let message = response.json::<Message>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        if let Some(logger) = &self.logger {
            logger.log_response(&message);
        }
        Ok(message)
    }

    /// Send a message and get its reply as a stream of text chunks.
    ///
    /// Cancelling `cancel` while the request is in flight returns
    /// [`Error::Abort`]; cancelling later ends the returned stream with it.
    pub async fn stream(
        &self,
        session_id: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let request = self
            .client
            .post(self.endpoint("stream"))
            .header(header::ACCEPT, HeaderValue::from_static("text/plain"))
            .json(&SendMessageRequest::new(session_id, text));

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::abort("stream cancelled before the response arrived"));
            }
            response = self.execute(request, None) => response?,
        };
        let response = Self::check_status(response, "Failed to stream message")?;

        Ok(decode_chunks(response.bytes_stream(), cancel))
    }

    /// Stream a reply, handing each chunk to `on_chunk` in arrival order.
    ///
    /// Chunks are not reassembled; that is up to the caller.  An empty body
    /// completes without calling `on_chunk`.
    pub async fn stream_message<F>(
        &self,
        session_id: &str,
        text: &str,
        on_chunk: F,
    ) -> Result<StreamSummary>
    where
        F: FnMut(&str),
    {
        self.stream_message_with_cancel(session_id, text, CancellationToken::new(), on_chunk)
            .await
    }

    /// Like [`stream_message`](Self::stream_message), stoppable through `cancel`.
    ///
    /// On failure or cancellation every chunk received before the error has
    /// already been passed to `on_chunk`.
    pub async fn stream_message_with_cancel<F>(
        &self,
        session_id: &str,
        text: &str,
        cancel: CancellationToken,
        mut on_chunk: F,
    ) -> Result<StreamSummary>
    where
        F: FnMut(&str),
    {
        let started = Instant::now();
        let mut phase = StreamPhase::Idle;
        self.transition(&mut phase, StreamPhase::Requesting);

        let mut stream = match self.stream(session_id, text, cancel).await {
            Ok(stream) => stream,
            Err(err) => {
                self.transition(&mut phase, terminal_phase_for(&err));
                return Err(err);
            }
        };
        self.transition(&mut phase, StreamPhase::Streaming);

        let mut chunks = 0;
        let mut bytes = 0;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if chunks == 0 {
                        STREAM_TTFB.add(started.elapsed().as_secs_f64());
                    }
                    chunks += 1;
                    bytes += chunk.len();
                    if let Some(logger) = &self.logger {
                        logger.log_stream_chunk(&chunk);
                    }
                    on_chunk(&chunk);
                }
                Err(err) => {
                    self.transition(&mut phase, terminal_phase_for(&err));
                    return Err(err);
                }
            }
        }

        self.transition(&mut phase, StreamPhase::Completed);
        let elapsed = started.elapsed();
        STREAM_DURATION.add(elapsed.as_secs_f64());
        Ok(StreamSummary {
            chunks,
            bytes,
            elapsed,
        })
    }

    fn transition(&self, phase: &mut StreamPhase, next: StreamPhase) {
        debug_assert!(
            phase.can_transition_to(next),
            "illegal stream transition {phase} -> {next}"
        );
        *phase = next;
        if let Some(logger) = &self.logger {
            logger.log_stream_phase(next);
        }
    }
}

/// Create and return default headers for API requests.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

fn terminal_phase_for(err: &Error) -> StreamPhase {
    if err.is_abort() {
        StreamPhase::Cancelled
    } else {
        StreamPhase::Failed
    }
}
