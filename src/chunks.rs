//! Incremental decoding of a streamed response body into text chunks.
//!
//! Transport increments do not respect character boundaries: a multi-byte
//! UTF-8 sequence may be split across two reads.  The decoder carries the
//! incomplete tail forward.  Bytes that can never become valid UTF-8 are
//! replaced with U+FFFD and decoding continues, so text received around
//! them is still delivered.

use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::observability::{STREAM_BYTES, STREAM_CANCELLATIONS, STREAM_CHUNKS, STREAM_ERRORS};

/// A cancellable stream of decoded text chunks, in transport order.
///
/// The stream ends after the first error it yields.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Stateful UTF-8 decoder for byte increments.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    /// Create a decoder with nothing buffered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    ///
    /// Returns an empty string when the increment only extends an incomplete
    /// sequence.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
        text
    }

    /// Flush the decoder at the end of the stream.
    ///
    /// A stream that ended inside a character yields one U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: Utf8ChunkDecoder,
    cancel: CancellationToken,
    done: bool,
}

/// Turn a body byte stream into a [`ChunkStream`].
///
/// Every non-empty decoded increment becomes one chunk.  Cancelling `cancel`
/// yields [`Error::Abort`] after the last delivered chunk; a transport error
/// yields [`Error::Streaming`].  Either ends the stream.
pub fn decode_chunks<S, E>(byte_stream: S, cancel: CancellationToken) -> ChunkStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(byte_stream),
        decoder: Utf8ChunkDecoder::new(),
        cancel,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => {
                    state.done = true;
                    STREAM_CANCELLATIONS.click();
                    return Some((Err(Error::abort("stream cancelled by caller")), state));
                }
                next = state.bytes.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    let text = state.decoder.decode(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    STREAM_CHUNKS.click();
                    return Some((Ok(text), state));
                }
                Some(Err(err)) => {
                    state.done = true;
                    STREAM_ERRORS.click();
                    return Some((
                        Err(Error::streaming(
                            format!("Error in HTTP stream: {err}"),
                            Some(Box::new(err)),
                        )),
                        state,
                    ));
                }
                None => {
                    state.done = true;
                    let tail = state.decoder.finish();
                    if tail.is_empty() {
                        return None;
                    }
                    STREAM_CHUNKS.click();
                    return Some((Ok(tail), state));
                }
            }
        }
    }))
}
