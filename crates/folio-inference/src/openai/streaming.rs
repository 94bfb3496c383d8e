//! SSE stream parsing for OpenAI-compatible streaming responses.
//!
//! Network chunks do not align with SSE lines, so bytes are buffered until a
//! full line is available. A line that never gets its newline is flushed when
//! the body ends.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};

use folio_core::{Error, Result, TokenStream};

use super::types::{ChatCompletionChunk, OpenAIErrorResponse};

type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// Incremental SSE line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns the increments completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();

        while !self.done {
            let Some(pos) = self.pending.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(item) = self.parse_line(&String::from_utf8_lossy(&line)) {
                out.push(item);
            }
        }
        out
    }

    /// Flush a trailing line left without a newline.
    pub fn finish(&mut self) -> Vec<Result<String>> {
        if self.done || self.pending.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.pending);
        self.parse_line(&String::from_utf8_lossy(&line))
            .into_iter()
            .collect()
    }

    fn parse_line(&mut self, line: &str) -> Option<Result<String>> {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        let data = line.strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => {
                let content: String = chunk
                    .choices
                    .into_iter()
                    .filter_map(|choice| choice.delta.content)
                    .collect();
                if content.is_empty() {
                    None
                } else {
                    Some(Ok(content))
                }
            }
            Err(parse_err) => {
                // Providers report mid-stream failures as an error object.
                if let Ok(body) = serde_json::from_str::<OpenAIErrorResponse>(data) {
                    return Some(Err(Error::Generation(format!(
                        "Stream error: {}",
                        body.error.message
                    ))));
                }
                Some(Err(Error::Generation(format!(
                    "Failed to parse SSE chunk: {}",
                    parse_err
                ))))
            }
        }
    }
}

struct SseState {
    inner: ByteStream,
    decoder: SseDecoder,
    queue: VecDeque<Result<String>>,
    finished: bool,
}

/// Parse SSE stream from OpenAI-compatible endpoint.
///
/// The returned stream ends after `[DONE]`, after the first transport error,
/// or when the body ends.
pub fn parse_sse_stream(
    stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> TokenStream {
    let state = SseState {
        inner: Box::pin(stream),
        decoder: SseDecoder::new(),
        queue: VecDeque::new(),
        finished: false,
    };

    let token_stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.queue.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    let items = st.decoder.push(&bytes);
                    st.queue.extend(items);
                    st.finished = st.decoder.is_done();
                }
                Some(Err(e)) => {
                    st.queue
                        .push_back(Err(Error::Generation(format!("Stream error: {}", e))));
                    st.finished = true;
                }
                None => {
                    let items = st.decoder.finish();
                    st.queue.extend(items);
                    st.finished = true;
                }
            }
        }
    });

    Box::pin(token_stream)
}
