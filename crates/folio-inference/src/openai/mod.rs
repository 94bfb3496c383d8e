//! OpenAI-compatible streaming completion backend.
//!
//! Works with any endpoint that speaks the chat-completions SSE protocol:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//! - LM Studio
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::StreamingCompletion;
//! use folio_inference::openai::OpenAIBackend;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env().unwrap();
//!     let mut stream = backend
//!         .stream_completion("Write plainly.", "Summarize the meeting.", Some(512))
//!         .await
//!         .unwrap();
//!     while let Some(increment) = stream.next().await {
//!         print!("{}", increment.unwrap());
//!     }
//! }
//! ```

mod backend;
mod error;
mod streaming;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_folio_error, OpenAIErrorCode};
pub use streaming::{parse_sse_stream, SseDecoder};
pub use types::*;
