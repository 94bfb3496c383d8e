//! # folio-inference
//!
//! Streaming completion backends for folio.
//!
//! This crate provides:
//! - OpenAI-compatible SSE streaming backend (feature `openai`, default)
//! - Scripted mock backend for tests (feature `mock`)
//!
//! Both implement [`folio_core::StreamingCompletion`].

#[cfg(feature = "openai")]
pub mod openai;

// Mock completion backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use folio_core::*;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockCompletionBackend;
