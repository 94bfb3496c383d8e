//! # folio-generation
//!
//! Turns source material into new document versions through a streaming
//! completion call.
//!
//! The [`GenerationPipeline`] is wired from trait objects, so the same code
//! runs against PostgreSQL and an OpenAI-compatible endpoint in production and
//! against in-memory fakes in tests. The `folio` binary in `src/bin` drives it
//! (and the publication operations) from the command line.

pub mod config;
pub mod pipeline;
pub mod prompt;
pub mod request;

pub use config::GenerationConfig;
pub use pipeline::{GenerationHandle, GenerationPipeline};
pub use request::{
    DocumentKind, GenerationOutcome, GenerationParameters, GenerationRequest, GenerationSource,
    RevisionRequest,
};
