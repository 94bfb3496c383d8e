//! # folio-core
//!
//! Core types, traits, and abstractions for the folio document engine.
//!
//! This crate provides the data model (documents, versions, envelopes),
//! the repository and collaborator traits the other folio crates implement,
//! the publication state machine, and the shared error type.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod publication;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{DocumentEvent, EventBus};
pub use models::*;
pub use publication::{DraftSource, PublicationSlots, PublicationState};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, new_v7};
