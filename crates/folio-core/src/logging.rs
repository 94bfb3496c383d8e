//! Structured logging field name constants for folio.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query every subsystem the same way.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, committed mutations |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-increment stream data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "inference", "generation", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "versions", "documents", "chats", "publication", "pipeline"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_version", "publish", "generate"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

pub const WORKSPACE_ID: &str = "workspace_id";
pub const DOCUMENT_ID: &str = "document_id";
pub const VERSION_ID: &str = "version_id";
pub const CHAT_ID: &str = "chat_id";
pub const OWNER_ID: &str = "owner_id";

/// Monotonic per-document version number.
pub const VERSION_NUMBER: &str = "version_number";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of source documents that resolved.
pub const SOURCE_COUNT: &str = "source_count";

/// Number of stream increments forwarded.
pub const INCREMENT_COUNT: &str = "increment_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for generation.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
