//! Centralized default constants for folio.
//!
//! Every crate reads shared defaults from here instead of defining its own
//! magic numbers.

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of connections kept open.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const POOL_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// VERSIONS
// =============================================================================

/// Title given to documents created implicitly (chat binding, first generation
/// without a title).
pub const UNTITLED_DOCUMENT: &str = "Untitled";

/// Page size for version history listings.
pub const HISTORY_PAGE_LIMIT: i64 = 50;

// =============================================================================
// GENERATION
// =============================================================================

/// Default completion token budget for a generation pass.
pub const GEN_MAX_TOKENS: u32 = 4096;

/// Capacity of the increment channel between the stream task and its observer.
pub const GEN_CHANNEL_CAPACITY: usize = 64;

/// Default completion request timeout in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// EVENTS
// =============================================================================

/// Capacity of the document event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;
