//! Pipeline configuration.

use folio_core::defaults;

/// Tunables for [`crate::GenerationPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Token budget used when a request does not set one.
    pub max_tokens: u32,
    /// Persist the text streamed so far when a pass is cancelled.
    pub save_partial_on_cancel: bool,
    /// Buffer between the stream task and its observer in spawned passes.
    pub channel_capacity: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: defaults::GEN_MAX_TOKENS,
            save_partial_on_cancel: false,
            channel_capacity: defaults::GEN_CHANNEL_CAPACITY,
        }
    }
}

impl GenerationConfig {
    /// Read `FOLIO_GEN_MAX_TOKENS`, `FOLIO_GEN_SAVE_PARTIAL` and
    /// `FOLIO_GEN_CHANNEL_CAPACITY`, falling back to defaults.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            max_tokens: std::env::var("FOLIO_GEN_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(base.max_tokens),
            save_partial_on_cancel: std::env::var("FOLIO_GEN_SAVE_PARTIAL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(base.save_partial_on_cancel),
            channel_capacity: std::env::var("FOLIO_GEN_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(base.channel_capacity),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_save_partial_on_cancel(mut self, save: bool) -> Self {
        self.save_partial_on_cancel = save;
        self
    }

    /// Capacity is clamped to at least one slot.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
