//! Mock completion backend for deterministic testing.
//!
//! Streams a scripted list of increments and can inject failures at stream
//! open or mid-stream, or stall forever after a prefix so cancellation paths
//! can be exercised.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_inference::mock::MockCompletionBackend;
//!
//! let backend = MockCompletionBackend::new()
//!     .with_increments(["Quarterly ", "goals"])
//!     .with_increment_delay_ms(5);
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use folio_core::{Error, Result, StreamingCompletion, TokenStream};

/// One recorded `stream_completion` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    increments: Vec<String>,
    increment_delay_ms: u64,
    reject_with: Option<String>,
    fail_after: Option<usize>,
    stall_after: Option<usize>,
    failure_rate: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model: "mock-model".to_string(),
            increments: vec!["Mock ".to_string(), "response".to_string()],
            increment_delay_ms: 0,
            reject_with: None,
            fail_after: None,
            stall_after: None,
            failure_rate: 0.0,
        }
    }
}

/// Scripted [`StreamingCompletion`] implementation.
#[derive(Clone, Default)]
pub struct MockCompletionBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockCompletionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments streamed in order.
    pub fn with_increments<I, S>(mut self, increments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.config).increments =
            increments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Sleep before each increment.
    pub fn with_increment_delay_ms(mut self, delay_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).increment_delay_ms = delay_ms;
        self
    }

    /// Fail when the stream is opened.
    pub fn rejecting(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).reject_with = Some(message.into());
        self
    }

    /// Yield `n` increments, then a generation error.
    pub fn failing_after(mut self, n: usize) -> Self {
        Arc::make_mut(&mut self.config).fail_after = Some(n);
        self
    }

    /// Yield `n` increments, then never yield again.
    pub fn stalling_after(mut self, n: usize) -> Self {
        Arc::make_mut(&mut self.config).stall_after = Some(n);
        self
    }

    /// Probability (0.0 - 1.0) of rejecting a stream at open.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        self.config.failure_rate > 0.0
            && rand::thread_rng().gen::<f64>() < self.config.failure_rate
    }
}

#[async_trait]
impl StreamingCompletion for MockCompletionBackend {
    async fn stream_completion(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<TokenStream> {
        self.call_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(MockCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
                max_tokens,
            });

        if let Some(message) = &self.config.reject_with {
            return Err(Error::Generation(message.clone()));
        }
        if self.should_fail() {
            return Err(Error::Generation("Simulated failure".to_string()));
        }

        let config = &self.config;
        let cut = match (config.fail_after, config.stall_after) {
            (Some(n), _) | (None, Some(n)) => n.min(config.increments.len()),
            (None, None) => config.increments.len(),
        };
        let mut items: Vec<Result<String>> = config.increments[..cut]
            .iter()
            .cloned()
            .map(Ok)
            .collect();
        if config.fail_after.is_some() {
            items.push(Err(Error::Generation("Simulated stream failure".to_string())));
        }

        let delay = Duration::from_millis(config.increment_delay_ms);
        let scripted = futures::stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        });

        let stream: TokenStream = if config.fail_after.is_none() && config.stall_after.is_some() {
            Box::pin(scripted.chain(futures::stream::pending()))
        } else {
            Box::pin(scripted)
        };
        Ok(stream)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
