//! Generator configuration.
//!
//! Values come from defaults, an optional TOML file, and environment
//! variables prefixed `CASEFORGE_` (in that precedence, later wins).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::budget::EstimationMethod;
use crate::error::PipelineResult;
use crate::oracle::RetryPolicy;
use crate::pipeline::prompt::DEFAULT_PREAMBLE;

/// Default system prompt sent with every oracle request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert at generating test cases for API \
endpoints. You design realistic, self-consistent test cases and respond with strictly valid JSON.";

/// Configuration for a test case generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Token budget per batch.
    pub max_tokens_per_batch: u64,
    /// Maximum batches processed concurrently.
    pub max_concurrency: usize,
    /// Token estimation method for budgeting.
    pub estimation: EstimationMethod,
    /// Oracle retry attempts per request.
    pub retry_max_attempts: u32,
    /// Base retry delay in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Retry delay cap in milliseconds.
    pub retry_max_delay_ms: u64,
    /// System prompt sent with every request.
    pub system_prompt: String,
    /// Instruction preamble prepended to each collection prompt.
    pub prompt_preamble: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_batch: 8_000,
            max_concurrency: 4,
            estimation: EstimationMethod::default(),
            retry_max_attempts: 3,
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 10_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration, layering an optional TOML file and the
    /// environment over the defaults.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("CASEFORGE"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn with_max_tokens_per_batch(mut self, budget: u64) -> Self {
        self.max_tokens_per_batch = budget.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, width: usize) -> Self {
        self.max_concurrency = width.max(1);
        self
    }

    pub fn with_estimation(mut self, method: EstimationMethod) -> Self {
        self.estimation = method;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_prompt_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.prompt_preamble = preamble.into();
        self
    }

    /// Retry behavior derived from the delay fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry_max_attempts)
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }
}
