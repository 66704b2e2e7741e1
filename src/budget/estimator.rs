//! Token cost estimation.
//!
//! Batching needs an integer cost per item before anything is sent to the
//! oracle, so estimation is heuristic: character counts and word counts with
//! a safety margin. The estimator seam is pluggable; when a custom estimator
//! fails, the batcher falls back to a plain character-count heuristic rather
//! than failing the batch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by a pluggable cost estimator.
#[derive(Error, Debug)]
#[error("cost estimation failed: {0}")]
pub struct EstimationError(pub String);

/// Pluggable integer cost estimator used by the batcher.
pub trait CostEstimator: Send + Sync {
    /// Estimate the token cost of a piece of text.
    fn estimate(&self, text: &str) -> Result<u64, EstimationError>;
}

/// Length-based fallback heuristic: roughly four characters per token.
pub fn fallback_estimate(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Token estimation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Simple character-based estimation (4 chars ≈ 1 token for English)
    CharacterBased,
    /// Word-based estimation (1 word ≈ 1.3 tokens)
    WordBased,
    /// Conservative estimation (higher estimate for safety margin)
    Conservative,
}

impl Default for EstimationMethod {
    fn default() -> Self {
        Self::Conservative
    }
}

/// Default token estimator.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    method: EstimationMethod,
    /// Multiplier for conservative estimation
    safety_margin: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            method: EstimationMethod::Conservative,
            safety_margin: 1.2, // 20% safety margin
        }
    }
}

impl TokenEstimator {
    /// Create a new token estimator with the specified method.
    pub fn new(method: EstimationMethod) -> Self {
        let safety_margin = match method {
            EstimationMethod::CharacterBased => 1.0,
            EstimationMethod::WordBased => 1.0,
            EstimationMethod::Conservative => 1.2,
        };
        Self {
            method,
            safety_margin,
        }
    }

    /// Create a conservative estimator with custom safety margin.
    pub fn conservative(safety_margin: f64) -> Self {
        Self {
            method: EstimationMethod::Conservative,
            safety_margin: safety_margin.max(1.0),
        }
    }

    /// Estimate tokens from text.
    pub fn estimate(&self, text: &str) -> u64 {
        let base_estimate = match self.method {
            EstimationMethod::CharacterBased => self.estimate_by_chars(text),
            EstimationMethod::WordBased => self.estimate_by_words(text),
            EstimationMethod::Conservative => {
                // Use the higher of the two methods
                let char_estimate = self.estimate_by_chars(text);
                let word_estimate = self.estimate_by_words(text);
                char_estimate.max(word_estimate)
            }
        };

        (base_estimate as f64 * self.safety_margin).ceil() as u64
    }

    /// Estimate tokens based on character count.
    /// Roughly 4 characters per token for English text.
    fn estimate_by_chars(&self, text: &str) -> u64 {
        let chars = text.chars().count();
        // Use 3.5 chars per token to be slightly conservative
        (chars as f64 / 3.5).ceil() as u64
    }

    /// Estimate tokens based on word count.
    /// Roughly 1.3 tokens per word for English text.
    fn estimate_by_words(&self, text: &str) -> u64 {
        let words = text.split_whitespace().count();
        (words as f64 * 1.3).ceil() as u64
    }
}

impl CostEstimator for TokenEstimator {
    fn estimate(&self, text: &str) -> Result<u64, EstimationError> {
        Ok(TokenEstimator::estimate(self, text))
    }
}
