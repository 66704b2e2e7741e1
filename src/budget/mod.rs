//! Token budget management: cost estimation and greedy batching.
//!
//! The budget system consists of:
//! - **CostEstimator / TokenEstimator**: estimates token counts from text
//!   (exact counts are not available before calling the oracle)
//! - **TokenBudgetBatcher**: bins collections (or code chunks) into batches
//!   without exceeding a max token budget per batch
//!
//! # Example
//!
//! ```ignore
//! use caseforge::budget::{TokenBudgetBatcher, TokenEstimator};
//!
//! let batcher = TokenBudgetBatcher::new(8_000);
//! let batches = batcher.batch_collections(&TokenEstimator::default(), collections);
//! ```

mod batcher;
mod estimator;

pub use batcher::{CodeChunk, TokenBudgetBatcher};
pub use estimator::{
    fallback_estimate, CostEstimator, EstimationError, EstimationMethod, TokenEstimator,
};
