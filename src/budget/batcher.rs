//! Greedy token-budget batching.
//!
//! Collections are binned in insertion order, accumulating a running cost;
//! when the next collection would exceed the budget, the running batch is
//! closed and a new one started. A collection is never split across batches,
//! so a single collection larger than the whole budget occupies its own
//! batch. A chunk-level variant bins raw code chunks per source language,
//! where the chunk (not the collection) is the atomic unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::budget::estimator::{fallback_estimate, CostEstimator};
use crate::model::{Batch, CollectionMap, Endpoint};

/// A raw source-code chunk, for the chunk-level batching variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeChunk {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub code: String,
    /// Precomputed token count, if the producer already has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

/// Greedy binning of collections (or chunks) under a token budget.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudgetBatcher {
    budget: u64,
}

impl TokenBudgetBatcher {
    /// Create a batcher with the given per-batch token budget.
    pub fn new(budget: u64) -> Self {
        Self { budget }
    }

    /// The configured per-batch budget.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Bin collections into batches, keeping each collection whole.
    pub fn batch_collections(
        &self,
        estimator: &dyn CostEstimator,
        collections: CollectionMap,
    ) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        let mut current = Batch::default();

        for (name, endpoints) in collections {
            let cost: u64 = endpoints
                .iter()
                .map(|ep| estimate_or_fallback(estimator, &endpoint_text(ep)))
                .sum();

            if !current.is_empty() && current.estimated_cost + cost > self.budget {
                batches.push(std::mem::take(&mut current));
            }
            if cost > self.budget {
                warn!(
                    collection = %name,
                    cost,
                    budget = self.budget,
                    "collection alone exceeds the batch budget, placing it in its own batch"
                );
            }

            current.estimated_cost += cost;
            current.collections.push((name, endpoints));
        }

        if !current.is_empty() {
            batches.push(current);
        }

        debug!(batches = batches.len(), "batched collections under budget");
        batches
    }

    /// Bin code chunks per source language, with the chunk as atomic unit.
    ///
    /// Chunks carrying a precomputed `tokens` count use it directly; the
    /// rest are estimated from their code text.
    pub fn batch_chunks(
        &self,
        estimator: &dyn CostEstimator,
        chunks: Vec<CodeChunk>,
    ) -> BTreeMap<String, Vec<Vec<CodeChunk>>> {
        let mut by_language: BTreeMap<String, Vec<CodeChunk>> = BTreeMap::new();
        for chunk in chunks {
            let language = if chunk.language.is_empty() {
                "unknown".to_string()
            } else {
                chunk.language.clone()
            };
            by_language.entry(language).or_default().push(chunk);
        }

        let mut batched: BTreeMap<String, Vec<Vec<CodeChunk>>> = BTreeMap::new();
        for (language, lang_chunks) in by_language {
            let mut batches: Vec<Vec<CodeChunk>> = Vec::new();
            let mut current: Vec<CodeChunk> = Vec::new();
            let mut current_tokens = 0u64;

            for chunk in lang_chunks {
                let tokens = chunk
                    .tokens
                    .unwrap_or_else(|| estimate_or_fallback(estimator, &chunk.code));

                if !current.is_empty() && current_tokens + tokens > self.budget {
                    batches.push(std::mem::take(&mut current));
                    current_tokens = 0;
                }
                current_tokens += tokens;
                current.push(chunk);
            }

            if !current.is_empty() {
                batches.push(current);
            }
            batched.insert(language, batches);
        }

        batched
    }
}

/// Estimate cost, falling back to the character heuristic on estimator
/// failure instead of failing the batch.
fn estimate_or_fallback(estimator: &dyn CostEstimator, text: &str) -> u64 {
    match estimator.estimate(text) {
        Ok(cost) => cost,
        Err(err) => {
            warn!(error = %err, "cost estimation failed, using character-count fallback");
            fallback_estimate(text)
        }
    }
}

/// Textual form of an endpoint used for cost estimation.
fn endpoint_text(endpoint: &Endpoint) -> String {
    serde_json::to_string(endpoint).unwrap_or_else(|_| {
        format!(
            "{} {} {}",
            endpoint.method, endpoint.path, endpoint.summary
        )
    })
}
