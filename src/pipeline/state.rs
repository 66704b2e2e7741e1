//! Pipeline state, per-collection reports, and run metrics.
//!
//! The state is threaded node-to-node functionally: each stage consumes the
//! previous state and returns an updated value. During the concurrent phase
//! results are partitioned per batch and merged only after all tasks join,
//! so no two stages ever alias the state mutably.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Batch, CollectionMap, Endpoint, TestCaseSet};
use crate::sequence::CanonicalOperation;

/// Counters for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    /// Endpoints processed across all batches.
    pub total_endpoints: u64,
    /// All emitted cases, including synthesized placeholders.
    pub total_test_cases: u64,
    /// Emitted success cases.
    pub success_cases: u64,
    /// Emitted failure cases, including synthesized placeholders.
    pub failure_cases: u64,
    /// Wall-clock duration of the generate phase. Zero in per-batch deltas;
    /// set once when the run completes.
    #[serde(default)]
    pub execution_time: Duration,
}

impl GenerationMetrics {
    /// Fold another metrics delta into this one. Counters are summed;
    /// `execution_time` is left alone (it is owned by the run, not a batch).
    pub fn merge(&mut self, other: &GenerationMetrics) {
        self.total_endpoints += other.total_endpoints;
        self.total_test_cases += other.total_test_cases;
        self.success_cases += other.success_cases;
        self.failure_cases += other.failure_cases;
    }

    /// Record emitted cases for one test case set.
    pub fn record_set(&mut self, set: &TestCaseSet) {
        self.success_cases += set.success.len() as u64;
        self.failure_cases += set.failure.len() as u64;
        self.total_test_cases += set.case_count() as u64;
    }
}

/// Generation result for one collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionReport {
    /// Enriched endpoints in canonical order, each carrying `test_cases`.
    pub endpoints: Vec<Endpoint>,
    /// Placeholder sets for canonical operations with no owning endpoint.
    pub placeholders: Vec<TestCaseSet>,
}

impl CollectionReport {
    /// Every canonical operation represented in this report, whether it came
    /// from the oracle or from placeholder synthesis.
    pub fn operations_present(&self) -> BTreeSet<CanonicalOperation> {
        self.endpoints
            .iter()
            .filter_map(|ep| ep.test_cases.as_ref())
            .map(|set| set.operation)
            .chain(self.placeholders.iter().map(|set| set.operation))
            .collect()
    }

    /// Total emitted cases for the collection.
    pub fn case_count(&self) -> usize {
        self.endpoints
            .iter()
            .filter_map(|ep| ep.test_cases.as_ref())
            .map(TestCaseSet::case_count)
            .sum::<usize>()
            + self
                .placeholders
                .iter()
                .map(TestCaseSet::case_count)
                .sum::<usize>()
    }
}

/// Final output of the generate operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Per-collection results, keyed and ordered by collection name.
    pub collections: BTreeMap<String, CollectionReport>,
    pub metrics: GenerationMetrics,
}

/// State threaded through the pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Ingested endpoints, as supplied by the extraction collaborator.
    pub endpoints: CollectionMap,
    /// Budgeted batches, filled by the batching stage.
    pub batches: Vec<Batch>,
    /// Generation results, filled after the concurrent phase merges.
    pub results: BTreeMap<String, CollectionReport>,
    pub metrics: GenerationMetrics,
}

impl PipelineState {
    /// Start a run from ingested endpoints.
    pub fn new(endpoints: CollectionMap) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// Return the state with the batching stage's delta merged in.
    pub fn with_batches(mut self, batches: Vec<Batch>) -> Self {
        self.batches = batches;
        self
    }

    /// Return the state with the generation stage's delta merged in.
    pub fn with_output(mut self, output: GenerationOutput) -> Self {
        self.results = output.collections;
        self.metrics = output.metrics;
        self
    }
}
