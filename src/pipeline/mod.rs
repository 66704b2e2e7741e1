//! The test case generation pipeline.
//!
//! Two public operations: [`TestCasePipeline::batch`] bins ingested
//! collections under a token budget, and [`TestCasePipeline::generate`] runs
//! the budgeted batches through the oracle concurrently and merges the
//! per-collection results. [`TestCasePipeline::run`] threads both through a
//! [`PipelineState`].

mod collection;
mod executor;
pub mod prompt;
pub mod propagate;
pub mod state;
pub mod validate;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::budget::{CostEstimator, TokenBudgetBatcher, TokenEstimator};
use crate::config::GeneratorConfig;
use crate::model::{Batch, CollectionMap, Endpoint};
use crate::oracle::{Oracle, OracleClient, ResponseParser};
use crate::sequence::CollectionClass;

use collection::GenerationContext;
use executor::BatchExecutor;
use prompt::PromptRenderer;
use state::{CollectionReport, GenerationOutput, PipelineState};

/// End-to-end test case generation over a set of endpoint collections.
pub struct TestCasePipeline<O> {
    config: GeneratorConfig,
    context: Arc<GenerationContext<O>>,
    estimator: Arc<dyn CostEstimator>,
}

impl<O: Oracle + 'static> TestCasePipeline<O> {
    /// Build a pipeline around the given oracle and configuration.
    pub fn new(oracle: O, config: GeneratorConfig) -> Self {
        let context = Arc::new(GenerationContext {
            client: OracleClient::new(oracle, config.retry_policy()),
            parser: ResponseParser::new(),
            renderer: PromptRenderer::new(config.prompt_preamble.clone()),
            system_prompt: config.system_prompt.clone(),
        });
        let estimator = Arc::new(TokenEstimator::new(config.estimation));
        Self {
            config,
            context,
            estimator,
        }
    }

    /// Swap in a custom cost estimator for the batching stage.
    pub fn with_estimator(mut self, estimator: Arc<dyn CostEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Bin collections into batches under the configured token budget.
    /// Endpoints arriving without an id are assigned sequential numeric ones
    /// so the oracle output can be re-associated later.
    pub fn batch(&self, mut collections: CollectionMap) -> Vec<Batch> {
        let mut next_id = 1u64;
        for (_, endpoints) in &mut collections {
            for endpoint in endpoints {
                if endpoint.id.is_empty() {
                    endpoint.id = next_id.to_string();
                }
                next_id += 1;
            }
        }

        let batcher = TokenBudgetBatcher::new(self.config.max_tokens_per_batch);
        batcher.batch_collections(self.estimator.as_ref(), collections)
    }

    /// Run the budgeted batches through the oracle and merge the results.
    pub async fn generate(&self, batches: Vec<Batch>) -> GenerationOutput {
        let started = Instant::now();
        let executor = BatchExecutor::new(self.config.max_concurrency);
        let outcome = executor.execute(Arc::clone(&self.context), batches).await;

        let mut collections: BTreeMap<String, CollectionReport> = BTreeMap::new();
        for (name, endpoints) in outcome.endpoints {
            collections
                .entry(name)
                .or_default()
                .endpoints
                .extend(endpoints);
        }
        for (name, placeholders) in outcome.placeholders {
            collections
                .entry(name)
                .or_default()
                .placeholders
                .extend(placeholders);
        }
        for (name, report) in &mut collections {
            sort_report(name, report);
        }

        let mut metrics = outcome.metrics;
        metrics.execution_time = started.elapsed();
        info!(
            collections = collections.len(),
            endpoints = metrics.total_endpoints,
            test_cases = metrics.total_test_cases,
            elapsed = ?metrics.execution_time,
            "generation complete"
        );

        GenerationOutput {
            collections,
            metrics,
        }
    }

    /// Batch then generate, threading the state through both stages.
    pub async fn run(&self, collections: CollectionMap) -> PipelineState {
        let state = PipelineState::new(collections);
        let batches = self.batch(state.endpoints.clone());
        let state = state.with_batches(batches.clone());
        let output = self.generate(batches).await;
        state.with_output(output)
    }
}

/// Restore canonical order within a merged collection report.
fn sort_report(name: &str, report: &mut CollectionReport) {
    let class = CollectionClass::of(name);
    report.endpoints.sort_by(|a, b| {
        (endpoint_rank(class, a), &a.id, &a.path).cmp(&(endpoint_rank(class, b), &b.id, &b.path))
    });
    report
        .placeholders
        .sort_by_key(|set| class.rank(set.operation));
}

fn endpoint_rank(class: CollectionClass, endpoint: &Endpoint) -> usize {
    endpoint
        .test_cases
        .as_ref()
        .map_or(usize::MAX, |set| class.rank(set.operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::EstimationError;
    use crate::oracle::OracleResult;
    use crate::sequence::{CanonicalOperation, RawOperation};
    use async_trait::async_trait;

    struct EchoOracle;

    #[async_trait]
    impl Oracle for EchoOracle {
        async fn complete(&self, _prompt: &str, _system_prompt: &str) -> OracleResult<String> {
            Ok("{}".to_string())
        }
    }

    struct UnitEstimator;

    impl CostEstimator for UnitEstimator {
        fn estimate(&self, _text: &str) -> Result<u64, EstimationError> {
            Ok(1)
        }
    }

    fn endpoint(path: &str, operation: RawOperation) -> Endpoint {
        Endpoint {
            path: path.to_string(),
            method: "POST".to_string(),
            operation,
            ..Endpoint::default()
        }
    }

    #[test]
    fn test_batch_assigns_missing_ids() {
        let pipeline = TestCasePipeline::new(EchoOracle, GeneratorConfig::default());
        let batches = pipeline.batch(vec![(
            "Items".to_string(),
            vec![
                endpoint("/items", RawOperation::Create),
                endpoint("/items/{id}", RawOperation::Read),
            ],
        )]);

        assert_eq!(batches.len(), 1);
        let ids: Vec<_> = batches[0].collections[0]
            .1
            .iter()
            .map(|ep| ep.id.clone())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_batch_respects_budget() {
        let config = GeneratorConfig::default().with_max_tokens_per_batch(3);
        let pipeline =
            TestCasePipeline::new(EchoOracle, config).with_estimator(Arc::new(UnitEstimator));

        let collections: CollectionMap = (0..6)
            .map(|i| {
                (
                    format!("C{i}"),
                    vec![
                        endpoint("/x", RawOperation::Create),
                        endpoint("/x/{id}", RawOperation::Read),
                    ],
                )
            })
            .collect();

        let batches = pipeline.batch(collections);
        // Two unit-cost endpoints per collection against a budget of three.
        assert_eq!(batches.len(), 6);
        for batch in &batches {
            assert!(batch.estimated_cost <= 3);
        }
    }

    #[tokio::test]
    async fn test_run_threads_state() {
        let pipeline = TestCasePipeline::new(EchoOracle, GeneratorConfig::default());
        let state = pipeline
            .run(vec![(
                "Items".to_string(),
                vec![endpoint("/items", RawOperation::Create)],
            )])
            .await;

        assert_eq!(state.batches.len(), 1);
        assert_eq!(state.results.len(), 1);
        let report = &state.results["Items"];
        // The empty oracle object yields a placeholder for the endpoint and
        // collection-level placeholders for the remaining canonical slots.
        assert_eq!(report.endpoints.len(), 1);
        assert_eq!(report.placeholders.len(), 6);
        assert_eq!(state.metrics.total_endpoints, 1);
    }

    #[test]
    fn test_sort_report_restores_canonical_order() {
        let mut report = CollectionReport::default();
        for (id, op) in [
            ("3", CanonicalOperation::Delete),
            ("1", CanonicalOperation::Create),
            ("2", CanonicalOperation::ReadAfterCreate),
        ] {
            let mut ep = Endpoint {
                id: id.to_string(),
                ..Endpoint::default()
            };
            ep.test_cases = Some(crate::model::TestCaseSet::empty(op));
            report.endpoints.push(ep);
        }

        sort_report("Items", &mut report);
        let ops: Vec<_> = report
            .endpoints
            .iter()
            .map(|ep| ep.test_cases.as_ref().unwrap().operation)
            .collect();
        assert_eq!(
            ops,
            vec![
                CanonicalOperation::Create,
                CanonicalOperation::ReadAfterCreate,
                CanonicalOperation::Delete,
            ]
        );
    }
}
