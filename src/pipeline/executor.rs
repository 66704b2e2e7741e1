//! Concurrent execution of budgeted batches.
//!
//! Batches run as spawned tasks behind a semaphore, so at most `width`
//! batches are in flight at once regardless of how many the budgeting stage
//! produced. Within one batch, collections are processed sequentially so
//! each collection's dependency scope stays ordered.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::model::{Batch, Endpoint, TestCaseSet};
use crate::oracle::Oracle;
use crate::pipeline::collection::{process_collection, GenerationContext};
use crate::pipeline::state::GenerationMetrics;

/// Combined result of one batch run.
#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    pub endpoints: Vec<(String, Vec<Endpoint>)>,
    pub placeholders: Vec<(String, Vec<TestCaseSet>)>,
    pub metrics: GenerationMetrics,
}

impl BatchOutcome {
    fn merge(&mut self, mut other: BatchOutcome) {
        self.endpoints.append(&mut other.endpoints);
        self.placeholders.append(&mut other.placeholders);
        self.metrics.merge(&other.metrics);
    }
}

/// Runs budgeted batches concurrently with a bounded width.
pub(crate) struct BatchExecutor {
    width: usize,
}

impl BatchExecutor {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Process all batches and merge their outcomes. A panicked batch task
    /// is logged and excluded; the remaining batches still contribute.
    pub async fn execute<O: Oracle + 'static>(
        &self,
        context: Arc<GenerationContext<O>>,
        batches: Vec<Batch>,
    ) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut tasks = JoinSet::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let context = Arc::clone(&context);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Holds until a slot frees up. The semaphore is never
                // closed while tasks are running.
                let _permit = semaphore.acquire_owned().await;
                process_batch(&context, index, batch).await
            });
        }

        let mut combined = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => combined.merge(outcome),
                Err(err) => {
                    error!(error = %err, "batch task failed to join, excluding its results");
                }
            }
        }
        combined
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(4)
    }
}

async fn process_batch<O: Oracle>(
    context: &GenerationContext<O>,
    index: usize,
    batch: Batch,
) -> BatchOutcome {
    info!(
        batch = index,
        collections = batch.collections.len(),
        estimated_cost = batch.estimated_cost,
        "processing batch"
    );

    let mut outcome = BatchOutcome::default();
    for (name, endpoints) in batch.collections {
        let result = process_collection(context, &name, endpoints).await;
        outcome.metrics.merge(&result.metrics);
        outcome.endpoints.push((name.clone(), result.endpoints));
        if !result.placeholders.is_empty() {
            outcome.placeholders.push((name, result.placeholders));
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleClient, OracleError, OracleResult, ResponseParser, RetryPolicy};
    use crate::pipeline::prompt::PromptRenderer;
    use crate::sequence::RawOperation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOracle {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl CountingOracle {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl Oracle for CountingOracle {
        async fn complete(&self, prompt: &str, _system_prompt: &str) -> OracleResult<String> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(marker) = self.fail_on {
                if prompt.contains(marker) {
                    return Err(OracleError::Status(401));
                }
            }
            Ok(r#"{"1": {"success": [{"payload": {"name": "x"}, "expected_response": {"id": "r"}, "response_code": 201}], "failure": []}}"#.to_string())
        }
    }

    fn context(oracle: Arc<CountingOracle>) -> Arc<GenerationContext<Arc<CountingOracle>>> {
        Arc::new(GenerationContext {
            client: OracleClient::new(oracle, RetryPolicy::none()),
            parser: ResponseParser::default(),
            renderer: PromptRenderer::default(),
            system_prompt: "system".to_string(),
        })
    }

    fn batch(name: &str) -> Batch {
        Batch {
            collections: vec![(
                name.to_string(),
                vec![Endpoint {
                    id: "1".to_string(),
                    path: "/items".to_string(),
                    method: "POST".to_string(),
                    operation: RawOperation::Create,
                    ..Endpoint::default()
                }],
            )],
            estimated_cost: 10,
        }
    }

    #[tokio::test]
    async fn test_all_batches_contribute() {
        let oracle = Arc::new(CountingOracle::new(None));
        let executor = BatchExecutor::default();
        let batches = vec![batch("A"), batch("B"), batch("C")];

        let outcome = executor.execute(context(Arc::clone(&oracle)), batches).await;
        assert_eq!(outcome.endpoints.len(), 3);
        assert_eq!(outcome.metrics.total_endpoints, 3);
    }

    #[tokio::test]
    async fn test_width_bounds_concurrency() {
        let oracle = Arc::new(CountingOracle::new(None));
        let executor = BatchExecutor::new(2);
        let batches = (0..8).map(|i| batch(&format!("C{i}"))).collect();

        executor.execute(context(Arc::clone(&oracle)), batches).await;
        assert!(oracle.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failed_collection_does_not_sink_batch_run() {
        let oracle = Arc::new(CountingOracle::new(Some("Broken")));
        let executor = BatchExecutor::default();
        let batches = vec![batch("A"), batch("Broken"), batch("B")];

        let outcome = executor.execute(context(Arc::clone(&oracle)), batches).await;
        // The failed collection still reports, as placeholders.
        assert_eq!(outcome.endpoints.len(), 3);
        let broken = outcome
            .endpoints
            .iter()
            .find(|(name, _)| name == "Broken")
            .unwrap();
        let set = broken.1[0].test_cases.as_ref().unwrap();
        assert!(set.success.is_empty());
        assert_eq!(set.failure.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_width_clamped_to_one() {
        let oracle = Arc::new(CountingOracle::new(None));
        let executor = BatchExecutor::new(0);
        let outcome = executor.execute(context(oracle), vec![batch("A")]).await;
        assert_eq!(outcome.endpoints.len(), 1);
    }
}
