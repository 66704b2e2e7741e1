//! # caseforge
//!
//! Automated API test case generation over a language model oracle.
//!
//! Given endpoint metadata grouped into collections, caseforge:
//!
//! 1. **Batches** collections under a token budget so each oracle request
//!    stays within context limits ([`budget`])
//! 2. **Sequences** each collection's endpoints into a canonical operation
//!    order, resolving ambiguous roles from context ([`sequence`])
//! 3. **Generates** test cases by prompting the oracle per collection,
//!    recovering JSON from imperfect output, validating every case, and
//!    propagating resource ids and credentials across dependent stages
//!    ([`oracle`], [`pipeline`])
//!
//! Failures degrade instead of aborting: transient oracle errors are
//! retried with exponential backoff, and a collection whose round-trip
//! still fails comes back as synthesized placeholder cases so downstream
//! consumers always see the full canonical operation set.
//!
//! # Example
//!
//! ```ignore
//! use caseforge::{GeneratorConfig, TestCasePipeline};
//! use caseforge::oracle::ChatCompletionsOracle;
//!
//! let oracle = ChatCompletionsOracle::new(base_url, api_key, model);
//! let pipeline = TestCasePipeline::new(oracle, GeneratorConfig::default());
//! let state = pipeline.run(collections).await;
//! ```

pub mod budget;
pub mod config;
pub mod error;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod sequence;

pub use config::GeneratorConfig;
pub use error::{PipelineError, PipelineResult};
pub use model::{Batch, CollectionMap, Endpoint, TestCase, TestCaseSet};
pub use pipeline::state::{GenerationMetrics, GenerationOutput, PipelineState};
pub use pipeline::TestCasePipeline;
