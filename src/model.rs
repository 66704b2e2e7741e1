//! Core data model: endpoint descriptors, generated test cases, and batches.
//!
//! Endpoints arrive from the extraction collaborator grouped by collection.
//! The pipeline assigns run-unique ids, attaches the owning collection name,
//! and eventually attaches a [`TestCaseSet`] to each endpoint in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sequence::{CanonicalOperation, RawOperation};

/// Ordered mapping of collection name to its endpoints.
///
/// Insertion order is significant: batching walks collections in the order
/// the extraction collaborator produced them.
pub type CollectionMap = Vec<(String, Vec<Endpoint>)>;

/// An API endpoint descriptor.
///
/// The `id` and `collection` fields are assigned by the pipeline during
/// batching; everything else comes from the extraction collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Endpoint {
    /// Run-unique identifier, assigned at ingestion.
    #[serde(default)]
    pub id: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub handler: String,
    /// Parameter descriptors (name, location, type, required).
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub summary: String,
    /// Status code to response shape mapping.
    #[serde(default)]
    pub responses: Map<String, Value>,
    /// Raw operation tag; unrecognized tags normalize to `other` at ingestion.
    #[serde(default)]
    pub operation: RawOperation,
    /// Owning collection, assigned at ingestion.
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub file: String,
    /// Generated test cases, attached after generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<TestCaseSet>,
}

impl Endpoint {
    /// Whether the path contains a placeholder segment such as `{id}`.
    pub fn has_path_placeholder(&self) -> bool {
        self.path.contains('{') && self.path.contains('}')
    }
}

/// A single generated test case. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub payload: Value,
    pub expected_response: Value,
    pub response_code: u16,
}

/// The success/failure test cases generated for one canonical operation.
///
/// Attached 1:1 to the endpoint that owns the operation; canonical operations
/// with no owning endpoint get a collection-level placeholder set instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseSet {
    pub operation: CanonicalOperation,
    #[serde(default)]
    pub success: Vec<TestCase>,
    #[serde(default)]
    pub failure: Vec<TestCase>,
}

impl TestCaseSet {
    /// Create an empty set for the given operation.
    pub fn empty(operation: CanonicalOperation) -> Self {
        Self {
            operation,
            success: Vec::new(),
            failure: Vec::new(),
        }
    }

    /// Total number of cases in the set.
    pub fn case_count(&self) -> usize {
        self.success.len() + self.failure.len()
    }

    /// Whether the set holds no cases at all.
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failure.is_empty()
    }
}

/// A group of collections processed in one oracle round-trip.
///
/// Collections are atomic: a collection never spans two batches. The total
/// estimated cost stays at or under the budget except when a single
/// collection alone exceeds it, in which case it occupies its own batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    /// Collection name to endpoints, in insertion order.
    pub collections: CollectionMap,
    /// Estimated token cost of the batch contents.
    pub estimated_cost: u64,
}

impl Batch {
    /// Number of endpoints across all collections in the batch.
    pub fn endpoint_count(&self) -> usize {
        self.collections.iter().map(|(_, eps)| eps.len()).sum()
    }

    /// Whether the batch holds no collections.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
