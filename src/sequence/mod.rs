//! Operation sequencing: contextual role resolution and stable ordering.
//!
//! Raw operation tags are ambiguous: `read` may be a read-after-create,
//! read-after-update, or read-after-delete depending on what precedes it, and
//! `login` splits into success and failure roles. The sequencer resolves
//! these by scanning a collection's endpoints in their given order, then
//! sorts the collection into a deterministic total order reused both for the
//! text presented to the oracle and for reassembling its output.

mod operation;

pub use operation::{
    CanonicalOperation, CollectionClass, RawOperation, AUTH_ORDER, CRUD_ORDER,
};

use tracing::warn;

use crate::model::Endpoint;

/// An endpoint paired with its resolved canonical operation.
#[derive(Debug, Clone)]
pub struct SequencedEndpoint {
    pub endpoint: Endpoint,
    pub operation: CanonicalOperation,
    /// Identifier used in the prompt and expected back in the oracle output.
    /// Contextual roles are suffixed (`<id>_<operation>`) so the same base
    /// endpoint can carry different roles across runs.
    pub prompt_id: String,
}

/// Assigns canonical operation roles and produces a stable total order for
/// one collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationSequencer;

impl OperationSequencer {
    /// Resolve each endpoint's role and sort the collection by
    /// (canonical rank, original id, path).
    ///
    /// The sort is stable and idempotent: sequencing already-ordered input
    /// yields an identical ordering.
    pub fn sequence(collection: &str, endpoints: Vec<Endpoint>) -> Vec<SequencedEndpoint> {
        let class = CollectionClass::of(collection);

        let mut login_seen = 0u32;
        let mut previous: Option<CanonicalOperation> = None;
        let mut sequenced: Vec<SequencedEndpoint> = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let resolved = Self::resolve(collection, &endpoint, previous, &mut login_seen);
            previous = Some(resolved);

            let operation = if class.contains(resolved) {
                resolved
            } else {
                warn!(
                    collection,
                    endpoint = %endpoint.id,
                    operation = %resolved,
                    "operation outside the collection's canonical order, normalizing to other"
                );
                CanonicalOperation::Other
            };

            let prompt_id = prompt_id(&endpoint.id, operation);
            sequenced.push(SequencedEndpoint {
                endpoint,
                operation,
                prompt_id,
            });
        }

        sequenced.sort_by(|a, b| {
            (class.rank(a.operation), &a.endpoint.id, &a.endpoint.path).cmp(&(
                class.rank(b.operation),
                &b.endpoint.id,
                &b.endpoint.path,
            ))
        });
        sequenced
    }

    fn resolve(
        collection: &str,
        endpoint: &Endpoint,
        previous: Option<CanonicalOperation>,
        login_seen: &mut u32,
    ) -> CanonicalOperation {
        match endpoint.operation {
            RawOperation::Create => CanonicalOperation::Create,
            RawOperation::Update => CanonicalOperation::Update,
            RawOperation::Delete => CanonicalOperation::Delete,
            RawOperation::Register => CanonicalOperation::Register,
            RawOperation::Other => CanonicalOperation::Other,
            RawOperation::Read => {
                if !endpoint.has_path_placeholder() {
                    // A path-less read cannot be a single-resource fetch; a
                    // listing must already be tagged `list`.
                    warn!(
                        collection,
                        endpoint = %endpoint.id,
                        path = %endpoint.path,
                        "read endpoint without a path placeholder, reclassifying to other"
                    );
                    return CanonicalOperation::Other;
                }
                match previous {
                    Some(CanonicalOperation::Update) => CanonicalOperation::ReadAfterUpdate,
                    Some(CanonicalOperation::Delete) => CanonicalOperation::ReadAfterDelete,
                    _ => CanonicalOperation::ReadAfterCreate,
                }
            }
            RawOperation::List => {
                if endpoint.has_path_placeholder() {
                    warn!(
                        collection,
                        endpoint = %endpoint.id,
                        path = %endpoint.path,
                        "list endpoint with a path placeholder, reclassifying to other"
                    );
                    CanonicalOperation::Other
                } else {
                    CanonicalOperation::List
                }
            }
            RawOperation::Login => {
                *login_seen += 1;
                match *login_seen {
                    1 => CanonicalOperation::LoginSuccess,
                    2 => CanonicalOperation::LoginFailure,
                    n => {
                        // Unsupported configuration: no defined resolution
                        // for a third login endpoint. Flag it, don't guess.
                        warn!(
                            collection,
                            endpoint = %endpoint.id,
                            occurrence = n,
                            "more than two login-tagged endpoints in one collection, normalizing to other"
                        );
                        CanonicalOperation::Other
                    }
                }
            }
        }
    }
}

/// Build the identifier presented to the oracle for an endpoint. Contextual
/// roles carry an operation suffix; base roles use the bare id, which never
/// contains an underscore.
fn prompt_id(id: &str, operation: CanonicalOperation) -> String {
    match operation {
        CanonicalOperation::ReadAfterCreate
        | CanonicalOperation::ReadAfterUpdate
        | CanonicalOperation::ReadAfterDelete
        | CanonicalOperation::LoginSuccess
        | CanonicalOperation::LoginFailure
        | CanonicalOperation::List => format!("{}_{}", id, operation.as_str()),
        _ => id.to_string(),
    }
}

/// Recover the base endpoint id from an oracle-reported identifier.
pub fn base_id(reported: &str) -> &str {
    reported.split('_').next().unwrap_or(reported)
}
