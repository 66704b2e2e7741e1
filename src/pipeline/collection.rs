//! Per-collection generation: one oracle round-trip, parsed, validated,
//! dependency-propagated, and completed with placeholders.
//!
//! Failures are contained here: an oracle or parse failure for one
//! collection yields an all-placeholder result for that collection and
//! nothing else, so one bad collection cannot sink its batch.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::model::{Endpoint, TestCaseSet};
use crate::oracle::{Oracle, OracleClient, ResponseParser};
use crate::pipeline::prompt::PromptRenderer;
use crate::pipeline::propagate::DependencyScope;
use crate::pipeline::state::GenerationMetrics;
use crate::pipeline::validate::{complete_canonical, placeholder_set, validate_cases};
use crate::sequence::{
    base_id, CanonicalOperation, CollectionClass, OperationSequencer, SequencedEndpoint,
};

/// Result of processing one collection.
#[derive(Debug, Default)]
pub(crate) struct CollectionOutcome {
    /// Enriched endpoints in canonical order.
    pub endpoints: Vec<Endpoint>,
    /// Placeholder sets for canonical operations with no owning endpoint.
    pub placeholders: Vec<TestCaseSet>,
    /// Metrics delta for this collection.
    pub metrics: GenerationMetrics,
}

/// Everything a worker needs to process collections. Configuration is
/// immutable and shared read-only across workers.
pub(crate) struct GenerationContext<O> {
    pub client: OracleClient<O>,
    pub parser: ResponseParser,
    pub renderer: PromptRenderer,
    pub system_prompt: String,
}

pub(crate) async fn process_collection<O: Oracle>(
    context: &GenerationContext<O>,
    name: &str,
    endpoints: Vec<Endpoint>,
) -> CollectionOutcome {
    let class = CollectionClass::of(name);
    let sequenced = OperationSequencer::sequence(name, endpoints);
    info!(
        collection = name,
        endpoints = sequenced.len(),
        "generating test cases"
    );

    let prompt = context.renderer.render(name, &sequenced);
    let text = match context.client.complete(&prompt, &context.system_prompt).await {
        Ok(text) => text,
        Err(err) => {
            error!(collection = name, error = %err, "oracle call failed, using placeholder result");
            return fallback_outcome(class, name, sequenced);
        }
    };

    let entries = match context.parser.parse(&text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            error!(
                collection = name,
                kind = json_kind(&other),
                "oracle output is not a keyed object, using placeholder result"
            );
            return fallback_outcome(class, name, sequenced);
        }
        Err(err) => {
            error!(collection = name, error = %err, "oracle output failed to parse, using placeholder result");
            return fallback_outcome(class, name, sequenced);
        }
    };

    assemble_outcome(class, name, sequenced, &entries)
}

/// Build the outcome from parsed oracle entries: validate, propagate
/// dependencies in canonical order, and fill canonical gaps.
fn assemble_outcome(
    class: CollectionClass,
    name: &str,
    sequenced: Vec<SequencedEndpoint>,
    entries: &Map<String, Value>,
) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    outcome.metrics.total_endpoints = sequenced.len() as u64;

    let mut scope = DependencyScope::new();
    let mut present: BTreeSet<_> = BTreeSet::new();

    for entry in sequenced {
        let mut set = TestCaseSet::empty(entry.operation);

        if let Some(raw) = lookup_entry(entries, &entry.prompt_id, &entry.endpoint.id) {
            set.success = validate_cases(
                raw_cases(raw, "success"),
                entry.operation,
                name,
                &entry.endpoint.id,
                "success",
            );
            set.failure = validate_cases(
                raw_cases(raw, "failure"),
                entry.operation,
                name,
                &entry.endpoint.id,
                "failure",
            );
        } else {
            warn!(
                collection = name,
                endpoint = %entry.endpoint.id,
                prompt_id = %entry.prompt_id,
                "oracle output carries no entry for endpoint"
            );
        }

        scope.absorb_and_apply(&mut set);

        // `other` is outside the canonical guarantee and never gets a
        // synthesized placeholder; an empty set stays empty.
        if set.is_empty() && entry.operation != CanonicalOperation::Other {
            set = placeholder_set(entry.operation);
        }
        // An endpoint-attached placeholder still represents its operation.
        present.insert(entry.operation);
        outcome.metrics.record_set(&set);

        let mut endpoint = entry.endpoint;
        endpoint.test_cases = Some(set);
        outcome.endpoints.push(endpoint);
    }

    outcome.placeholders = complete_canonical(class, name, &present);
    for set in &outcome.placeholders {
        outcome.metrics.record_set(set);
    }
    outcome
}

/// All-placeholder result for a collection whose oracle round-trip failed.
fn fallback_outcome(
    class: CollectionClass,
    name: &str,
    sequenced: Vec<SequencedEndpoint>,
) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    outcome.metrics.total_endpoints = sequenced.len() as u64;

    let mut present = BTreeSet::new();
    for entry in sequenced {
        let set = if entry.operation == CanonicalOperation::Other {
            TestCaseSet::empty(entry.operation)
        } else {
            placeholder_set(entry.operation)
        };
        outcome.metrics.record_set(&set);
        present.insert(entry.operation);

        let mut endpoint = entry.endpoint;
        endpoint.test_cases = Some(set);
        outcome.endpoints.push(endpoint);
    }

    outcome.placeholders = complete_canonical(class, name, &present);
    for set in &outcome.placeholders {
        outcome.metrics.record_set(set);
    }
    outcome
}

/// Find the oracle entry for an endpoint, trying the suffixed prompt id
/// first, then the bare id, then any key whose base id matches.
fn lookup_entry<'a>(
    entries: &'a Map<String, Value>,
    prompt_id: &str,
    id: &str,
) -> Option<&'a Value> {
    entries
        .get(prompt_id)
        .or_else(|| entries.get(id))
        .or_else(|| {
            entries
                .iter()
                .find(|(key, _)| base_id(key) == id)
                .map(|(_, value)| value)
        })
}

fn raw_cases<'a>(entry: &'a Value, kind: &str) -> &'a [Value] {
    entry
        .get(kind)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
