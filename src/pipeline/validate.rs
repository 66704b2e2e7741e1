//! Test case validation and placeholder synthesis.
//!
//! Oracle output is untrusted: cases missing required fields, carrying a
//! zero response code, or (for mutating operations) an empty payload are
//! dropped with a warning. After validation, any canonical operation other
//! than `other` left with no surviving cases gets a synthesized failure
//! placeholder so the canonical operation set is never silently absent.

use std::collections::BTreeSet;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::model::{TestCase, TestCaseSet};
use crate::sequence::{CanonicalOperation, CollectionClass};

/// Why a generated test case was rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CaseRejection {
    #[error("test case is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("response_code is zero or not a valid status code")]
    InvalidResponseCode,
    #[error("payload must be a non-empty mapping for a mutating operation")]
    EmptyPayload,
}

/// Validate a single raw case for the given operation.
pub fn validate_case(
    raw: &Value,
    operation: CanonicalOperation,
) -> Result<TestCase, CaseRejection> {
    let object = raw.as_object().ok_or(CaseRejection::NotAnObject)?;

    for field in ["payload", "expected_response", "response_code"] {
        if !object.contains_key(field) {
            return Err(CaseRejection::MissingField(field));
        }
    }

    let response_code = object["response_code"]
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .ok_or(CaseRejection::InvalidResponseCode)?;
    if response_code == 0 {
        return Err(CaseRejection::InvalidResponseCode);
    }

    let payload = object["payload"].clone();
    if operation.is_mutating() {
        match payload.as_object() {
            Some(map) if !map.is_empty() => {}
            _ => return Err(CaseRejection::EmptyPayload),
        }
    }

    Ok(TestCase {
        payload,
        expected_response: object["expected_response"].clone(),
        response_code,
    })
}

/// Validate all raw cases of one kind, logging and dropping the invalid.
pub fn validate_cases(
    raw_cases: &[Value],
    operation: CanonicalOperation,
    collection: &str,
    endpoint_id: &str,
    kind: &str,
) -> Vec<TestCase> {
    raw_cases
        .iter()
        .filter_map(|raw| match validate_case(raw, operation) {
            Ok(case) => Some(case),
            Err(rejection) => {
                warn!(
                    collection,
                    endpoint = endpoint_id,
                    operation = %operation,
                    kind,
                    reason = %rejection,
                    "dropping invalid test case"
                );
                None
            }
        })
        .collect()
}

/// The synthesized failure placeholder for a missing canonical operation.
pub fn placeholder_set(operation: CanonicalOperation) -> TestCaseSet {
    TestCaseSet {
        operation,
        success: Vec::new(),
        failure: vec![TestCase {
            payload: json!({}),
            expected_response: json!({
                "error": format!("Placeholder for missing {}", operation)
            }),
            response_code: 400,
        }],
    }
}

/// Synthesize placeholder sets for every canonical operation (except
/// `other`) not already present in the collection.
pub fn complete_canonical(
    class: CollectionClass,
    collection: &str,
    present: &BTreeSet<CanonicalOperation>,
) -> Vec<TestCaseSet> {
    class
        .canonical_order()
        .iter()
        .filter(|op| **op != CanonicalOperation::Other && !present.contains(op))
        .map(|op| {
            warn!(
                collection,
                operation = %op,
                "canonical operation has no surviving cases, synthesizing placeholder"
            );
            placeholder_set(*op)
        })
        .collect()
}
