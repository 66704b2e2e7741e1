//! Dependency propagation across sequenced stages.
//!
//! Within one collection, the resource identifier minted by the create (or
//! register) stage and the credentials registered by the auth stages must be
//! reused by everything downstream, or the generated cases would reference
//! resources that were never created. The scope values are captured only
//! from stages that actually yielded a success case; nothing is fabricated
//! when a producing stage came back empty.

use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::model::TestCaseSet;
use crate::sequence::CanonicalOperation;

/// Per-collection values threaded across sequenced stages.
#[derive(Debug, Default)]
pub struct DependencyScope {
    resource_id: Option<String>,
    credentials: Option<Value>,
}

impl DependencyScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The propagated resource identifier, if one has been captured.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// Capture scope values from this set, then rewrite its payloads so they
    /// stay consistent with earlier stages. Call in canonical order.
    pub fn absorb_and_apply(&mut self, set: &mut TestCaseSet) {
        match set.operation {
            CanonicalOperation::Create | CanonicalOperation::Register => {
                self.capture_resource_id(set);
                if set.operation == CanonicalOperation::Register {
                    self.capture_credentials(set);
                }
            }
            op if op.targets_resource() => {
                if let Some(id) = self.resource_id.clone() {
                    for case in &mut set.success {
                        set_field(&mut case.payload, "id", json!(id));
                    }
                }
            }
            CanonicalOperation::List => {
                if let Some(id) = self.resource_id.clone() {
                    for case in &mut set.success {
                        if let Some(items) = case
                            .expected_response
                            .get_mut("items")
                            .and_then(Value::as_array_mut)
                        {
                            for item in items {
                                set_field(item, "id", json!(id));
                            }
                        }
                    }
                }
            }
            CanonicalOperation::LoginSuccess => {
                if let Some(credentials) = self.credentials.clone() {
                    for case in &mut set.success {
                        case.payload = credentials.clone();
                    }
                } else {
                    self.capture_credentials(set);
                }
            }
            CanonicalOperation::LoginFailure => {
                // Overwrite only the username, leaving the supplied password
                // in place so the credentials are guaranteed to mismatch.
                let username = self
                    .credentials
                    .as_ref()
                    .and_then(|creds| creds.get("username"))
                    .cloned();
                if let Some(username) = username {
                    for case in &mut set.failure {
                        if case
                            .payload
                            .as_object()
                            .is_some_and(|map| map.contains_key("username"))
                        {
                            set_field(&mut case.payload, "username", username.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Capture the resource id from the first success case of a producing
    /// stage. A missing identifier gets a generated placeholder so later
    /// stages still propagate a consistent value.
    fn capture_resource_id(&mut self, set: &TestCaseSet) {
        if self.resource_id.is_some() {
            return;
        }
        let Some(first) = set.success.first() else {
            return;
        };
        let id = match first.expected_response.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                debug!(
                    operation = %set.operation,
                    "success case carries no response identifier, generating placeholder"
                );
                Uuid::new_v4().to_string()
            }
            Some(other) => other.to_string(),
        };
        self.resource_id = Some(id);
    }

    /// Capture credentials from the first success case of a producing stage.
    fn capture_credentials(&mut self, set: &TestCaseSet) {
        if self.credentials.is_some() {
            return;
        }
        if let Some(first) = set.success.first() {
            self.credentials = Some(first.payload.clone());
        }
    }
}

fn set_field(value: &mut Value, field: &str, replacement: Value) {
    if let Some(map) = value.as_object_mut() {
        map.insert(field.to_string(), replacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestCase;

    fn case(payload: Value, expected: Value, code: u16) -> TestCase {
        TestCase {
            payload,
            expected_response: expected,
            response_code: code,
        }
    }

    fn set(operation: CanonicalOperation, success: Vec<TestCase>, failure: Vec<TestCase>) -> TestCaseSet {
        TestCaseSet {
            operation,
            success,
            failure,
        }
    }

    #[test]
    fn test_create_id_threads_through_reads() {
        let mut scope = DependencyScope::new();

        let mut create = set(
            CanonicalOperation::Create,
            vec![case(json!({"name": "Laptop"}), json!({"id": "res-1"}), 201)],
            vec![],
        );
        scope.absorb_and_apply(&mut create);
        assert_eq!(scope.resource_id(), Some("res-1"));

        let mut read = set(
            CanonicalOperation::ReadAfterCreate,
            vec![case(json!({"id": "wrong"}), json!({}), 200)],
            vec![],
        );
        scope.absorb_and_apply(&mut read);
        assert_eq!(read.success[0].payload["id"], "res-1");

        let mut update = set(
            CanonicalOperation::Update,
            vec![case(json!({"id": "also-wrong", "name": "New"}), json!({}), 200)],
            vec![],
        );
        scope.absorb_and_apply(&mut update);
        assert_eq!(update.success[0].payload["id"], "res-1");
    }

    #[test]
    fn test_missing_response_id_generates_placeholder() {
        let mut scope = DependencyScope::new();
        let mut create = set(
            CanonicalOperation::Create,
            vec![case(json!({"name": "x"}), json!({"name": "x"}), 201)],
            vec![],
        );
        scope.absorb_and_apply(&mut create);
        // Placeholder is a parseable UUID.
        let id = scope.resource_id().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_no_success_case_means_no_propagation() {
        let mut scope = DependencyScope::new();
        let mut create = set(
            CanonicalOperation::Create,
            vec![],
            vec![case(json!({}), json!({}), 400)],
        );
        scope.absorb_and_apply(&mut create);
        assert!(scope.resource_id().is_none());

        let mut read = set(
            CanonicalOperation::ReadAfterCreate,
            vec![case(json!({"id": "original"}), json!({}), 200)],
            vec![],
        );
        scope.absorb_and_apply(&mut read);
        // Nothing fabricated: the supplied payload survives untouched.
        assert_eq!(read.success[0].payload["id"], "original");
    }

    #[test]
    fn test_list_items_rewritten() {
        let mut scope = DependencyScope::new();
        let mut create = set(
            CanonicalOperation::Create,
            vec![case(json!({"name": "x"}), json!({"id": "res-9"}), 201)],
            vec![],
        );
        scope.absorb_and_apply(&mut create);

        let mut list = set(
            CanonicalOperation::List,
            vec![case(
                json!({}),
                json!({"items": [{"id": "a"}, {"id": "b"}]}),
                200,
            )],
            vec![],
        );
        scope.absorb_and_apply(&mut list);
        let items = list.success[0].expected_response["items"].as_array().unwrap();
        assert!(items.iter().all(|item| item["id"] == "res-9"));
    }

    #[test]
    fn test_register_credentials_reused_by_login_success() {
        let mut scope = DependencyScope::new();
        let credentials = json!({"username": "alice", "password": "s3cret"});

        let mut register = set(
            CanonicalOperation::Register,
            vec![case(credentials.clone(), json!({"id": "u-1"}), 201)],
            vec![],
        );
        scope.absorb_and_apply(&mut register);

        let mut login = set(
            CanonicalOperation::LoginSuccess,
            vec![case(json!({"username": "bob", "password": "x"}), json!({}), 200)],
            vec![],
        );
        scope.absorb_and_apply(&mut login);
        assert_eq!(login.success[0].payload, credentials);
    }

    #[test]
    fn test_login_failure_gets_username_but_keeps_password() {
        let mut scope = DependencyScope::new();
        let mut register = set(
            CanonicalOperation::Register,
            vec![case(
                json!({"username": "alice", "password": "s3cret"}),
                json!({"id": "u-1"}),
                201,
            )],
            vec![],
        );
        scope.absorb_and_apply(&mut register);

        let mut login_failure = set(
            CanonicalOperation::LoginFailure,
            vec![],
            vec![case(
                json!({"username": "mallory", "password": "wrong-pass"}),
                json!({"error": "Invalid credentials"}),
                401,
            )],
        );
        scope.absorb_and_apply(&mut login_failure);
        assert_eq!(login_failure.failure[0].payload["username"], "alice");
        assert_eq!(login_failure.failure[0].payload["password"], "wrong-pass");
    }

    #[test]
    fn test_login_success_seeds_credentials_without_register() {
        let mut scope = DependencyScope::new();
        let mut login = set(
            CanonicalOperation::LoginSuccess,
            vec![case(json!({"username": "solo", "password": "p"}), json!({}), 200)],
            vec![],
        );
        scope.absorb_and_apply(&mut login);

        let mut failure = set(
            CanonicalOperation::LoginFailure,
            vec![],
            vec![case(json!({"username": "other", "password": "bad"}), json!({}), 401)],
        );
        scope.absorb_and_apply(&mut failure);
        assert_eq!(failure.failure[0].payload["username"], "solo");
    }

    #[test]
    fn test_numeric_response_id_stringified() {
        let mut scope = DependencyScope::new();
        let mut create = set(
            CanonicalOperation::Create,
            vec![case(json!({"name": "x"}), json!({"id": 42}), 201)],
            vec![],
        );
        scope.absorb_and_apply(&mut create);
        assert_eq!(scope.resource_id(), Some("42"));
    }
}
