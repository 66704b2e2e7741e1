//! Operation tags and canonical per-class orders.
//!
//! Raw tags are the free-form strings the extraction collaborator attaches to
//! endpoints. They are normalized into a closed enum at ingestion; the
//! ambiguous ones (`read`, `list`, `login`) are resolved contextually by the
//! sequencer into canonical operations.

use serde::{Deserialize, Serialize};

/// Operation tag as supplied by the extraction collaborator.
///
/// Unrecognized tags deserialize to [`RawOperation::Other`] so unknown
/// strings never propagate past ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RawOperation {
    Create,
    Read,
    Update,
    Delete,
    List,
    Register,
    Login,
    #[default]
    Other,
}

impl From<String> for RawOperation {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl RawOperation {
    /// Parse a raw tag, mapping anything unrecognized to `Other`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "create" => Self::Create,
            "read" => Self::Read,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "list" => Self::List,
            "register" => Self::Register,
            "login" => Self::Login,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Register => "register",
            Self::Login => "login",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for RawOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved, contextual operation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalOperation {
    Create,
    ReadAfterCreate,
    Update,
    ReadAfterUpdate,
    Delete,
    ReadAfterDelete,
    List,
    Register,
    LoginSuccess,
    LoginFailure,
    Other,
}

impl CanonicalOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::ReadAfterCreate => "read_after_create",
            Self::Update => "update",
            Self::ReadAfterUpdate => "read_after_update",
            Self::Delete => "delete",
            Self::ReadAfterDelete => "read_after_delete",
            Self::List => "list",
            Self::Register => "register",
            Self::LoginSuccess => "login_success",
            Self::LoginFailure => "login_failure",
            Self::Other => "other",
        }
    }

    /// Operations whose payload must be a non-empty mapping to be valid.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Register | Self::LoginSuccess | Self::LoginFailure
        )
    }

    /// Single-resource operations whose success payload carries the
    /// propagated resource identifier.
    pub fn targets_resource(&self) -> bool {
        matches!(
            self,
            Self::ReadAfterCreate
                | Self::ReadAfterUpdate
                | Self::ReadAfterDelete
                | Self::Update
                | Self::Delete
        )
    }
}

impl std::fmt::Display for CanonicalOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical order for non-auth (CRUD) collections.
pub const CRUD_ORDER: &[CanonicalOperation] = &[
    CanonicalOperation::Create,
    CanonicalOperation::ReadAfterCreate,
    CanonicalOperation::Update,
    CanonicalOperation::ReadAfterUpdate,
    CanonicalOperation::Delete,
    CanonicalOperation::ReadAfterDelete,
    CanonicalOperation::List,
    CanonicalOperation::Other,
];

/// Canonical order for auth collections.
pub const AUTH_ORDER: &[CanonicalOperation] = &[
    CanonicalOperation::Register,
    CanonicalOperation::LoginSuccess,
    CanonicalOperation::LoginFailure,
    CanonicalOperation::List,
    CanonicalOperation::Other,
];

/// Collection class: determines the applicable canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionClass {
    Crud,
    Auth,
}

impl CollectionClass {
    /// Classify a collection by name. Login/Register/Auth (case-insensitive)
    /// are auth collections; everything else is CRUD.
    pub fn of(collection: &str) -> Self {
        match collection.trim().to_ascii_lowercase().as_str() {
            "login" | "register" | "auth" => Self::Auth,
            _ => Self::Crud,
        }
    }

    /// The canonical operation order for this class.
    pub fn canonical_order(&self) -> &'static [CanonicalOperation] {
        match self {
            Self::Crud => CRUD_ORDER,
            Self::Auth => AUTH_ORDER,
        }
    }

    /// Whether the operation is a member of this class's canonical order.
    pub fn contains(&self, operation: CanonicalOperation) -> bool {
        self.canonical_order().contains(&operation)
    }

    /// Position of the operation in the canonical order. Operations outside
    /// the order rank with `other`, which is always last.
    pub fn rank(&self, operation: CanonicalOperation) -> usize {
        let order = self.canonical_order();
        order
            .iter()
            .position(|op| *op == operation)
            .unwrap_or(order.len() - 1)
    }
}
