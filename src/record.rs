// ABOUTME: Record model shared by source and target stores
// ABOUTME: Identifier and timestamps are system-assigned; all other fields are opaque payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque payload fields of a record, keyed by field name.
pub type Fields = Map<String, Value>;

/// Keys owned by the store. Payload fields with these names are dropped.
pub const RESERVED_FIELDS: [&str; 3] = ["_id", "createdAt", "updatedAt"];

/// Remove any reserved keys from a payload, returning what was dropped.
pub fn strip_reserved(fields: &mut Fields) -> Vec<String> {
    RESERVED_FIELDS
        .iter()
        .filter(|key| fields.remove(**key).is_some())
        .map(|key| key.to_string())
        .collect()
}

/// System-assigned unique identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A replicated record.
///
/// `updated_at` is refreshed by the owning store on every mutation and is the
/// only value the change poller compares. `fields` are never interpreted by
/// the synchronizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Look up a payload field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// True when the source copy carries a different timestamp than this one.
    pub fn is_stale_against(&self, fresh: &Record) -> bool {
        self.updated_at != fresh.updated_at
    }
}

/// Selection predicate for store queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record.
    All,
    /// The record with this identifier.
    Id(RecordId),
    /// Records whose payload field equals the given value.
    FieldEq { name: String, value: Value },
}

impl Filter {
    pub fn id(id: &RecordId) -> Self {
        Filter::Id(id.clone())
    }

    pub fn field(name: &str, value: impl Into<Value>) -> Self {
        Filter::FieldEq {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => &record.id == id,
            Filter::FieldEq { name, value } => record.field(name) == Some(value),
        }
    }
}

/// Skip/limit pagination for `find`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: usize,
    /// `None` returns everything after `skip`.
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn page(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }
}
