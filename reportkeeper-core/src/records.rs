//! records.rs - The record model and the remote record-store contract.
//!
//! The `RecordStore` trait decouples the service-processing pipeline from the
//! concrete feature-service client, allowing the pipeline to be exercised
//! against in-memory fakes. This module defines the contract that all such
//! stores must adhere to, along with the record and edit-outcome shapes that
//! cross it.
//!
//! License: MIT OR Apache-2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute map of a single record. Values are opaque JSON.
pub type Attributes = serde_json::Map<String, Value>;

/// A single record returned by a record store: an attribute map plus an
/// optional geometry that is passed through untouched (all spatial semantics
/// are delegated to the remote service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Record {
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

impl Record {
    /// The record's object id, if the attribute map carries one under any
    /// capitalization of `objectid`.
    pub fn object_id(&self) -> Option<i64> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("objectid"))
            .and_then(|(_, value)| value.as_i64())
    }

    /// A string attribute value, if present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.attributes.insert(field.to_string(), value);
    }

    /// Label used in per-record log messages.
    pub fn label(&self) -> String {
        match self.object_id() {
            Some(id) => id.to_string(),
            None => "<no objectid>".to_string(),
        }
    }
}

/// Per-record outcome of a batched edit submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOutcome {
    #[serde(rename = "objectId", default)]
    pub object_id: i64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A trait that defines the contract with a remote record store.
///
/// Implementations own pagination, authentication, and retry; callers see
/// complete result sets and per-record outcomes. Query filter expressions are
/// opaque SQL-like strings evaluated by the store.
pub trait RecordStore {
    /// Returns every record matching the filter expression. Implementations
    /// must page through the full result set.
    fn query(&self, where_clause: &str) -> Result<Vec<Record>>;

    /// Returns every record matching the filter expression that intersects
    /// the given geometry. Intersection semantics belong to the store.
    fn query_intersecting(&self, geometry: &Value, where_clause: &str) -> Result<Vec<Record>>;

    /// Submits updated records as one batch and returns one outcome per
    /// record, in submission order where the store provides it.
    fn apply_edits(&self, updates: &[Record]) -> Result<Vec<EditOutcome>>;

    /// Names of date-typed fields, used to render attribute values for
    /// human-readable output.
    fn date_fields(&self) -> Vec<String>;

    /// The store's address, for log messages.
    fn url(&self) -> &str;
}

/// Opens record stores by URL. The CLI implements this on top of an
/// authenticated portal connection; tests implement it over fixtures.
pub trait StoreOpener {
    fn open(&self, url: &str) -> Result<Box<dyn RecordStore>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_id_lookup_is_case_insensitive() {
        let record: Record = serde_json::from_value(json!({
            "attributes": {"OBJECTID": 12, "status": "SUBMITTED"}
        }))
        .unwrap();
        assert_eq!(record.object_id(), Some(12));
        assert_eq!(record.get_str("status"), Some("SUBMITTED"));
    }

    #[test]
    fn edit_outcome_parses_service_shape() {
        let outcome: EditOutcome = serde_json::from_value(json!({
            "objectId": 3,
            "success": false,
            "error_code": 1000,
            "error_message": "Value out of range"
        }))
        .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.object_id, 3);
        assert_eq!(outcome.error_code, Some(1000));
    }
}
