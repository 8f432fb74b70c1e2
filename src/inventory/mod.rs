//! Inventory Data Model
//!
//! A point-in-time capture of a database: users -> tables -> fields,
//! privileges and indexes. Inventories are plain documents; once loaded
//! they are never mutated by the change engine.
//!
//! Names are unique within each level (one user name per inventory, one
//! table name per user, one field or index name per table). The maps
//! below enforce that on load; callers building an inventory by hand get
//! the same guarantee from `BTreeMap`.

pub mod filter;

pub use filter::filter_names;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Full inventory: user name -> that user's tables
pub type Inventory = BTreeMap<String, UserTables>;

/// Tables owned by one user: table name -> table entry
pub type UserTables = BTreeMap<String, TableEntry>;

/// Components every table entry must carry
pub const TABLE_COMPONENTS: [&str; 3] = ["fields", "privileges", "indexes"];

/// Errors raised while turning a document into an [`Inventory`]
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Malformed snapshot: table {user}.{table} is missing `{component}`")]
    Malformed {
        user: String,
        table: String,
        component: &'static str,
    },

    #[error("Malformed snapshot: {0}")]
    Shape(String),

    #[error("Snapshot could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One table: its fields, privileges and indexes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub fields: BTreeMap<String, FieldAttrs>,
    pub privileges: BTreeSet<String>,
    pub indexes: BTreeMap<String, IndexAttrs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<i64>,
    /// Vendor attributes carried through untouched (e.g. spatial type, srid)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Field (column) descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAttrs {
    pub db_type: String,
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldAttrs {
    pub fn new(db_type: impl Into<String>, length: Option<i64>) -> Self {
        Self {
            db_type: db_type.into(),
            length,
            extra: Map::new(),
        }
    }
}

/// Index descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAttrs {
    /// Indexed field names, in catalog order
    pub fields: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexAttrs {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            extra: Map::new(),
        }
    }
}

/// Parse an inventory from a JSON document.
///
/// Structure is checked before typed decoding so that a table missing one
/// of its components is reported by name instead of as a generic decode
/// failure. The whole document is rejected on the first problem.
pub fn from_value(value: Value) -> Result<Inventory, SnapshotError> {
    validate_structure(&value)?;
    Ok(serde_json::from_value(value)?)
}

/// Parse an inventory from JSON text
pub fn from_str(json: &str) -> Result<Inventory, SnapshotError> {
    let value: Value = serde_json::from_str(json)?;
    from_value(value)
}

fn validate_structure(value: &Value) -> Result<(), SnapshotError> {
    let users = value
        .as_object()
        .ok_or_else(|| SnapshotError::Shape("inventory must be an object of users".to_string()))?;

    for (user, tables) in users {
        let tables = tables.as_object().ok_or_else(|| {
            SnapshotError::Shape(format!("user {} must map to an object of tables", user))
        })?;

        for (table, entry) in tables {
            let entry = entry.as_object().ok_or_else(|| {
                SnapshotError::Shape(format!("table {}.{} must be an object", user, table))
            })?;

            for component in TABLE_COMPONENTS {
                if !entry.contains_key(component) {
                    return Err(SnapshotError::Malformed {
                        user: user.clone(),
                        table: table.clone(),
                        component,
                    });
                }
            }
        }
    }

    Ok(())
}

/// SHA-256 of the canonical (sorted-key) JSON form
pub fn checksum(inventory: &Inventory) -> String {
    let mut hasher = Sha256::new();
    // Maps are ordered, so the serialized form is canonical.
    let bytes = serde_json::to_vec(inventory).unwrap_or_default();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// Number of tables across all users
pub fn table_count(inventory: &Inventory) -> usize {
    inventory.values().map(BTreeMap::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "GIS_311": {
                "CASES": {
                    "fields": {
                        "OBJECTID": {"db_type": "NUMBER", "length": 38, "nullable": false},
                        "NAME": {"db_type": "VARCHAR2", "length": null}
                    },
                    "privileges": ["GIS_READER:SELECT"],
                    "indexes": {
                        "CASES_PK": {"fields": ["OBJECTID"], "unique": true}
                    },
                    "row_count": 12,
                    "srid": 2272
                }
            }
        })
    }

    #[test]
    fn test_parse_keeps_extra_attributes() {
        let inventory = from_value(sample()).unwrap();
        let table = &inventory["GIS_311"]["CASES"];

        assert_eq!(table.row_count, Some(12));
        assert_eq!(table.extra.get("srid"), Some(&json!(2272)));

        let objectid = &table.fields["OBJECTID"];
        assert_eq!(objectid.db_type, "NUMBER");
        assert_eq!(objectid.length, Some(38));
        assert_eq!(objectid.extra.get("nullable"), Some(&json!(false)));

        assert_eq!(table.fields["NAME"].length, None);
        assert!(table.privileges.contains("GIS_READER:SELECT"));
        assert_eq!(table.indexes["CASES_PK"].fields, vec!["OBJECTID"]);
    }

    #[test]
    fn test_missing_component_is_rejected_by_name() {
        let mut doc = sample();
        doc["GIS_311"]["CASES"]
            .as_object_mut()
            .unwrap()
            .remove("privileges");

        match from_value(doc) {
            Err(SnapshotError::Malformed { user, table, component }) => {
                assert_eq!(user, "GIS_311");
                assert_eq!(table, "CASES");
                assert_eq!(component, "privileges");
            }
            other => panic!("expected malformed snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_user_is_rejected() {
        let result = from_value(json!({"GIS_311": ["CASES"]}));
        assert!(matches!(result, Err(SnapshotError::Shape(_))));
    }

    #[test]
    fn test_wrong_attribute_type_is_decode_error() {
        let mut doc = sample();
        doc["GIS_311"]["CASES"]["fields"]["NAME"]["length"] = json!("wide");
        assert!(matches!(from_value(doc), Err(SnapshotError::Decode(_))));
    }

    #[test]
    fn test_checksum_consistency() {
        let a = from_value(sample()).unwrap();
        let b = from_str(&serde_json::to_string(&a).unwrap()).unwrap();

        assert_eq!(checksum(&a), checksum(&b));
        assert_eq!(table_count(&a), 1);
    }
}
