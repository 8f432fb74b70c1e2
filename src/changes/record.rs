//! Change records
//!
//! The single output unit of the change engine. Every record is one
//! attributed fact: something was added or removed between two inventories.

use crate::inventory::{FieldAttrs, IndexAttrs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of change detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    AddUser,
    RemoveUser,
    AddTable,
    RemoveTable,
    AddField,
    RemoveField,
    AddPrivilege,
    RemovePrivilege,
    AddIndex,
    RemoveIndex,
}

impl ChangeType {
    /// Wire name, e.g. `ADD_FIELD`
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::AddUser => "ADD_USER",
            ChangeType::RemoveUser => "REMOVE_USER",
            ChangeType::AddTable => "ADD_TABLE",
            ChangeType::RemoveTable => "REMOVE_TABLE",
            ChangeType::AddField => "ADD_FIELD",
            ChangeType::RemoveField => "REMOVE_FIELD",
            ChangeType::AddPrivilege => "ADD_PRIVILEGE",
            ChangeType::RemovePrivilege => "REMOVE_PRIVILEGE",
            ChangeType::AddIndex => "ADD_INDEX",
            ChangeType::RemoveIndex => "REMOVE_INDEX",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
impl ChangeType {
    pub const ALL: [ChangeType; 10] = [
        ChangeType::AddUser,
        ChangeType::RemoveUser,
        ChangeType::AddTable,
        ChangeType::RemoveTable,
        ChangeType::AddField,
        ChangeType::RemoveField,
        ChangeType::AddPrivilege,
        ChangeType::RemovePrivilege,
        ChangeType::AddIndex,
        ChangeType::RemoveIndex,
    ];

    /// The change that undoes this one (ADD_* <-> REMOVE_*)
    pub fn inverse(self) -> Self {
        match self {
            ChangeType::AddUser => ChangeType::RemoveUser,
            ChangeType::RemoveUser => ChangeType::AddUser,
            ChangeType::AddTable => ChangeType::RemoveTable,
            ChangeType::RemoveTable => ChangeType::AddTable,
            ChangeType::AddField => ChangeType::RemoveField,
            ChangeType::RemoveField => ChangeType::AddField,
            ChangeType::AddPrivilege => ChangeType::RemovePrivilege,
            ChangeType::RemovePrivilege => ChangeType::AddPrivilege,
            ChangeType::AddIndex => ChangeType::RemoveIndex,
            ChangeType::RemoveIndex => ChangeType::AddIndex,
        }
    }

    pub fn is_addition(self) -> bool {
        matches!(
            self,
            ChangeType::AddUser
                | ChangeType::AddTable
                | ChangeType::AddField
                | ChangeType::AddPrivilege
                | ChangeType::AddIndex
        )
    }
}

/// Payload attached to field, privilege and index changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeData {
    Field(FieldAttrs),
    Index(IndexAttrs),
    Privilege(String),
}

/// A single detected change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// As-of time of the newer inventory, shared by every record of one diff
    pub timestamp: DateTime<Utc>,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChangeData>,
}

impl Change {
    pub fn user(change_type: ChangeType, user: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            change_type,
            timestamp,
            user: user.to_string(),
            table: None,
            field: None,
            index: None,
            data: None,
        }
    }

    pub fn table(change_type: ChangeType, user: &str, table: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            table: Some(table.to_string()),
            ..Self::user(change_type, user, timestamp)
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_index(mut self, index: &str) -> Self {
        self.index = Some(index.to_string());
        self
    }

    pub fn with_data(mut self, data: ChangeData) -> Self {
        self.data = Some(data);
        self
    }

    /// Short path of the changed object, e.g. `GIS_311.CASES.OBJECTID`
    pub fn object_path(&self) -> String {
        let mut path = self.user.clone();
        if let Some(table) = &self.table {
            path.push('.');
            path.push_str(table);
        }
        if let Some(name) = self.field.as_ref().or(self.index.as_ref()) {
            path.push('.');
            path.push_str(name);
        }
        path
    }
}

/// Counts per change type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub total_changes: usize,
    pub by_type: BTreeMap<ChangeType, usize>,
}

impl ChangeSummary {
    pub fn from_changes(changes: &[Change]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            summary.add(change.change_type);
        }
        summary
    }

    pub fn add(&mut self, change_type: ChangeType) {
        self.total_changes += 1;
        *self.by_type.entry(change_type).or_insert(0) += 1;
    }

    #[cfg(test)]
    pub fn count(&self, change_type: ChangeType) -> usize {
        self.by_type.get(&change_type).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_user_change_serializes_flat() {
        let change = Change::user(ChangeType::RemoveUser, "GIS_311", ts());
        let value = serde_json::to_value(&change).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "REMOVE_USER",
                "timestamp": "2024-03-01T12:00:00Z",
                "user": "GIS_311"
            })
        );
    }

    #[test]
    fn test_field_change_carries_attrs() {
        let change = Change::table(ChangeType::AddField, "GIS_311", "CASES", ts())
            .with_field("NAME")
            .with_data(ChangeData::Field(FieldAttrs::new("VARCHAR2", Some(20))));
        let value = serde_json::to_value(&change).unwrap();

        assert_eq!(value["type"], "ADD_FIELD");
        assert_eq!(value["table"], "CASES");
        assert_eq!(value["field"], "NAME");
        assert_eq!(value["data"], json!({"db_type": "VARCHAR2", "length": 20}));
        assert_eq!(change.object_path(), "GIS_311.CASES.NAME");
    }

    #[test]
    fn test_privilege_payload_is_plain_string() {
        let change = Change::table(ChangeType::RemovePrivilege, "GIS_311", "CASES", ts())
            .with_data(ChangeData::Privilege("GIS_READER:SELECT".to_string()));
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["data"], "GIS_READER:SELECT");
    }

    #[test]
    fn test_inverse_pairs() {
        for change_type in ChangeType::ALL {
            assert_eq!(change_type.inverse().inverse(), change_type);
            assert_ne!(change_type.is_addition(), change_type.inverse().is_addition());
        }
    }

    #[test]
    fn test_summary_counts() {
        let changes = vec![
            Change::user(ChangeType::AddUser, "A", ts()),
            Change::table(ChangeType::AddTable, "A", "T", ts()),
            Change::table(ChangeType::AddTable, "A", "U", ts()),
        ];
        let summary = ChangeSummary::from_changes(&changes);

        assert_eq!(summary.total_changes, 3);
        assert_eq!(summary.count(ChangeType::AddTable), 2);
        assert_eq!(summary.count(ChangeType::RemoveTable), 0);
    }
}
