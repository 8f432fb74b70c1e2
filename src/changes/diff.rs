//! Inventory Diff Engine
//!
//! Compares two inventories level by level (users, tables, then fields,
//! privileges and indexes) and emits one flat, ordered list of changes.
//!
//! The first inventory is always "old" and the second "new". A name only
//! in new is an addition, a name only in old is a removal, and a name in
//! both is compared. Attribute updates are reported as a removal of the
//! old attributes immediately followed by an addition of the new ones.
//!
//! Ordering: at every level, entries derived from the old side come first
//! (in old iteration order), then new-only entries (in new iteration
//! order). An added user or table is immediately followed by the additions
//! of everything it contains. Removals are not decomposed: a removed user
//! yields one `REMOVE_USER` and nothing for its tables.

use super::compare::{fields_equal, indexes_equal};
use super::record::{Change, ChangeData, ChangeType};
use crate::inventory::{FieldAttrs, IndexAttrs, Inventory, TableEntry, UserTables};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Where nested changes are attributed
#[derive(Debug, Clone, Copy)]
struct TableScope<'a> {
    user: &'a str,
    table: &'a str,
    timestamp: DateTime<Utc>,
}

impl TableScope<'_> {
    fn change(&self, change_type: ChangeType) -> Change {
        Change::table(change_type, self.user, self.table, self.timestamp)
    }
}

/// The diff engine that compares inventories
pub struct DiffEngine;

impl DiffEngine {
    /// Compare two inventories and return every change, in traversal order
    pub fn diff(old: &Inventory, new: &Inventory, timestamp: DateTime<Utc>) -> Vec<Change> {
        let mut changes = Vec::new();

        for (user, old_tables) in old {
            match new.get(user) {
                Some(new_tables) => {
                    Self::diff_user(Some(old_tables), new_tables, user, timestamp, &mut changes)
                }
                None => changes.push(Change::user(ChangeType::RemoveUser, user, timestamp)),
            }
        }

        for (user, new_tables) in new {
            if !old.contains_key(user) {
                changes.push(Change::user(ChangeType::AddUser, user, timestamp));
                Self::diff_user(None, new_tables, user, timestamp, &mut changes);
            }
        }

        changes
    }

    /// Compare one user's tables. `old` is `None` for a new user.
    pub fn diff_user(
        old: Option<&UserTables>,
        new: &UserTables,
        user: &str,
        timestamp: DateTime<Utc>,
        changes: &mut Vec<Change>,
    ) {
        if let Some(old_tables) = old {
            for (table, old_entry) in old_tables {
                match new.get(table) {
                    Some(new_entry) => {
                        Self::diff_table(Some(old_entry), new_entry, user, table, timestamp, changes)
                    }
                    None => {
                        changes.push(Change::table(ChangeType::RemoveTable, user, table, timestamp))
                    }
                }
            }
        }

        for (table, new_entry) in new {
            let is_new = old.map_or(true, |old_tables| !old_tables.contains_key(table));
            if is_new {
                changes.push(Change::table(ChangeType::AddTable, user, table, timestamp));
                Self::diff_table(None, new_entry, user, table, timestamp, changes);
            }
        }
    }

    /// Compare one table: fields, then privileges, then indexes.
    /// `old` is `None` for a new table. Emits no table-level record itself.
    pub fn diff_table(
        old: Option<&TableEntry>,
        new: &TableEntry,
        user: &str,
        table: &str,
        timestamp: DateTime<Utc>,
        changes: &mut Vec<Change>,
    ) {
        let scope = TableScope { user, table, timestamp };

        Self::diff_fields(old.map(|t| &t.fields), &new.fields, scope, changes);
        Self::diff_privileges(old.map(|t| &t.privileges), &new.privileges, scope, changes);
        Self::diff_indexes(old.map(|t| &t.indexes), &new.indexes, scope, changes);
    }

    fn diff_fields(
        old: Option<&BTreeMap<String, FieldAttrs>>,
        new: &BTreeMap<String, FieldAttrs>,
        scope: TableScope<'_>,
        changes: &mut Vec<Change>,
    ) {
        if let Some(old_fields) = old {
            for (name, old_attrs) in old_fields {
                match new.get(name) {
                    None => changes.push(scope.change(ChangeType::RemoveField).with_field(name)),
                    Some(new_attrs) if !fields_equal(old_attrs, new_attrs) => {
                        changes.push(
                            scope
                                .change(ChangeType::RemoveField)
                                .with_field(name)
                                .with_data(ChangeData::Field(old_attrs.clone())),
                        );
                        changes.push(
                            scope
                                .change(ChangeType::AddField)
                                .with_field(name)
                                .with_data(ChangeData::Field(new_attrs.clone())),
                        );
                    }
                    Some(_) => {}
                }
            }
        }

        for (name, new_attrs) in new {
            if old.map_or(true, |old_fields| !old_fields.contains_key(name)) {
                changes.push(
                    scope
                        .change(ChangeType::AddField)
                        .with_field(name)
                        .with_data(ChangeData::Field(new_attrs.clone())),
                );
            }
        }
    }

    fn diff_privileges(
        old: Option<&BTreeSet<String>>,
        new: &BTreeSet<String>,
        scope: TableScope<'_>,
        changes: &mut Vec<Change>,
    ) {
        if let Some(old_privileges) = old {
            for privilege in old_privileges.difference(new) {
                changes.push(
                    scope
                        .change(ChangeType::RemovePrivilege)
                        .with_data(ChangeData::Privilege(privilege.clone())),
                );
            }
        }

        for privilege in new {
            if old.map_or(true, |old_privileges| !old_privileges.contains(privilege)) {
                changes.push(
                    scope
                        .change(ChangeType::AddPrivilege)
                        .with_data(ChangeData::Privilege(privilege.clone())),
                );
            }
        }
    }

    fn diff_indexes(
        old: Option<&BTreeMap<String, IndexAttrs>>,
        new: &BTreeMap<String, IndexAttrs>,
        scope: TableScope<'_>,
        changes: &mut Vec<Change>,
    ) {
        if let Some(old_indexes) = old {
            // Each old index is checked against its own counterpart by name.
            for (name, old_attrs) in old_indexes {
                match new.get(name) {
                    None => changes.push(
                        scope
                            .change(ChangeType::RemoveIndex)
                            .with_index(name)
                            .with_data(ChangeData::Index(old_attrs.clone())),
                    ),
                    Some(new_attrs) if !indexes_equal(old_attrs, new_attrs) => {
                        changes.push(
                            scope
                                .change(ChangeType::RemoveIndex)
                                .with_index(name)
                                .with_data(ChangeData::Index(old_attrs.clone())),
                        );
                        changes.push(
                            scope
                                .change(ChangeType::AddIndex)
                                .with_index(name)
                                .with_data(ChangeData::Index(new_attrs.clone())),
                        );
                    }
                    Some(_) => {}
                }
            }
        }

        for (name, new_attrs) in new {
            if old.map_or(true, |old_indexes| !old_indexes.contains_key(name)) {
                changes.push(
                    scope
                        .change(ChangeType::AddIndex)
                        .with_index(name)
                        .with_data(ChangeData::Index(new_attrs.clone())),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn ts() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }

    fn table(
        fields: &[(&str, &str, Option<i64>)],
        privileges: &[&str],
        indexes: &[(&str, &str)],
    ) -> TableEntry {
        TableEntry {
            fields: fields
                .iter()
                .map(|(name, db_type, length)| (name.to_string(), FieldAttrs::new(*db_type, *length)))
                .collect(),
            privileges: privileges.iter().map(|p| p.to_string()).collect(),
            indexes: indexes
                .iter()
                .map(|(name, cols)| (name.to_string(), IndexAttrs::new(cols.split(','))))
                .collect(),
            ..Default::default()
        }
    }

    fn inventory(users: Vec<(&str, Vec<(&str, TableEntry)>)>) -> Inventory {
        users
            .into_iter()
            .map(|(user, tables)| {
                let tables = tables
                    .into_iter()
                    .map(|(name, entry)| (name.to_string(), entry))
                    .collect();
                (user.to_string(), tables)
            })
            .collect()
    }

    /// (type, user, table, field-or-index) for compact assertions
    fn keys(changes: &[Change]) -> Vec<(ChangeType, String, Option<String>, Option<String>)> {
        changes
            .iter()
            .map(|c| {
                (
                    c.change_type,
                    c.user.clone(),
                    c.table.clone(),
                    c.field.clone().or_else(|| c.index.clone()),
                )
            })
            .collect()
    }

    fn key(
        change_type: ChangeType,
        user: &str,
        table: Option<&str>,
        name: Option<&str>,
    ) -> (ChangeType, String, Option<String>, Option<String>) {
        (
            change_type,
            user.to_string(),
            table.map(str::to_string),
            name.map(str::to_string),
        )
    }

    fn parcels() -> TableEntry {
        table(
            &[("OBJECTID", "NUMBER", Some(38)), ("ADDRESS", "VARCHAR", Some(10))],
            &["GIS_READER:SELECT", "GIS_EDITOR:UPDATE"],
            &[("PARCELS_PK", "OBJECTID"), ("PARCELS_ADDR", "ADDRESS,OBJECTID")],
        )
    }

    #[test]
    fn test_identical_inventories_produce_no_changes() {
        let a = inventory(vec![
            ("GIS_311", vec![("CASES", parcels()), ("PARCELS", parcels())]),
            ("GIS_STREETS", vec![("CENTERLINE", parcels())]),
        ]);

        assert!(DiffEngine::diff(&a, &a, ts()).is_empty());
        assert!(DiffEngine::diff(&Inventory::new(), &Inventory::new(), ts()).is_empty());
    }

    #[test]
    fn test_new_user_is_fully_decomposed() {
        let old = Inventory::new();
        let new = inventory(vec![(
            "U",
            vec![(
                "T",
                table(
                    &[("F1", "NUMBER", Some(10)), ("F2", "VARCHAR", Some(20))],
                    &["P"],
                    &[("I", "F1")],
                ),
            )],
        )]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            keys(&changes),
            vec![
                key(ChangeType::AddUser, "U", None, None),
                key(ChangeType::AddTable, "U", Some("T"), None),
                key(ChangeType::AddField, "U", Some("T"), Some("F1")),
                key(ChangeType::AddField, "U", Some("T"), Some("F2")),
                key(ChangeType::AddPrivilege, "U", Some("T"), None),
                key(ChangeType::AddIndex, "U", Some("T"), Some("I")),
            ]
        );
        assert_eq!(changes[4].data, Some(ChangeData::Privilege("P".to_string())));
        assert!(changes.iter().all(|c| c.timestamp == ts()));
    }

    #[test]
    fn test_field_update_is_remove_then_add() {
        let old = inventory(vec![("U", vec![("T", table(&[("F", "VARCHAR", Some(10))], &[], &[]))])]);
        let new = inventory(vec![("U", vec![("T", table(&[("F", "VARCHAR", Some(20))], &[], &[]))])]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            changes,
            vec![
                Change::table(ChangeType::RemoveField, "U", "T", ts())
                    .with_field("F")
                    .with_data(ChangeData::Field(FieldAttrs::new("VARCHAR", Some(10)))),
                Change::table(ChangeType::AddField, "U", "T", ts())
                    .with_field("F")
                    .with_data(ChangeData::Field(FieldAttrs::new("VARCHAR", Some(20)))),
            ]
        );
    }

    #[test]
    fn test_removed_field_has_no_payload() {
        let old = inventory(vec![(
            "U",
            vec![("T", table(&[("A", "NUMBER", None), ("B", "NUMBER", None)], &[], &[]))],
        )]);
        let new = inventory(vec![("U", vec![("T", table(&[("A", "NUMBER", None)], &[], &[]))])]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::RemoveField);
        assert_eq!(changes[0].field.as_deref(), Some("B"));
        assert_eq!(changes[0].data, None);
    }

    #[test]
    fn test_old_derived_changes_precede_new_only_additions() {
        // B is updated, C removed, A and D added.
        let old = inventory(vec![(
            "U",
            vec![("T", table(&[("B", "NUMBER", Some(1)), ("C", "NUMBER", Some(1))], &[], &[]))],
        )]);
        let new = inventory(vec![(
            "U",
            vec![(
                "T",
                table(
                    &[("A", "NUMBER", Some(1)), ("B", "NUMBER", Some(2)), ("D", "NUMBER", Some(1))],
                    &[],
                    &[],
                ),
            )],
        )]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            keys(&changes),
            vec![
                key(ChangeType::RemoveField, "U", Some("T"), Some("B")),
                key(ChangeType::AddField, "U", Some("T"), Some("B")),
                key(ChangeType::RemoveField, "U", Some("T"), Some("C")),
                key(ChangeType::AddField, "U", Some("T"), Some("A")),
                key(ChangeType::AddField, "U", Some("T"), Some("D")),
            ]
        );
    }

    #[test]
    fn test_new_user_follows_changes_to_existing_users() {
        // A sorts before B but only exists in new.
        let old = inventory(vec![("B", vec![("T", table(&[("X", "DATE", None)], &[], &[]))])]);
        let new = inventory(vec![
            ("A", vec![("T", table(&[("X", "DATE", None)], &[], &[]))]),
            ("B", vec![("T", table(&[("Y", "DATE", None)], &[], &[]))]),
        ]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            keys(&changes),
            vec![
                key(ChangeType::RemoveField, "B", Some("T"), Some("X")),
                key(ChangeType::AddField, "B", Some("T"), Some("Y")),
                key(ChangeType::AddUser, "A", None, None),
                key(ChangeType::AddTable, "A", Some("T"), None),
                key(ChangeType::AddField, "A", Some("T"), Some("X")),
            ]
        );
    }

    #[test]
    fn test_index_equality_ignores_field_order() {
        let old = inventory(vec![("U", vec![("T", table(&[], &[], &[("I", "A,B")]))])]);
        let new = inventory(vec![("U", vec![("T", table(&[], &[], &[("I", "B,A")]))])]);

        assert!(DiffEngine::diff(&old, &new, ts()).is_empty());
    }

    #[test]
    fn test_each_index_is_compared_independently() {
        // Only the first index changes; the last one is untouched.
        let old = inventory(vec![(
            "U",
            vec![("T", table(&[], &[], &[("I1", "A"), ("I2", "B"), ("I3", "C")]))],
        )]);
        let new = inventory(vec![(
            "U",
            vec![("T", table(&[], &[], &[("I1", "A,X"), ("I2", "B"), ("I3", "C")]))],
        )]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            keys(&changes),
            vec![
                key(ChangeType::RemoveIndex, "U", Some("T"), Some("I1")),
                key(ChangeType::AddIndex, "U", Some("T"), Some("I1")),
            ]
        );
        assert_eq!(changes[0].data, Some(ChangeData::Index(IndexAttrs::new(["A"]))));
        assert_eq!(changes[1].data, Some(ChangeData::Index(IndexAttrs::new(["A", "X"]))));
    }

    #[test]
    fn test_removed_index_carries_old_attrs() {
        let old = inventory(vec![("U", vec![("T", table(&[], &[], &[("I", "A")]))])]);
        let new = inventory(vec![("U", vec![("T", table(&[], &[], &[]))])]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            changes,
            vec![Change::table(ChangeType::RemoveIndex, "U", "T", ts())
                .with_index("I")
                .with_data(ChangeData::Index(IndexAttrs::new(["A"])))]
        );
    }

    #[test]
    fn test_privileges_are_membership_only() {
        let old = inventory(vec![("U", vec![("T", table(&[], &["R:SELECT", "W:UPDATE"], &[]))])]);
        let new = inventory(vec![("U", vec![("T", table(&[], &["R:SELECT", "X:DELETE"], &[]))])]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change_type, ChangeType::RemovePrivilege);
        assert_eq!(changes[0].data, Some(ChangeData::Privilege("W:UPDATE".to_string())));
        assert_eq!(changes[1].change_type, ChangeType::AddPrivilege);
        assert_eq!(changes[1].data, Some(ChangeData::Privilege("X:DELETE".to_string())));
    }

    #[test]
    fn test_table_changes_ordered_fields_privileges_indexes() {
        let old = inventory(vec![("U", vec![("T", table(&[], &[], &[]))])]);
        let new = inventory(vec![(
            "U",
            vec![("T", table(&[("F", "NUMBER", None)], &["P"], &[("I", "F")]))],
        )]);

        let types: Vec<_> = DiffEngine::diff(&old, &new, ts())
            .into_iter()
            .map(|c| c.change_type)
            .collect();

        assert_eq!(
            types,
            vec![ChangeType::AddField, ChangeType::AddPrivilege, ChangeType::AddIndex]
        );
    }

    #[test]
    fn test_removed_user_is_not_decomposed() {
        let old = inventory(vec![
            ("GONE", vec![("T1", parcels()), ("T2", parcels())]),
            ("KEPT", vec![("T", parcels())]),
        ]);
        let new = inventory(vec![("KEPT", vec![("T", parcels())])]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(changes, vec![Change::user(ChangeType::RemoveUser, "GONE", ts())]);
    }

    #[test]
    fn test_removed_table_is_not_decomposed() {
        let old = inventory(vec![("U", vec![("OLD", parcels()), ("T", parcels())])]);
        let new = inventory(vec![("U", vec![("T", parcels())])]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            keys(&changes),
            vec![key(ChangeType::RemoveTable, "U", Some("OLD"), None)]
        );
    }

    #[test]
    fn test_added_table_follows_changes_to_existing_tables() {
        let mut changed = parcels();
        changed.privileges.insert("PUBLIC:SELECT".to_string());

        let old = inventory(vec![("U", vec![("B", parcels())])]);
        let new = inventory(vec![(
            "U",
            vec![("A", table(&[("X", "DATE", None)], &[], &[])), ("B", changed)],
        )]);

        let changes = DiffEngine::diff(&old, &new, ts());

        assert_eq!(
            keys(&changes),
            vec![
                key(ChangeType::AddPrivilege, "U", Some("B"), None),
                key(ChangeType::AddTable, "U", Some("A"), None),
                key(ChangeType::AddField, "U", Some("A"), Some("X")),
            ]
        );
    }

    #[test]
    fn test_swapping_inputs_inverts_change_types() {
        let old = inventory(vec![(
            "U",
            vec![(
                "T",
                table(
                    &[("A", "NUMBER", Some(1)), ("B", "VARCHAR", Some(10))],
                    &["R:SELECT"],
                    &[("I1", "A"), ("I2", "B")],
                ),
            )],
        )]);
        let new = inventory(vec![(
            "U",
            vec![(
                "T",
                table(
                    &[("B", "VARCHAR", Some(20)), ("C", "DATE", None)],
                    &["W:UPDATE"],
                    &[("I1", "A,C"), ("I3", "C")],
                ),
            )],
        )]);

        let forward: BTreeSet<_> = keys(&DiffEngine::diff(&old, &new, ts()))
            .into_iter()
            .map(|(t, u, tb, n)| (t.inverse(), u, tb, n))
            .collect();
        let backward: BTreeSet<_> = keys(&DiffEngine::diff(&new, &old, ts())).into_iter().collect();

        assert!(!forward.is_empty());
        assert_eq!(forward, backward);
    }
}
