//! The permission model and its algebra.
//!
//! Grants and requirements share one representation: a [`Permission`] is a
//! `(table, mode, scope)` triple. The wire and store encoding is frozen as
//! `{"type": "READ"|"WRITE", "table": ..., "row_keys": null | [[..], ..]}`
//! where `null` (or an empty array) means every row of the table.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// The kind of access a statement performs or a grant allows.
///
/// There is no hierarchy between the two modes: `Write` does not imply
/// `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "READ"),
            AccessMode::Write => write!(f, "WRITE"),
        }
    }
}

/// One row identified by its primary-key column values.
///
/// Values are the unquoted SQL literal text of each PK column, in the
/// table's declared PK order. Ordering is componentwise lexicographic,
/// which is the canonical order for row sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(pub Vec<String>);

impl CompositeKey {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CompositeKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Which rows of a table a permission applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every row of the table. The top element: merging anything into
    /// `All` yields `All`.
    All,
    /// An explicit set of rows. Non-empty by construction; the ordered set
    /// keeps membership checks logarithmic and unions/differences linear.
    Rows(BTreeSet<CompositeKey>),
}

impl Scope {
    /// Whether this scope is at least as broad as `required` under the
    /// subset relation, with `All` as the top element.
    pub fn covers(&self, required: &Scope) -> bool {
        match (self, required) {
            (Scope::All, _) => true,
            (Scope::Rows(_), Scope::All) => false,
            (Scope::Rows(held), Scope::Rows(required)) => {
                required.iter().all(|key| held.contains(key))
            }
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all rows"),
            Scope::Rows(keys) => write!(f, "{} row(s)", keys.len()),
        }
    }
}

/// A grant held by a user, or a requirement derived from a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionRepr", into = "PermissionRepr")]
pub struct Permission {
    pub table: String,
    pub mode: AccessMode,
    pub scope: Scope,
}

impl Permission {
    /// A blanket permission over every row of `table`.
    pub fn all(table: impl Into<String>, mode: AccessMode) -> Self {
        Self {
            table: table.into(),
            mode,
            scope: Scope::All,
        }
    }

    /// A row-scoped permission. The keys are sorted and deduplicated; an
    /// empty key set normalizes to [`Scope::All`], matching the stored
    /// encoding where an absent row list means the whole table.
    pub fn rows(
        table: impl Into<String>,
        mode: AccessMode,
        keys: impl IntoIterator<Item = CompositeKey>,
    ) -> Self {
        let keys: BTreeSet<CompositeKey> = keys.into_iter().collect();
        let scope = if keys.is_empty() {
            Scope::All
        } else {
            Scope::Rows(keys)
        };
        Self {
            table: table.into(),
            mode,
            scope,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on `{}` for {}", self.mode, self.table, self.scope)
    }
}

/// Frozen JSON shape for stores and the wire.
#[derive(Serialize, Deserialize)]
struct PermissionRepr {
    #[serde(rename = "type")]
    mode: AccessMode,
    table: String,
    row_keys: Option<Vec<Vec<String>>>,
}

impl From<Permission> for PermissionRepr {
    fn from(permission: Permission) -> Self {
        let row_keys = match permission.scope {
            Scope::All => None,
            Scope::Rows(keys) => Some(keys.into_iter().map(|key| key.0).collect()),
        };
        Self {
            mode: permission.mode,
            table: permission.table,
            row_keys,
        }
    }
}

impl From<PermissionRepr> for Permission {
    fn from(repr: PermissionRepr) -> Self {
        match repr.row_keys {
            None => Permission::all(repr.table, repr.mode),
            Some(keys) => Permission::rows(
                repr.table,
                repr.mode,
                keys.into_iter().map(CompositeKey::new),
            ),
        }
    }
}

/// Errors from grant-set mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    /// Specific rows cannot be carved out of a blanket grant.
    #[error("cannot remove specific rows from a blanket {mode} grant on `{table}`")]
    RemoveSpecificFromAll { table: String, mode: AccessMode },
}

/// A user's grants, keyed by table and mode.
///
/// The nested map makes the no-duplicate-`(table, mode)` invariant
/// unforgeable: an addition for an existing pair merges into the held
/// scope instead of coexisting with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    entries: BTreeMap<String, BTreeMap<AccessMode, Scope>>,
}

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a stored permission list, merging duplicates.
    pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut set = Self::new();
        for permission in permissions {
            set.merge(permission);
        }
        set
    }

    /// Flatten back to a permission list, ordered by table then mode.
    pub fn permissions(&self) -> Vec<Permission> {
        self.entries
            .iter()
            .flat_map(|(table, modes)| {
                modes.iter().map(move |(mode, scope)| Permission {
                    table: table.clone(),
                    mode: *mode,
                    scope: scope.clone(),
                })
            })
            .collect()
    }

    /// The scope held for `(table, mode)`, if any.
    pub fn scope(&self, table: &str, mode: AccessMode) -> Option<&Scope> {
        self.entries.get(table)?.get(&mode)
    }

    /// Add a permission, merging with any existing `(table, mode)` entry.
    /// `All` absorbs row scopes; two row scopes union.
    pub fn merge(&mut self, addition: Permission) {
        let modes = self.entries.entry(addition.table).or_default();
        match modes.entry(addition.mode) {
            Entry::Vacant(slot) => {
                slot.insert(addition.scope);
            }
            Entry::Occupied(mut slot) => {
                let merged = match (slot.get(), addition.scope) {
                    (Scope::All, _) | (_, Scope::All) => Scope::All,
                    (Scope::Rows(held), Scope::Rows(incoming)) => {
                        let mut union = held.clone();
                        union.extend(incoming);
                        Scope::Rows(union)
                    }
                };
                slot.insert(merged);
            }
        }
    }

    /// Subtract a permission from the matching `(table, mode)` entry.
    ///
    /// Removing `All` from `All` deletes the entry; removing `All` from a
    /// row scope is a no-op; removing rows from rows takes the set
    /// difference and deletes the entry when it empties. Removing rows
    /// from `All` fails. A removal with no matching entry is a no-op.
    pub fn remove(&mut self, removal: &Permission) -> Result<(), GrantError> {
        let Some(modes) = self.entries.get_mut(&removal.table) else {
            return Ok(());
        };
        let Some(held) = modes.get_mut(&removal.mode) else {
            return Ok(());
        };
        let delete = match (&mut *held, &removal.scope) {
            (Scope::All, Scope::All) => true,
            (Scope::Rows(_), Scope::All) => false,
            (Scope::All, Scope::Rows(_)) => {
                return Err(GrantError::RemoveSpecificFromAll {
                    table: removal.table.clone(),
                    mode: removal.mode,
                });
            }
            (Scope::Rows(held_keys), Scope::Rows(to_remove)) => {
                for key in to_remove {
                    held_keys.remove(key);
                }
                held_keys.is_empty()
            }
        };
        if delete {
            modes.remove(&removal.mode);
            if modes.is_empty() {
                self.entries.remove(&removal.table);
            }
        }
        Ok(())
    }

    /// Whether this grant set satisfies a requirement: the matching
    /// `(table, mode)` entry must exist and its scope must cover the
    /// required scope.
    pub fn satisfies(&self, requirement: &Permission) -> bool {
        match self.scope(&requirement.table, requirement.mode) {
            None => false,
            Some(held) => held.covers(&requirement.scope),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct `(table, mode)` entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> CompositeKey {
        parts.iter().copied().collect()
    }

    #[test]
    fn rows_constructor_sorts_and_dedups() {
        let permission = Permission::rows(
            "t1",
            AccessMode::Read,
            vec![key(&["10"]), key(&["5"]), key(&["10"])],
        );
        match &permission.scope {
            Scope::Rows(keys) => {
                let keys: Vec<_> = keys.iter().cloned().collect();
                assert_eq!(keys, vec![key(&["10"]), key(&["5"])]);
            }
            Scope::All => panic!("expected row scope"),
        }
    }

    #[test]
    fn rows_constructor_normalizes_empty_to_all() {
        let permission = Permission::rows("t1", AccessMode::Read, vec![]);
        assert_eq!(permission.scope, Scope::All);
    }

    #[test]
    fn merge_keeps_one_entry_per_table_and_mode() {
        let mut grants = GrantSet::new();
        grants.merge(Permission::rows("t1", AccessMode::Read, vec![key(&["5"])]));
        grants.merge(Permission::rows("t1", AccessMode::Read, vec![key(&["7"])]));
        grants.merge(Permission::rows("t1", AccessMode::Write, vec![key(&["5"])]));
        assert_eq!(grants.len(), 2);
        assert_eq!(
            grants.scope("t1", AccessMode::Read),
            Some(&Scope::Rows([key(&["5"]), key(&["7"])].into_iter().collect()))
        );
    }

    #[test]
    fn merge_all_absorbs_rows() {
        let mut grants = GrantSet::new();
        grants.merge(Permission::all("t1", AccessMode::Read));
        grants.merge(Permission::rows("t1", AccessMode::Read, vec![key(&["5"])]));
        assert_eq!(grants.scope("t1", AccessMode::Read), Some(&Scope::All));

        let mut grants = GrantSet::new();
        grants.merge(Permission::rows("t1", AccessMode::Read, vec![key(&["5"])]));
        grants.merge(Permission::all("t1", AccessMode::Read));
        assert_eq!(grants.scope("t1", AccessMode::Read), Some(&Scope::All));
    }

    #[test]
    fn merge_is_idempotent() {
        let addition = Permission::rows("t1", AccessMode::Read, vec![key(&["5"]), key(&["10"])]);
        let mut once = GrantSet::new();
        once.merge(addition.clone());
        let mut twice = once.clone();
        twice.merge(addition);
        assert_eq!(once, twice);
    }

    #[test]
    fn remove_inverts_add_on_disjoint_rows() {
        let mut grants = GrantSet::from_permissions(vec![Permission::rows(
            "t1",
            AccessMode::Read,
            vec![key(&["5"])],
        )]);
        let before = grants.clone();
        grants.merge(Permission::rows("t1", AccessMode::Read, vec![key(&["7"])]));
        grants
            .remove(&Permission::rows("t1", AccessMode::Read, vec![key(&["7"])]))
            .unwrap();
        assert_eq!(grants, before);
    }

    #[test]
    fn remove_deletes_entry_when_rows_empty() {
        let mut grants = GrantSet::from_permissions(vec![Permission::rows(
            "t1",
            AccessMode::Read,
            vec![key(&["5"])],
        )]);
        grants
            .remove(&Permission::rows("t1", AccessMode::Read, vec![key(&["5"])]))
            .unwrap();
        assert!(grants.is_empty());
    }

    #[test]
    fn remove_all_from_all_deletes_entry() {
        let mut grants = GrantSet::from_permissions(vec![Permission::all("t1", AccessMode::Write)]);
        grants
            .remove(&Permission::all("t1", AccessMode::Write))
            .unwrap();
        assert!(grants.is_empty());
    }

    #[test]
    fn remove_all_from_rows_is_a_noop() {
        let mut grants = GrantSet::from_permissions(vec![Permission::rows(
            "t1",
            AccessMode::Read,
            vec![key(&["5"])],
        )]);
        let before = grants.clone();
        grants
            .remove(&Permission::all("t1", AccessMode::Read))
            .unwrap();
        assert_eq!(grants, before);
    }

    #[test]
    fn remove_rows_from_all_fails() {
        let mut grants = GrantSet::from_permissions(vec![Permission::all("t1", AccessMode::Read)]);
        let err = grants
            .remove(&Permission::rows("t1", AccessMode::Read, vec![key(&["5"])]))
            .unwrap_err();
        assert_eq!(
            err,
            GrantError::RemoveSpecificFromAll {
                table: "t1".to_string(),
                mode: AccessMode::Read,
            }
        );
        assert_eq!(grants.scope("t1", AccessMode::Read), Some(&Scope::All));
    }

    #[test]
    fn satisfies_requires_matching_mode() {
        let grants =
            GrantSet::from_permissions(vec![Permission::all("t1", AccessMode::Read)]);
        assert!(grants.satisfies(&Permission::all("t1", AccessMode::Read)));
        assert!(!grants.satisfies(&Permission::all("t1", AccessMode::Write)));
        assert!(!grants.satisfies(&Permission::all("t2", AccessMode::Read)));
    }

    #[test]
    fn satisfies_checks_row_subset() {
        let grants = GrantSet::from_permissions(vec![Permission::rows(
            "t2",
            AccessMode::Write,
            vec![key(&["5", "10"]), key(&["6", "11"])],
        )]);
        assert!(grants.satisfies(&Permission::rows(
            "t2",
            AccessMode::Write,
            vec![key(&["5", "10"])],
        )));
        assert!(grants.satisfies(&Permission::rows(
            "t2",
            AccessMode::Write,
            vec![key(&["5", "10"]), key(&["6", "11"])],
        )));
        assert!(!grants.satisfies(&Permission::rows(
            "t2",
            AccessMode::Write,
            vec![key(&["7", "12"])],
        )));
        // A row grant never satisfies a blanket requirement.
        assert!(!grants.satisfies(&Permission::all("t2", AccessMode::Write)));
    }

    #[test]
    fn satisfies_is_monotone_under_merge() {
        let requirement = Permission::rows("t1", AccessMode::Read, vec![key(&["5"])]);
        let mut grants = GrantSet::from_permissions(vec![Permission::rows(
            "t1",
            AccessMode::Read,
            vec![key(&["5"])],
        )]);
        assert!(grants.satisfies(&requirement));
        grants.merge(Permission::rows("t1", AccessMode::Read, vec![key(&["9"])]));
        assert!(grants.satisfies(&requirement));
        grants.merge(Permission::all("t2", AccessMode::Write));
        assert!(grants.satisfies(&requirement));
    }

    #[test]
    fn serializes_to_frozen_wire_shape() {
        let blanket = Permission::all("t1", AccessMode::Read);
        assert_eq!(
            serde_json::to_value(&blanket).unwrap(),
            serde_json::json!({"type": "READ", "table": "t1", "row_keys": null})
        );

        let scoped = Permission::rows(
            "t2",
            AccessMode::Write,
            vec![key(&["6", "11"]), key(&["5", "10"])],
        );
        assert_eq!(
            serde_json::to_value(&scoped).unwrap(),
            serde_json::json!({
                "type": "WRITE",
                "table": "t2",
                "row_keys": [["5", "10"], ["6", "11"]],
            })
        );
    }

    #[test]
    fn deserializes_null_and_empty_row_keys_as_all() {
        let from_null: Permission =
            serde_json::from_str(r#"{"type": "READ", "table": "t1", "row_keys": null}"#).unwrap();
        assert_eq!(from_null.scope, Scope::All);

        let from_empty: Permission =
            serde_json::from_str(r#"{"type": "WRITE", "table": "t1", "row_keys": []}"#).unwrap();
        assert_eq!(from_empty.scope, Scope::All);
    }

    #[test]
    fn permission_round_trips_through_json() {
        let original = Permission::rows(
            "orders",
            AccessMode::Write,
            vec![key(&["5", "10"]), key(&["6", "11"])],
        );
        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: Permission = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, original);
    }
}
