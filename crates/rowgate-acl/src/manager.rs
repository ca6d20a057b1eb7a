//! The permission manager.
//!
//! State discipline: the projection (grants, admin keys, key-to-user) is
//! one logical unit behind a single `RwLock`. Readers take the shared
//! lock and never observe a partially-applied mutation. Writers take the
//! exclusive lock and hold it across the store write, so a mutation is
//! persistent before it becomes visible and the in-memory state stays at
//! the prior value on any store failure.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use rowgate_analyzer::RequirementAnalyzer;
use rowgate_core::{GrantSet, GrantStore, Permission, PkSchema};

use crate::error::AclError;

/// In-memory projection of the grant store, authoritative for reads.
struct Projection {
    grants: HashMap<String, GrantSet>,
    admin_keys: HashSet<String>,
    key_to_user: HashMap<String, String>,
}

/// Checks SQL batches against user grants and mutates grants through
/// admin-scoped operations.
pub struct AclManager {
    store: Arc<dyn GrantStore>,
    analyzer: RequirementAnalyzer,
    pk_schema: PkSchema,
    state: RwLock<Projection>,
}

impl AclManager {
    /// Build a manager by bulk-loading the grant store.
    ///
    /// Keys and admin flags are materialized here and not mutated
    /// afterwards; grants are refreshed through the mutation operations.
    pub async fn new(store: Arc<dyn GrantStore>, pk_schema: PkSchema) -> Result<Self, AclError> {
        let snapshot = store.load_all().await?;
        info!(
            users = snapshot.grants.len(),
            keys = snapshot.key_to_user.len(),
            admin_keys = snapshot.admin_keys.len(),
            "loaded grant projection"
        );
        let grants = snapshot
            .grants
            .into_iter()
            .map(|(user, permissions)| (user, GrantSet::from_permissions(permissions)))
            .collect();
        Ok(Self {
            store,
            analyzer: RequirementAnalyzer::new(),
            pk_schema,
            state: RwLock::new(Projection {
                grants,
                admin_keys: snapshot.admin_keys,
                key_to_user: snapshot.key_to_user,
            }),
        })
    }

    /// Check whether the key's user holds every permission the batch
    /// requires.
    ///
    /// Collects all failing requirements rather than stopping at the
    /// first, so the caller learns the full set of missing grants.
    pub async fn check_permissions(&self, key: &str, sql: &str) -> Result<(), AclError> {
        let state = self.state.read().await;
        let user = state.key_to_user.get(key).ok_or(AclError::NoSuchKey)?;
        let requirements = self.analyzer.analyze(sql, &self.pk_schema)?;

        let empty = GrantSet::new();
        let grants = state.grants.get(user).unwrap_or(&empty);
        let failing: Vec<_> = requirements
            .into_iter()
            .filter(|requirement| !grants.satisfies(&requirement.permission))
            .collect();
        if failing.is_empty() {
            Ok(())
        } else {
            debug!(user = %user, failing = failing.len(), "permission check failed");
            Err(AclError::InsufficientPermissions(failing))
        }
    }

    /// Add permissions to a user's grants. Admin only.
    ///
    /// Additions merge into existing `(table, mode)` entries: a blanket
    /// grant absorbs row grants, row grants union.
    pub async fn add_permissions(
        &self,
        key: &str,
        user: &str,
        additions: Vec<Permission>,
    ) -> Result<(), AclError> {
        let mut state = self.state.write().await;
        if !state.admin_keys.contains(key) {
            return Err(AclError::NotAdmin);
        }
        let mut grants = match state.grants.get(user) {
            Some(set) => set.clone(),
            None => GrantSet::from_permissions(self.store.user_grants(user).await?),
        };
        for addition in additions {
            grants.merge(addition);
        }
        // The store write must succeed before the projection changes.
        self.store
            .store_user_grants(user, &grants.permissions())
            .await?;
        info!(user = %user, entries = grants.len(), "added permissions");
        state.grants.insert(user.to_string(), grants);
        Ok(())
    }

    /// Remove permissions from a user's grants. Admin only.
    ///
    /// Removing specific rows from a blanket grant fails before anything
    /// is written; removing a blanket from a row grant is a silent no-op.
    pub async fn remove_permissions(
        &self,
        key: &str,
        user: &str,
        removals: &[Permission],
    ) -> Result<(), AclError> {
        let mut state = self.state.write().await;
        if !state.admin_keys.contains(key) {
            return Err(AclError::NotAdmin);
        }
        let mut grants = match state.grants.get(user) {
            Some(set) => set.clone(),
            None => GrantSet::from_permissions(self.store.user_grants(user).await?),
        };
        for removal in removals {
            grants.remove(removal)?;
        }
        self.store
            .store_user_grants(user, &grants.permissions())
            .await?;
        info!(user = %user, entries = grants.len(), "removed permissions");
        state.grants.insert(user.to_string(), grants);
        Ok(())
    }

    /// One user's grants. Admin only. Falls back to the store for users
    /// absent from the projection; the projection is not mutated on this
    /// read path.
    pub async fn get_permissions(&self, key: &str, user: &str) -> Result<Vec<Permission>, AclError> {
        let state = self.state.read().await;
        if !state.admin_keys.contains(key) {
            return Err(AclError::NotAdmin);
        }
        match state.grants.get(user) {
            Some(set) => Ok(set.permissions()),
            None => Ok(self.store.user_grants(user).await?),
        }
    }

    /// Every user's grants from the projection. Admin only.
    pub async fn all_permissions(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, Vec<Permission>>, AclError> {
        let state = self.state.read().await;
        if !state.admin_keys.contains(key) {
            return Err(AclError::NotAdmin);
        }
        Ok(state
            .grants
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(user, set)| (user.clone(), set.permissions()))
            .collect())
    }
}
