//! The gateway: permission checks in front of the backing database.

use std::sync::Arc;
use tracing::debug;

use rowgate_acl::AclManager;
use rowgate_adapter_sqlite::{SqliteDb, SqliteGrantStore};
use rowgate_core::{GatewayConfig, GrantStore, SqlStore};

use crate::error::GatewayError;
use crate::types::{
    AddPermissionsRequest, GetAllPermissionsRequest, GetAllPermissionsResponse,
    GetPermissionsRequest, GetPermissionsResponse, QueryRequest, QueryResponse,
    RemovePermissionsRequest,
};

/// The authorization gateway.
///
/// Construction loads the primary-key schema from the backing database
/// and the grant snapshot from the grant store; both become the
/// process-wide state the manager serves from.
pub struct Gateway {
    acl: AclManager,
    db: Arc<dyn SqlStore>,
    grant_store: Arc<dyn GrantStore>,
}

impl Gateway {
    /// Assemble a gateway from its two stores.
    pub async fn new(
        grant_store: Arc<dyn GrantStore>,
        db: Arc<dyn SqlStore>,
    ) -> Result<Self, GatewayError> {
        let pk_schema = db.pk_schema().await?;
        let acl = AclManager::new(grant_store.clone(), pk_schema).await?;
        Ok(Self {
            acl,
            db,
            grant_store,
        })
    }

    /// Open the two SQLite stores named by the configuration.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let grant_store = SqliteGrantStore::connect(&config.acl_store.url).await?;
        let db =
            SqliteDb::connect(&config.database.url, config.database.max_connections).await?;
        Self::new(Arc::new(grant_store), Arc::new(db)).await
    }

    /// Execute a batch after checking every permission it requires.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, GatewayError> {
        self.acl
            .check_permissions(&request.key, &request.sql)
            .await?;
        debug!(sql = %request.sql, "forwarding authorized batch");
        let rows = self.db.query(&request.sql).await?;
        Ok(QueryResponse { rows })
    }

    /// One user's grants. Admin only.
    pub async fn get_permissions(
        &self,
        request: &GetPermissionsRequest,
    ) -> Result<GetPermissionsResponse, GatewayError> {
        let permissions = self
            .acl
            .get_permissions(&request.key, &request.user)
            .await?;
        Ok(GetPermissionsResponse { permissions })
    }

    /// Every user's grants. Admin only.
    pub async fn get_all_permissions(
        &self,
        request: &GetAllPermissionsRequest,
    ) -> Result<GetAllPermissionsResponse, GatewayError> {
        let permissions = self.acl.all_permissions(&request.key).await?;
        Ok(GetAllPermissionsResponse { permissions })
    }

    /// Grant permissions to a user. Admin only.
    pub async fn add_permissions(
        &self,
        request: AddPermissionsRequest,
    ) -> Result<(), GatewayError> {
        self.acl
            .add_permissions(&request.key, &request.user, request.permissions)
            .await?;
        Ok(())
    }

    /// Revoke permissions from a user. Admin only.
    pub async fn remove_permissions(
        &self,
        request: &RemovePermissionsRequest,
    ) -> Result<(), GatewayError> {
        self.acl
            .remove_permissions(&request.key, &request.user, &request.permissions)
            .await?;
        Ok(())
    }

    /// Close both stores.
    pub async fn close(&self) {
        self.grant_store.close().await;
        self.db.close().await;
    }
}
