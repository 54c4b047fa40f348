//! Permission store: point lookups over the `deployment_permissions` table.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::authz::PermissionKey;
use crate::errors::{AppError, AppResult};

/// Read-only existence check for a single grant.
///
/// Implementations must be safe to share across the resolver's concurrent
/// lookups.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn exists(&self, key: &PermissionKey) -> AppResult<bool>;
}

#[derive(Debug, Clone)]
pub struct SqlitePermissionStore {
    pool: SqlitePool,
}

impl SqlitePermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn exists(&self, key: &PermissionKey) -> AppResult<bool> {
        let row = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM deployment_permissions WHERE login = ? AND repo_env = ? LIMIT 1",
        )
        .bind(key.requester())
        .bind(key.scope())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| {
            tracing::error!(key = %key, error = %err, "permission lookup failed");
            AppError::store_unavailable(err.to_string())
        })?;

        Ok(row.is_some())
    }
}
