//! Redis-backed permissions cache.
//!
//! Each workspace is one hash keyed by role id, holding JSON-encoded resolved sets.

use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tenantry_application::PermissionsCache;
use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{ResolvedPermissionSet, RoleId};
use tracing::debug;

const REPLACE_WORKSPACE_SCRIPT: &str = r#"
redis.call('DEL', KEYS[1])
for index = 1, #ARGV, 2 do
  redis.call('HSET', KEYS[1], ARGV[index], ARGV[index + 1])
end
return #ARGV / 2
"#;

/// Redis implementation of the permissions cache port.
#[derive(Clone)]
pub struct RedisPermissionsCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPermissionsCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, workspace_id: WorkspaceId) -> String {
        format!("{}:{workspace_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }

    fn encode(permissions: &ResolvedPermissionSet) -> AppResult<String> {
        serde_json::to_string(permissions).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode permissions of role '{}': {error}",
                permissions.role_id()
            ))
        })
    }

    fn decode(value: &str) -> AppResult<ResolvedPermissionSet> {
        serde_json::from_str(value).map_err(|error| {
            AppError::Internal(format!("invalid permissions cache value: {error}"))
        })
    }
}

#[async_trait]
impl PermissionsCache for RedisPermissionsCache {
    async fn get(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<Arc<ResolvedPermissionSet>>> {
        let mut connection = self.connection().await?;

        let encoded: Option<String> = connection
            .hget(self.key_for(workspace_id), role_id.to_string())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to read permissions cache entry: {error}"))
            })?;

        encoded
            .as_deref()
            .map(|value| Self::decode(value).map(Arc::new))
            .transpose()
    }

    async fn put(&self, permissions: Arc<ResolvedPermissionSet>) -> AppResult<()> {
        let value = Self::encode(&permissions)?;
        let mut connection = self.connection().await?;

        connection
            .hset::<_, _, _, ()>(
                self.key_for(permissions.workspace_id()),
                permissions.role_id().to_string(),
                value,
            )
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write permissions cache entry: {error}"))
            })
    }

    async fn replace_workspace(
        &self,
        workspace_id: WorkspaceId,
        permissions: Vec<Arc<ResolvedPermissionSet>>,
    ) -> AppResult<()> {
        let mut encoded = Vec::with_capacity(permissions.len());
        for entry in permissions
            .iter()
            .filter(|entry| entry.workspace_id() == workspace_id)
        {
            encoded.push((entry.role_id().to_string(), Self::encode(entry)?));
        }

        let script = Script::new(REPLACE_WORKSPACE_SCRIPT);
        let mut invocation = script.key(self.key_for(workspace_id));
        for (field, value) in &encoded {
            invocation.arg(field.as_str()).arg(value.as_str());
        }

        let mut connection = self.connection().await?;
        let stored = invocation
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to replace permissions cache of workspace '{workspace_id}': {error}"
                ))
            })?;

        debug!(
            workspace_id = %workspace_id,
            entries = stored,
            "replaced redis permissions cache"
        );

        Ok(())
    }

    async fn invalidate(&self, workspace_id: WorkspaceId, role_ids: &[RoleId]) -> AppResult<()> {
        if role_ids.is_empty() {
            return Ok(());
        }

        let fields: Vec<String> = role_ids.iter().map(RoleId::to_string).collect();
        let mut connection = self.connection().await?;

        connection
            .hdel::<_, _, ()>(self.key_for(workspace_id), fields)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to invalidate permissions cache: {error}"))
            })
    }

    async fn invalidate_workspace(&self, workspace_id: WorkspaceId) -> AppResult<()> {
        let mut connection = self.connection().await?;

        connection
            .del::<_, ()>(self.key_for(workspace_id))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to invalidate permissions cache of workspace '{workspace_id}': {error}"
                ))
            })
    }
}
