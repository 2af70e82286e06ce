use std::sync::Arc;

use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{ResolvedPermissionSet, RoleId, resolve};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::rbac_ports::{PermissionOverrideRepository, PermissionsCache, RoleRepository};
use crate::workspace_locks::WorkspaceLocks;

/// Application service keeping the permissions cache in sync with the role store.
///
/// Every write to the cache for one workspace happens under that workspace's
/// writer lock and resolves from a fresh store read taken while the lock is held.
///
/// Services built on one cache service also share its administrator guard
/// locks, which serialise mutations checked against the last-administrator rule.
#[derive(Clone)]
pub struct WorkspacePermissionsCacheService {
    role_repository: Arc<dyn RoleRepository>,
    override_repository: Arc<dyn PermissionOverrideRepository>,
    cache: Arc<dyn PermissionsCache>,
    writer_locks: WorkspaceLocks,
    admin_guard_locks: WorkspaceLocks,
}

impl WorkspacePermissionsCacheService {
    /// Creates a cache service from required dependencies.
    #[must_use]
    pub fn new(
        role_repository: Arc<dyn RoleRepository>,
        override_repository: Arc<dyn PermissionOverrideRepository>,
        cache: Arc<dyn PermissionsCache>,
    ) -> Self {
        Self {
            role_repository,
            override_repository,
            cache,
            writer_locks: WorkspaceLocks::default(),
            admin_guard_locks: WorkspaceLocks::default(),
        }
    }

    /// Returns the resolved permissions of one role, computing them on a miss.
    pub async fn lookup(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Arc<ResolvedPermissionSet>> {
        if let Some(cached) = self.read_cached(workspace_id, role_id).await {
            return Ok(cached);
        }

        let _guard = self.writer_locks.lock(workspace_id).await;

        if let Some(cached) = self.read_cached(workspace_id, role_id).await {
            return Ok(cached);
        }

        let resolved = self
            .resolve_from_store(workspace_id, role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "role '{role_id}' does not exist in workspace '{workspace_id}'"
                ))
            })?;

        if let Err(error) = self.cache.put(resolved.clone()).await {
            warn!(
                workspace_id = %workspace_id,
                role_id = %role_id,
                error = %error,
                "failed to store resolved permissions, serving uncached value"
            );
        }

        Ok(resolved)
    }

    /// Recomputes cache entries from the store.
    ///
    /// With `role_ids`, only those entries are replaced and entries of roles
    /// that no longer exist are dropped. Without, the whole workspace map is
    /// replaced in one step.
    pub async fn recompute_roles_permissions_cache(
        &self,
        workspace_id: WorkspaceId,
        role_ids: Option<&[RoleId]>,
    ) -> AppResult<()> {
        let _guard = self.writer_locks.lock(workspace_id).await;

        match role_ids {
            Some(role_ids) => {
                for role_id in role_ids {
                    match self.resolve_from_store(workspace_id, *role_id).await? {
                        Some(resolved) => self.cache.put(resolved).await?,
                        None => self.cache.invalidate(workspace_id, &[*role_id]).await?,
                    }
                }

                debug!(
                    workspace_id = %workspace_id,
                    role_count = role_ids.len(),
                    "recomputed role permissions"
                );
            }
            None => {
                let roles = self.role_repository.list_roles(workspace_id).await?;
                let mut resolved = Vec::with_capacity(roles.len());
                for role in &roles {
                    let object_overrides = self
                        .override_repository
                        .list_object_permission_overrides(workspace_id, role.id())
                        .await?;
                    let setting_overrides = self
                        .override_repository
                        .list_setting_permission_overrides(workspace_id, role.id())
                        .await?;
                    resolved.push(Arc::new(resolve(
                        role,
                        &object_overrides,
                        &setting_overrides,
                    )));
                }

                self.cache.replace_workspace(workspace_id, resolved).await?;

                debug!(
                    workspace_id = %workspace_id,
                    role_count = roles.len(),
                    "recomputed workspace permissions"
                );
            }
        }

        Ok(())
    }

    /// Recomputes after a committed store mutation without failing the caller.
    ///
    /// On failure the affected entries are dropped so the next lookup miss
    /// recomputes them.
    pub async fn recompute_after_mutation(
        &self,
        workspace_id: WorkspaceId,
        role_ids: Option<&[RoleId]>,
    ) {
        let Err(error) = self
            .recompute_roles_permissions_cache(workspace_id, role_ids)
            .await
        else {
            return;
        };

        warn!(
            workspace_id = %workspace_id,
            error = %error,
            "permissions cache recomputation failed, invalidating affected entries"
        );

        let invalidation = match role_ids {
            Some(role_ids) => self.cache.invalidate(workspace_id, role_ids).await,
            None => self.cache.invalidate_workspace(workspace_id).await,
        };

        if let Err(error) = invalidation {
            warn!(
                workspace_id = %workspace_id,
                error = %error,
                "permissions cache invalidation failed"
            );
        }
    }

    async fn read_cached(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> Option<Arc<ResolvedPermissionSet>> {
        match self.cache.get(workspace_id, role_id).await {
            Ok(cached) => cached,
            Err(error) => {
                warn!(
                    workspace_id = %workspace_id,
                    role_id = %role_id,
                    error = %error,
                    "failed to read permissions cache, resolving from store"
                );
                None
            }
        }
    }

    async fn resolve_from_store(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<Arc<ResolvedPermissionSet>>> {
        let Some(role) = self
            .role_repository
            .find_role(workspace_id, role_id)
            .await?
        else {
            return Ok(None);
        };

        let object_overrides = self
            .override_repository
            .list_object_permission_overrides(workspace_id, role_id)
            .await?;
        let setting_overrides = self
            .override_repository
            .list_setting_permission_overrides(workspace_id, role_id)
            .await?;

        Ok(Some(Arc::new(resolve(
            &role,
            &object_overrides,
            &setting_overrides,
        ))))
    }

    /// Holds off other mutations of the workspace that could remove its last
    /// administrator until the guard is dropped.
    pub(crate) async fn lock_admin_guard(
        &self,
        workspace_id: WorkspaceId,
    ) -> OwnedMutexGuard<()> {
        self.admin_guard_locks.lock(workspace_id).await
    }
}
