use std::sync::Arc;

use async_trait::async_trait;
use tenantry_core::{AppResult, WorkspaceId};
use tenantry_domain::{ResolvedPermissionSet, RoleId};

/// Storage port for resolved role permissions.
///
/// Entries are replaced whole; readers never observe a partially written set.
#[async_trait]
pub trait PermissionsCache: Send + Sync {
    /// Returns the cached set for one role.
    async fn get(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<Arc<ResolvedPermissionSet>>>;

    /// Stores or replaces the set of one role.
    async fn put(&self, permissions: Arc<ResolvedPermissionSet>) -> AppResult<()>;

    /// Replaces every entry of a workspace in one step.
    async fn replace_workspace(
        &self,
        workspace_id: WorkspaceId,
        permissions: Vec<Arc<ResolvedPermissionSet>>,
    ) -> AppResult<()>;

    /// Drops entries so the next lookup recomputes them.
    async fn invalidate(&self, workspace_id: WorkspaceId, role_ids: &[RoleId]) -> AppResult<()>;

    /// Drops every entry of a workspace.
    async fn invalidate_workspace(&self, workspace_id: WorkspaceId) -> AppResult<()>;
}
