use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tenantry_application::PermissionsCache;
use tenantry_core::{AppResult, WorkspaceId};
use tenantry_domain::{ResolvedPermissionSet, RoleId};
use tokio::sync::RwLock;

type WorkspaceEntries = HashMap<RoleId, Arc<ResolvedPermissionSet>>;

/// In-memory permissions cache adapter.
///
/// Each workspace map is swapped whole on replacement, so readers see either
/// the previous or the next generation.
#[derive(Debug, Default)]
pub struct InMemoryPermissionsCache {
    entries: RwLock<HashMap<WorkspaceId, Arc<WorkspaceEntries>>>,
}

impl InMemoryPermissionsCache {
    /// Creates an empty in-memory permissions cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionsCache for InMemoryPermissionsCache {
    async fn get(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<Arc<ResolvedPermissionSet>>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&workspace_id)
            .and_then(|workspace| workspace.get(&role_id))
            .cloned())
    }

    async fn put(&self, permissions: Arc<ResolvedPermissionSet>) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        let workspace = entries.entry(permissions.workspace_id()).or_default();

        Arc::make_mut(workspace).insert(permissions.role_id(), permissions);
        Ok(())
    }

    async fn replace_workspace(
        &self,
        workspace_id: WorkspaceId,
        permissions: Vec<Arc<ResolvedPermissionSet>>,
    ) -> AppResult<()> {
        let generation: WorkspaceEntries = permissions
            .into_iter()
            .filter(|entry| entry.workspace_id() == workspace_id)
            .map(|entry| (entry.role_id(), entry))
            .collect();

        self.entries
            .write()
            .await
            .insert(workspace_id, Arc::new(generation));
        Ok(())
    }

    async fn invalidate(&self, workspace_id: WorkspaceId, role_ids: &[RoleId]) -> AppResult<()> {
        if let Some(workspace) = self.entries.write().await.get_mut(&workspace_id) {
            let workspace = Arc::make_mut(workspace);
            for role_id in role_ids {
                workspace.remove(role_id);
            }
        }

        Ok(())
    }

    async fn invalidate_workspace(&self, workspace_id: WorkspaceId) -> AppResult<()> {
        self.entries.write().await.remove(&workspace_id);
        Ok(())
    }
}
