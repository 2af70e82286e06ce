use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tenantry_application::{PermissionOverrideRepository, RoleRepository};
use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{
    ObjectPermissionOverride, RoleDefinition, RoleId, RoleUpdate, SettingPermissionOverride,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct WorkspaceRoles {
    roles: Vec<RoleDefinition>,
    object_overrides: Vec<ObjectPermissionOverride>,
    setting_overrides: Vec<SettingPermissionOverride>,
    default_role_id: Option<RoleId>,
}

impl WorkspaceRoles {
    fn position(&self, role_id: RoleId) -> Option<usize> {
        self.roles.iter().position(|role| role.id() == role_id)
    }

    fn label_taken(&self, label: &str, excluded_role_id: Option<RoleId>) -> bool {
        self.roles
            .iter()
            .any(|role| Some(role.id()) != excluded_role_id && role.label().as_str() == label)
    }
}

/// In-memory role store holding definitions and permission overrides.
///
/// Roles of one workspace keep their creation order.
#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    workspaces: RwLock<HashMap<WorkspaceId, WorkspaceRoles>>,
}

impl InMemoryRoleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn role_not_found(workspace_id: WorkspaceId, role_id: RoleId) -> AppError {
    AppError::NotFound(format!(
        "role '{role_id}' does not exist in workspace '{workspace_id}'"
    ))
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn find_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleDefinition>> {
        Ok(self
            .workspaces
            .read()
            .await
            .get(&workspace_id)
            .and_then(|workspace| workspace.roles.iter().find(|role| role.id() == role_id))
            .cloned())
    }

    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleDefinition>> {
        Ok(self
            .workspaces
            .read()
            .await
            .get(&workspace_id)
            .map(|workspace| workspace.roles.clone())
            .unwrap_or_default())
    }

    async fn create_role(&self, role: RoleDefinition) -> AppResult<RoleDefinition> {
        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces.entry(role.workspace_id()).or_default();

        if workspace.position(role.id()).is_some() {
            return Err(AppError::Validation(format!(
                "role id '{}' is already used in workspace '{}'",
                role.id(),
                role.workspace_id()
            )));
        }

        if workspace.label_taken(role.label().as_str(), None) {
            return Err(AppError::DuplicateLabel(format!(
                "a role labelled '{}' already exists in workspace '{}'",
                role.label(),
                role.workspace_id()
            )));
        }

        workspace.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<RoleDefinition> {
        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces
            .get_mut(&workspace_id)
            .ok_or_else(|| role_not_found(workspace_id, role_id))?;
        let index = workspace
            .position(role_id)
            .ok_or_else(|| role_not_found(workspace_id, role_id))?;

        let updated = workspace.roles[index].with_update(&update, Utc::now())?;
        if workspace.label_taken(updated.label().as_str(), Some(role_id)) {
            return Err(AppError::DuplicateLabel(format!(
                "a role labelled '{}' already exists in workspace '{workspace_id}'",
                updated.label()
            )));
        }

        workspace.roles[index] = updated.clone();
        Ok(updated)
    }

    async fn delete_role(&self, workspace_id: WorkspaceId, role_id: RoleId) -> AppResult<()> {
        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces
            .get_mut(&workspace_id)
            .ok_or_else(|| role_not_found(workspace_id, role_id))?;
        let index = workspace
            .position(role_id)
            .ok_or_else(|| role_not_found(workspace_id, role_id))?;

        if workspace.default_role_id == Some(role_id) {
            return Err(AppError::IsDefaultRole(format!(
                "role '{role_id}' is the default role of workspace '{workspace_id}'"
            )));
        }

        if !workspace.roles[index].is_editable() {
            return Err(AppError::NotEditable(format!(
                "role '{}' is a system role and cannot be deleted",
                workspace.roles[index].label()
            )));
        }

        workspace.roles.remove(index);
        workspace
            .object_overrides
            .retain(|entry| entry.role_id() != role_id);
        workspace
            .setting_overrides
            .retain(|entry| entry.role_id != role_id);

        Ok(())
    }

    async fn default_role_id(&self, workspace_id: WorkspaceId) -> AppResult<Option<RoleId>> {
        Ok(self
            .workspaces
            .read()
            .await
            .get(&workspace_id)
            .and_then(|workspace| workspace.default_role_id))
    }

    async fn set_default_role_id(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces
            .get_mut(&workspace_id)
            .filter(|workspace| workspace.position(role_id).is_some())
            .ok_or_else(|| role_not_found(workspace_id, role_id))?;

        workspace.default_role_id = Some(role_id);
        Ok(())
    }

    async fn list_workspace_ids(&self) -> AppResult<Vec<WorkspaceId>> {
        let mut workspace_ids: Vec<WorkspaceId> = self
            .workspaces
            .read()
            .await
            .iter()
            .filter_map(|(workspace_id, workspace)| {
                (!workspace.roles.is_empty()).then_some(*workspace_id)
            })
            .collect();
        workspace_ids.sort();

        Ok(workspace_ids)
    }
}

#[async_trait]
impl PermissionOverrideRepository for InMemoryRoleRepository {
    async fn list_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        Ok(self
            .workspaces
            .read()
            .await
            .get(&workspace_id)
            .map(|workspace| {
                workspace
                    .object_overrides
                    .iter()
                    .filter(|entry| entry.role_id() == role_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<SettingPermissionOverride>> {
        Ok(self
            .workspaces
            .read()
            .await
            .get(&workspace_id)
            .map(|workspace| {
                workspace
                    .setting_overrides
                    .iter()
                    .filter(|entry| entry.role_id == role_id)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<ObjectPermissionOverride>,
    ) -> AppResult<()> {
        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces.entry(workspace_id).or_default();

        if let Some(entry) = overrides
            .iter()
            .find(|entry| workspace.position(entry.role_id()).is_none())
        {
            return Err(role_not_found(workspace_id, entry.role_id()));
        }

        for entry in overrides {
            match workspace.object_overrides.iter_mut().find(|stored| {
                stored.role_id() == entry.role_id()
                    && stored.object_metadata_id() == entry.object_metadata_id()
            }) {
                Some(stored) => *stored = entry,
                None => workspace.object_overrides.push(entry),
            }
        }

        Ok(())
    }

    async fn upsert_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<SettingPermissionOverride>,
    ) -> AppResult<()> {
        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces.entry(workspace_id).or_default();

        if let Some(entry) = overrides
            .iter()
            .find(|entry| workspace.position(entry.role_id).is_none())
        {
            return Err(role_not_found(workspace_id, entry.role_id));
        }

        for entry in overrides {
            match workspace
                .setting_overrides
                .iter_mut()
                .find(|stored| stored.role_id == entry.role_id && stored.setting == entry.setting)
            {
                Some(stored) => *stored = entry,
                None => workspace.setting_overrides.push(entry),
            }
        }

        Ok(())
    }
}
