use tenantry_domain::{ObjectPermissionOverride, SettingPermissionOverride};

use crate::rbac_ports::{UpsertObjectPermissionInput, UpsertSettingPermissionInput};

use super::*;

impl RoleService {
    /// Inserts or replaces object permission overrides of an editable role.
    pub async fn upsert_object_permissions(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        inputs: Vec<UpsertObjectPermissionInput>,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        self.require_editable_role(workspace_id, role_id).await?;

        let overrides = inputs
            .into_iter()
            .map(|input| {
                ObjectPermissionOverride::new(role_id, input.object_metadata_id, input.permissions)
            })
            .collect::<AppResult<Vec<_>>>()?;

        self.override_repository
            .upsert_object_permission_overrides(workspace_id, overrides)
            .await?;

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[role_id]))
            .await;

        self.override_repository
            .list_object_permission_overrides(workspace_id, role_id)
            .await
    }

    /// Inserts or replaces setting permission overrides of an editable role.
    pub async fn upsert_setting_permissions(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        inputs: Vec<UpsertSettingPermissionInput>,
    ) -> AppResult<Vec<SettingPermissionOverride>> {
        self.require_editable_role(workspace_id, role_id).await?;

        let overrides = inputs
            .into_iter()
            .map(|input| SettingPermissionOverride {
                role_id,
                setting: input.setting,
                can_update_setting: input.can_update_setting,
            })
            .collect();

        self.override_repository
            .upsert_setting_permission_overrides(workspace_id, overrides)
            .await?;

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[role_id]))
            .await;

        self.override_repository
            .list_setting_permission_overrides(workspace_id, role_id)
            .await
    }

    async fn require_editable_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<RoleDefinition> {
        let role = require_role(self.role_repository.as_ref(), workspace_id, role_id).await?;

        if !role.is_editable() {
            return Err(AppError::NotEditable(format!(
                "permissions of system role '{}' cannot be changed",
                role.label()
            )));
        }

        Ok(role)
    }
}
