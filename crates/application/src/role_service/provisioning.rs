use tenantry_domain::BuiltInRole;

use super::*;

/// Built-in roles of a provisioned workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedWorkspaceRoles {
    /// Administrator role.
    pub admin: RoleDefinition,
    /// Member role, the default for new members unless one was already set.
    pub member: RoleDefinition,
    /// Read-only guest role.
    pub guest: RoleDefinition,
}

impl RoleService {
    /// Creates the built-in Admin role unless it already exists.
    pub async fn create_admin_role(&self, workspace_id: WorkspaceId) -> AppResult<RoleDefinition> {
        self.create_built_in_role(workspace_id, BuiltInRole::Admin)
            .await
    }

    /// Creates the built-in Member role unless it already exists.
    pub async fn create_member_role(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<RoleDefinition> {
        self.create_built_in_role(workspace_id, BuiltInRole::Member)
            .await
    }

    /// Creates the built-in Guest role unless it already exists.
    pub async fn create_guest_role(&self, workspace_id: WorkspaceId) -> AppResult<RoleDefinition> {
        self.create_built_in_role(workspace_id, BuiltInRole::Guest)
            .await
    }

    /// Provisions every built-in role and points the default at Member when
    /// the workspace has no default yet.
    pub async fn provision_workspace_roles(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<ProvisionedWorkspaceRoles> {
        let admin = self.create_admin_role(workspace_id).await?;
        let member = self.create_member_role(workspace_id).await?;
        let guest = self.create_guest_role(workspace_id).await?;

        if self
            .role_repository
            .default_role_id(workspace_id)
            .await?
            .is_none()
        {
            self.role_repository
                .set_default_role_id(workspace_id, member.id())
                .await?;
        }

        Ok(ProvisionedWorkspaceRoles {
            admin,
            member,
            guest,
        })
    }

    /// Points the workspace default role at an existing role.
    pub async fn set_default_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        require_role(self.role_repository.as_ref(), workspace_id, role_id).await?;

        self.role_repository
            .set_default_role_id(workspace_id, role_id)
            .await?;

        info!(
            workspace_id = %workspace_id,
            role_id = %role_id,
            "default role changed"
        );

        Ok(())
    }

    async fn create_built_in_role(
        &self,
        workspace_id: WorkspaceId,
        kind: BuiltInRole,
    ) -> AppResult<RoleDefinition> {
        if let Some(existing) = self
            .role_repository
            .list_roles(workspace_id)
            .await?
            .into_iter()
            .find(|role| role.is_built_in(kind))
        {
            return Ok(existing);
        }

        let role = RoleDefinition::new_built_in(kind, RoleId::new(), workspace_id, Utc::now())?;
        let created = self.role_repository.create_role(role).await?;

        info!(
            workspace_id = %workspace_id,
            role_id = %created.id(),
            label = %created.label(),
            "built-in role provisioned"
        );

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[created.id()]))
            .await;

        Ok(created)
    }
}
