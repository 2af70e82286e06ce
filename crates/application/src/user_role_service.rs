use std::collections::HashMap;
use std::sync::Arc;

use tenantry_core::{AppResult, WorkspaceId};
use tenantry_domain::{RoleDefinition, RoleId, UserWorkspaceId};
use tracing::info;

use crate::WorkspacePermissionsCacheService;
use crate::rbac_guards::{administrative_role_ids, require_role};
use crate::rbac_ports::{RoleAssignmentRepository, RoleRepository};

/// Application service for member role assignments.
#[derive(Clone)]
pub struct UserRoleService {
    role_repository: Arc<dyn RoleRepository>,
    assignment_repository: Arc<dyn RoleAssignmentRepository>,
    permissions_cache: WorkspacePermissionsCacheService,
}

impl UserRoleService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        role_repository: Arc<dyn RoleRepository>,
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        permissions_cache: WorkspacePermissionsCacheService,
    ) -> Self {
        Self {
            role_repository,
            assignment_repository,
            permissions_cache,
        }
    }

    /// Assigns a workspace role to a member. Assigning a held role is a no-op.
    pub async fn assign_role_to_user_workspace(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        require_role(self.role_repository.as_ref(), workspace_id, role_id).await?;

        self.assignment_repository
            .assign_role(workspace_id, user_workspace_id, role_id)
            .await?;

        info!(
            workspace_id = %workspace_id,
            user_workspace_id = %user_workspace_id,
            role_id = %role_id,
            "role assigned"
        );

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[role_id]))
            .await;

        Ok(())
    }

    /// Removes one role from a member.
    ///
    /// Fails with `LastAdminRemoval` when the member is the workspace's only
    /// administrator; the assignment is left untouched in that case. The check
    /// runs under the workspace's administrator guard, so concurrent role
    /// updates and deletions cannot invalidate it.
    pub async fn remove_role_from_user(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let _admin_guard = self.permissions_cache.lock_admin_guard(workspace_id).await;
        let administrative_role_ids =
            administrative_role_ids(self.role_repository.as_ref(), workspace_id).await?;

        self.assignment_repository
            .unassign_role(
                workspace_id,
                user_workspace_id,
                role_id,
                &administrative_role_ids,
            )
            .await?;

        info!(
            workspace_id = %workspace_id,
            user_workspace_id = %user_workspace_id,
            role_id = %role_id,
            "role unassigned"
        );

        Ok(())
    }

    /// Replaces every role of a member with one role and returns the member's roles.
    pub async fn update_workspace_member_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<RoleDefinition>> {
        let admin_guard = self.permissions_cache.lock_admin_guard(workspace_id).await;
        require_role(self.role_repository.as_ref(), workspace_id, role_id).await?;
        let administrative_role_ids =
            administrative_role_ids(self.role_repository.as_ref(), workspace_id).await?;

        self.assignment_repository
            .replace_roles(
                workspace_id,
                user_workspace_id,
                role_id,
                &administrative_role_ids,
            )
            .await?;
        drop(admin_guard);

        info!(
            workspace_id = %workspace_id,
            user_workspace_id = %user_workspace_id,
            role_id = %role_id,
            "member role replaced"
        );

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[role_id]))
            .await;

        Ok(self
            .get_roles_by_user_workspaces(workspace_id, &[user_workspace_id])
            .await?
            .remove(&user_workspace_id)
            .unwrap_or_default())
    }

    /// Returns the roles of each requested member in assignment order.
    ///
    /// Every requested member is present in the result; members without
    /// assignments map to an empty list.
    pub async fn get_roles_by_user_workspaces(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_ids: &[UserWorkspaceId],
    ) -> AppResult<HashMap<UserWorkspaceId, Vec<RoleDefinition>>> {
        let roles: HashMap<RoleId, RoleDefinition> = self
            .role_repository
            .list_roles(workspace_id)
            .await?
            .into_iter()
            .map(|role| (role.id(), role))
            .collect();

        let mut result: HashMap<UserWorkspaceId, Vec<RoleDefinition>> = user_workspace_ids
            .iter()
            .map(|user_workspace_id| (*user_workspace_id, Vec::new()))
            .collect();

        for assignment in self
            .assignment_repository
            .list_assignments(workspace_id)
            .await?
        {
            let (Some(member_roles), Some(role)) = (
                result.get_mut(&assignment.user_workspace_id),
                roles.get(&assignment.role_id),
            ) else {
                continue;
            };
            member_roles.push(role.clone());
        }

        Ok(result)
    }

    /// Returns members currently holding a role.
    pub async fn get_user_workspace_ids_assigned_to_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<UserWorkspaceId>> {
        self.assignment_repository
            .members_for(workspace_id, role_id)
            .await
    }
}

#[cfg(test)]
mod tests;
