mod overrides;
mod provisioning;

use std::sync::Arc;

use chrono::Utc;
use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{RoleDefinition, RoleId, RoleUpdate, UserWorkspaceId};
use tracing::{info, warn};

use crate::WorkspacePermissionsCacheService;
use crate::rbac_guards::{administrator_remains_without_role, require_role};
use crate::rbac_ports::{
    CreateRoleInput, PermissionOverrideRepository, RoleAssignmentRepository, RoleRepository,
};

pub use provisioning::ProvisionedWorkspaceRoles;

/// Application service for workspace role lifecycle.
#[derive(Clone)]
pub struct RoleService {
    role_repository: Arc<dyn RoleRepository>,
    override_repository: Arc<dyn PermissionOverrideRepository>,
    assignment_repository: Arc<dyn RoleAssignmentRepository>,
    permissions_cache: WorkspacePermissionsCacheService,
}

impl RoleService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        role_repository: Arc<dyn RoleRepository>,
        override_repository: Arc<dyn PermissionOverrideRepository>,
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        permissions_cache: WorkspacePermissionsCacheService,
    ) -> Self {
        Self {
            role_repository,
            override_repository,
            assignment_repository,
            permissions_cache,
        }
    }

    /// Returns workspace roles in creation order.
    pub async fn get_workspace_roles(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<RoleDefinition>> {
        self.role_repository.list_roles(workspace_id).await
    }

    /// Returns one role, or `None` when the workspace has no such role.
    pub async fn get_role_by_id(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleDefinition>> {
        self.role_repository.find_role(workspace_id, role_id).await
    }

    /// Creates an editable custom role.
    pub async fn create_role(
        &self,
        workspace_id: WorkspaceId,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let role = RoleDefinition::new_custom(
            input.id.unwrap_or_default(),
            workspace_id,
            input.label,
            input.description,
            input.icon,
            input.capabilities,
            Utc::now(),
        )?;

        if input.id.is_some()
            && self
                .role_repository
                .find_role(workspace_id, role.id())
                .await?
                .is_some()
        {
            return Err(AppError::Validation(format!(
                "role id '{}' is already used in workspace '{workspace_id}'",
                role.id()
            )));
        }

        self.ensure_label_available(workspace_id, role.label().as_str(), None)
            .await?;

        let created = self.role_repository.create_role(role).await?;

        info!(
            workspace_id = %workspace_id,
            role_id = %created.id(),
            label = %created.label(),
            "role created"
        );

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[created.id()]))
            .await;

        Ok(created)
    }

    /// Updates an editable role.
    ///
    /// Stripping the administrative flag from a role someone holds fails with
    /// `LastAdminRemoval` when no other administrative assignment remains.
    pub async fn update_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<RoleDefinition> {
        let admin_guard = self.permissions_cache.lock_admin_guard(workspace_id).await;

        let existing = require_role(self.role_repository.as_ref(), workspace_id, role_id).await?;
        let candidate = existing.with_update(&update, Utc::now())?;

        self.ensure_label_available(workspace_id, candidate.label().as_str(), Some(role_id))
            .await?;

        if existing.has_administrative_capability()
            && !candidate.has_administrative_capability()
            && !self
                .assignment_repository
                .members_for(workspace_id, role_id)
                .await?
                .is_empty()
        {
            self.ensure_administrator_remains(workspace_id, role_id)
                .await?;
        }

        let updated = self
            .role_repository
            .update_role(workspace_id, role_id, update)
            .await?;
        drop(admin_guard);

        info!(
            workspace_id = %workspace_id,
            role_id = %role_id,
            "role updated"
        );

        self.permissions_cache
            .recompute_after_mutation(workspace_id, Some(&[role_id]))
            .await;

        Ok(updated)
    }

    /// Deletes an editable, non-default role and returns its identifier.
    ///
    /// Members holding only this role are moved to the workspace default role,
    /// then the role is deleted and its assignments are purged. When the delete
    /// fails those members are moved back and no assignment of the role is lost.
    pub async fn delete_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<RoleId> {
        let admin_guard = self.permissions_cache.lock_admin_guard(workspace_id).await;

        let role = require_role(self.role_repository.as_ref(), workspace_id, role_id).await?;

        if !role.is_editable() {
            return Err(AppError::NotEditable(format!(
                "role '{}' is a system role and cannot be deleted",
                role.label()
            )));
        }

        let default_role_id = self.role_repository.default_role_id(workspace_id).await?;
        if default_role_id == Some(role_id) {
            return Err(AppError::IsDefaultRole(format!(
                "role '{}' is the default role of workspace '{workspace_id}'",
                role.label()
            )));
        }

        let members = self
            .assignment_repository
            .members_for(workspace_id, role_id)
            .await?;

        if role.has_administrative_capability() && !members.is_empty() {
            self.ensure_administrator_remains(workspace_id, role_id)
                .await?;
        }

        let mut sole_holders = Vec::new();
        for member in members {
            let held = self
                .assignment_repository
                .roles_for(workspace_id, member)
                .await?;
            if held.iter().all(|held_role_id| *held_role_id == role_id) {
                sole_holders.push(member);
            }
        }

        let mut reassigned = Vec::with_capacity(sole_holders.len());
        if !sole_holders.is_empty() {
            let default_role_id = default_role_id.ok_or_else(|| {
                AppError::Validation(format!(
                    "workspace '{workspace_id}' has no default role to reassign members of role '{}'",
                    role.label()
                ))
            })?;

            for member in &sole_holders {
                if let Err(error) = self
                    .assignment_repository
                    .assign_role(workspace_id, *member, default_role_id)
                    .await
                {
                    self.revert_reassignments(workspace_id, default_role_id, &reassigned)
                        .await;
                    return Err(error);
                }
                reassigned.push(*member);
            }
        }

        if let Err(error) = self
            .role_repository
            .delete_role(workspace_id, role_id)
            .await
        {
            if let Some(default_role_id) = default_role_id {
                self.revert_reassignments(workspace_id, default_role_id, &reassigned)
                    .await;
            }
            return Err(error);
        }

        let purged = self
            .assignment_repository
            .remove_assignments_for_role(workspace_id, role_id)
            .await;
        drop(admin_guard);

        info!(
            workspace_id = %workspace_id,
            role_id = %role_id,
            reassigned_members = reassigned.len(),
            "role deleted"
        );

        self.permissions_cache
            .recompute_after_mutation(workspace_id, None)
            .await;

        if let Err(error) = purged {
            warn!(
                workspace_id = %workspace_id,
                role_id = %role_id,
                error = %error,
                "failed to purge assignments of deleted role, leaving them to the repair pass"
            );
            return Err(error);
        }

        Ok(role_id)
    }

    async fn revert_reassignments(
        &self,
        workspace_id: WorkspaceId,
        default_role_id: RoleId,
        members: &[UserWorkspaceId],
    ) {
        for member in members {
            if let Err(error) = self
                .assignment_repository
                .unassign_role(workspace_id, *member, default_role_id, &[])
                .await
            {
                warn!(
                    workspace_id = %workspace_id,
                    user_workspace_id = %member,
                    role_id = %default_role_id,
                    error = %error,
                    "failed to revert default role reassignment"
                );
            }
        }
    }

    async fn ensure_label_available(
        &self,
        workspace_id: WorkspaceId,
        label: &str,
        excluded_role_id: Option<RoleId>,
    ) -> AppResult<()> {
        let taken = self
            .role_repository
            .list_roles(workspace_id)
            .await?
            .iter()
            .any(|role| Some(role.id()) != excluded_role_id && role.label().as_str() == label);

        if taken {
            return Err(AppError::DuplicateLabel(format!(
                "a role labelled '{label}' already exists in workspace '{workspace_id}'"
            )));
        }

        Ok(())
    }

    async fn ensure_administrator_remains(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        if administrator_remains_without_role(
            self.role_repository.as_ref(),
            self.assignment_repository.as_ref(),
            workspace_id,
            role_id,
        )
        .await?
        {
            return Ok(());
        }

        Err(AppError::LastAdminRemoval(format!(
            "role '{role_id}' grants the only administrator access in workspace '{workspace_id}'"
        )))
    }
}
