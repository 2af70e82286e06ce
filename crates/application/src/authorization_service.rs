use std::sync::Arc;

use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{
    EffectivePermissions, ObjectRecordsPermissions, SettingPermissionKey, UserWorkspaceId,
};
use tracing::warn;

use crate::WorkspacePermissionsCacheService;
use crate::rbac_ports::RoleAssignmentRepository;

/// Read-side authorization checks for workspace members.
///
/// Role definitions are only ever read through the permissions cache.
#[derive(Clone)]
pub struct AuthorizationService {
    assignment_repository: Arc<dyn RoleAssignmentRepository>,
    permissions_cache: WorkspacePermissionsCacheService,
}

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new(
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        permissions_cache: WorkspacePermissionsCacheService,
    ) -> Self {
        Self {
            assignment_repository,
            permissions_cache,
        }
    }

    /// Returns the OR-merged permissions of every role held by a member.
    pub async fn effective_permissions(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
    ) -> AppResult<EffectivePermissions> {
        let role_ids = self
            .assignment_repository
            .roles_for(workspace_id, user_workspace_id)
            .await?;

        let mut resolved = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            match self.permissions_cache.lookup(workspace_id, role_id).await {
                Ok(permissions) => resolved.push(permissions),
                Err(AppError::NotFound(_)) => {
                    warn!(
                        workspace_id = %workspace_id,
                        user_workspace_id = %user_workspace_id,
                        role_id = %role_id,
                        "ignoring assignment to a role that no longer exists"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        Ok(EffectivePermissions::merge(
            resolved.iter().map(|permissions| permissions.as_ref()),
        ))
    }

    /// Returns a member's record grants on one object.
    pub async fn object_permissions(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        object_metadata_id: &str,
    ) -> AppResult<ObjectRecordsPermissions> {
        Ok(self
            .effective_permissions(workspace_id, user_workspace_id)
            .await?
            .object_permissions(object_metadata_id))
    }

    /// Returns whether a member can update one workspace setting.
    pub async fn can_update_setting(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        setting: SettingPermissionKey,
    ) -> AppResult<bool> {
        Ok(self
            .effective_permissions(workspace_id, user_workspace_id)
            .await?
            .can_update_setting(setting))
    }
}
