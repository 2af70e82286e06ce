use async_trait::async_trait;
use tenantry_core::{AppResult, WorkspaceId};
use tenantry_domain::{
    ObjectPermissionOverride, RoleDefinition, RoleId, RoleUpdate, SettingPermissionOverride,
    UserWorkspaceId,
};

use super::inputs::RoleAssignment;

/// Repository port for workspace role definitions.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Finds one role in workspace scope.
    async fn find_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleDefinition>>;

    /// Lists workspace roles in creation order.
    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleDefinition>>;

    /// Persists a new role.
    ///
    /// Fails with `DuplicateLabel` when the label is taken in the workspace.
    async fn create_role(&self, role: RoleDefinition) -> AppResult<RoleDefinition>;

    /// Merges an update into the stored role and returns the stored result.
    ///
    /// Fails with `NotEditable` for system roles and `DuplicateLabel` on label
    /// collisions. Concurrent updates of one role are last-writer-wins.
    async fn update_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<RoleDefinition>;

    /// Deletes a role together with its permission overrides.
    ///
    /// Fails with `IsDefaultRole` for the workspace default and `NotEditable`
    /// for system roles.
    async fn delete_role(&self, workspace_id: WorkspaceId, role_id: RoleId) -> AppResult<()>;

    /// Returns the role auto-assigned to new members.
    async fn default_role_id(&self, workspace_id: WorkspaceId) -> AppResult<Option<RoleId>>;

    /// Points the workspace default at an existing role.
    async fn set_default_role_id(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Lists workspaces owning at least one role.
    async fn list_workspace_ids(&self) -> AppResult<Vec<WorkspaceId>>;
}

/// Repository port for fine-grained permission overrides.
#[async_trait]
pub trait PermissionOverrideRepository: Send + Sync {
    /// Lists object overrides of one role.
    async fn list_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<ObjectPermissionOverride>>;

    /// Lists setting overrides of one role.
    async fn list_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<SettingPermissionOverride>>;

    /// Inserts or replaces object overrides keyed by role and object.
    async fn upsert_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<ObjectPermissionOverride>,
    ) -> AppResult<()>;

    /// Inserts or replaces setting overrides keyed by role and setting.
    async fn upsert_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<SettingPermissionOverride>,
    ) -> AppResult<()>;
}

/// Repository port for member role assignments.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Assigns a role to a member. Assigning a held role is a no-op.
    async fn assign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Removes one held role.
    ///
    /// When `role_id` is one of `administrative_role_ids`, the removal fails with
    /// `LastAdminRemoval` if no other member would keep an administrative role.
    /// The check and the removal are atomic. Fails with `NotFound` when the
    /// member does not hold the role.
    async fn unassign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()>;

    /// Replaces every role of a member with exactly one role, under the same
    /// administrator guard as `unassign_role`.
    async fn replace_roles(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()>;

    /// Lists roles held by a member in assignment order.
    async fn roles_for(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
    ) -> AppResult<Vec<RoleId>>;

    /// Lists members holding a role in assignment order.
    async fn members_for(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<UserWorkspaceId>>;

    /// Lists every assignment of a workspace in assignment order.
    async fn list_assignments(&self, workspace_id: WorkspaceId)
    -> AppResult<Vec<RoleAssignment>>;

    /// Removes every assignment referencing a role and returns the count.
    async fn remove_assignments_for_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<u64>;
}
