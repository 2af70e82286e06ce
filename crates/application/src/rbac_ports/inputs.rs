use chrono::{DateTime, Utc};
use tenantry_core::WorkspaceId;
use tenantry_domain::{
    ObjectRecordsPermissions, RoleCapabilities, RoleId, SettingPermissionKey, UserWorkspaceId,
};

/// Input payload for creating custom roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Caller-chosen identifier. A random one is generated when absent.
    pub id: Option<RoleId>,
    /// Unique role label in workspace scope.
    pub label: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional icon name.
    pub icon: Option<String>,
    /// Coarse flags. Unspecified flags are false.
    pub capabilities: RoleCapabilities,
}

/// Assignment of one role to one workspace member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Workspace scope.
    pub workspace_id: WorkspaceId,
    /// Member holding the role.
    pub user_workspace_id: UserWorkspaceId,
    /// Held role.
    pub role_id: RoleId,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
}

/// Input payload for one object permission override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertObjectPermissionInput {
    /// Targeted object identifier.
    pub object_metadata_id: String,
    /// Grants replacing the coarse defaults for the object.
    pub permissions: ObjectRecordsPermissions,
}

/// Input payload for one setting permission override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSettingPermissionInput {
    /// Targeted setting.
    pub setting: SettingPermissionKey,
    /// Grant replacing the coarse settings flag for the setting.
    pub can_update_setting: bool,
}
