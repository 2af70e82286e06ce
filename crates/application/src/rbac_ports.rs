mod cache;
mod inputs;
mod repositories;

pub use cache::PermissionsCache;
pub use inputs::{
    CreateRoleInput, RoleAssignment, UpsertObjectPermissionInput, UpsertSettingPermissionInput,
};
pub use repositories::{PermissionOverrideRepository, RoleAssignmentRepository, RoleRepository};
