//! Application services and ports for workspace role-based access control.

#![forbid(unsafe_code)]

mod authorization_service;
mod permissions_cache_service;
mod rbac_guards;
mod rbac_ports;
mod rbac_repair_service;
mod role_service;
mod user_role_service;
mod workspace_locks;

#[cfg(test)]
mod test_support;

pub use authorization_service::AuthorizationService;
pub use permissions_cache_service::WorkspacePermissionsCacheService;
pub use rbac_ports::{
    CreateRoleInput, PermissionOverrideRepository, PermissionsCache, RoleAssignment,
    RoleAssignmentRepository, RoleRepository, UpsertObjectPermissionInput,
    UpsertSettingPermissionInput,
};
pub use rbac_repair_service::{RbacRepairReport, RbacRepairService};
pub use role_service::{ProvisionedWorkspaceRoles, RoleService};
pub use user_role_service::UserRoleService;
