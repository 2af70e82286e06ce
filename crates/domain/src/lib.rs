//! Domain entities and invariants for workspace role-based access control.

#![forbid(unsafe_code)]

mod permission;
mod resolved_permissions;
mod role;

pub use permission::{
    ObjectPermissionOverride, ObjectRecordsPermissions, SettingPermissionKey,
    SettingPermissionOverride,
};
pub use resolved_permissions::{
    EffectivePermissions, PermissionGrants, ResolvedPermissionSet, resolve,
};
pub use role::{
    BuiltInRole, RoleCapabilities, RoleDefinition, RoleId, RoleUpdate, UserWorkspaceId,
};
