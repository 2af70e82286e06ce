//! Permission resolution from coarse role flags and point overrides.
//!
//! Resolution is pure: storage and caching live in the application layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tenantry_core::WorkspaceId;

use crate::{
    ObjectPermissionOverride, ObjectRecordsPermissions, RoleDefinition, RoleId,
    SettingPermissionKey, SettingPermissionOverride,
};

/// Expanded permissions of one role, as stored in the permissions cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermissionSet {
    workspace_id: WorkspaceId,
    role_id: RoleId,
    grants: PermissionGrants,
}

impl ResolvedPermissionSet {
    /// Returns the owning workspace.
    #[must_use]
    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the role the set was resolved from.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the resolved grants.
    #[must_use]
    pub fn grants(&self) -> &PermissionGrants {
        &self.grants
    }

    /// Returns record grants for one object.
    #[must_use]
    pub fn object_permissions(&self, object_metadata_id: &str) -> ObjectRecordsPermissions {
        self.grants.object_permissions(object_metadata_id)
    }

    /// Returns whether one setting can be updated.
    #[must_use]
    pub fn can_update_setting(&self, setting: SettingPermissionKey) -> bool {
        self.grants.can_update_setting(setting)
    }
}

/// Coarse defaults plus per-target exceptions.
///
/// Objects absent from `object_permissions` use `default_object_permissions`.
/// `setting_permissions` is always expanded over every known setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrants {
    /// Whether every setting is updatable absent an override.
    pub can_update_all_settings: bool,
    /// Record grants applied to objects without an override.
    pub default_object_permissions: ObjectRecordsPermissions,
    /// Per-object exceptions.
    pub object_permissions: BTreeMap<String, ObjectRecordsPermissions>,
    /// Effective grant of every setting.
    pub setting_permissions: BTreeMap<SettingPermissionKey, bool>,
}

impl PermissionGrants {
    /// Returns record grants for one object.
    #[must_use]
    pub fn object_permissions(&self, object_metadata_id: &str) -> ObjectRecordsPermissions {
        self.object_permissions
            .get(object_metadata_id)
            .copied()
            .unwrap_or(self.default_object_permissions)
    }

    /// Returns whether one setting can be updated.
    #[must_use]
    pub fn can_update_setting(&self, setting: SettingPermissionKey) -> bool {
        self.setting_permissions
            .get(&setting)
            .copied()
            .unwrap_or(self.can_update_all_settings)
    }

    /// Combines grants with most-permissive-wins semantics.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut object_permissions = BTreeMap::new();
        for object_metadata_id in self
            .object_permissions
            .keys()
            .chain(other.object_permissions.keys())
        {
            object_permissions.insert(
                object_metadata_id.clone(),
                self.object_permissions(object_metadata_id)
                    .union(other.object_permissions(object_metadata_id)),
            );
        }

        let setting_permissions = SettingPermissionKey::all()
            .iter()
            .map(|setting| {
                (
                    *setting,
                    self.can_update_setting(*setting) || other.can_update_setting(*setting),
                )
            })
            .collect();

        Self {
            can_update_all_settings: self.can_update_all_settings
                || other.can_update_all_settings,
            default_object_permissions: self
                .default_object_permissions
                .union(other.default_object_permissions),
            object_permissions,
            setting_permissions,
        }
    }
}

/// Resolves one role into its expanded permission set.
///
/// Overrides owned by other roles are ignored. When two overrides target the
/// same object or setting the later one wins.
#[must_use]
pub fn resolve(
    role: &RoleDefinition,
    object_overrides: &[ObjectPermissionOverride],
    setting_overrides: &[SettingPermissionOverride],
) -> ResolvedPermissionSet {
    let capabilities = role.capabilities();
    let default_object_permissions = ObjectRecordsPermissions {
        can_read: capabilities.can_read_all_object_records,
        can_update: capabilities.can_update_all_object_records,
        can_soft_delete: capabilities.can_soft_delete_all_object_records,
        can_destroy: capabilities.can_destroy_all_object_records,
    };

    let object_permissions = object_overrides
        .iter()
        .filter(|value| value.role_id() == role.id())
        .map(|value| {
            (
                value.object_metadata_id().as_str().to_owned(),
                value.permissions(),
            )
        })
        .collect();

    let mut setting_permissions: BTreeMap<SettingPermissionKey, bool> =
        SettingPermissionKey::all()
            .iter()
            .map(|setting| (*setting, capabilities.can_update_all_settings))
            .collect();
    for value in setting_overrides
        .iter()
        .filter(|value| value.role_id == role.id())
    {
        setting_permissions.insert(value.setting, value.can_update_setting);
    }

    ResolvedPermissionSet {
        workspace_id: role.workspace_id(),
        role_id: role.id(),
        grants: PermissionGrants {
            can_update_all_settings: capabilities.can_update_all_settings,
            default_object_permissions,
            object_permissions,
            setting_permissions,
        },
    }
}

/// Effective permissions of a member holding several roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    /// Roles that contributed to the grants.
    pub role_ids: Vec<RoleId>,
    /// OR-merged grants.
    pub grants: PermissionGrants,
}

impl EffectivePermissions {
    /// OR-merges resolved role sets. No sets yields no grants.
    #[must_use]
    pub fn merge<'a>(sets: impl IntoIterator<Item = &'a ResolvedPermissionSet>) -> Self {
        let mut merged: Option<Self> = None;

        for set in sets {
            merged = Some(match merged {
                None => Self {
                    role_ids: vec![set.role_id()],
                    grants: set.grants().clone(),
                },
                Some(mut current) => {
                    current.role_ids.push(set.role_id());
                    current.grants = current.grants.union(set.grants());
                    current
                }
            });
        }

        merged.unwrap_or_else(|| Self {
            role_ids: Vec::new(),
            grants: PermissionGrants {
                setting_permissions: SettingPermissionKey::all()
                    .iter()
                    .map(|setting| (*setting, false))
                    .collect(),
                ..PermissionGrants::default()
            },
        })
    }

    /// Returns record grants for one object.
    #[must_use]
    pub fn object_permissions(&self, object_metadata_id: &str) -> ObjectRecordsPermissions {
        self.grants.object_permissions(object_metadata_id)
    }

    /// Returns whether one setting can be updated.
    #[must_use]
    pub fn can_update_setting(&self, setting: SettingPermissionKey) -> bool {
        self.grants.can_update_setting(setting)
    }
}
