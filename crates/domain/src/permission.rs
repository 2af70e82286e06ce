use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tenantry_core::{AppError, AppResult, NonEmptyString};

use crate::RoleId;

/// Workspace settings that can be granted individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingPermissionKey {
    /// API keys and webhooks administration.
    ApiKeysAndWebhooks,
    /// General workspace settings.
    Workspace,
    /// Workspace member administration.
    WorkspaceMembers,
    /// Role administration.
    Roles,
    /// Data model administration.
    DataModel,
    /// Security settings.
    Security,
    /// Workflow administration.
    Workflows,
}

impl SettingPermissionKey {
    /// Returns a stable storage value for this setting.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKeysAndWebhooks => "api_keys_and_webhooks",
            Self::Workspace => "workspace",
            Self::WorkspaceMembers => "workspace_members",
            Self::Roles => "roles",
            Self::DataModel => "data_model",
            Self::Security => "security",
            Self::Workflows => "workflows",
        }
    }

    /// Returns all known settings.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[SettingPermissionKey] = &[
            SettingPermissionKey::ApiKeysAndWebhooks,
            SettingPermissionKey::Workspace,
            SettingPermissionKey::WorkspaceMembers,
            SettingPermissionKey::Roles,
            SettingPermissionKey::DataModel,
            SettingPermissionKey::Security,
            SettingPermissionKey::Workflows,
        ];

        ALL
    }
}

impl FromStr for SettingPermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "api_keys_and_webhooks" => Ok(Self::ApiKeysAndWebhooks),
            "workspace" => Ok(Self::Workspace),
            "workspace_members" => Ok(Self::WorkspaceMembers),
            "roles" => Ok(Self::Roles),
            "data_model" => Ok(Self::DataModel),
            "security" => Ok(Self::Security),
            "workflows" => Ok(Self::Workflows),
            _ => Err(AppError::Validation(format!(
                "unknown setting permission value '{value}'"
            ))),
        }
    }
}

/// Record-level grants on one object (or on every object, as a default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRecordsPermissions {
    /// Read records.
    pub can_read: bool,
    /// Update records.
    pub can_update: bool,
    /// Soft-delete records.
    pub can_soft_delete: bool,
    /// Permanently delete records.
    pub can_destroy: bool,
}

impl ObjectRecordsPermissions {
    /// Returns the per-flag logical OR of two grants.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            can_read: self.can_read || other.can_read,
            can_update: self.can_update || other.can_update,
            can_soft_delete: self.can_soft_delete || other.can_soft_delete,
            can_destroy: self.can_destroy || other.can_destroy,
        }
    }
}

/// Point exception replacing a role's coarse record grants for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPermissionOverride {
    role_id: RoleId,
    object_metadata_id: NonEmptyString,
    permissions: ObjectRecordsPermissions,
}

impl ObjectPermissionOverride {
    /// Creates an override for one object.
    pub fn new(
        role_id: RoleId,
        object_metadata_id: impl Into<String>,
        permissions: ObjectRecordsPermissions,
    ) -> AppResult<Self> {
        Ok(Self {
            role_id,
            object_metadata_id: NonEmptyString::new(object_metadata_id)?,
            permissions,
        })
    }

    /// Returns the role owning the override.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the targeted object identifier.
    #[must_use]
    pub fn object_metadata_id(&self) -> &NonEmptyString {
        &self.object_metadata_id
    }

    /// Returns the granted record permissions.
    #[must_use]
    pub fn permissions(&self) -> ObjectRecordsPermissions {
        self.permissions
    }
}

/// Point exception replacing a role's coarse settings grant for one setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingPermissionOverride {
    /// Role owning the override.
    pub role_id: RoleId,
    /// Targeted setting.
    pub setting: SettingPermissionKey,
    /// Whether the setting can be updated.
    pub can_update_setting: bool,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ObjectPermissionOverride, ObjectRecordsPermissions, SettingPermissionKey};
    use crate::RoleId;

    #[test]
    fn every_setting_parses_from_its_storage_value() {
        for setting in SettingPermissionKey::all() {
            let parsed = SettingPermissionKey::from_str(setting.as_str());
            assert!(matches!(parsed, Ok(value) if value == *setting));
        }
    }

    #[test]
    fn unknown_setting_is_rejected() {
        assert!(SettingPermissionKey::from_str("billing").is_err());
    }

    #[test]
    fn union_grants_any_flag_granted_by_either_side() {
        let read_only = ObjectRecordsPermissions {
            can_read: true,
            ..ObjectRecordsPermissions::default()
        };
        let destroy_only = ObjectRecordsPermissions {
            can_destroy: true,
            ..ObjectRecordsPermissions::default()
        };

        let merged = read_only.union(destroy_only);
        assert!(merged.can_read && merged.can_destroy);
        assert!(!merged.can_update && !merged.can_soft_delete);
    }

    #[test]
    fn override_requires_object_identifier() {
        let result =
            ObjectPermissionOverride::new(RoleId::new(), " ", ObjectRecordsPermissions::default());
        assert!(result.is_err());
    }
}
