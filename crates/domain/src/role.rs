use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantry_core::{AppError, AppResult, NonEmptyString, WorkspaceId};
use uuid::Uuid;

/// Unique identifier for a role, scoped to one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of one user's membership in one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserWorkspaceId(Uuid);

impl UserWorkspaceId {
    /// Creates a new random membership identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a membership identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserWorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserWorkspaceId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The five coarse "all records" capability flags carried by every role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleCapabilities {
    /// Grants update access to every workspace setting.
    pub can_update_all_settings: bool,
    /// Grants read access to records of every object.
    pub can_read_all_object_records: bool,
    /// Grants update access to records of every object.
    pub can_update_all_object_records: bool,
    /// Grants soft-delete access to records of every object.
    pub can_soft_delete_all_object_records: bool,
    /// Grants hard-delete access to records of every object.
    pub can_destroy_all_object_records: bool,
}

impl RoleCapabilities {
    /// Returns whether the flags amount to workspace administration.
    #[must_use]
    pub fn has_administrative_capability(&self) -> bool {
        self.can_update_all_settings
    }
}

/// Built-in roles provisioned for every workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInRole {
    /// Full administrative access.
    Admin,
    /// Full record access without settings.
    Member,
    /// Read-only record access.
    Guest,
}

impl BuiltInRole {
    /// Returns all built-in roles in provisioning order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Admin, Self::Member, Self::Guest]
    }

    /// Returns the stable role label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Member => "Member",
            Self::Guest => "Guest",
        }
    }

    /// Returns the role description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Admin role",
            Self::Member => "Member role",
            Self::Guest => "Guest role",
        }
    }

    /// Returns the role icon name.
    #[must_use]
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Admin => "IconUserCog",
            Self::Member | Self::Guest => "IconUser",
        }
    }

    /// Returns the fixed capability template of the role.
    #[must_use]
    pub fn capabilities(&self) -> RoleCapabilities {
        match self {
            Self::Admin => RoleCapabilities {
                can_update_all_settings: true,
                can_read_all_object_records: true,
                can_update_all_object_records: true,
                can_soft_delete_all_object_records: true,
                can_destroy_all_object_records: true,
            },
            Self::Member => RoleCapabilities {
                can_update_all_settings: false,
                can_read_all_object_records: true,
                can_update_all_object_records: true,
                can_soft_delete_all_object_records: true,
                can_destroy_all_object_records: true,
            },
            Self::Guest => RoleCapabilities {
                can_update_all_settings: false,
                can_read_all_object_records: true,
                can_update_all_object_records: false,
                can_soft_delete_all_object_records: false,
                can_destroy_all_object_records: false,
            },
        }
    }
}

/// Partial update applied to an editable role. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    /// New label.
    pub label: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New icon.
    pub icon: Option<String>,
    /// New settings flag.
    pub can_update_all_settings: Option<bool>,
    /// New read flag.
    pub can_read_all_object_records: Option<bool>,
    /// New update flag.
    pub can_update_all_object_records: Option<bool>,
    /// New soft-delete flag.
    pub can_soft_delete_all_object_records: Option<bool>,
    /// New destroy flag.
    pub can_destroy_all_object_records: Option<bool>,
}

/// Workspace-scoped role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    id: RoleId,
    workspace_id: WorkspaceId,
    label: NonEmptyString,
    description: Option<String>,
    icon: Option<String>,
    capabilities: RoleCapabilities,
    is_editable: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleDefinition {
    /// Creates an editable custom role.
    pub fn new_custom(
        id: RoleId,
        workspace_id: WorkspaceId,
        label: impl Into<String>,
        description: Option<String>,
        icon: Option<String>,
        capabilities: RoleCapabilities,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            workspace_id,
            label: NonEmptyString::new(label)?,
            description,
            icon,
            capabilities,
            is_editable: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Creates a non-editable built-in role from its fixed template.
    pub fn new_built_in(
        kind: BuiltInRole,
        id: RoleId,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            workspace_id,
            label: NonEmptyString::new(kind.label())?,
            description: Some(kind.description().to_owned()),
            icon: Some(kind.icon().to_owned()),
            capabilities: kind.capabilities(),
            is_editable: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a role from persisted values.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: RoleId,
        workspace_id: WorkspaceId,
        label: impl Into<String>,
        description: Option<String>,
        icon: Option<String>,
        capabilities: RoleCapabilities,
        is_editable: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            workspace_id,
            label: NonEmptyString::new(label)?,
            description,
            icon,
            capabilities,
            is_editable,
            created_at,
            updated_at,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the owning workspace.
    #[must_use]
    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the workspace-unique label.
    #[must_use]
    pub fn label(&self) -> &NonEmptyString {
        &self.label
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the optional icon name.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Returns the coarse capability flags.
    #[must_use]
    pub fn capabilities(&self) -> RoleCapabilities {
        self.capabilities
    }

    /// Returns false for system roles.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.is_editable
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether holders of this role administer the workspace.
    #[must_use]
    pub fn has_administrative_capability(&self) -> bool {
        self.capabilities.has_administrative_capability()
    }

    /// Returns whether this role matches the given built-in template.
    #[must_use]
    pub fn is_built_in(&self, kind: BuiltInRole) -> bool {
        !self.is_editable && self.label.as_str() == kind.label()
    }

    /// Returns a copy with the update merged in.
    ///
    /// System roles reject every update, including empty ones.
    pub fn with_update(&self, update: &RoleUpdate, now: DateTime<Utc>) -> AppResult<Self> {
        if !self.is_editable {
            return Err(AppError::NotEditable(format!(
                "role '{}' is a system role and cannot be updated",
                self.label
            )));
        }

        let label = match &update.label {
            Some(label) => NonEmptyString::new(label.clone())?,
            None => self.label.clone(),
        };
        let current = self.capabilities;

        Ok(Self {
            id: self.id,
            workspace_id: self.workspace_id,
            label,
            description: update
                .description
                .clone()
                .or_else(|| self.description.clone()),
            icon: update.icon.clone().or_else(|| self.icon.clone()),
            capabilities: RoleCapabilities {
                can_update_all_settings: update
                    .can_update_all_settings
                    .unwrap_or(current.can_update_all_settings),
                can_read_all_object_records: update
                    .can_read_all_object_records
                    .unwrap_or(current.can_read_all_object_records),
                can_update_all_object_records: update
                    .can_update_all_object_records
                    .unwrap_or(current.can_update_all_object_records),
                can_soft_delete_all_object_records: update
                    .can_soft_delete_all_object_records
                    .unwrap_or(current.can_soft_delete_all_object_records),
                can_destroy_all_object_records: update
                    .can_destroy_all_object_records
                    .unwrap_or(current.can_destroy_all_object_records),
            },
            is_editable: true,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}
