mod overrides;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use tenantry_application::{PermissionOverrideRepository, RoleRepository};
use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{
    ObjectPermissionOverride, ObjectRecordsPermissions, RoleCapabilities, RoleDefinition, RoleId,
    RoleUpdate, SettingPermissionKey, SettingPermissionOverride,
};

/// PostgreSQL-backed role store holding definitions and permission overrides.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ROLE_COLUMNS: &str = r#"
    id,
    workspace_id,
    label,
    description,
    icon,
    can_update_all_settings,
    can_read_all_object_records,
    can_update_all_object_records,
    can_soft_delete_all_object_records,
    can_destroy_all_object_records,
    is_editable,
    created_at,
    updated_at
"#;

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    label: String,
    description: Option<String>,
    icon: Option<String>,
    can_update_all_settings: bool,
    can_read_all_object_records: bool,
    can_update_all_object_records: bool,
    can_soft_delete_all_object_records: bool,
    can_destroy_all_object_records: bool,
    is_editable: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for RoleDefinition {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        RoleDefinition::from_storage(
            RoleId::from_uuid(row.id),
            WorkspaceId::from_uuid(row.workspace_id),
            row.label,
            row.description,
            row.icon,
            RoleCapabilities {
                can_update_all_settings: row.can_update_all_settings,
                can_read_all_object_records: row.can_read_all_object_records,
                can_update_all_object_records: row.can_update_all_object_records,
                can_soft_delete_all_object_records: row.can_soft_delete_all_object_records,
                can_destroy_all_object_records: row.can_destroy_all_object_records,
            },
            row.is_editable,
            row.created_at,
            row.updated_at,
        )
    }
}

fn map_label_conflict(error: sqlx::Error, label: &str, action: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        if database_error.constraint() == Some("rbac_roles_workspace_label_key") {
            return AppError::DuplicateLabel(format!("a role labelled '{label}' already exists"));
        }

        return AppError::Validation(format!("role identifier is already used: {error}"));
    }

    AppError::Internal(format!("failed to {action} role: {error}"))
}

fn role_not_found(workspace_id: WorkspaceId, role_id: RoleId) -> AppError {
    AppError::NotFound(format!(
        "role '{role_id}' does not exist in workspace '{workspace_id}'"
    ))
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn find_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleDefinition>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM rbac_roles WHERE workspace_id = $1 AND id = $2"
        ))
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?;

        row.map(RoleDefinition::try_from).transpose()
    }

    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM rbac_roles WHERE workspace_id = $1 ORDER BY sequence_number"
        ))
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleDefinition::try_from).collect()
    }

    async fn create_role(&self, role: RoleDefinition) -> AppResult<RoleDefinition> {
        let capabilities = role.capabilities();

        sqlx::query(
            r#"
            INSERT INTO rbac_roles (
                id,
                workspace_id,
                label,
                description,
                icon,
                can_update_all_settings,
                can_read_all_object_records,
                can_update_all_object_records,
                can_soft_delete_all_object_records,
                can_destroy_all_object_records,
                is_editable,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.workspace_id().as_uuid())
        .bind(role.label().as_str())
        .bind(role.description())
        .bind(role.icon())
        .bind(capabilities.can_update_all_settings)
        .bind(capabilities.can_read_all_object_records)
        .bind(capabilities.can_update_all_object_records)
        .bind(capabilities.can_soft_delete_all_object_records)
        .bind(capabilities.can_destroy_all_object_records)
        .bind(role.is_editable())
        .bind(role.created_at())
        .bind(role.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| map_label_conflict(error, role.label().as_str(), "create"))?;

        Ok(role)
    }

    async fn update_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<RoleDefinition> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let existing = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM rbac_roles WHERE workspace_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?
        .ok_or_else(|| role_not_found(workspace_id, role_id))?;

        let updated = RoleDefinition::try_from(existing)?.with_update(&update, Utc::now())?;
        let capabilities = updated.capabilities();

        sqlx::query(
            r#"
            UPDATE rbac_roles
            SET label = $3,
                description = $4,
                icon = $5,
                can_update_all_settings = $6,
                can_read_all_object_records = $7,
                can_update_all_object_records = $8,
                can_soft_delete_all_object_records = $9,
                can_destroy_all_object_records = $10,
                updated_at = $11
            WHERE workspace_id = $1 AND id = $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(updated.label().as_str())
        .bind(updated.description())
        .bind(updated.icon())
        .bind(capabilities.can_update_all_settings)
        .bind(capabilities.can_read_all_object_records)
        .bind(capabilities.can_update_all_object_records)
        .bind(capabilities.can_soft_delete_all_object_records)
        .bind(capabilities.can_destroy_all_object_records)
        .bind(updated.updated_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_label_conflict(error, updated.label().as_str(), "update"))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(updated)
    }

    async fn delete_role(&self, workspace_id: WorkspaceId, role_id: RoleId) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let default_role_id = sqlx::query_scalar::<_, Option<uuid::Uuid>>(
            r#"
            SELECT default_role_id
            FROM rbac_workspace_settings
            WHERE workspace_id = $1
            FOR UPDATE
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read default role: {error}")))?
        .flatten();

        if default_role_id == Some(role_id.as_uuid()) {
            return Err(AppError::IsDefaultRole(format!(
                "role '{role_id}' is the default role of workspace '{workspace_id}'"
            )));
        }

        let is_editable = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT is_editable
            FROM rbac_roles
            WHERE workspace_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?
        .ok_or_else(|| role_not_found(workspace_id, role_id))?;

        if !is_editable {
            return Err(AppError::NotEditable(format!(
                "role '{role_id}' is a system role and cannot be deleted"
            )));
        }

        sqlx::query(
            r#"
            DELETE FROM rbac_roles
            WHERE workspace_id = $1 AND id = $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn default_role_id(&self, workspace_id: WorkspaceId) -> AppResult<Option<RoleId>> {
        let default_role_id = sqlx::query_scalar::<_, Option<uuid::Uuid>>(
            r#"
            SELECT default_role_id
            FROM rbac_workspace_settings
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read default role: {error}")))?
        .flatten();

        Ok(default_role_id.map(RoleId::from_uuid))
    }

    async fn set_default_role_id(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rbac_workspace_settings (workspace_id, default_role_id)
            VALUES ($1, $2)
            ON CONFLICT (workspace_id) DO UPDATE
            SET default_role_id = EXCLUDED.default_role_id
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23503")
            {
                return role_not_found(workspace_id, role_id);
            }

            AppError::Internal(format!("failed to set default role: {error}"))
        })?;

        Ok(())
    }

    async fn list_workspace_ids(&self) -> AppResult<Vec<WorkspaceId>> {
        let workspace_ids = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT DISTINCT workspace_id
            FROM rbac_roles
            ORDER BY workspace_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list workspaces: {error}")))?;

        Ok(workspace_ids
            .into_iter()
            .map(WorkspaceId::from_uuid)
            .collect())
    }
}
