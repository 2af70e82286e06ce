use super::*;

#[derive(Debug, FromRow)]
struct ObjectPermissionRow {
    object_metadata_id: String,
    can_read: bool,
    can_update: bool,
    can_soft_delete: bool,
    can_destroy: bool,
}

#[derive(Debug, FromRow)]
struct SettingPermissionRow {
    setting: String,
    can_update_setting: bool,
}

#[async_trait]
impl PermissionOverrideRepository for PostgresRoleRepository {
    async fn list_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        let rows = sqlx::query_as::<_, ObjectPermissionRow>(
            r#"
            SELECT object_metadata_id, can_read, can_update, can_soft_delete, can_destroy
            FROM rbac_object_permissions
            WHERE workspace_id = $1 AND role_id = $2
            ORDER BY object_metadata_id
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list object permission overrides: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                ObjectPermissionOverride::new(
                    role_id,
                    row.object_metadata_id,
                    ObjectRecordsPermissions {
                        can_read: row.can_read,
                        can_update: row.can_update,
                        can_soft_delete: row.can_soft_delete,
                        can_destroy: row.can_destroy,
                    },
                )
            })
            .collect()
    }

    async fn list_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<SettingPermissionOverride>> {
        let rows = sqlx::query_as::<_, SettingPermissionRow>(
            r#"
            SELECT setting, can_update_setting
            FROM rbac_setting_permissions
            WHERE workspace_id = $1 AND role_id = $2
            ORDER BY setting
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list setting permission overrides: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                let setting = SettingPermissionKey::from_str(row.setting.as_str()).map_err(
                    |error| {
                        AppError::Internal(format!(
                            "invalid stored setting '{}' for role '{role_id}': {error}",
                            row.setting
                        ))
                    },
                )?;

                Ok(SettingPermissionOverride {
                    role_id,
                    setting,
                    can_update_setting: row.can_update_setting,
                })
            })
            .collect()
    }

    async fn upsert_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<ObjectPermissionOverride>,
    ) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        for entry in &overrides {
            let permissions = entry.permissions();
            sqlx::query(
                r#"
                INSERT INTO rbac_object_permissions (
                    workspace_id,
                    role_id,
                    object_metadata_id,
                    can_read,
                    can_update,
                    can_soft_delete,
                    can_destroy
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (workspace_id, role_id, object_metadata_id) DO UPDATE
                SET can_read = EXCLUDED.can_read,
                    can_update = EXCLUDED.can_update,
                    can_soft_delete = EXCLUDED.can_soft_delete,
                    can_destroy = EXCLUDED.can_destroy
                "#,
            )
            .bind(workspace_id.as_uuid())
            .bind(entry.role_id().as_uuid())
            .bind(entry.object_metadata_id().as_str())
            .bind(permissions.can_read)
            .bind(permissions.can_update)
            .bind(permissions.can_soft_delete)
            .bind(permissions.can_destroy)
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_override_error(error, workspace_id, entry.role_id()))?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn upsert_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<SettingPermissionOverride>,
    ) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        for entry in &overrides {
            sqlx::query(
                r#"
                INSERT INTO rbac_setting_permissions (
                    workspace_id,
                    role_id,
                    setting,
                    can_update_setting
                )
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (workspace_id, role_id, setting) DO UPDATE
                SET can_update_setting = EXCLUDED.can_update_setting
                "#,
            )
            .bind(workspace_id.as_uuid())
            .bind(entry.role_id.as_uuid())
            .bind(entry.setting.as_str())
            .bind(entry.can_update_setting)
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_override_error(error, workspace_id, entry.role_id))?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }
}

fn map_override_error(error: sqlx::Error, workspace_id: WorkspaceId, role_id: RoleId) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23503")
    {
        return role_not_found(workspace_id, role_id);
    }

    AppError::Internal(format!("failed to upsert permission override: {error}"))
}
