use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use tenantry_application::{RoleAssignment, RoleAssignmentRepository};
use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{RoleId, UserWorkspaceId};

/// PostgreSQL-backed assignment store.
///
/// Guarded removals lock every assignment row of the workspace before checking
/// that an administrator remains.
#[derive(Clone)]
pub struct PostgresRoleAssignmentRepository {
    pool: PgPool,
}

impl PostgresRoleAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'_, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_workspace_id: uuid::Uuid,
    role_id: uuid::Uuid,
    assigned_at: DateTime<Utc>,
}

impl AssignmentRow {
    fn into_assignment(self, workspace_id: WorkspaceId) -> RoleAssignment {
        RoleAssignment {
            workspace_id,
            user_workspace_id: UserWorkspaceId::from_uuid(self.user_workspace_id),
            role_id: RoleId::from_uuid(self.role_id),
            assigned_at: self.assigned_at,
        }
    }
}

async fn lock_workspace_assignments(
    transaction: &mut Transaction<'_, Postgres>,
    workspace_id: WorkspaceId,
) -> AppResult<Vec<AssignmentRow>> {
    sqlx::query_as::<_, AssignmentRow>(
        r#"
        SELECT user_workspace_id, role_id, assigned_at
        FROM rbac_user_workspace_roles
        WHERE workspace_id = $1
        ORDER BY sequence_number
        FOR UPDATE
        "#,
    )
    .bind(workspace_id.as_uuid())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock role assignments: {error}")))
}

fn administrator_remains(
    rows: &[AssignmentRow],
    administrative_role_ids: &[RoleId],
    removed: impl Fn(&AssignmentRow) -> bool,
) -> bool {
    rows.iter().any(|row| {
        !removed(row) && administrative_role_ids.contains(&RoleId::from_uuid(row.role_id))
    })
}

fn last_admin_error(workspace_id: WorkspaceId, user_workspace_id: UserWorkspaceId) -> AppError {
    AppError::LastAdminRemoval(format!(
        "member '{user_workspace_id}' is the last administrator of workspace '{workspace_id}'"
    ))
}

#[async_trait]
impl RoleAssignmentRepository for PostgresRoleAssignmentRepository {
    async fn assign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rbac_user_workspace_roles (workspace_id, user_workspace_id, role_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (workspace_id, user_workspace_id, role_id) DO NOTHING
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(user_workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        Ok(())
    }

    async fn unassign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        let rows = lock_workspace_assignments(&mut transaction, workspace_id).await?;
        let is_target = |row: &AssignmentRow| {
            row.user_workspace_id == user_workspace_id.as_uuid()
                && row.role_id == role_id.as_uuid()
        };

        if !rows.iter().any(is_target) {
            return Err(AppError::NotFound(format!(
                "member '{user_workspace_id}' does not hold role '{role_id}' in workspace '{workspace_id}'"
            )));
        }

        if administrative_role_ids.contains(&role_id)
            && !administrator_remains(&rows, administrative_role_ids, is_target)
        {
            return Err(last_admin_error(workspace_id, user_workspace_id));
        }

        sqlx::query(
            r#"
            DELETE FROM rbac_user_workspace_roles
            WHERE workspace_id = $1
                AND user_workspace_id = $2
                AND role_id = $3
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(user_workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unassign role: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn replace_roles(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        let rows = lock_workspace_assignments(&mut transaction, workspace_id).await?;
        let held_by_member =
            |row: &AssignmentRow| row.user_workspace_id == user_workspace_id.as_uuid();

        let was_administrator = rows.iter().any(|row| {
            held_by_member(row)
                && administrative_role_ids.contains(&RoleId::from_uuid(row.role_id))
        });
        if was_administrator
            && !administrative_role_ids.contains(&role_id)
            && !administrator_remains(&rows, administrative_role_ids, held_by_member)
        {
            return Err(last_admin_error(workspace_id, user_workspace_id));
        }

        sqlx::query(
            r#"
            DELETE FROM rbac_user_workspace_roles
            WHERE workspace_id = $1 AND user_workspace_id = $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(user_workspace_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear member roles: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO rbac_user_workspace_roles (workspace_id, user_workspace_id, role_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(user_workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn roles_for(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
    ) -> AppResult<Vec<RoleId>> {
        let role_ids = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT role_id
            FROM rbac_user_workspace_roles
            WHERE workspace_id = $1 AND user_workspace_id = $2
            ORDER BY sequence_number
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(user_workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list member roles: {error}")))?;

        Ok(role_ids.into_iter().map(RoleId::from_uuid).collect())
    }

    async fn members_for(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<UserWorkspaceId>> {
        let member_ids = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT user_workspace_id
            FROM rbac_user_workspace_roles
            WHERE workspace_id = $1 AND role_id = $2
            ORDER BY sequence_number
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role members: {error}")))?;

        Ok(member_ids
            .into_iter()
            .map(UserWorkspaceId::from_uuid)
            .collect())
    }

    async fn list_assignments(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT user_workspace_id, role_id, assigned_at
            FROM rbac_user_workspace_roles
            WHERE workspace_id = $1
            ORDER BY sequence_number
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role assignments: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_assignment(workspace_id))
            .collect())
    }

    async fn remove_assignments_for_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM rbac_user_workspace_roles
            WHERE workspace_id = $1 AND role_id = $2
            "#,
        )
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove role assignments: {error}"))
        })?
        .rows_affected();

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests;
