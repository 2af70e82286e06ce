use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tenantry_application::{RoleAssignment, RoleAssignmentRepository};
use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{RoleId, UserWorkspaceId};
use tokio::sync::RwLock;

/// In-memory assignment store.
///
/// The administrator guard and the mutation it protects run under one write lock.
#[derive(Debug, Default)]
pub struct InMemoryRoleAssignmentRepository {
    assignments: RwLock<HashMap<WorkspaceId, Vec<RoleAssignment>>>,
}

impl InMemoryRoleAssignmentRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns whether someone keeps an administrative role once `removed` is gone.
fn administrator_remains(
    assignments: &[RoleAssignment],
    administrative_role_ids: &[RoleId],
    removed: impl Fn(&RoleAssignment) -> bool,
) -> bool {
    assignments.iter().any(|assignment| {
        !removed(assignment) && administrative_role_ids.contains(&assignment.role_id)
    })
}

fn last_admin_error(workspace_id: WorkspaceId, user_workspace_id: UserWorkspaceId) -> AppError {
    AppError::LastAdminRemoval(format!(
        "member '{user_workspace_id}' is the last administrator of workspace '{workspace_id}'"
    ))
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryRoleAssignmentRepository {
    async fn assign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let mut assignments = self.assignments.write().await;
        let workspace = assignments.entry(workspace_id).or_default();

        if !workspace.iter().any(|assignment| {
            assignment.user_workspace_id == user_workspace_id && assignment.role_id == role_id
        }) {
            workspace.push(RoleAssignment {
                workspace_id,
                user_workspace_id,
                role_id,
                assigned_at: Utc::now(),
            });
        }

        Ok(())
    }

    async fn unassign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut assignments = self.assignments.write().await;
        let workspace = assignments.entry(workspace_id).or_default();
        let is_target = |assignment: &RoleAssignment| {
            assignment.user_workspace_id == user_workspace_id && assignment.role_id == role_id
        };

        if !workspace.iter().any(is_target) {
            return Err(AppError::NotFound(format!(
                "member '{user_workspace_id}' does not hold role '{role_id}' in workspace '{workspace_id}'"
            )));
        }

        if administrative_role_ids.contains(&role_id)
            && !administrator_remains(workspace, administrative_role_ids, is_target)
        {
            return Err(last_admin_error(workspace_id, user_workspace_id));
        }

        workspace.retain(|assignment| !is_target(assignment));
        Ok(())
    }

    async fn replace_roles(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut assignments = self.assignments.write().await;
        let workspace = assignments.entry(workspace_id).or_default();
        let held_by_member =
            |assignment: &RoleAssignment| assignment.user_workspace_id == user_workspace_id;

        let was_administrator = workspace.iter().any(|assignment| {
            held_by_member(assignment) && administrative_role_ids.contains(&assignment.role_id)
        });
        if was_administrator
            && !administrative_role_ids.contains(&role_id)
            && !administrator_remains(workspace, administrative_role_ids, held_by_member)
        {
            return Err(last_admin_error(workspace_id, user_workspace_id));
        }

        workspace.retain(|assignment| !held_by_member(assignment));
        workspace.push(RoleAssignment {
            workspace_id,
            user_workspace_id,
            role_id,
            assigned_at: Utc::now(),
        });

        Ok(())
    }

    async fn roles_for(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
    ) -> AppResult<Vec<RoleId>> {
        Ok(self
            .assignments
            .read()
            .await
            .get(&workspace_id)
            .map(|workspace| {
                workspace
                    .iter()
                    .filter(|assignment| assignment.user_workspace_id == user_workspace_id)
                    .map(|assignment| assignment.role_id)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn members_for(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<UserWorkspaceId>> {
        Ok(self
            .assignments
            .read()
            .await
            .get(&workspace_id)
            .map(|workspace| {
                workspace
                    .iter()
                    .filter(|assignment| assignment.role_id == role_id)
                    .map(|assignment| assignment.user_workspace_id)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_assignments(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .read()
            .await
            .get(&workspace_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_assignments_for_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let mut assignments = self.assignments.write().await;
        let Some(workspace) = assignments.get_mut(&workspace_id) else {
            return Ok(0);
        };

        let before = workspace.len();
        workspace.retain(|assignment| assignment.role_id != role_id);

        Ok(u64::try_from(before - workspace.len()).unwrap_or(u64::MAX))
    }
}
