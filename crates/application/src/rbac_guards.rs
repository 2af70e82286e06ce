use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{RoleDefinition, RoleId};

use crate::rbac_ports::{RoleAssignmentRepository, RoleRepository};

pub(crate) async fn require_role(
    role_repository: &dyn RoleRepository,
    workspace_id: WorkspaceId,
    role_id: RoleId,
) -> AppResult<RoleDefinition> {
    role_repository
        .find_role(workspace_id, role_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "role '{role_id}' does not exist in workspace '{workspace_id}'"
            ))
        })
}

pub(crate) async fn administrative_role_ids(
    role_repository: &dyn RoleRepository,
    workspace_id: WorkspaceId,
) -> AppResult<Vec<RoleId>> {
    Ok(role_repository
        .list_roles(workspace_id)
        .await?
        .iter()
        .filter(|role| role.has_administrative_capability())
        .map(RoleDefinition::id)
        .collect())
}

/// Returns whether some member keeps an administrative role other than `excluded_role_id`.
pub(crate) async fn administrator_remains_without_role(
    role_repository: &dyn RoleRepository,
    assignment_repository: &dyn RoleAssignmentRepository,
    workspace_id: WorkspaceId,
    excluded_role_id: RoleId,
) -> AppResult<bool> {
    let administrative_role_ids = administrative_role_ids(role_repository, workspace_id).await?;

    Ok(assignment_repository
        .list_assignments(workspace_id)
        .await?
        .iter()
        .any(|assignment| {
            assignment.role_id != excluded_role_id
                && administrative_role_ids.contains(&assignment.role_id)
        }))
}
