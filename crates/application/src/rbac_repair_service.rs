use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{RoleId, UserWorkspaceId};
use tracing::{info, warn};

use crate::WorkspacePermissionsCacheService;
use crate::rbac_ports::{RoleAssignmentRepository, RoleRepository};

/// Outcome of one workspace repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacRepairReport {
    /// Assignments removed because their role no longer exists.
    pub removed_assignments: u64,
    /// Members given the default role because they were left without roles.
    pub reassigned_members: Vec<UserWorkspaceId>,
}

/// Repairs assignment state left behind by interrupted role deletions.
#[derive(Clone)]
pub struct RbacRepairService {
    role_repository: Arc<dyn RoleRepository>,
    assignment_repository: Arc<dyn RoleAssignmentRepository>,
    permissions_cache: WorkspacePermissionsCacheService,
}

impl RbacRepairService {
    /// Creates a new repair service.
    #[must_use]
    pub fn new(
        role_repository: Arc<dyn RoleRepository>,
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        permissions_cache: WorkspacePermissionsCacheService,
    ) -> Self {
        Self {
            role_repository,
            assignment_repository,
            permissions_cache,
        }
    }

    /// Removes dangling assignments, reassigns role-less members to the
    /// default role and rebuilds the workspace cache.
    pub async fn repair_workspace(&self, workspace_id: WorkspaceId) -> AppResult<RbacRepairReport> {
        let existing_role_ids: HashSet<RoleId> = self
            .role_repository
            .list_roles(workspace_id)
            .await?
            .iter()
            .map(|role| role.id())
            .collect();

        let mut held_by_member: BTreeMap<UserWorkspaceId, (usize, usize)> = BTreeMap::new();
        let mut dangling_role_ids = BTreeSet::new();
        for assignment in self
            .assignment_repository
            .list_assignments(workspace_id)
            .await?
        {
            let counts = held_by_member
                .entry(assignment.user_workspace_id)
                .or_default();
            counts.0 += 1;
            if !existing_role_ids.contains(&assignment.role_id) {
                counts.1 += 1;
                dangling_role_ids.insert(assignment.role_id);
            }
        }

        let orphaned_members: Vec<UserWorkspaceId> = held_by_member
            .into_iter()
            .filter(|(_, (held, dangling))| *dangling > 0 && held == dangling)
            .map(|(member, _)| member)
            .collect();

        if !orphaned_members.is_empty() {
            let default_role_id = self
                .role_repository
                .default_role_id(workspace_id)
                .await?
                .filter(|role_id| existing_role_ids.contains(role_id))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "workspace '{workspace_id}' has no default role to repair members with"
                    ))
                })?;

            for member in &orphaned_members {
                self.assignment_repository
                    .assign_role(workspace_id, *member, default_role_id)
                    .await?;
            }
        }

        let mut removed_assignments = 0_u64;
        for role_id in dangling_role_ids {
            removed_assignments = removed_assignments.saturating_add(
                self.assignment_repository
                    .remove_assignments_for_role(workspace_id, role_id)
                    .await?,
            );
        }

        self.permissions_cache
            .recompute_roles_permissions_cache(workspace_id, None)
            .await?;

        if removed_assignments > 0 {
            info!(
                workspace_id = %workspace_id,
                removed_assignments,
                reassigned_members = orphaned_members.len(),
                "repaired dangling role assignments"
            );
        }

        Ok(RbacRepairReport {
            removed_assignments,
            reassigned_members: orphaned_members,
        })
    }

    /// Repairs every workspace, continuing past workspaces that fail.
    pub async fn repair_all_workspaces(&self) -> AppResult<Vec<(WorkspaceId, RbacRepairReport)>> {
        let mut reports = Vec::new();

        for workspace_id in self.role_repository.list_workspace_ids().await? {
            match self.repair_workspace(workspace_id).await {
                Ok(report) => reports.push((workspace_id, report)),
                Err(error) => warn!(
                    workspace_id = %workspace_id,
                    error = %error,
                    "workspace repair failed"
                ),
            }
        }

        Ok(reports)
    }
}
