use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use tenantry_core::{AppError, AppResult, WorkspaceId};
use tenantry_domain::{
    ObjectPermissionOverride, ResolvedPermissionSet, RoleDefinition, RoleId, RoleUpdate,
    SettingPermissionOverride, UserWorkspaceId,
};

use crate::rbac_ports::{
    PermissionOverrideRepository, PermissionsCache, RoleAssignment, RoleAssignmentRepository,
    RoleRepository,
};
use crate::{
    AuthorizationService, RbacRepairService, RoleService, UserRoleService,
    WorkspacePermissionsCacheService,
};

#[derive(Default)]
pub(crate) struct FakeRoleStore {
    pub(crate) roles: Mutex<Vec<RoleDefinition>>,
    pub(crate) object_overrides: Mutex<Vec<(WorkspaceId, ObjectPermissionOverride)>>,
    pub(crate) setting_overrides: Mutex<Vec<(WorkspaceId, SettingPermissionOverride)>>,
    pub(crate) default_roles: Mutex<HashMap<WorkspaceId, RoleId>>,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_deletes: AtomicBool,
}

impl FakeRoleStore {
    fn check_reads(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("role store unavailable".to_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl RoleRepository for FakeRoleStore {
    async fn find_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleDefinition>> {
        self.check_reads()?;
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.workspace_id() == workspace_id && role.id() == role_id)
            .cloned())
    }

    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleDefinition>> {
        self.check_reads()?;
        tokio::task::yield_now().await;
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .filter(|role| role.workspace_id() == workspace_id)
            .cloned()
            .collect())
    }

    async fn create_role(&self, role: RoleDefinition) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.lock().await;
        if roles.iter().any(|stored| {
            stored.workspace_id() == role.workspace_id() && stored.label() == role.label()
        }) {
            return Err(AppError::DuplicateLabel(role.label().to_string()));
        }
        roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.lock().await;
        let Some(index) = roles
            .iter()
            .position(|role| role.workspace_id() == workspace_id && role.id() == role_id)
        else {
            return Err(AppError::NotFound(role_id.to_string()));
        };

        let updated = roles[index].with_update(&update, Utc::now())?;
        if roles.iter().any(|role| {
            role.workspace_id() == workspace_id
                && role.id() != role_id
                && role.label() == updated.label()
        }) {
            return Err(AppError::DuplicateLabel(updated.label().to_string()));
        }

        roles[index] = updated.clone();
        Ok(updated)
    }

    async fn delete_role(&self, workspace_id: WorkspaceId, role_id: RoleId) -> AppResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("role store unavailable".to_owned()));
        }

        if self.default_roles.lock().await.get(&workspace_id) == Some(&role_id) {
            return Err(AppError::IsDefaultRole(role_id.to_string()));
        }

        let mut roles = self.roles.lock().await;
        if roles.iter().any(|role| {
            role.workspace_id() == workspace_id && role.id() == role_id && !role.is_editable()
        }) {
            return Err(AppError::NotEditable(role_id.to_string()));
        }
        roles.retain(|role| !(role.workspace_id() == workspace_id && role.id() == role_id));
        drop(roles);

        self.object_overrides
            .lock()
            .await
            .retain(|(stored_workspace_id, stored)| {
                !(*stored_workspace_id == workspace_id && stored.role_id() == role_id)
            });
        self.setting_overrides
            .lock()
            .await
            .retain(|(stored_workspace_id, stored)| {
                !(*stored_workspace_id == workspace_id && stored.role_id == role_id)
            });
        Ok(())
    }

    async fn default_role_id(&self, workspace_id: WorkspaceId) -> AppResult<Option<RoleId>> {
        Ok(self.default_roles.lock().await.get(&workspace_id).copied())
    }

    async fn set_default_role_id(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.default_roles.lock().await.insert(workspace_id, role_id);
        Ok(())
    }

    async fn list_workspace_ids(&self) -> AppResult<Vec<WorkspaceId>> {
        let mut workspace_ids: Vec<WorkspaceId> = self
            .roles
            .lock()
            .await
            .iter()
            .map(RoleDefinition::workspace_id)
            .collect();
        workspace_ids.sort();
        workspace_ids.dedup();
        Ok(workspace_ids)
    }
}

#[async_trait]
impl PermissionOverrideRepository for FakeRoleStore {
    async fn list_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        self.check_reads()?;
        Ok(self
            .object_overrides
            .lock()
            .await
            .iter()
            .filter(|(stored_workspace_id, stored)| {
                *stored_workspace_id == workspace_id && stored.role_id() == role_id
            })
            .map(|(_, stored)| stored.clone())
            .collect())
    }

    async fn list_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<SettingPermissionOverride>> {
        self.check_reads()?;
        Ok(self
            .setting_overrides
            .lock()
            .await
            .iter()
            .filter(|(stored_workspace_id, stored)| {
                *stored_workspace_id == workspace_id && stored.role_id == role_id
            })
            .map(|(_, stored)| *stored)
            .collect())
    }

    async fn upsert_object_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<ObjectPermissionOverride>,
    ) -> AppResult<()> {
        let mut stored = self.object_overrides.lock().await;
        for entry in overrides {
            stored.retain(|(stored_workspace_id, existing)| {
                !(*stored_workspace_id == workspace_id
                    && existing.role_id() == entry.role_id()
                    && existing.object_metadata_id() == entry.object_metadata_id())
            });
            stored.push((workspace_id, entry));
        }
        Ok(())
    }

    async fn upsert_setting_permission_overrides(
        &self,
        workspace_id: WorkspaceId,
        overrides: Vec<SettingPermissionOverride>,
    ) -> AppResult<()> {
        let mut stored = self.setting_overrides.lock().await;
        for entry in overrides {
            stored.retain(|(stored_workspace_id, existing)| {
                !(*stored_workspace_id == workspace_id
                    && existing.role_id == entry.role_id
                    && existing.setting == entry.setting)
            });
            stored.push((workspace_id, entry));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAssignmentStore {
    pub(crate) assignments: Mutex<Vec<RoleAssignment>>,
}

impl FakeAssignmentStore {
    fn administrator_remains(
        assignments: &[RoleAssignment],
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        administrative_role_ids: &[RoleId],
    ) -> bool {
        assignments.iter().any(|assignment| {
            assignment.workspace_id == workspace_id
                && assignment.user_workspace_id != user_workspace_id
                && administrative_role_ids.contains(&assignment.role_id)
        })
    }

    fn holds(
        assignments: &[RoleAssignment],
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> bool {
        assignments.iter().any(|assignment| {
            assignment.workspace_id == workspace_id
                && assignment.user_workspace_id == user_workspace_id
                && assignment.role_id == role_id
        })
    }
}

#[async_trait]
impl RoleAssignmentRepository for FakeAssignmentStore {
    async fn assign_role(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        if !Self::holds(&assignments, workspace_id, user_workspace_id, role_id) {
            assignments.push(RoleAssignment {
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
        let mut assignments = self.assignments.lock().await;
        if !Self::holds(&assignments, workspace_id, user_workspace_id, role_id) {
            return Err(AppError::NotFound(role_id.to_string()));
        }

        let keeps_other_admin_role = assignments.iter().any(|assignment| {
            assignment.workspace_id == workspace_id
                && assignment.user_workspace_id == user_workspace_id
                && assignment.role_id != role_id
                && administrative_role_ids.contains(&assignment.role_id)
        });
        if administrative_role_ids.contains(&role_id)
            && !keeps_other_admin_role
            && !Self::administrator_remains(
                &assignments,
                workspace_id,
                user_workspace_id,
                administrative_role_ids,
            )
        {
            return Err(AppError::LastAdminRemoval(user_workspace_id.to_string()));
        }

        assignments.retain(|assignment| {
            !(assignment.workspace_id == workspace_id
                && assignment.user_workspace_id == user_workspace_id
                && assignment.role_id == role_id)
        });
        Ok(())
    }

    async fn replace_roles(
        &self,
        workspace_id: WorkspaceId,
        user_workspace_id: UserWorkspaceId,
        role_id: RoleId,
        administrative_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        let was_admin = assignments.iter().any(|assignment| {
            assignment.workspace_id == workspace_id
                && assignment.user_workspace_id == user_workspace_id
                && administrative_role_ids.contains(&assignment.role_id)
        });
        if was_admin
            && !administrative_role_ids.contains(&role_id)
            && !Self::administrator_remains(
                &assignments,
                workspace_id,
                user_workspace_id,
                administrative_role_ids,
            )
        {
            return Err(AppError::LastAdminRemoval(user_workspace_id.to_string()));
        }

        assignments.retain(|assignment| {
            !(assignment.workspace_id == workspace_id
                && assignment.user_workspace_id == user_workspace_id)
        });
        assignments.push(RoleAssignment {
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
            .lock()
            .await
            .iter()
            .filter(|assignment| {
                assignment.workspace_id == workspace_id
                    && assignment.user_workspace_id == user_workspace_id
            })
            .map(|assignment| assignment.role_id)
            .collect())
    }

    async fn members_for(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Vec<UserWorkspaceId>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| {
                assignment.workspace_id == workspace_id && assignment.role_id == role_id
            })
            .map(|assignment| assignment.user_workspace_id)
            .collect())
    }

    async fn list_assignments(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn remove_assignments_for_role(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let mut assignments = self.assignments.lock().await;
        let before = assignments.len();
        assignments.retain(|assignment| {
            !(assignment.workspace_id == workspace_id && assignment.role_id == role_id)
        });
        Ok(u64::try_from(before - assignments.len()).unwrap_or(u64::MAX))
    }
}

#[derive(Default)]
pub(crate) struct FakePermissionsCache {
    pub(crate) entries: Mutex<HashMap<(WorkspaceId, RoleId), Arc<ResolvedPermissionSet>>>,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) puts: AtomicUsize,
}

impl FakePermissionsCache {
    fn check_writes(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache unavailable".to_owned()));
        }

        Ok(())
    }

    pub(crate) async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub(crate) async fn contains(&self, workspace_id: WorkspaceId, role_id: RoleId) -> bool {
        self.entries
            .lock()
            .await
            .contains_key(&(workspace_id, role_id))
    }
}

#[async_trait]
impl PermissionsCache for FakePermissionsCache {
    async fn get(
        &self,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<Option<Arc<ResolvedPermissionSet>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache unavailable".to_owned()));
        }

        Ok(self
            .entries
            .lock()
            .await
            .get(&(workspace_id, role_id))
            .cloned())
    }

    async fn put(&self, permissions: Arc<ResolvedPermissionSet>) -> AppResult<()> {
        self.check_writes()?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().await.insert(
            (permissions.workspace_id(), permissions.role_id()),
            permissions,
        );
        Ok(())
    }

    async fn replace_workspace(
        &self,
        workspace_id: WorkspaceId,
        permissions: Vec<Arc<ResolvedPermissionSet>>,
    ) -> AppResult<()> {
        self.check_writes()?;
        let mut entries = self.entries.lock().await;
        entries.retain(|(stored_workspace_id, _), _| *stored_workspace_id != workspace_id);
        for entry in permissions {
            entries.insert((workspace_id, entry.role_id()), entry);
        }
        Ok(())
    }

    async fn invalidate(&self, workspace_id: WorkspaceId, role_ids: &[RoleId]) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        for role_id in role_ids {
            entries.remove(&(workspace_id, *role_id));
        }
        Ok(())
    }

    async fn invalidate_workspace(&self, workspace_id: WorkspaceId) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .retain(|(stored_workspace_id, _), _| *stored_workspace_id != workspace_id);
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) roles: Arc<FakeRoleStore>,
    pub(crate) assignments: Arc<FakeAssignmentStore>,
    pub(crate) cache: Arc<FakePermissionsCache>,
    pub(crate) permissions_cache: WorkspacePermissionsCacheService,
    pub(crate) role_service: RoleService,
    pub(crate) user_role_service: UserRoleService,
    pub(crate) authorization_service: AuthorizationService,
    pub(crate) repair_service: RbacRepairService,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let roles = Arc::new(FakeRoleStore::default());
        let assignments = Arc::new(FakeAssignmentStore::default());
        let cache = Arc::new(FakePermissionsCache::default());

        let permissions_cache =
            WorkspacePermissionsCacheService::new(roles.clone(), roles.clone(), cache.clone());
        let role_service = RoleService::new(
            roles.clone(),
            roles.clone(),
            assignments.clone(),
            permissions_cache.clone(),
        );
        let user_role_service = UserRoleService::new(
            roles.clone(),
            assignments.clone(),
            permissions_cache.clone(),
        );
        let authorization_service =
            AuthorizationService::new(assignments.clone(), permissions_cache.clone());
        let repair_service = RbacRepairService::new(
            roles.clone(),
            assignments.clone(),
            permissions_cache.clone(),
        );

        Self {
            roles,
            assignments,
            cache,
            permissions_cache,
            role_service,
            user_role_service,
            authorization_service,
            repair_service,
        }
    }
}

pub(crate) fn custom_role(label: &str, can_update_all_settings: bool) -> crate::CreateRoleInput {
    crate::CreateRoleInput {
        label: label.to_owned(),
        capabilities: tenantry_domain::RoleCapabilities {
            can_update_all_settings,
            can_read_all_object_records: true,
            ..tenantry_domain::RoleCapabilities::default()
        },
        ..crate::CreateRoleInput::default()
    }
}
