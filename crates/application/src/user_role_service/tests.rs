use tenantry_core::{AppError, WorkspaceId};
use tenantry_domain::{RoleId, UserWorkspaceId};

use crate::ProvisionedWorkspaceRoles;
use crate::rbac_ports::RoleAssignmentRepository;
use crate::test_support::{Harness, custom_role};

async fn provisioned_workspace(harness: &Harness) -> (WorkspaceId, ProvisionedWorkspaceRoles) {
    let workspace_id = WorkspaceId::new();
    let provisioned = harness
        .role_service
        .provision_workspace_roles(workspace_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    (workspace_id, provisioned)
}

#[tokio::test]
async fn assigning_twice_keeps_a_single_assignment() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;
    let member = UserWorkspaceId::new();

    for _ in 0..2 {
        harness
            .user_role_service
            .assign_role_to_user_workspace(workspace_id, member, provisioned.guest.id())
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    assert_eq!(
        harness
            .user_role_service
            .get_user_workspace_ids_assigned_to_role(workspace_id, provisioned.guest.id())
            .await
            .unwrap_or_else(|_| unreachable!()),
        vec![member]
    );
}

#[tokio::test]
async fn assigning_unknown_role_is_not_found() {
    let harness = Harness::new();
    let (workspace_id, _) = provisioned_workspace(&harness).await;

    let result = harness
        .user_role_service
        .assign_role_to_user_workspace(workspace_id, UserWorkspaceId::new(), RoleId::new())
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(harness.assignments.assignments.lock().await.is_empty());
}

#[tokio::test]
async fn role_from_another_workspace_cannot_be_assigned() {
    let harness = Harness::new();
    let (_, provisioned) = provisioned_workspace(&harness).await;
    let (other_workspace, _) = provisioned_workspace(&harness).await;

    let result = harness
        .user_role_service
        .assign_role_to_user_workspace(
            other_workspace,
            UserWorkspaceId::new(),
            provisioned.admin.id(),
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn last_administrator_keeps_admin_role() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;
    let owner = UserWorkspaceId::new();
    harness
        .user_role_service
        .assign_role_to_user_workspace(workspace_id, owner, provisioned.admin.id())
        .await
        .unwrap_or_else(|_| unreachable!());

    let removal = harness
        .user_role_service
        .remove_role_from_user(workspace_id, owner, provisioned.admin.id())
        .await;
    let replacement = harness
        .user_role_service
        .update_workspace_member_role(workspace_id, owner, provisioned.guest.id())
        .await;

    assert!(matches!(removal, Err(AppError::LastAdminRemoval(_))));
    assert!(matches!(replacement, Err(AppError::LastAdminRemoval(_))));
    assert_eq!(
        harness
            .assignments
            .roles_for(workspace_id, owner)
            .await
            .unwrap_or_else(|_| unreachable!()),
        vec![provisioned.admin.id()]
    );
}

#[tokio::test]
async fn administrator_can_leave_when_another_remains() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;
    let first = UserWorkspaceId::new();
    let second = UserWorkspaceId::new();
    for member in [first, second] {
        harness
            .user_role_service
            .assign_role_to_user_workspace(workspace_id, member, provisioned.admin.id())
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    let removal = harness
        .user_role_service
        .remove_role_from_user(workspace_id, first, provisioned.admin.id())
        .await;

    assert!(removal.is_ok());
    assert_eq!(
        harness
            .user_role_service
            .get_user_workspace_ids_assigned_to_role(workspace_id, provisioned.admin.id())
            .await
            .unwrap_or_else(|_| unreachable!()),
        vec![second]
    );
}

#[tokio::test]
async fn custom_administrative_role_counts_as_administrator() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;
    let owners = harness
        .role_service
        .create_role(workspace_id, custom_role("Owners", true))
        .await
        .unwrap_or_else(|_| unreachable!());
    let first = UserWorkspaceId::new();
    let second = UserWorkspaceId::new();
    harness
        .user_role_service
        .assign_role_to_user_workspace(workspace_id, first, provisioned.admin.id())
        .await
        .unwrap_or_else(|_| unreachable!());
    harness
        .user_role_service
        .assign_role_to_user_workspace(workspace_id, second, owners.id())
        .await
        .unwrap_or_else(|_| unreachable!());

    let removal = harness
        .user_role_service
        .remove_role_from_user(workspace_id, first, provisioned.admin.id())
        .await;

    assert!(removal.is_ok());
}

#[tokio::test]
async fn removing_unheld_role_is_not_found() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;

    let result = harness
        .user_role_service
        .remove_role_from_user(workspace_id, UserWorkspaceId::new(), provisioned.guest.id())
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn member_role_update_replaces_every_held_role() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;
    let member = UserWorkspaceId::new();
    let sales = harness
        .role_service
        .create_role(workspace_id, custom_role("Sales", false))
        .await
        .unwrap_or_else(|_| unreachable!());
    for role_id in [provisioned.guest.id(), sales.id()] {
        harness
            .user_role_service
            .assign_role_to_user_workspace(workspace_id, member, role_id)
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    let roles = harness
        .user_role_service
        .update_workspace_member_role(workspace_id, member, provisioned.member.id())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(roles, vec![provisioned.member.clone()]);
}

#[tokio::test]
async fn batched_role_lookup_includes_members_without_roles() {
    let harness = Harness::new();
    let (workspace_id, provisioned) = provisioned_workspace(&harness).await;
    let with_roles = UserWorkspaceId::new();
    let without_roles = UserWorkspaceId::new();
    for role_id in [provisioned.guest.id(), provisioned.member.id()] {
        harness
            .user_role_service
            .assign_role_to_user_workspace(workspace_id, with_roles, role_id)
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    let roles = harness
        .user_role_service
        .get_roles_by_user_workspaces(workspace_id, &[with_roles, without_roles])
        .await
        .unwrap_or_else(|_| unreachable!());
    let empty = harness
        .user_role_service
        .get_roles_by_user_workspaces(workspace_id, &[])
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(roles.len(), 2);
    assert_eq!(
        roles.get(&with_roles).map(|roles| roles
            .iter()
            .map(|role| role.label().as_str())
            .collect::<Vec<_>>()),
        Some(vec!["Guest", "Member"])
    );
    assert_eq!(roles.get(&without_roles).map(Vec::len), Some(0));
    assert!(empty.is_empty());
}
