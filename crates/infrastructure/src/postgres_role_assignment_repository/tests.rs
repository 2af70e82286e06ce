use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tenantry_application::RoleAssignmentRepository;
use tenantry_core::{AppError, WorkspaceId};
use tenantry_domain::{RoleId, UserWorkspaceId};

use super::PostgresRoleAssignmentRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres assignment tests: {error}");
    }

    Some(pool)
}

#[tokio::test]
async fn assignments_are_idempotent_and_ordered() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAssignmentRepository::new(pool);
    let workspace_id = WorkspaceId::new();
    let member = UserWorkspaceId::new();
    let first = RoleId::new();
    let second = RoleId::new();

    for role_id in [first, second, first] {
        assert!(
            repository
                .assign_role(workspace_id, member, role_id)
                .await
                .is_ok()
        );
    }

    assert!(matches!(
        repository.roles_for(workspace_id, member).await,
        Ok(role_ids) if role_ids == vec![first, second]
    ));
    assert!(matches!(
        repository.list_assignments(workspace_id).await,
        Ok(assignments) if assignments.len() == 2
    ));
}

#[tokio::test]
async fn concurrent_admin_removals_keep_one_administrator() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAssignmentRepository::new(pool);
    let workspace_id = WorkspaceId::new();
    let admin_role = RoleId::new();
    let first = UserWorkspaceId::new();
    let second = UserWorkspaceId::new();
    for member in [first, second] {
        assert!(
            repository
                .assign_role(workspace_id, member, admin_role)
                .await
                .is_ok()
        );
    }

    let admin_roles = [admin_role];
    let (left, right) = tokio::join!(
        repository.unassign_role(workspace_id, first, admin_role, &admin_roles),
        repository.unassign_role(workspace_id, second, admin_role, &admin_roles),
    );

    assert!(left.is_ok() != right.is_ok());
    assert!(
        matches!(left, Err(AppError::LastAdminRemoval(_)))
            || matches!(right, Err(AppError::LastAdminRemoval(_)))
    );
    assert!(matches!(
        repository.members_for(workspace_id, admin_role).await,
        Ok(members) if members.len() == 1
    ));
}

#[tokio::test]
async fn replace_and_purge_assignments() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAssignmentRepository::new(pool);
    let workspace_id = WorkspaceId::new();
    let member = UserWorkspaceId::new();
    let temporary = RoleId::new();
    let replacement = RoleId::new();
    assert!(
        repository
            .assign_role(workspace_id, member, temporary)
            .await
            .is_ok()
    );

    assert!(
        repository
            .replace_roles(workspace_id, member, replacement, &[])
            .await
            .is_ok()
    );
    assert!(matches!(
        repository.roles_for(workspace_id, member).await,
        Ok(role_ids) if role_ids == vec![replacement]
    ));
    assert!(matches!(
        repository
            .remove_assignments_for_role(workspace_id, replacement)
            .await,
        Ok(1)
    ));
    assert!(matches!(
        repository
            .unassign_role(workspace_id, member, replacement, &[])
            .await,
        Err(AppError::NotFound(_))
    ));
}
