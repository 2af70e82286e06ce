//! Tenantry RBAC repair worker.

#![forbid(unsafe_code)]

mod worker_config;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tenantry_application::{PermissionsCache, RbacRepairService, WorkspacePermissionsCacheService};
use tenantry_core::{AppError, AppResult};
use tenantry_infrastructure::{
    InMemoryPermissionsCache, PostgresRoleAssignmentRepository, PostgresRoleRepository,
    RedisPermissionsCache,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::worker_config::{PermissionsCacheBackend, WorkerConfig};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let run_once = env::args().skip(1).any(|argument| argument == "repair-once");
    let pool = connect_pool(&config).await?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let repair_service = build_repair_service(pool, &config.cache_backend)?;

    if !config.cache_backend.is_shared() {
        warn!(
            "PERMISSIONS_CACHE_BACKEND=memory keeps rebuilt permissions inside this worker; \
             repairs fix assignments but other processes keep their own caches"
        );
    }

    info!(
        repair_interval_seconds = config.repair_interval_seconds,
        run_once, "tenantry-worker started"
    );

    loop {
        match repair_service.repair_all_workspaces().await {
            Ok(reports) => {
                let removed_assignments: u64 = reports
                    .iter()
                    .map(|(_, report)| report.removed_assignments)
                    .sum();
                let reassigned_members: usize = reports
                    .iter()
                    .map(|(_, report)| report.reassigned_members.len())
                    .sum();

                info!(
                    workspaces = reports.len(),
                    removed_assignments, reassigned_members, "rbac repair pass finished"
                );
            }
            Err(error) => {
                warn!(error = %error, "rbac repair pass failed");
            }
        }

        if run_once {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(config.repair_interval_seconds)).await;
    }
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_repair_service(
    pool: PgPool,
    cache_backend: &PermissionsCacheBackend,
) -> AppResult<RbacRepairService> {
    let role_repository = Arc::new(PostgresRoleRepository::new(pool.clone()));
    let assignment_repository = Arc::new(PostgresRoleAssignmentRepository::new(pool));

    let cache: Arc<dyn PermissionsCache> = match cache_backend {
        PermissionsCacheBackend::Memory => Arc::new(InMemoryPermissionsCache::new()),
        PermissionsCacheBackend::Redis {
            redis_url,
            key_prefix,
        } => {
            let client = redis::Client::open(redis_url.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL '{redis_url}': {error}"))
            })?;
            Arc::new(RedisPermissionsCache::new(client, key_prefix.as_str()))
        }
    };

    let permissions_cache = WorkspacePermissionsCacheService::new(
        role_repository.clone(),
        role_repository.clone(),
        cache,
    );

    Ok(RbacRepairService::new(
        role_repository,
        assignment_repository,
        permissions_cache,
    ))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
