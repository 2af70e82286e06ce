use std::env;

use tenantry_core::{AppError, AppResult};

/// Backend holding resolved role permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionsCacheBackend {
    /// Process-local cache.
    Memory,
    /// Shared Redis cache.
    Redis {
        /// Redis connection URL.
        redis_url: String,
        /// Prefix of every workspace hash key.
        key_prefix: String,
    },
}

impl PermissionsCacheBackend {
    /// Returns whether entries written by this worker are visible to other processes.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Redis { .. })
    }
}

/// Worker runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub cache_backend: PermissionsCacheBackend,
    pub repair_interval_seconds: u64,
}

impl WorkerConfig {
    /// Loads configuration from process environment variables.
    pub fn load() -> AppResult<Self> {
        Self::from_source(|name| env::var(name).ok())
    }

    fn from_source(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let database_max_connections = parse_number(&lookup, "DATABASE_MAX_CONNECTIONS", 5_u32)?;
        let repair_interval_seconds =
            parse_number(&lookup, "RBAC_REPAIR_INTERVAL_SECONDS", 300_u64)?;

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if repair_interval_seconds == 0 {
            return Err(AppError::Validation(
                "RBAC_REPAIR_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let backend = lookup("PERMISSIONS_CACHE_BACKEND")
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "memory".to_owned());
        let cache_backend = match backend.as_str() {
            "memory" => PermissionsCacheBackend::Memory,
            "redis" => PermissionsCacheBackend::Redis {
                redis_url: lookup("REDIS_URL")
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Validation(
                            "REDIS_URL is required when PERMISSIONS_CACHE_BACKEND=redis"
                                .to_owned(),
                        )
                    })?,
                key_prefix: lookup("PERMISSIONS_CACHE_KEY_PREFIX")
                    .map(|value| value.trim().to_owned())
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| "rbac:permissions".to_owned()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "invalid PERMISSIONS_CACHE_BACKEND value '{other}', expected 'memory' or 'redis'"
                )));
            }
        };

        Ok(Self {
            database_url,
            database_max_connections,
            cache_backend,
            repair_interval_seconds,
        })
    }
}

fn parse_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
