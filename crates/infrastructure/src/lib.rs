//! Infrastructure adapters for role-based access control ports.

#![forbid(unsafe_code)]

mod in_memory_permissions_cache;
mod in_memory_role_assignment_repository;
mod in_memory_role_repository;
mod postgres_role_assignment_repository;
mod postgres_role_repository;
mod redis_permissions_cache;


pub use in_memory_permissions_cache::InMemoryPermissionsCache;
pub use in_memory_role_assignment_repository::InMemoryRoleAssignmentRepository;
pub use in_memory_role_repository::InMemoryRoleRepository;
pub use postgres_role_assignment_repository::PostgresRoleAssignmentRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use redis_permissions_cache::RedisPermissionsCache;
