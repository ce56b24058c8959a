//! Tenant hierarchy access control.
//!
//! Tenants form a forest: every tenant has at most one parent. A session acts
//! on behalf of exactly one tenant (or none) and may touch rows of its own
//! tenant and of its direct children, never siblings and never grandchildren.
//!
//! # Modules
//!
//! - `types` - Tenant records, creation/update inputs, hierarchy rows
//! - `error` - Tenancy error taxonomy
//! - `validation` - Name, type and parent consistency rules
//! - `predicate` - The access predicate
//! - `context` - Per-unit-of-work session context
//! - `store` - Storage trait
//! - `memory` - In-memory store
//! - `policy` - Predicate-enforcing interceptor around a store
//! - `admin` - Administrative operations outside the session predicate
//! - `hierarchy` - Breadth-first descendant traversal
//! - `directory` - Session-scoped reads served over HTTP
//! - `health` - Health summary for monitoring

pub mod admin;
pub mod context;
pub mod directory;
pub mod error;
pub mod health;
pub mod hierarchy;
pub mod memory;
pub mod policy;
pub mod predicate;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod hierarchy_props;
#[cfg(test)]
mod predicate_props;

pub use admin::TenantAdmin;
pub use context::SessionContext;
pub use directory::TenantDirectory;
pub use error::{TenancyError, TenancyResult};
pub use health::{CrudStatus, DatabaseCheck, HealthProbe, TenantModelHealth};
pub use hierarchy::{DEFAULT_MAX_DEPTH, hierarchy};
pub use memory::InMemoryTenantStore;
pub use policy::TenantPolicy;
pub use predicate::{can_access, can_access_in, can_access_row};
pub use store::TenantStore;
pub use types::{HierarchyNode, NewTenant, Tenant, TenantChanges, TenantType};
