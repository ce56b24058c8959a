//! Tenancy error types.
//!
//! Errors are narrow and scoped to a single operation. The access predicate
//! itself never produces an error: every ambiguous input is a deny.

use canopy_shared::AppError;
use canopy_shared::types::TenantId;
use thiserror::Error;

/// Result type alias using `TenancyError`.
pub type TenancyResult<T> = Result<T, TenancyError>;

/// Errors that can occur during tenancy operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenancyError {
    /// A referenced tenant does not exist.
    #[error("Tenant {0} does not exist")]
    UnknownTenant(TenantId),

    /// The tenant still has subsidiaries.
    #[error("Cannot delete tenant {tenant_id} with {children} active subsidiaries")]
    HasDependents {
        /// The tenant that was to be deleted.
        tenant_id: TenantId,
        /// Number of direct children.
        children: usize,
    },

    /// The stored hierarchy is not a forest.
    #[error("Cycle detected in tenant hierarchy at {tenant_id} (depth {depth})")]
    CycleDetected {
        /// Tenant at which the traversal stopped.
        tenant_id: TenantId,
        /// Depth reached.
        depth: u32,
    },

    /// The tenant is absent or not visible to the session.
    #[error("Tenant {0} not found or access denied")]
    NotFound(TenantId),

    /// The mutation would leave a row the session may not access.
    #[error("Access to tenant {0} denied")]
    AccessDenied(TenantId),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A sibling already carries this name.
    #[error("Tenant name '{name}' already exists under {scope}")]
    DuplicateName {
        /// The clashing name.
        name: String,
        /// Where the clash happened (`root level` or `parent <id>`).
        scope: String,
    },

    /// Backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TenancyError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::AccessDenied(_) => 403,
            Self::UnknownTenant(_) | Self::NotFound(_) => 404,
            Self::HasDependents { .. } | Self::DuplicateName { .. } => 409,
            Self::CycleDetected { .. } | Self::Storage(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownTenant(_) => "UNKNOWN_TENANT",
            Self::HasDependents { .. } => "HAS_DEPENDENTS",
            Self::CycleDetected { .. } => "CYCLE_DETECTED",
            Self::NotFound(_) => "TENANT_NOT_FOUND",
            Self::AccessDenied(_) => "ACCESS_DENIED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DuplicateName { .. } => "DUPLICATE_NAME",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Builds a `DuplicateName` error for a sibling clash.
    #[must_use]
    pub fn duplicate_name(name: &str, parent: Option<TenantId>) -> Self {
        let scope = match parent {
            Some(parent) => format!("parent '{parent}'"),
            None => "root level".to_string(),
        };
        Self::DuplicateName {
            name: name.to_string(),
            scope,
        }
    }
}

impl From<TenancyError> for AppError {
    fn from(err: TenancyError) -> Self {
        let message = err.to_string();
        match err {
            TenancyError::UnknownTenant(_) | TenancyError::NotFound(_) => Self::NotFound(message),
            TenancyError::HasDependents { .. } | TenancyError::DuplicateName { .. } => {
                Self::Conflict(message)
            }
            TenancyError::CycleDetected { .. } => Self::Integrity(message),
            TenancyError::AccessDenied(_) => Self::Forbidden(message),
            TenancyError::Validation(_) => Self::Validation(message),
            TenancyError::Storage(_) => Self::Database(message),
        }
    }
}

/// Session context parse failures. Never leaves this crate: a malformed
/// context reads as "no context".
#[derive(Debug, Error)]
pub(crate) enum ContextError {
    #[error("malformed tenant context value '{0}'")]
    Malformed(String),
}
