//! Session context: the acting tenant of a unit of work.
//!
//! The context is an explicit value owned by whoever runs the unit of work
//! (a request handler, a job, a test). It is never global, so concurrent
//! sessions cannot observe each other's identity.
//!
//! The value is kept in raw string form, like the database session variable
//! `app.current_tenant_id` it mirrors. A raw value that does not parse as a
//! tenant id reads as "no context" and therefore denies everything.

use canopy_shared::types::TenantId;
use tracing::debug;

use crate::tenancy::error::{ContextError, TenancyError, TenancyResult};
use crate::tenancy::store::TenantStore;

/// Acting-tenant identity for one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    raw: Option<String>,
}

impl SessionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a raw context value (for example a request header) without
    /// checking it. Parsing happens in [`Self::current_context`].
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self {
            raw: Some(value.into()),
        }
    }

    /// Records `tenant_id` as the acting tenant.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTenant` if the tenant does not exist in `store`; the
    /// previous context is left untouched in that case.
    pub async fn set_context<S>(&mut self, store: &S, tenant_id: TenantId) -> TenancyResult<()>
    where
        S: TenantStore + ?Sized,
    {
        if store.get(tenant_id).await?.is_none() {
            return Err(TenancyError::UnknownTenant(tenant_id));
        }
        self.raw = Some(tenant_id.to_string());
        debug!(tenant_id = %tenant_id, "Tenant context set");
        Ok(())
    }

    /// Empties the context. Idempotent.
    pub fn clear_context(&mut self) {
        self.raw = None;
    }

    /// Returns the acting tenant, or `None` if unset or malformed.
    #[must_use]
    pub fn current_context(&self) -> Option<TenantId> {
        match self.parse() {
            Ok(tenant) => tenant,
            Err(err) => {
                debug!(error = %err, "Ignoring tenant context");
                None
            }
        }
    }

    /// Returns the raw stored value.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    fn parse(&self) -> Result<Option<TenantId>, ContextError> {
        match self.raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ContextError::Malformed(value.to_string())),
        }
    }
}
