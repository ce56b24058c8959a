//! Request middleware.

pub mod tenant;

pub use tenant::tenant_context;
