//! Core tenancy logic for Canopy.
//!
//! This crate contains the tenant-hierarchy access-control model with ZERO
//! web or database dependencies. The storage engine enforces the same rules
//! through RLS policies installed by `canopy-db`; this crate is the portable
//! application-side enforcement.
//!
//! # Modules
//!
//! - `tenancy` - Tenant forest, session context, access predicate,
//!   policy enforcement, hierarchy traversal, and health summary

pub mod tenancy;
