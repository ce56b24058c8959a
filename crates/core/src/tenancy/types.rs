//! Tenant domain types.
//!
//! This module defines the tenant record, the inputs used to create and
//! update tenants, and the rows produced by hierarchy traversal.

use canopy_shared::types::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Tenant category.
///
/// Roots of the forest are `Parent` tenants; everything with a parent is a
/// `Subsidiary`, which may itself own further subsidiaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    /// Top-level tenant (independent organization).
    Parent,
    /// Tenant organized under a parent tenant.
    Subsidiary,
}

impl TenantType {
    /// Returns the string representation of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Subsidiary => "subsidiary",
        }
    }

    /// Parses a type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "parent" => Some(Self::Parent),
            "subsidiary" => Some(Self::Subsidiary),
            _ => None,
        }
    }

    /// Returns the type implied by the presence of a parent link.
    #[must_use]
    pub fn for_parent(parent: Option<TenantId>) -> Self {
        if parent.is_some() {
            Self::Subsidiary
        } else {
            Self::Parent
        }
    }
}

impl fmt::Display for TenantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique identifier.
    pub tenant_id: TenantId,
    /// Human-readable name, unique among siblings.
    pub name: String,
    /// Tenant category.
    pub tenant_type: TenantType,
    /// Parent tenant, `None` for roots.
    pub parent_tenant_id: Option<TenantId>,
    /// Free-form JSON object.
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Returns true if this tenant is a root of the forest.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_tenant_id.is_none()
    }

    /// Returns true if `other` is this tenant's direct parent.
    #[must_use]
    pub fn is_child_of(&self, other: TenantId) -> bool {
        self.parent_tenant_id == Some(other)
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.tenant_type)
    }
}

/// Input for creating a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTenant {
    /// Tenant name (trimmed during validation).
    pub name: String,
    /// Tenant category.
    pub tenant_type: TenantType,
    /// Parent tenant, required for subsidiaries.
    #[serde(default)]
    pub parent_tenant_id: Option<TenantId>,
    /// Optional metadata object; defaults to `{}`.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl NewTenant {
    /// Input for a root tenant.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tenant_type: TenantType::Parent,
            parent_tenant_id: None,
            metadata: None,
        }
    }

    /// Input for a subsidiary of `parent`.
    #[must_use]
    pub fn subsidiary(name: impl Into<String>, parent: TenantId) -> Self {
        Self {
            name: name.into(),
            tenant_type: TenantType::Subsidiary,
            parent_tenant_id: Some(parent),
            metadata: None,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial update of a tenant. The parent link is not part of it; see
/// `TenantAdmin::reassign_parent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantChanges {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// Replacement metadata (replaces the previous value wholesale).
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// One row of a hierarchy traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Tenant name.
    pub name: String,
    /// Tenant category.
    pub tenant_type: TenantType,
    /// Distance from the traversal root; the root itself is at depth 1.
    pub depth: u32,
    /// Names from the root down to this node, joined by `" -> "`.
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_as_str() {
        assert_eq!(TenantType::Parent.as_str(), "parent");
        assert_eq!(TenantType::Subsidiary.as_str(), "subsidiary");
    }

    #[test]
    fn test_type_parse() {
        assert_eq!(TenantType::parse("parent"), Some(TenantType::Parent));
        assert_eq!(TenantType::parse("SUBSIDIARY"), Some(TenantType::Subsidiary));
        assert_eq!(TenantType::parse("branch"), None);
    }

    #[test]
    fn test_type_for_parent() {
        assert_eq!(TenantType::for_parent(None), TenantType::Parent);
        assert_eq!(
            TenantType::for_parent(Some(TenantId::new())),
            TenantType::Subsidiary
        );
    }

    #[test]
    fn test_type_serde_lowercase() {
        let json = serde_json::to_string(&TenantType::Subsidiary).unwrap();
        assert_eq!(json, "\"subsidiary\"");
    }

    #[test]
    fn test_new_tenant_builders() {
        let root = NewTenant::root("HSBC");
        assert_eq!(root.tenant_type, TenantType::Parent);
        assert!(root.parent_tenant_id.is_none());

        let parent = TenantId::new();
        let sub = NewTenant::subsidiary("HSBC-HK", parent)
            .with_metadata(serde_json::json!({"country": "Hong Kong"}));
        assert_eq!(sub.tenant_type, TenantType::Subsidiary);
        assert_eq!(sub.parent_tenant_id, Some(parent));
        assert_eq!(sub.metadata.unwrap()["country"], "Hong Kong");
    }
}
