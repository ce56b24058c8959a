//! Tenant validation rules.
//!
//! These mirror the table constraints installed by the migrations
//! (`ck_tenant_name_not_empty`, `ck_tenant_parent_logic`,
//! `ck_tenant_no_self_reference`) so that both backends reject the same
//! inputs.

use canopy_shared::types::TenantId;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::tenancy::error::{TenancyError, TenancyResult};
use crate::tenancy::types::{NewTenant, Tenant, TenantChanges, TenantType};

/// Longest accepted tenant name, in characters, after trimming.
pub const MAX_NAME_LEN: usize = 200;

/// Trims a tenant name and checks it is non-empty and within bounds.
pub fn normalize_name(name: &str) -> TenancyResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TenancyError::Validation(
            "Tenant name cannot be empty or whitespace only".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(TenancyError::Validation(format!(
            "Tenant name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Checks that the tenant type agrees with the presence of a parent.
pub fn check_parent_logic(tenant_type: TenantType, parent: Option<TenantId>) -> TenancyResult<()> {
    match (tenant_type, parent) {
        (TenantType::Parent, Some(_)) => Err(TenancyError::Validation(
            "Parent tenants cannot have a parent tenant".to_string(),
        )),
        (TenantType::Subsidiary, None) => Err(TenancyError::Validation(
            "Subsidiary tenants must have a parent tenant".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Rejects a tenant that names itself as parent.
pub fn check_not_self_parent(tenant_id: TenantId, parent: Option<TenantId>) -> TenancyResult<()> {
    if parent == Some(tenant_id) {
        return Err(TenancyError::Validation(
            "A tenant cannot be its own parent".to_string(),
        ));
    }
    Ok(())
}

/// Metadata must be a JSON object; `None` becomes `{}`.
pub fn normalize_metadata(metadata: Option<Value>) -> TenancyResult<Value> {
    match metadata {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(value @ Value::Object(_)) => Ok(value),
        Some(_) => Err(TenancyError::Validation(
            "Metadata must be a JSON object".to_string(),
        )),
    }
}

/// Validates creation input and builds the tenant record with a fresh id.
pub fn build_tenant(input: NewTenant) -> TenancyResult<Tenant> {
    let name = normalize_name(&input.name)?;
    check_parent_logic(input.tenant_type, input.parent_tenant_id)?;
    let metadata = normalize_metadata(input.metadata)?;

    let now = Utc::now();
    Ok(Tenant {
        tenant_id: TenantId::new(),
        name,
        tenant_type: input.tenant_type,
        parent_tenant_id: input.parent_tenant_id,
        metadata,
        created_at: now,
        updated_at: now,
    })
}

/// Applies a partial update to a copy of `tenant`.
pub fn apply_changes(tenant: &Tenant, changes: TenantChanges) -> TenancyResult<Tenant> {
    let mut updated = tenant.clone();
    if let Some(name) = changes.name {
        updated.name = normalize_name(&name)?;
    }
    if let Some(metadata) = changes.metadata {
        updated.metadata = normalize_metadata(Some(metadata))?;
    }
    updated.updated_at = Utc::now();
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_name_trims() {
        assert_eq!(normalize_name("  HSBC Hong Kong  ").unwrap(), "HSBC Hong Kong");
    }

    #[test]
    fn test_normalize_name_rejects_blank() {
        assert!(matches!(
            normalize_name("   "),
            Err(TenancyError::Validation(_))
        ));
        assert!(normalize_name("").is_err());
    }

    #[test]
    fn test_normalize_name_length_limit() {
        let ok = "a".repeat(MAX_NAME_LEN);
        assert!(normalize_name(&ok).is_ok());
        let too_long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(normalize_name(&too_long).is_err());
        // Surrounding whitespace does not count.
        assert!(normalize_name(&format!("  {ok}  ")).is_ok());
    }

    #[test]
    fn test_parent_logic() {
        let parent = Some(TenantId::new());
        assert!(check_parent_logic(TenantType::Parent, None).is_ok());
        assert!(check_parent_logic(TenantType::Subsidiary, parent).is_ok());
        assert!(check_parent_logic(TenantType::Parent, parent).is_err());
        assert!(check_parent_logic(TenantType::Subsidiary, None).is_err());
    }

    #[test]
    fn test_self_parent_rejected() {
        let id = TenantId::new();
        assert!(check_not_self_parent(id, Some(id)).is_err());
        assert!(check_not_self_parent(id, None).is_ok());
        assert!(check_not_self_parent(id, Some(TenantId::new())).is_ok());
    }

    #[test]
    fn test_metadata_must_be_object() {
        assert_eq!(normalize_metadata(None).unwrap(), json!({}));
        assert_eq!(normalize_metadata(Some(Value::Null)).unwrap(), json!({}));
        assert_eq!(
            normalize_metadata(Some(json!({"status": "active"}))).unwrap(),
            json!({"status": "active"})
        );
        assert!(normalize_metadata(Some(json!(["not", "an", "object"]))).is_err());
        assert!(normalize_metadata(Some(json!("text"))).is_err());
    }

    #[test]
    fn test_build_tenant() {
        let tenant = build_tenant(NewTenant::root("  Barclays ")).unwrap();
        assert_eq!(tenant.name, "Barclays");
        assert_eq!(tenant.metadata, json!({}));
        assert!(tenant.is_root());
        assert_eq!(tenant.created_at, tenant.updated_at);
    }

    #[test]
    fn test_apply_changes_keeps_parent() {
        let parent = TenantId::new();
        let tenant = build_tenant(NewTenant::subsidiary("HSBC-HK", parent)).unwrap();
        let updated = apply_changes(
            &tenant,
            TenantChanges {
                name: Some(" HSBC Hong Kong ".into()),
                metadata: Some(json!({"country": "HK"})),
            },
        )
        .unwrap();
        assert_eq!(updated.name, "HSBC Hong Kong");
        assert_eq!(updated.parent_tenant_id, Some(parent));
        assert_eq!(updated.tenant_id, tenant.tenant_id);
        assert_eq!(updated.metadata["country"], "HK");
    }
}
