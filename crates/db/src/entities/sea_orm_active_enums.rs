//! `SeaORM` active enums.

use canopy_core::tenancy::TenantType as CoreTenantType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Database enum `tenant_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "tenant_type")]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    /// Root tenant.
    #[sea_orm(string_value = "parent")]
    Parent,
    /// Tenant with a parent.
    #[sea_orm(string_value = "subsidiary")]
    Subsidiary,
}

impl From<CoreTenantType> for TenantType {
    fn from(value: CoreTenantType) -> Self {
        match value {
            CoreTenantType::Parent => Self::Parent,
            CoreTenantType::Subsidiary => Self::Subsidiary,
        }
    }
}

impl From<TenantType> for CoreTenantType {
    fn from(value: TenantType) -> Self {
        match value {
            TenantType::Parent => Self::Parent,
            TenantType::Subsidiary => Self::Subsidiary,
        }
    }
}
