//! `SeaORM` Entity for tenants table.

use canopy_core::tenancy::Tenant;
use canopy_shared::types::TenantId;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::TenantType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: Uuid,
    pub name: String,
    pub tenant_type: TenantType,
    pub parent_tenant_id: Option<Uuid>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentTenantId",
        to = "Column::TenantId",
        on_delete = "Restrict"
    )]
    Parent,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Tenant {
    fn from(model: Model) -> Self {
        Self {
            tenant_id: TenantId::from(model.tenant_id),
            name: model.name,
            tenant_type: model.tenant_type.into(),
            parent_tenant_id: model.parent_tenant_id.map(TenantId::from),
            metadata: model.metadata,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
