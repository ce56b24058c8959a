//! `SeaORM` entities.

pub mod sea_orm_active_enums;
pub mod tenants;
