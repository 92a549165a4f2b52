//! Tenant (namespace) registry entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tenant_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kp: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub tenant_desc: Option<String>,
    pub create_source: Option<String>,
    /// Epoch milliseconds
    pub gmt_create: i64,
    pub gmt_modified: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
