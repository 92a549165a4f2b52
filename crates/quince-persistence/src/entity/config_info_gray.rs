//! Gray configuration entity
//!
//! Named gray slices of a base config. Several may coexist per base key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "config_info_gray")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub data_id: String,
    pub group_id: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub md5: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub src_user: Option<String>,
    pub src_ip: Option<String>,
    pub gmt_create: DateTime,
    pub gmt_modified: DateTime,
    pub app_name: Option<String>,
    pub tenant_id: String,
    pub gray_name: String,
    /// Rule text evaluated by the push side
    #[sea_orm(column_type = "Text")]
    pub gray_rule: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub encrypted_data_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
