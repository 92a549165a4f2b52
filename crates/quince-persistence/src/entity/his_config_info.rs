//! Configuration history entity
//!
//! Append-only audit rows. `id` references the mutated config or gray row,
//! `nid` is the surrogate key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "his_config_info")]
pub struct Model {
    pub id: i64,
    #[sea_orm(primary_key)]
    pub nid: i64,
    pub data_id: String,
    pub group_id: String,
    pub app_name: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub md5: Option<String>,
    pub gmt_create: DateTime,
    pub gmt_modified: DateTime,
    #[sea_orm(column_type = "Text", nullable)]
    pub src_user: Option<String>,
    pub src_ip: Option<String>,
    /// I, U or D
    pub op_type: Option<String>,
    pub tenant_id: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub encrypted_data_key: Option<String>,
    /// `formal` or `gray`
    pub publish_type: Option<String>,
    pub gray_name: Option<String>,
    /// JSON extension (tags and metadata, or gray name and rule)
    #[sea_orm(column_type = "Text", nullable)]
    pub ext_info: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
