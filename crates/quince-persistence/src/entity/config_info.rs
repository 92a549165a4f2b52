//! Base configuration entity
//!
//! One row per `(data_id, group_id, tenant_id)`. The numeric `id` is referenced by
//! `config_tags_relation.id` and `his_config_info.id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "config_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub data_id: String,
    pub group_id: String,
    /// Configuration content
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// MD5 of content, null for rows written before fingerprints existed
    pub md5: Option<String>,
    pub gmt_create: DateTime,
    pub gmt_modified: DateTime,
    #[sea_orm(column_type = "Text", nullable)]
    pub src_user: Option<String>,
    pub src_ip: Option<String>,
    pub app_name: Option<String>,
    /// Tenant/Namespace ID, empty for the default namespace
    pub tenant_id: String,
    pub c_desc: Option<String>,
    pub c_use: Option<String>,
    pub effect: Option<String>,
    pub r#type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub c_schema: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub encrypted_data_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
