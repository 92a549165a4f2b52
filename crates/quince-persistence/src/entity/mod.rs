//! SeaORM entity definitions for the config variant tables

pub mod prelude;

pub mod config_info;
pub mod config_info_beta;
pub mod config_info_gray;
pub mod config_info_tag;
pub mod config_tags_relation;
pub mod his_config_info;
pub mod tenant_info;
