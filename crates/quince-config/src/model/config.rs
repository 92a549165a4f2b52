//! Publish requests, variant selection and service outcomes

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use quince_persistence::{
    ConfigAdvanceInfo, ConfigBetaStorageData, ConfigGrayStorageData, ConfigInfo, ConfigKey,
    ConfigStorageData, ConfigTagStorageData,
};

use crate::validation::{validate_gray_request, validate_identifier};

/// A single publish of one config variant
///
/// The variant is picked from the request: non-empty `beta_ips` publishes a
/// beta, then `tag`, then `gray_name`, otherwise the base config.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "validate_gray_request"))]
pub struct ConfigPublishRequest {
    #[validate(length(min = 1, max = 256), custom(function = "validate_identifier"))]
    pub data_id: String,
    #[validate(length(min = 1, max = 128), custom(function = "validate_identifier"))]
    pub group: String,
    #[validate(length(max = 128), custom(function = "validate_identifier"))]
    pub tenant: String,
    pub content: String,
    #[validate(length(max = 128))]
    pub app_name: Option<String>,
    pub encrypted_data_key: String,
    #[validate(length(max = 1024))]
    pub beta_ips: String,
    #[validate(length(max = 128), custom(function = "validate_identifier"))]
    pub tag: String,
    #[validate(length(max = 128), custom(function = "validate_identifier"))]
    pub gray_name: String,
    pub gray_rule: String,
    /// Expected fingerprint of the stored row, only read by CAS publishes
    pub cas_md5: Option<String>,
    #[validate(length(max = 128))]
    pub desc: Option<String>,
    pub r#use: Option<String>,
    pub effect: Option<String>,
    pub r#type: Option<String>,
    pub schema: Option<String>,
    #[validate(length(max = 512))]
    pub config_tags: Option<String>,
    pub src_ip: String,
    pub src_user: String,
}

impl ConfigPublishRequest {
    pub fn new(data_id: &str, group: &str, tenant: &str, content: &str) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            tenant: tenant.to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(&self.data_id, &self.group, &self.tenant)
    }

    pub fn variant_kind(&self) -> VariantKind {
        if !self.beta_ips.trim().is_empty() {
            VariantKind::Beta
        } else if !self.tag.trim().is_empty() {
            VariantKind::Tag(self.tag.trim().to_string())
        } else if !self.gray_name.trim().is_empty() {
            VariantKind::Gray(self.gray_name.trim().to_string())
        } else {
            VariantKind::Base
        }
    }

    pub fn config_info(&self) -> ConfigInfo {
        ConfigInfo {
            key: self.key(),
            content: self.content.clone(),
            app_name: self.app_name.clone(),
            encrypted_data_key: self.encrypted_data_key.clone(),
            md5: self.cas_md5.clone(),
        }
    }

    pub fn advance_info(&self) -> ConfigAdvanceInfo {
        ConfigAdvanceInfo {
            desc: self.desc.clone(),
            r#use: self.r#use.clone(),
            effect: self.effect.clone(),
            r#type: self.r#type.clone(),
            schema: self.schema.clone(),
            config_tags: self.config_tags.clone(),
        }
    }
}

/// Which row of a key an operation addresses
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Base,
    Beta,
    Tag(String),
    Gray(String),
}

impl Display for VariantKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantKind::Base => write!(f, "base"),
            VariantKind::Beta => write!(f, "beta"),
            VariantKind::Tag(tag) => write!(f, "tag:{}", tag),
            VariantKind::Gray(name) => write!(f, "gray:{}", name),
        }
    }
}

/// A stored row of any variant kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConfigVariant {
    Base(ConfigStorageData),
    Beta(ConfigBetaStorageData),
    Tag(ConfigTagStorageData),
    Gray(ConfigGrayStorageData),
}

impl ConfigVariant {
    pub fn content(&self) -> &str {
        match self {
            ConfigVariant::Base(c) => &c.content,
            ConfigVariant::Beta(c) => &c.content,
            ConfigVariant::Tag(c) => &c.content,
            ConfigVariant::Gray(c) => &c.content,
        }
    }

    pub fn md5(&self) -> &str {
        match self {
            ConfigVariant::Base(c) => &c.md5,
            ConfigVariant::Beta(c) => &c.md5,
            ConfigVariant::Tag(c) => &c.md5,
            ConfigVariant::Gray(c) => &c.md5,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ConfigVariant::Base(c) => c.id,
            ConfigVariant::Beta(c) => c.id,
            ConfigVariant::Tag(c) => c.id,
            ConfigVariant::Gray(c) => c.id,
        }
    }
}

/// What a batch import does with a key that already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SameConfigPolicy {
    /// Stop import on first conflict
    #[default]
    Abort,
    /// Skip conflicting configs, continue with others
    Skip,
    /// Overwrite existing configs with imported data
    Overwrite,
}

impl Display for SameConfigPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SameConfigPolicy::Abort => write!(f, "ABORT"),
            SameConfigPolicy::Skip => write!(f, "SKIP"),
            SameConfigPolicy::Overwrite => write!(f, "OVERWRITE"),
        }
    }
}

impl FromStr for SameConfigPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ABORT" => Ok(SameConfigPolicy::Abort),
            "SKIP" => Ok(SameConfigPolicy::Skip),
            "OVERWRITE" => Ok(SameConfigPolicy::Overwrite),
            _ => Err(format!("Invalid same config policy: {}", s)),
        }
    }
}

/// Keys touched by a batch import, grouped by outcome
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportResult {
    pub succ_count: usize,
    pub skip_count: usize,
    pub fail_data: Vec<ConfigKey>,
    pub skip_data: Vec<ConfigKey>,
}

/// Result of one cross-tenant sync call that did not conflict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// The source was written into the target
    Copied,
    /// The source is gone and the target was deleted
    Removed,
    /// Nothing to do
    UpToDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_kind_dispatch_order() {
        let mut req = ConfigPublishRequest::new("app.yaml", "DEFAULT_GROUP", "", "a=1");
        assert_eq!(req.variant_kind(), VariantKind::Base);

        req.gray_name = " canary ".to_string();
        assert_eq!(req.variant_kind(), VariantKind::Gray("canary".to_string()));

        req.tag = "blue".to_string();
        assert_eq!(req.variant_kind(), VariantKind::Tag("blue".to_string()));

        req.beta_ips = "10.0.0.1".to_string();
        assert_eq!(req.variant_kind(), VariantKind::Beta);
    }

    #[test]
    fn test_config_info_carries_cas_md5() {
        let req = ConfigPublishRequest {
            app_name: Some("shop".to_string()),
            cas_md5: Some("abc".to_string()),
            ..ConfigPublishRequest::new("app.yaml", "DEFAULT_GROUP", "public", "a=1")
        };
        let info = req.config_info();
        assert_eq!(info.key.tenant, "public");
        assert_eq!(info.md5.as_deref(), Some("abc"));
        assert_eq!(info.app_name.as_deref(), Some("shop"));
    }

    #[test]
    fn test_same_config_policy_from_str() {
        assert_eq!(
            "skip".parse::<SameConfigPolicy>().unwrap(),
            SameConfigPolicy::Skip
        );
        assert_eq!(
            "OVERWRITE".parse::<SameConfigPolicy>().unwrap(),
            SameConfigPolicy::Overwrite
        );
        assert!("merge".parse::<SameConfigPolicy>().is_err());
        assert_eq!(SameConfigPolicy::default().to_string(), "ABORT");
    }

    #[test]
    fn test_variant_kind_display() {
        assert_eq!(VariantKind::Base.to_string(), "base");
        assert_eq!(VariantKind::Gray("canary".to_string()).to_string(), "gray:canary");
    }
}
