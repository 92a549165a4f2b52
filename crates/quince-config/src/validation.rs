//! Input validation for publish requests
//!
//! Field rules are declared on [`ConfigPublishRequest`] with `validator`; the
//! content size limit is configurable and checked separately.

use validator::{Validate, ValidationError};

use quince_common::{QuinceError, is_valid};

use crate::model::ConfigPublishRequest;

/// Default maximum content size (10 MiB)
pub const DEFAULT_MAX_CONTENT: usize = 10 * 1024 * 1024;

/// Identifier fields only allow alphanumerics and `_.:-`
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if !is_valid(value) {
        return Err(ValidationError::new("identifier_invalid_chars"));
    }
    Ok(())
}

/// A gray publish must carry a rule
pub fn validate_gray_request(req: &ConfigPublishRequest) -> Result<(), ValidationError> {
    if !req.gray_name.trim().is_empty() && req.gray_rule.trim().is_empty() {
        return Err(ValidationError::new("gray_rule_empty"));
    }
    Ok(())
}

pub fn validate_content(content: &str, max_content: usize) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::new("content_empty"));
    }
    if content.len() > max_content {
        return Err(ValidationError::new("content_too_long"));
    }
    Ok(())
}

/// Run every check on a publish request
///
/// Violations surface as `QuinceError::IllegalArgument`.
pub fn check_publish_request(req: &ConfigPublishRequest, max_content: usize) -> anyhow::Result<()> {
    req.validate()
        .map_err(|e| QuinceError::IllegalArgument(e.to_string()))?;
    validate_content(&req.content, max_content)
        .map_err(|e| QuinceError::IllegalArgument(format!("content: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConfigPublishRequest {
        ConfigPublishRequest::new("app.yaml", "DEFAULT_GROUP", "", "a=1")
    }

    fn is_illegal_argument(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<QuinceError>(),
            Some(QuinceError::IllegalArgument(_))
        )
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("my-config.yaml").is_ok());
        assert!(validate_identifier("app_name:v1").is_ok());
        assert!(validate_identifier("").is_ok());
        assert!(validate_identifier("invalid/path").is_err());
        assert!(validate_identifier("with spaces").is_err());
    }

    #[test]
    fn test_validate_content() {
        assert!(validate_content("a=1", 16).is_ok());
        assert!(validate_content("   ", 16).is_err());
        assert!(validate_content("a".repeat(17).as_str(), 16).is_err());
    }

    #[test]
    fn test_check_publish_request_accepts_valid() {
        assert!(check_publish_request(&request(), DEFAULT_MAX_CONTENT).is_ok());
    }

    #[test]
    fn test_check_publish_request_rejects_bad_fields() {
        let mut req = request();
        req.data_id = "bad/id".to_string();
        let err = check_publish_request(&req, DEFAULT_MAX_CONTENT).unwrap_err();
        assert!(is_illegal_argument(&err));

        let mut req = request();
        req.group = String::new();
        assert!(check_publish_request(&req, DEFAULT_MAX_CONTENT).is_err());

        let mut req = request();
        req.data_id = "a".repeat(257);
        assert!(check_publish_request(&req, DEFAULT_MAX_CONTENT).is_err());

        let mut req = request();
        req.content = String::new();
        let err = check_publish_request(&req, DEFAULT_MAX_CONTENT).unwrap_err();
        assert!(is_illegal_argument(&err));
    }

    #[test]
    fn test_check_publish_request_requires_gray_rule() {
        let mut req = request();
        req.gray_name = "canary".to_string();
        assert!(check_publish_request(&req, DEFAULT_MAX_CONTENT).is_err());

        req.gray_rule = "{\"type\":\"beta\"}".to_string();
        assert!(check_publish_request(&req, DEFAULT_MAX_CONTENT).is_ok());
    }

    #[test]
    fn test_check_publish_request_content_limit() {
        let mut req = request();
        req.content = "a".repeat(64);
        assert!(check_publish_request(&req, 32).is_err());
        assert!(check_publish_request(&req, 64).is_ok());
    }
}
