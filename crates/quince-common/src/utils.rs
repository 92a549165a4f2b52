//! Utility functions for Quince
//!
//! Identifier validation, key normalization and the content fingerprint.

use std::sync::LazyLock;

use md5::{Digest, Md5};

/// Regex pattern for validating identifiers (dataId, group, etc.)
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]*$").expect("Invalid regex pattern"));

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen
///
/// # Examples
///
/// ```
/// use quince_common::is_valid;
///
/// assert!(is_valid("my-config.yaml"));
/// assert!(is_valid("app_name:v1"));
/// assert!(!is_valid("invalid/path"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Lowercase hex MD5 of the UTF-8 bytes of `content`.
///
/// This is the version token used by every CAS write.
///
/// ```
/// use quince_common::md5_digest;
///
/// assert_eq!(md5_digest("hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
/// ```
pub fn md5_digest(content: &str) -> String {
    const_hex::encode(Md5::digest(content.as_bytes()))
}

/// Blank tenants collapse to the empty string.
pub fn normalize_tenant(tenant: &str) -> String {
    if tenant.trim().is_empty() {
        String::new()
    } else {
        tenant.to_string()
    }
}

/// Blank values collapse to the empty string, others are trimmed.
pub fn trim_or_empty(value: &str) -> String {
    value.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_is_valid_alphanumeric() {
        assert!(is_valid("abc123"));
        assert!(is_valid("test_value"));
        assert!(is_valid("test-value"));
        assert!(is_valid("test.value"));
        assert!(is_valid("test:value"));
    }

    #[test]
    fn test_is_valid_invalid_chars() {
        assert!(!is_valid("test value"));
        assert!(!is_valid("test@value"));
        assert!(!is_valid("test/value"));
    }

    #[test]
    fn test_md5_digest_known_values() {
        assert_eq!(md5_digest(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_digest("hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_normalize_tenant() {
        assert_eq!(normalize_tenant(""), "");
        assert_eq!(normalize_tenant("   "), "");
        assert_eq!(normalize_tenant("dev"), "dev");
    }

    #[test]
    fn test_trim_or_empty() {
        assert_eq!(trim_or_empty("  "), "");
        assert_eq!(trim_or_empty(" canary "), "canary");
    }

    proptest! {
        #[test]
        fn md5_digest_is_32_lowercase_hex(s in ".*") {
            let digest = md5_digest(&s);
            prop_assert_eq!(digest.len(), 32);
            prop_assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }
}
