//! Quince Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all Quince components:
//! - Error types and error codes
//! - Identifier validation and the content fingerprint
//! - Common constants

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, ErrorCode, QuinceError};
pub use utils::{is_valid, md5_digest, normalize_tenant, trim_or_empty};

/// Default namespace ID used when no namespace is specified
pub const DEFAULT_NAMESPACE_ID: &str = "public";

/// Default group name
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Key prefix of tenants registered by the console
pub const DEFAULT_KP: &str = "1";

/// History operation types
pub const OP_TYPE_INSERT: &str = "I";
pub const OP_TYPE_UPDATE: &str = "U";
pub const OP_TYPE_DELETE: &str = "D";

/// History publish types
pub const PUBLISH_TYPE_FORMAL: &str = "formal";
pub const PUBLISH_TYPE_GRAY: &str = "gray";
