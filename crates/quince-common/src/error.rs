//! Error types and error codes for Quince
//!
//! This module defines:
//! - `QuinceError`: Application-specific error enum
//! - `AppError`: Wrapper around `anyhow::Error` for callers that need to downcast
//! - `ErrorCode`: Structured error codes for API responses

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum QuinceError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    /// A row with the same unique key already exists
    #[error("config already exists: {0}")]
    UniquenessConflict(String),

    /// A concurrent writer changed the source while it was being synced
    #[error("sync conflict: {0}")]
    SyncConflict(String),

    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("namespace '{0}' not exist")]
    NamespaceNotExist(String),

    #[error("namespace '{0}' already exist")]
    NamespaceAlreadyExist(String),
}

impl QuinceError {
    /// Map the error to its API error code
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            QuinceError::IllegalArgument(_) => PARAMETER_VALIDATE_ERROR,
            QuinceError::UniquenessConflict(_) => RESOURCE_CONFLICT,
            QuinceError::SyncConflict(_) => CONFIG_SYNC_CONFLICT,
            QuinceError::ConfigNotFound(_) => RESOURCE_NOT_FOUND,
            QuinceError::NamespaceNotExist(_) => NAMESPACE_NOT_EXIST,
            QuinceError::NamespaceAlreadyExist(_) => NAMESPACE_ALREADY_EXIST,
            QuinceError::DatabaseError(_) => DATA_ACCESS_ERROR,
            QuinceError::ConfigError(_) | QuinceError::InternalError(_) => SERVER_ERROR,
        }
    }
}

/// Wrapper for application errors
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl AppError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Error code of the wrapped `QuinceError`, or a generic server error
    pub fn error_code(&self) -> ErrorCode<'static> {
        self.downcast_ref::<QuinceError>()
            .map(QuinceError::error_code)
            .unwrap_or(SERVER_ERROR)
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const TENANT_PARAM_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20001,
    message: "'tenant' parameter error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

pub const INVALID_DATA_ID: ErrorCode<'static> = ErrorCode {
    code: 20008,
    message: "invalid dataId",
};

pub const INVALID_GROUP: ErrorCode<'static> = ErrorCode {
    code: 20009,
    message: "invalid group",
};

pub const CONFIG_CAS_MISMATCH: ErrorCode<'static> = ErrorCode {
    code: 20010,
    message: "config md5 mismatch",
};

pub const CONFIG_SYNC_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20011,
    message: "config changed during sync",
};

pub const NAMESPACE_NOT_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22001,
    message: "namespace not exist",
};

pub const NAMESPACE_ALREADY_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22002,
    message: "namespace already exist",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quince_error_display() {
        let err = QuinceError::IllegalArgument("invalid param".to_string());
        assert_eq!(format!("{}", err), "caused: invalid param");

        let err = QuinceError::SyncConflict("dataId=a".to_string());
        assert_eq!(format!("{}", err), "sync conflict: dataId=a");

        let err = QuinceError::NamespaceNotExist("dev".to_string());
        assert_eq!(format!("{}", err), "namespace 'dev' not exist");
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            QuinceError::UniquenessConflict("k".to_string())
                .error_code()
                .code,
            RESOURCE_CONFLICT.code
        );
        assert_eq!(
            QuinceError::SyncConflict("k".to_string()).error_code().code,
            20011
        );
        assert_eq!(
            QuinceError::InternalError("x".to_string())
                .error_code()
                .code,
            SERVER_ERROR.code
        );
    }

    #[test]
    fn test_app_error_downcast() {
        let app_err = AppError::from(anyhow::Error::new(QuinceError::SyncConflict(
            "k".to_string(),
        )));
        assert!(matches!(
            app_err.downcast_ref::<QuinceError>(),
            Some(QuinceError::SyncConflict(_))
        ));
        assert_eq!(app_err.error_code().code, CONFIG_SYNC_CONFLICT.code);

        let app_err = AppError::from(anyhow::anyhow!("test error"));
        assert_eq!(format!("{}", app_err), "test error");
        assert_eq!(app_err.error_code().code, SERVER_ERROR.code);
    }
}
