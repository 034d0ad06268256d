/*
[INPUT]:  Task construction failures and unexpected internal faults
[OUTPUT]: Classified errors (validation vs fatal) for the controller boundary
[POS]:    Error handling layer - strategy crate
[UPDATE]: When adding new validation classes
*/

use serde::Serialize;
use thiserror::Error;

/// Classification of a rejected request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidParams,
    AlreadyExists,
    NotFound,
}

#[derive(Error, Debug)]
pub enum TaskError {
    /// Bad input or a violated precondition; reported back to the caller.
    #[error("{message}")]
    Validation { code: ErrorCode, message: String },

    /// Anything else; propagated to the process boundary.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl TaskError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        TaskError::Validation {
            code: ErrorCode::InvalidParams,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        TaskError::Validation {
            code: ErrorCode::AlreadyExists,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        TaskError::Validation {
            code: ErrorCode::NotFound,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TaskError::Validation { code, .. } => Some(*code),
            TaskError::Fatal(_) => None,
        }
    }
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;
