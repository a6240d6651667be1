//! Error type shared by the content modules.

use thiserror::Error;

use crate::content::NodeKind;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("{kind} {id} is not owned by the caller")]
    Forbidden { kind: &'static str, id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{message}")]
    Validation {
        message: String,
        reasons: Vec<String>,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ContentResult<T> = Result<T, ContentError>;

impl ContentError {
    pub fn not_found(kind: NodeKind, id: &str) -> Self {
        Self::NotFound {
            kind: kind.label(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(kind: NodeKind, id: &str) -> Self {
        Self::Forbidden {
            kind: kind.label(),
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            reasons: Vec::new(),
        }
    }

    pub fn invalid_with(message: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            reasons,
        }
    }

    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_failed",
            Self::Conflict(_) => "conflict",
            Self::Database(_) => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 422,
            Self::Conflict(_) => 409,
            Self::Database(_) => 500,
        }
    }

    /// Constraint violations and lock contention surface as conflicts,
    /// everything else stays internal.
    pub fn from_write(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref f, _)
                if matches!(
                    f.code,
                    rusqlite::ErrorCode::ConstraintViolation
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Conflict(e.to_string())
            }
            other => Self::Database(other),
        }
    }
}
