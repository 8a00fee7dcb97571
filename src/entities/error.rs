use std::collections::BTreeMap;
use thiserror::Error;

/// Failures raised by a [`super::Store`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),
    /// Another record already holds the value of a unique field.
    #[error("duplicate value for unique field \"{0}\"")]
    Duplicate(&'static str),
}

/// Failures raised by entity accessors. Each variant maps to a stable
/// envelope error code.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("{message}")]
    InvalidAttributes {
        message: String,
        fields: BTreeMap<String, String>,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials.")]
    InvalidCredentials,
    #[error("User is disabled.")]
    UserDisabled,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Authentication required.")]
    Unauthorized,
    #[error("Not authorized, missing scope \"{0}\".")]
    Forbidden(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl EntityError {
    /// Build an `INVALID_ATTRIBUTES` error for a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.clone());
        Self::InvalidAttributes { message, fields }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidAttributes { .. } => "INVALID_ATTRIBUTES",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UserDisabled => "USER_DISABLED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Store(_) | Self::Internal(_) => "INTERNAL",
        }
    }

    /// `true` for failures whose details must stay server-side.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Internal(_))
    }
}

impl From<serde_json::Error> for EntityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(StoreError::Document(err))
    }
}
