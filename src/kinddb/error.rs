use crate::key::Key;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KindError {
    /// Malformed key, property declaration or schema.
    #[error("Construction error: {0}")]
    Construction(String),

    /// A value failed a property's type, range or choice check.
    #[error("Validation error on '{property}': {message}")]
    Validation { property: String, message: String },

    #[error("Entity not found: {0}")]
    NotFound(Key),

    #[error("No schema registered for kind '{0}'")]
    UnknownKind(String),

    #[error("Filter nodes cannot be ordered")]
    Ordering,

    #[error("Internal consistency error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KindError {
    pub fn validation(property: impl Into<String>, message: impl Into<String>) -> Self {
        KindError::Validation {
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KindError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, KindError>;
