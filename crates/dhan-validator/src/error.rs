//! Validation error types.

use thiserror::Error;

/// Input validation failure, always tied to one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Missing OCO fields: {}", .0.join(", "))]
    MissingOcoFields(Vec<&'static str>),
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Name of the offending field (first missing one for OCO legs).
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => field,
            Self::MissingOcoFields(fields) => fields.first().copied().unwrap_or("order_flag"),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
