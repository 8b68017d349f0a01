use thiserror::Error;

/// Request input rejected by a compiled validator. `path` names the offending
/// field, e.g. `query.limit` or `body.name`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path} {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A schema that cannot be compiled. Raised when the router is built, never
/// per request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Invalid bounds for field {0}: min exceeds max")]
    InvalidBounds(String),

    #[error("Invalid default for field {field}: {reason}")]
    InvalidDefault { field: String, reason: String },

    #[error("Field {0} cannot be required and forbidden or denied")]
    RequiredForbidden(String),

    #[error("Unknown association: {0}")]
    UnknownAssociation(String),
}
