use thiserror::Error;

use crate::filter::FilterError;

/// Persistence failures. Everything the store cannot classify as a missing
/// row ends up here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Connection(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Row not found: {0}")]
    RowNotFound(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<FilterError> for StoreError {
    fn from(err: FilterError) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|code| code.into_owned());
                match code.as_deref() {
                    // unique_violation, foreign_key_violation, not_null_violation, check_violation
                    Some("23505") | Some("23503") | Some("23502") | Some("23514") => {
                        StoreError::Constraint(db.message().to_string())
                    }
                    _ => StoreError::Sqlx(sqlx::Error::Database(db)),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::Connection(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
            sqlx::Error::RowNotFound => StoreError::RowNotFound("no rows returned".to_string()),
            other => StoreError::Sqlx(other),
        }
    }
}
