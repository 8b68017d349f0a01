use thiserror::Error;

/// Failures while turning a query descriptor into SQL. Identifiers are
/// checked before they are quoted, so most of these point at a column or
/// table name that never came from a resource definition.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Not a valid table identifier: {0}")]
    InvalidTableName(String),

    #[error("Not a valid column: {0}")]
    InvalidColumn(String),

    #[error("Operator not supported here: {0}")]
    UnsupportedOperator(String),

    #[error("Bad operand: {0}")]
    InvalidOperatorData(String),

    #[error("limit {0}")]
    InvalidLimit(String),

    #[error("offset {0}")]
    InvalidOffset(String),
}
