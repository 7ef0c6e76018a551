use thiserror::Error;

/// Error taxonomy for the Untold core. One variant per `spec.md` §7 kind,
/// plus the handful of infrastructure variants every module needs.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("the username or password was incorrect, please try again")]
    Unauthorized,

    #[error("null violation: column {0} requires a value")]
    NullViolation(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("bad operator: {0}")]
    BadOperator(String),

    #[error("query shape error: {0}")]
    QueryShape(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto authentication failed")]
    CryptoAuth,

    #[error("unrecognized: {0}")]
    Unrecognized(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
