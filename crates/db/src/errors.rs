use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Storage failures that callers are expected to tell apart
#[derive(Error, Debug)]
pub enum DbError {
    /// No row matched the given identifier
    #[error("entity not found")]
    NotFound,

    #[error("unique constraint violation: {message}")]
    UniqueViolation { message: String },

    /// A stored row could not be mapped back onto its domain type
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::UniqueViolation {
                    message: db_err.message().to_string(),
                }
            }
            _ => DbError::Other(anyhow::Error::new(err)),
        }
    }
}
