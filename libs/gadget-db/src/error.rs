use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("DATABASE_URL must start with sqlite:// (got {0})")]
    InvalidUrl(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be parsed back into its typed form.
    #[error("corrupt value in column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },

    #[error("date arithmetic overflow on subscription {0}")]
    DateOverflow(i64),

    #[error("subscription length of {0} months is out of range")]
    DurationOverflow(u32),
}

pub type StoreResult<T> = Result<T, StoreError>;
