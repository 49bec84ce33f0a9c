use viewline_core::error::CoreError;

/// Error type for engine operations and the worker process.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A domain-level error from `viewline_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Encoding command output failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An environment variable was present but invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for engine results.
pub type WorkerResult<T> = Result<T, WorkerError>;
