use tarantula_core::error::CoreError;

/// Error type returned by repository operations that do more than a single
/// query.
///
/// Wraps [`CoreError`] for domain errors and keeps raw [`sqlx::Error`]s for
/// failures that are not the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A domain-level error from `tarantula_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for repository return values.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Classify a sqlx error, turning constraint violations into
    /// validation errors.
    ///
    /// - `23505` unique violation: the constraint name is reported.
    /// - `23503` foreign key violation: a referenced row is missing.
    /// - `23502` not-null violation: a required column was empty.
    /// - `23514` check violation, e.g. a blank name.
    /// - Everything else stays a database error.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = match db_err.code().as_deref() {
                Some("23505") => Some(format!("has already been taken ({constraint})")),
                Some("23503") => Some(format!("references a missing row ({constraint})")),
                Some("23502") => Some(format!("required value missing: {}", db_err.message())),
                Some("23514") => Some(format!("violates check constraint ({constraint})")),
                _ => None,
            };
            if let Some(message) = message {
                return DbError::Core(CoreError::Validation(message));
            }
        }
        DbError::Database(err)
    }

    /// Whether this error is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Core(CoreError::Validation(_)))
    }
}
