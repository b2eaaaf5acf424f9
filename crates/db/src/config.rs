use crate::error::DbError;

/// Default pool size when `DB_MAX_CONNECTIONS` is unset.
const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default pool acquire timeout when `DB_ACQUIRE_TIMEOUT_SECS` is unset.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Maximum pooled connections (default: `20`).
    pub max_connections: u32,
    /// Seconds to wait for a free connection (default: `30`).
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    /// Load configuration from the environment, reading `.env` first if
    /// present.
    ///
    /// | Env Var                   | Default  |
    /// |---------------------------|----------|
    /// | `DATABASE_URL`            | required |
    /// | `DB_MAX_CONNECTIONS`      | `20`     |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30`     |
    pub fn from_env() -> Result<Self, DbError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DbError::Config("DATABASE_URL must be set".into()))?;

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let acquire_timeout_secs =
            parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", DEFAULT_ACQUIRE_TIMEOUT_SECS)?;

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout_secs,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, DbError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DbError::Config(format!("{key} must be a number, got {raw:?}"))),
    }
}
