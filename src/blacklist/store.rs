use async_trait::async_trait;
use color_eyre::Report;
use secrecy::ExposeSecret;
use std::error::Error as StdError;
use std::fmt;

mod memory;
mod postgres;
mod redis;
mod sql;

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;
pub use self::redis::RedisStore;
pub use self::sql::SqlStore;

use super::{BlacklistEntry, CreateOutcome, NewEntry};
use crate::config::DatabaseConfig;

type Result<T> = std::result::Result<T, StoreError>;

/// Error type for blacklist store operations.
///
/// A duplicate email is not an error, see [`CreateOutcome::AlreadyExists`].
#[derive(Debug)]
pub struct StoreError {
    error: Report,
}

impl StoreError {
    pub fn new<T>(error: T) -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        Self {
            error: Report::new(error),
        }
    }

    pub fn msg<T>(message: T) -> Self
    where
        T: fmt::Debug + fmt::Display + Send + Sync + 'static,
    {
        Self {
            error: Report::msg(message),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl From<::redis::RedisError> for StoreError {
    fn from(error: ::redis::RedisError) -> Self {
        Self::new(error)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self::new(error)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

/// Abstract interface for blacklist storage backends.
#[async_trait]
pub trait BlacklistStore: Send + Sync + Clone + 'static {
    /// Creates the schema if it does not exist yet. Idempotent.
    async fn migrate(&self) -> Result<()>;

    /// Persists a new entry unless its email is already present.
    ///
    /// Two concurrent calls for the same email must yield exactly one
    /// [`CreateOutcome::Created`]; the arbitration happens in the backend.
    async fn create(&self, entry: NewEntry) -> Result<CreateOutcome>;

    /// Looks up an entry by its normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<BlacklistEntry>>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Store selected at runtime from the configured database URL.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Memory(MemoryStore),
    Redis(RedisStore),
    Sql(SqlStore),
    Postgres(PgStore),
}

#[async_trait]
impl BlacklistStore for AnyStore {
    async fn migrate(&self) -> Result<()> {
        match self {
            Self::Memory(store) => store.migrate().await,
            Self::Redis(store) => store.migrate().await,
            Self::Sql(store) => store.migrate().await,
            Self::Postgres(store) => store.migrate().await,
        }
    }

    async fn create(&self, entry: NewEntry) -> Result<CreateOutcome> {
        match self {
            Self::Memory(store) => store.create(entry).await,
            Self::Redis(store) => store.create(entry).await,
            Self::Sql(store) => store.create(entry).await,
            Self::Postgres(store) => store.create(entry).await,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BlacklistEntry>> {
        match self {
            Self::Memory(store) => store.find_by_email(email).await,
            Self::Redis(store) => store.find_by_email(email).await,
            Self::Sql(store) => store.find_by_email(email).await,
            Self::Postgres(store) => store.find_by_email(email).await,
        }
    }

    async fn ping(&self) -> Result<()> {
        match self {
            Self::Memory(store) => store.ping().await,
            Self::Redis(store) => store.ping().await,
            Self::Sql(store) => store.ping().await,
            Self::Postgres(store) => store.ping().await,
        }
    }
}

/// Backend family named by a database URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Memory,
    Redis,
    Sqlite,
    Postgres,
}

impl Backend {
    fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once(':')?;
        match scheme {
            "memory" => Some(Self::Memory),
            "redis" | "rediss" => Some(Self::Redis),
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Opens the backend named by the URL scheme in `config`.
///
/// # Errors
/// Returns an error if the scheme is unknown or the backend cannot be reached.
pub async fn open_store(config: &DatabaseConfig) -> Result<AnyStore> {
    let url = config.url.expose_secret();

    let store = match Backend::from_url(url) {
        Some(Backend::Memory) => {
            tracing::warn!("Using in-memory blacklist store, entries will not survive a restart");
            AnyStore::Memory(MemoryStore::default())
        }
        Some(Backend::Redis) => AnyStore::Redis(RedisStore::connect(url).await?),
        Some(Backend::Sqlite) => {
            AnyStore::Sql(SqlStore::connect(url, config.max_connections).await?)
        }
        Some(Backend::Postgres) => {
            AnyStore::Postgres(PgStore::connect(url, config.max_connections).await?)
        }
        None => {
            // The URL may embed credentials, only report the scheme.
            let scheme = url.split(':').next().unwrap_or_default().to_owned();
            return Err(StoreError::msg(format!(
                "unsupported database url scheme `{scheme}`"
            )));
        }
    };

    store.ping().await?;
    Ok(store)
}
