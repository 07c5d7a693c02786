//! Database module for durable stream storage.
//!
//! Provides async SQLite access using SQLx for every durable category:
//! - Room timeline events and the membership they imply
//! - Read receipts, invites, send-to-device messages
//! - Account data, device list changes, notification counts, presence
//!
//! Each store operation persists a change and issues its stream position in a
//! single statement or transaction, so a position is never issued without the
//! row it names.

mod account_data;
mod device_lists;
mod events;
mod invites;
mod notification_data;
mod presence;
mod receipts;
mod send_to_device;
mod snapshot;

pub use account_data::AccountDataRepository;
pub use device_lists::DeviceListRepository;
pub use events::{EventRepository, StoredEvent};
pub use invites::InviteRepository;
pub use notification_data::NotificationDataRepository;
pub use presence::PresenceRepository;
pub use receipts::ReceiptRepository;
pub use send_to_device::SendToDeviceRepository;
pub use snapshot::DatabaseSnapshot;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use syncd_proto::{IdError, StreamPosition};
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

impl DbError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Sqlx(_) => "sqlx",
            Self::Migration(_) => "migration",
            Self::Serialization(_) => "serialization",
            Self::Corrupt { .. } => "corrupt_row",
        }
    }
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // `file::memory:` is shared process-wide and collides across parallel
            // tests, so every in-memory database gets a unique shared-cache name.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:syncd-ng-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets the startup snapshot read a stable view while consumers write.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Sqlx(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Database integrity check failed: {}", integrity_result),
            ))));
        }

        info!("Database integrity check passed");

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection. Subsequent queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Open a read transaction pinned to the current point in time.
    pub async fn snapshot(&self) -> Result<DatabaseSnapshot, DbError> {
        DatabaseSnapshot::begin(&self.pool).await
    }

    /// Get room event repository.
    pub fn events(&self) -> EventRepository<'_> {
        EventRepository::new(&self.pool)
    }

    /// Get receipt repository.
    pub fn receipts(&self) -> ReceiptRepository<'_> {
        ReceiptRepository::new(&self.pool)
    }

    /// Get invite repository.
    pub fn invites(&self) -> InviteRepository<'_> {
        InviteRepository::new(&self.pool)
    }

    /// Get send-to-device repository.
    pub fn send_to_device(&self) -> SendToDeviceRepository<'_> {
        SendToDeviceRepository::new(&self.pool)
    }

    /// Get account data repository.
    pub fn account_data(&self) -> AccountDataRepository<'_> {
        AccountDataRepository::new(&self.pool)
    }

    /// Get device list repository.
    pub fn device_lists(&self) -> DeviceListRepository<'_> {
        DeviceListRepository::new(&self.pool)
    }

    /// Get notification data repository.
    pub fn notification_data(&self) -> NotificationDataRepository<'_> {
        NotificationDataRepository::new(&self.pool)
    }

    /// Get presence repository.
    pub fn presence(&self) -> PresenceRepository<'_> {
        PresenceRepository::new(&self.pool)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}

/// Half-open range `(from, to]` of positions within one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    pub from: StreamPosition,
    pub to: StreamPosition,
}

impl PositionRange {
    pub fn new(from: StreamPosition, to: StreamPosition) -> Self {
        Self { from, to }
    }

    /// Returns `true` when no position can fall inside the range.
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    pub fn contains(&self, pos: StreamPosition) -> bool {
        pos > self.from && pos <= self.to
    }

    /// Bounds as SQLite integers.
    pub(crate) fn bounds(&self) -> (i64, i64) {
        (bind_position(self.from), bind_position(self.to))
    }
}

/// Row ids are positive, so the conversion only guards against corrupt rows.
pub(crate) fn to_position(id: i64) -> StreamPosition {
    StreamPosition::new(u64::try_from(id).unwrap_or_default())
}

/// Client-supplied positions may exceed what SQLite can store.
pub(crate) fn bind_position(pos: StreamPosition) -> i64 {
    i64::try_from(pos.value()).unwrap_or(i64::MAX)
}

/// Parse an identifier column, mapping validation failures to [`DbError::Corrupt`].
pub(crate) fn parse_id<T>(table: &'static str, value: String) -> Result<T, DbError>
where
    T: TryFrom<String, Error = IdError>,
{
    T::try_from(value).map_err(|e| DbError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|e| DbError::Serialization(e.to_string()))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    table: &'static str,
    value: &str,
) -> Result<T, DbError> {
    serde_json::from_str(value).map_err(|e| DbError::Corrupt {
        table,
        reason: e.to_string(),
    })
}
