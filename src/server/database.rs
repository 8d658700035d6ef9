use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{query, query_as, query_scalar, FromRow};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::server::responses::iso_millis;

/// A row of the `licenses` table.
///
/// Serializes with the column names, which is what `GET /api/admin/info`
/// returns.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct License {
    pub id: i64,
    pub key: String,
    pub plan: String,
    #[serde(with = "iso_millis")]
    pub expires_at: DateTime<Utc>,
    pub device: Option<String>,
    pub is_active: bool,
    pub note: Option<String>,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Whether verification is restricted to a device.
    pub fn is_bound(&self) -> bool {
        self.device.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Values for a new row. `id` is assigned by the store and `is_active`
/// always starts out true.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub key: String,
    pub plan: String,
    pub expires_at: DateTime<Utc>,
    pub device: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "sqlite")]
const SQLITE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        key         TEXT UNIQUE NOT NULL,
        plan        TEXT NOT NULL,
        expires_at  TEXT NOT NULL,
        device      TEXT NULL,
        is_active   BOOLEAN NOT NULL DEFAULT 1,
        note        TEXT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
"#;

#[cfg(feature = "postgres")]
const POSTGRES_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id          BIGSERIAL PRIMARY KEY,
        key         TEXT UNIQUE NOT NULL,
        plan        TEXT NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL,
        device      TEXT NULL,
        is_active   BOOLEAN NOT NULL DEFAULT TRUE,
        note        TEXT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const KEY_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_licenses_key ON licenses(key)";

const LICENSE_COLUMNS: &str = "id, key, plan, expires_at, device, is_active, note, created_at";

/// Latest expiry either backend can store; SQLite date functions stop at
/// year 9999.
pub const LATEST_EXPIRY: &str = "9999-12-31T23:59:59.999Z";

/// Log a store failure and turn it into a `ServerError`.
fn db_error(backend: &'static str, op: &'static str) -> impl FnOnce(sqlx::Error) -> LicenseError {
    move |e| {
        error!("{backend} {op} failed: {e}");
        LicenseError::ServerError(format!("database error: {e}"))
    }
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
///
/// Each method issues exactly one SQL statement.
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Open a connection pool for the configured URL.
    ///
    /// The URL scheme picks the backend. Connecting does not create the
    /// schema; call [`Database::init_schema`] before serving traffic.
    pub async fn connect(config: &DatabaseConfig) -> LicenseResult<Arc<Self>> {
        let url = config.url.as_str();

        if url.starts_with("sqlite:") {
            #[cfg(feature = "sqlite")]
            {
                // Every in-memory connection is its own database.
                let max_connections = if url.contains(":memory:") {
                    1
                } else {
                    config.max_connections
                };

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        LicenseError::ServerError(format!("failed to connect to SQLite: {e}"))
                    })?;

                info!("Connected to SQLite (max_connections={max_connections})");
                return Ok(Arc::new(Database::SQLite(pool)));
            }
            #[cfg(not(feature = "sqlite"))]
            return Err(LicenseError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            ));
        }

        if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            #[cfg(feature = "postgres")]
            {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        LicenseError::ServerError(format!("failed to connect to PostgreSQL: {e}"))
                    })?;

                info!(
                    "Connected to PostgreSQL (max_connections={})",
                    config.max_connections
                );
                return Ok(Arc::new(Database::Postgres(pool)));
            }
            #[cfg(not(feature = "postgres"))]
            return Err(LicenseError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            ));
        }

        Err(LicenseError::ConfigError(format!("unsupported database url: {url}")))
    }

    /// Backend name, for logs.
    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Create the `licenses` table and its key index if they don't exist.
    ///
    /// Safe to run on every startup.
    pub async fn init_schema(&self) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(SQLITE_SCHEMA)
                    .execute(pool)
                    .await
                    .map_err(db_error("SQLite", "init_schema"))?;
                query(KEY_INDEX)
                    .execute(pool)
                    .await
                    .map_err(db_error("SQLite", "init_schema"))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(POSTGRES_SCHEMA)
                    .execute(pool)
                    .await
                    .map_err(db_error("Postgres", "init_schema"))?;
                query(KEY_INDEX)
                    .execute(pool)
                    .await
                    .map_err(db_error("Postgres", "init_schema"))?;
            }
        }

        Ok(())
    }

    /// Insert a new active license.
    ///
    /// Returns:
    /// - `Ok(Some(License))` with the stored row
    /// - `Ok(None)` if a license with the same key already exists
    /// - `Err(LicenseError::ServerError)` on DB failure
    pub async fn insert_license(&self, license: &NewLicense) -> LicenseResult<Option<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let sql = format!(
                    "INSERT INTO licenses (key, plan, expires_at, device, is_active, note, created_at) \
                     VALUES (?, ?, ?, ?, TRUE, ?, ?) \
                     ON CONFLICT(key) DO NOTHING \
                     RETURNING {LICENSE_COLUMNS}"
                );
                query_as::<_, License>(&sql)
                    .bind(&license.key)
                    .bind(&license.plan)
                    .bind(license.expires_at)
                    .bind(&license.device)
                    .bind(&license.note)
                    .bind(license.created_at)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_error("SQLite", "insert_license"))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO licenses (key, plan, expires_at, device, is_active, note, created_at) \
                     VALUES ($1, $2, $3, $4, TRUE, $5, $6) \
                     ON CONFLICT (key) DO NOTHING \
                     RETURNING {LICENSE_COLUMNS}"
                );
                query_as::<_, License>(&sql)
                    .bind(&license.key)
                    .bind(&license.plan)
                    .bind(license.expires_at)
                    .bind(&license.device)
                    .bind(&license.note)
                    .bind(license.created_at)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_error("Postgres", "insert_license"))
            }
        }
    }

    /// Fetch a license by key.
    ///
    /// Returns:
    /// - `Ok(Some(License))` if found
    /// - `Ok(None)` if not found
    /// - `Err(LicenseError::ServerError)` on DB failure
    pub async fn get_license(&self, key: &str) -> LicenseResult<Option<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let sql = format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE key = ? LIMIT 1");
                query_as::<_, License>(&sql)
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_error("SQLite", "get_license"))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let sql = format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE key = $1 LIMIT 1");
                query_as::<_, License>(&sql)
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_error("Postgres", "get_license"))
            }
        }
    }

    /// Push a license's expiry to `max(expires_at, now) + days`.
    ///
    /// The comparison and the write happen in a single UPDATE, so concurrent
    /// extensions of the same key both take effect. Rows whose new expiry
    /// would pass [`LATEST_EXPIRY`] are left alone.
    ///
    /// Returns:
    /// - `Ok(Some(new_expiry))` if the license was extended
    /// - `Ok(None)` if no license matches `key` or the bound would be passed
    /// - `Err(LicenseError::ServerError)` on DB failure
    pub async fn extend_license(
        &self,
        key: &str,
        now: DateTime<Utc>,
        days: f64,
    ) -> LicenseResult<Option<DateTime<Utc>>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, DateTime<Utc>>(
                "UPDATE licenses \
                 SET expires_at = strftime('%Y-%m-%dT%H:%M:%fZ', \
                     MAX(julianday(expires_at), julianday(?1)) + ?2) \
                 WHERE key = ?3 \
                   AND MAX(julianday(expires_at), julianday(?1)) + ?2 <= julianday(?4) \
                 RETURNING expires_at",
            )
            .bind(now)
            .bind(days)
            .bind(key)
            .bind(LATEST_EXPIRY)
            .fetch_optional(pool)
            .await
            .map_err(db_error("SQLite", "extend_license")),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, DateTime<Utc>>(
                "UPDATE licenses \
                 SET expires_at = GREATEST(expires_at, $1) + make_interval(secs => $2) \
                 WHERE key = $3 \
                   AND GREATEST(expires_at, $1) + make_interval(secs => $2) <= $4::timestamptz \
                 RETURNING expires_at",
            )
            .bind(now)
            .bind(days * 86_400.0)
            .bind(key)
            .bind(LATEST_EXPIRY)
            .fetch_optional(pool)
            .await
            .map_err(db_error("Postgres", "extend_license")),
        }
    }

    /// Set the active flag.
    ///
    /// Returns:
    /// - `Ok(true)` if a row was updated
    /// - `Ok(false)` if no matching row was found
    /// - `Err(LicenseError::ServerError)` on DB failure
    pub async fn set_active(&self, key: &str, is_active: bool) -> LicenseResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("UPDATE licenses SET is_active = ? WHERE key = ?")
                .bind(is_active)
                .bind(key)
                .execute(pool)
                .await
                .map_err(db_error("SQLite", "set_active"))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("UPDATE licenses SET is_active = $1 WHERE key = $2")
                .bind(is_active)
                .bind(key)
                .execute(pool)
                .await
                .map_err(db_error("Postgres", "set_active"))?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Bind a license to a device, replacing any previous binding.
    ///
    /// Returns:
    /// - `Ok(true)` if a row was updated
    /// - `Ok(false)` if no matching row was found
    /// - `Err(LicenseError::ServerError)` on DB failure
    pub async fn bind_device(&self, key: &str, device: &str) -> LicenseResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("UPDATE licenses SET device = ? WHERE key = ?")
                .bind(device)
                .bind(key)
                .execute(pool)
                .await
                .map_err(db_error("SQLite", "bind_device"))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("UPDATE licenses SET device = $1 WHERE key = $2")
                .bind(device)
                .bind(key)
                .execute(pool)
                .await
                .map_err(db_error("Postgres", "bind_device"))?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }
}
