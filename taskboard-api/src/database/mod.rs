pub mod migrations;
pub mod seed;
pub mod tasks;
pub mod users;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{ffi, types::Type, Connection, Row};
use shared_types::ParseEnumError;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Errors raised by the user and task stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("referenced record does not exist")]
    InvalidReference,
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database error: {0}")]
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::QueryReturnedNoRows = err {
            return StoreError::NotFound;
        }

        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::Conflict(unique_violation_message(message.as_deref()));
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::InvalidReference,
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

/// Maps SQLite's "UNIQUE constraint failed: users.email" to a user facing message
fn unique_violation_message(message: Option<&str>) -> String {
    let column = message
        .and_then(|m| m.rsplit(": ").next())
        .unwrap_or_default();

    match column {
        "users.email" => "Email already exists".to_string(),
        "users.username" => "Username already exists".to_string(),
        _ => "Record already exists".to_string(),
    }
}

/// Reads a text column holding one of the wire enums (role, status, priority)
pub(crate) fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[derive(Clone)]
pub struct AsyncDbConnection {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl AsyncDbConnection {
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn lock(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

pub struct Database {
    pub connection: AsyncDbConnection,
    path: PathBuf,
}

impl Database {
    /// Open the database file, run migrations and build the connection pool
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Migrate on a plain connection so every pooled connection sees the schema
        {
            let conn = Connection::open(db_path)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            migrations::run_migrations(&conn)?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        Ok(Database {
            connection: AsyncDbConnection::new(pool),
            path: db_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every table and recreate an empty schema
    pub async fn reset(&self) -> anyhow::Result<()> {
        let conn = self.connection.lock().await?;
        migrations::drop_all(&conn)?;
        migrations::run_migrations(&conn)?;
        tracing::info!("Database schema reset at {}", self.path.display());
        Ok(())
    }

    pub async fn is_healthy(&self) -> bool {
        match self.connection.lock().await {
            Ok(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;

    /// Fresh database in a temporary directory; keep the guard alive for the test
    pub fn temp_database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("taskboard.db")).unwrap();
        (dir, db)
    }
}
