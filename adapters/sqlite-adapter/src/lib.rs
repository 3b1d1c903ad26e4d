//! sqlite-adapter: SQLite implementation of every repository port of the
//! `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - A fresh connection is opened for every operation (5 s busy timeout) and
//!   dropped when the call returns; writes run inside a transaction.
//! - Configuration values are stored as JSON object text in a `config` column
//!   and decoded through the adapter type registry on the way out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use domain::{CoreError, EntityId, EntityKind};
use rusqlite::{Connection, ErrorCode};
use tracing::error;

mod adapter_repo;
mod optimization_unit;
mod settings;

pub use adapter_repo::{
    AdapterTable, SqliteAdapterRepo, SqliteExternalServiceRepo, SqliteForecastProviderRepo,
    SqliteNotifierRepo,
};
pub use optimization_unit::SqliteOptimizationUnitRepo;
pub use settings::SqliteSettingsRepo;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Location of the database file. Cheap to clone; holds no open handle.
#[derive(Clone, Debug)]
pub struct SqliteDb {
    path: PathBuf,
}

impl SqliteDb {
    /// Point at a database file, creating its parent directory and checking
    /// that it can be opened.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                CoreError::repository(
                    EntityKind::Settings,
                    format!("cannot create {}: {e}", dir.display()),
                )
            })?;
        }
        let db = Self { path };
        db.connect(EntityKind::Settings)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connect(&self, kind: EntityKind) -> Result<Connection, CoreError> {
        let conn = Connection::open(&self.path).map_err(|e| map_sqerr(kind, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| map_sqerr(kind, e))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| map_sqerr(kind, e))?;
        Ok(conn)
    }
}

fn map_sqerr(kind: EntityKind, e: rusqlite::Error) -> CoreError {
    let message = match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            format!("database is busy: {e}")
        }
        _ => format!("sqlite error: {e}"),
    };
    error!(%kind, "{message}");
    CoreError::repository(kind, message)
}

/// Errors raised while converting one row's columns. They concern that row
/// only; anything else means the query itself failed.
fn is_column_decode_error(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::Utf8Error(_)
    )
}

/// Run a row query, keeping column conversion failures per row.
fn collect_rows<T>(
    kind: EntityKind,
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<rusqlite::Result<T>>, CoreError> {
    let mut out = Vec::new();
    for row in rows {
        match row {
            Err(e) if !is_column_decode_error(&e) => return Err(map_sqerr(kind, e)),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn unreadable_row(kind: EntityKind, e: rusqlite::Error) -> CoreError {
    CoreError::configuration(kind, format!("unreadable stored row: {e}"))
}

fn is_primary_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn parse_stored_id(kind: EntityKind, raw: &str) -> Result<EntityId, CoreError> {
    domain::validate::parse_id(kind, raw)
}

fn parse_optional_id(kind: EntityKind, raw: Option<&str>) -> Result<Option<EntityId>, CoreError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_stored_id(kind, s))
        .transpose()
}

#[cfg(test)]
pub(crate) fn tmp_db() -> (SqliteDb, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteDb::new(dir.path().join("nested").join("t.db")).unwrap();
    (db, dir)
}
