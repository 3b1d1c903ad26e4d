use std::marker::PhantomData;

use domain::config::{parse_blob, to_blob};
use domain::entity::adapter_type_locked;
use domain::{
    AdapterEntity, AdapterRepository, AdapterType, ConfigFamily, CoreError, EntityId,
    ExternalServiceConfig, ForecastProviderConfig, LinkedAdapterRepository, NotificationConfig,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, warn};

use crate::{
    collect_rows, is_primary_key_violation, map_sqerr, parse_optional_id, parse_stored_id,
    unreadable_row, SqliteDb,
};

/// Table layout of one adapter entity family.
pub trait AdapterTable: ConfigFamily {
    const TABLE: &'static str;
}

impl AdapterTable for ForecastProviderConfig {
    const TABLE: &'static str = "forecast_providers";
}

impl AdapterTable for NotificationConfig {
    const TABLE: &'static str = "notifiers";
}

impl AdapterTable for ExternalServiceConfig {
    const TABLE: &'static str = "external_services";
}

pub type SqliteForecastProviderRepo = SqliteAdapterRepo<ForecastProviderConfig>;
pub type SqliteNotifierRepo = SqliteAdapterRepo<NotificationConfig>;
pub type SqliteExternalServiceRepo = SqliteAdapterRepo<ExternalServiceConfig>;

/// SQLite repository for one adapter entity family.
pub struct SqliteAdapterRepo<C: AdapterTable> {
    db: SqliteDb,
    _family: PhantomData<fn() -> C>,
}

/// A row as stored, before any decoding.
struct AdapterRow {
    id: String,
    name: String,
    adapter_type: String,
    config: Option<String>,
    external_service_id: Option<String>,
}

impl<C: AdapterTable> SqliteAdapterRepo<C> {
    /// Open the repository, creating its table when missing. Existing rows
    /// are left alone.
    pub fn new(db: SqliteDb) -> Result<Self, CoreError> {
        let repo = Self {
            db,
            _family: PhantomData,
        };
        repo.create_table()?;
        Ok(repo)
    }

    fn create_table(&self) -> Result<(), CoreError> {
        debug!(table = C::TABLE, "ensuring table exists");
        let link_column = if C::LINKS_EXTERNAL_SERVICE {
            ",\n                external_service_id TEXT"
        } else {
            ""
        };
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                adapter_type TEXT NOT NULL,
                config TEXT{link_column}
            )",
            table = C::TABLE
        );
        let conn = self.db.connect(C::KIND)?;
        conn.execute_batch(&sql).map_err(|e| map_sqerr(C::KIND, e))
    }

    fn columns() -> &'static str {
        if C::LINKS_EXTERNAL_SERVICE {
            "id, name, adapter_type, config, external_service_id"
        } else {
            "id, name, adapter_type, config, NULL"
        }
    }

    fn select(
        &self,
        conn: &Connection,
        filter: &str,
        arg: Option<String>,
    ) -> Result<Vec<rusqlite::Result<AdapterRow>>, CoreError> {
        let sql = format!("SELECT {} FROM {} {filter}", Self::columns(), C::TABLE);
        let mut stmt = conn.prepare(&sql).map_err(|e| map_sqerr(C::KIND, e))?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<AdapterRow> {
            Ok(AdapterRow {
                id: row.get(0)?,
                name: row.get(1)?,
                adapter_type: row.get(2)?,
                config: row.get(3)?,
                external_service_id: row.get(4)?,
            })
        };
        let rows = match arg {
            Some(a) => stmt.query_map(params![a], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| map_sqerr(C::KIND, e))?;
        collect_rows(C::KIND, rows)
    }

    /// Decode every row, skipping and logging the ones that fail.
    fn decode_all(rows: Vec<rusqlite::Result<AdapterRow>>) -> Vec<AdapterEntity<C>> {
        rows.into_iter()
            .filter_map(|row| {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => {
                        error!(table = C::TABLE, error = %e, "skipping unreadable row");
                        return None;
                    }
                };
                let id = row.id.clone();
                match decode_row::<C>(row) {
                    Ok(entity) => Some(entity),
                    Err(e) => {
                        error!(table = C::TABLE, %id, error = %e, "skipping undecodable row");
                        None
                    }
                }
            })
            .collect()
    }
}

fn decode_row<C: AdapterTable>(row: AdapterRow) -> Result<AdapterEntity<C>, CoreError> {
    let id = parse_stored_id(C::KIND, &row.id)?;
    let adapter = C::Adapter::from_code(&row.adapter_type).map_err(|e| e.for_kind(C::KIND))?;
    let config = match row.config.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => {
            let map = parse_blob(text).map_err(|e| e.for_kind(C::KIND))?;
            Some(C::decode(adapter, &map).map_err(|e| e.for_kind(C::KIND))?)
        }
    };
    let external_service_id = parse_optional_id(C::KIND, row.external_service_id.as_deref())?;
    AdapterEntity::restore(id, row.name, adapter, config, external_service_id)
}

fn config_blob<C: ConfigFamily>(entity: &AdapterEntity<C>) -> Option<String> {
    entity.config().map(|c| to_blob(&c.to_map()))
}

impl<C: AdapterTable> AdapterRepository<C> for SqliteAdapterRepo<C> {
    fn add(&self, entity: &AdapterEntity<C>) -> Result<(), CoreError> {
        debug!(table = C::TABLE, id = %entity.id(), "add");
        let mut conn = self.db.connect(C::KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(C::KIND, e))?;
        let res = if C::LINKS_EXTERNAL_SERVICE {
            tx.execute(
                &format!(
                    "INSERT INTO {} (id, name, adapter_type, config, external_service_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                    C::TABLE
                ),
                params![
                    entity.id().to_string(),
                    entity.name(),
                    entity.adapter_type().as_str(),
                    config_blob(entity),
                    entity.external_service_id().map(|id| id.to_string()),
                ],
            )
        } else {
            tx.execute(
                &format!(
                    "INSERT INTO {} (id, name, adapter_type, config) VALUES (?1, ?2, ?3, ?4)",
                    C::TABLE
                ),
                params![
                    entity.id().to_string(),
                    entity.name(),
                    entity.adapter_type().as_str(),
                    config_blob(entity),
                ],
            )
        };
        match res {
            Ok(_) => {}
            Err(e) if is_primary_key_violation(&e) => {
                return Err(CoreError::already_exists(C::KIND, entity.id()));
            }
            Err(e) => return Err(map_sqerr(C::KIND, e)),
        }
        tx.commit().map_err(|e| map_sqerr(C::KIND, e))
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<AdapterEntity<C>>, CoreError> {
        debug!(table = C::TABLE, %id, "get_by_id");
        let conn = self.db.connect(C::KIND)?;
        let row = self
            .select(&conn, "WHERE id = ?1", Some(id.to_string()))?
            .into_iter()
            .next();
        row.map(|r| r.map_err(|e| unreadable_row(C::KIND, e)).and_then(decode_row::<C>))
            .transpose()
    }

    fn get_all(&self) -> Result<Vec<AdapterEntity<C>>, CoreError> {
        debug!(table = C::TABLE, "get_all");
        let conn = self.db.connect(C::KIND)?;
        let rows = self.select(&conn, "", None)?;
        Ok(Self::decode_all(rows))
    }

    fn update(&self, entity: &AdapterEntity<C>) -> Result<(), CoreError> {
        debug!(table = C::TABLE, id = %entity.id(), "update");
        let mut conn = self.db.connect(C::KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(C::KIND, e))?;
        let stored: Option<String> = tx
            .query_row(
                &format!("SELECT adapter_type FROM {} WHERE id = ?1", C::TABLE),
                params![entity.id().to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| map_sqerr(C::KIND, e))?;
        match stored {
            None => return Err(CoreError::not_found(C::KIND, entity.id())),
            Some(code) if code != entity.adapter_type().as_str() => {
                return Err(adapter_type_locked(C::KIND, entity.id(), &code));
            }
            Some(_) => {}
        }
        if C::LINKS_EXTERNAL_SERVICE {
            tx.execute(
                &format!(
                    "UPDATE {} SET name = ?1, config = ?2, external_service_id = ?3 WHERE id = ?4",
                    C::TABLE
                ),
                params![
                    entity.name(),
                    config_blob(entity),
                    entity.external_service_id().map(|id| id.to_string()),
                    entity.id().to_string(),
                ],
            )
        } else {
            tx.execute(
                &format!("UPDATE {} SET name = ?1, config = ?2 WHERE id = ?3", C::TABLE),
                params![entity.name(), config_blob(entity), entity.id().to_string()],
            )
        }
        .map_err(|e| map_sqerr(C::KIND, e))?;
        tx.commit().map_err(|e| map_sqerr(C::KIND, e))
    }

    fn remove(&self, id: EntityId) -> Result<(), CoreError> {
        debug!(table = C::TABLE, %id, "remove");
        let mut conn = self.db.connect(C::KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(C::KIND, e))?;
        let changed = tx
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", C::TABLE),
                params![id.to_string()],
            )
            .map_err(|e| map_sqerr(C::KIND, e))?;
        tx.commit().map_err(|e| map_sqerr(C::KIND, e))?;
        if changed == 0 {
            warn!(table = C::TABLE, %id, "remove: nothing stored under this id");
        }
        Ok(())
    }
}

impl<C: AdapterTable> LinkedAdapterRepository<C> for SqliteAdapterRepo<C> {
    fn get_by_external_service_id(
        &self,
        external_service_id: EntityId,
    ) -> Result<Vec<AdapterEntity<C>>, CoreError> {
        debug!(table = C::TABLE, %external_service_id, "get_by_external_service_id");
        if !C::LINKS_EXTERNAL_SERVICE {
            return Ok(Vec::new());
        }
        let conn = self.db.connect(C::KIND)?;
        let rows = self.select(
            &conn,
            "WHERE external_service_id = ?1",
            Some(external_service_id.to_string()),
        )?;
        Ok(Self::decode_all(rows))
    }
}
