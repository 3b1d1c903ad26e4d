use domain::optimization_unit::OptimizationUnitParts;
use domain::{
    CoreError, EnergyOptimizationUnit, EntityId, EntityKind, OptimizationUnitRepository,
};
use rusqlite::{params, Connection};
use tracing::{debug, error, warn};

use crate::{
    collect_rows, is_primary_key_violation, map_sqerr, parse_optional_id, parse_stored_id,
    unreadable_row, SqliteDb,
};

const KIND: EntityKind = EntityKind::OptimizationUnit;

const COLUMNS: &str = "id, name, description, is_enabled, policy_id, target_miner_ids, \
     energy_source_id, home_forecast_provider_id, performance_tracker_id, notifier_ids";

/// SQLite repository for optimization units. Id lists are stored as JSON
/// arrays of strings.
pub struct SqliteOptimizationUnitRepo {
    db: SqliteDb,
}

struct UnitRow {
    id: String,
    name: String,
    description: Option<String>,
    is_enabled: bool,
    policy_id: Option<String>,
    target_miner_ids: Option<String>,
    energy_source_id: Option<String>,
    home_forecast_provider_id: Option<String>,
    performance_tracker_id: Option<String>,
    notifier_ids: Option<String>,
}

impl SqliteOptimizationUnitRepo {
    pub fn new(db: SqliteDb) -> Result<Self, CoreError> {
        let conn = db.connect(KIND)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS optimization_units (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                is_enabled INTEGER NOT NULL DEFAULT 0 CHECK(is_enabled IN (0,1)),
                policy_id TEXT,
                target_miner_ids TEXT,
                energy_source_id TEXT,
                home_forecast_provider_id TEXT,
                performance_tracker_id TEXT,
                notifier_ids TEXT
            );
            "#,
        )
        .map_err(|e| map_sqerr(KIND, e))?;
        Ok(Self { db })
    }

    fn select(
        &self,
        conn: &Connection,
        filter: &str,
        arg: Option<String>,
    ) -> Result<Vec<rusqlite::Result<UnitRow>>, CoreError> {
        let sql = format!("SELECT {COLUMNS} FROM optimization_units {filter}");
        let mut stmt = conn.prepare(&sql).map_err(|e| map_sqerr(KIND, e))?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<UnitRow> {
            Ok(UnitRow {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                is_enabled: row.get(3)?,
                policy_id: row.get(4)?,
                target_miner_ids: row.get(5)?,
                energy_source_id: row.get(6)?,
                home_forecast_provider_id: row.get(7)?,
                performance_tracker_id: row.get(8)?,
                notifier_ids: row.get(9)?,
            })
        };
        let rows = match arg {
            Some(a) => stmt.query_map(params![a], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| map_sqerr(KIND, e))?;
        collect_rows(KIND, rows)
    }

    fn decode_all(rows: Vec<rusqlite::Result<UnitRow>>) -> Vec<EnergyOptimizationUnit> {
        rows.into_iter()
            .filter_map(|row| {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => {
                        error!(error = %e, "skipping unreadable optimization unit");
                        return None;
                    }
                };
                let id = row.id.clone();
                match decode_row(row) {
                    Ok(unit) => Some(unit),
                    Err(e) => {
                        error!(%id, error = %e, "skipping undecodable optimization unit");
                        None
                    }
                }
            })
            .collect()
    }
}

fn decode_id_list(raw: Option<&str>) -> Result<Vec<EntityId>, CoreError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| CoreError::configuration(KIND, format!("bad id list: {e}"))),
    }
}

fn encode_id_list(ids: &[EntityId]) -> Result<String, CoreError> {
    serde_json::to_string(ids).map_err(|e| CoreError::repository(KIND, e.to_string()))
}

fn decode_row(row: UnitRow) -> Result<EnergyOptimizationUnit, CoreError> {
    Ok(EnergyOptimizationUnit::from_parts(OptimizationUnitParts {
        id: parse_stored_id(KIND, &row.id)?,
        name: row.name,
        description: row.description,
        is_enabled: row.is_enabled,
        policy_id: parse_optional_id(KIND, row.policy_id.as_deref())?,
        target_miner_ids: decode_id_list(row.target_miner_ids.as_deref())?,
        energy_source_id: parse_optional_id(KIND, row.energy_source_id.as_deref())?,
        home_forecast_provider_id: parse_optional_id(
            KIND,
            row.home_forecast_provider_id.as_deref(),
        )?,
        performance_tracker_id: parse_optional_id(KIND, row.performance_tracker_id.as_deref())?,
        notifier_ids: decode_id_list(row.notifier_ids.as_deref())?,
    }))
}

fn opt_text(id: Option<EntityId>) -> Option<String> {
    id.map(|i| i.to_string())
}

impl OptimizationUnitRepository for SqliteOptimizationUnitRepo {
    fn add(&self, unit: &EnergyOptimizationUnit) -> Result<(), CoreError> {
        debug!(id = %unit.id(), "add optimization unit");
        let mut conn = self.db.connect(KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(KIND, e))?;
        let res = tx.execute(
            &format!(
                "INSERT INTO optimization_units ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                unit.id().to_string(),
                unit.name(),
                unit.description(),
                unit.is_enabled(),
                opt_text(unit.policy_id()),
                encode_id_list(unit.target_miner_ids())?,
                opt_text(unit.energy_source_id()),
                opt_text(unit.home_forecast_provider_id()),
                opt_text(unit.performance_tracker_id()),
                encode_id_list(unit.notifier_ids())?,
            ],
        );
        match res {
            Ok(_) => {}
            Err(e) if is_primary_key_violation(&e) => {
                return Err(CoreError::already_exists(KIND, unit.id()));
            }
            Err(e) => return Err(map_sqerr(KIND, e)),
        }
        tx.commit().map_err(|e| map_sqerr(KIND, e))
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<EnergyOptimizationUnit>, CoreError> {
        debug!(%id, "get optimization unit");
        let conn = self.db.connect(KIND)?;
        self.select(&conn, "WHERE id = ?1", Some(id.to_string()))?
            .into_iter()
            .next()
            .map(|r| r.map_err(|e| unreadable_row(KIND, e)).and_then(decode_row))
            .transpose()
    }

    fn get_all(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError> {
        debug!("get all optimization units");
        let conn = self.db.connect(KIND)?;
        Ok(Self::decode_all(self.select(&conn, "", None)?))
    }

    fn get_all_enabled(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError> {
        debug!("get enabled optimization units");
        let conn = self.db.connect(KIND)?;
        Ok(Self::decode_all(self.select(
            &conn,
            "WHERE is_enabled = 1",
            None,
        )?))
    }

    fn update(&self, unit: &EnergyOptimizationUnit) -> Result<(), CoreError> {
        debug!(id = %unit.id(), "update optimization unit");
        let mut conn = self.db.connect(KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(KIND, e))?;
        let changed = tx
            .execute(
                "UPDATE optimization_units SET name = ?1, description = ?2, is_enabled = ?3, \
                 policy_id = ?4, target_miner_ids = ?5, energy_source_id = ?6, \
                 home_forecast_provider_id = ?7, performance_tracker_id = ?8, notifier_ids = ?9 \
                 WHERE id = ?10",
                params![
                    unit.name(),
                    unit.description(),
                    unit.is_enabled(),
                    opt_text(unit.policy_id()),
                    encode_id_list(unit.target_miner_ids())?,
                    opt_text(unit.energy_source_id()),
                    opt_text(unit.home_forecast_provider_id()),
                    opt_text(unit.performance_tracker_id()),
                    encode_id_list(unit.notifier_ids())?,
                    unit.id().to_string(),
                ],
            )
            .map_err(|e| map_sqerr(KIND, e))?;
        if changed == 0 {
            return Err(CoreError::not_found(KIND, unit.id()));
        }
        tx.commit().map_err(|e| map_sqerr(KIND, e))
    }

    fn remove(&self, id: EntityId) -> Result<(), CoreError> {
        debug!(%id, "remove optimization unit");
        let mut conn = self.db.connect(KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(KIND, e))?;
        let changed = tx
            .execute(
                "DELETE FROM optimization_units WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| map_sqerr(KIND, e))?;
        tx.commit().map_err(|e| map_sqerr(KIND, e))?;
        if changed == 0 {
            warn!(%id, "remove optimization unit: nothing stored under this id");
        }
        Ok(())
    }
}
