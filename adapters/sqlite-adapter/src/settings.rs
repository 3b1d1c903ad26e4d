use domain::config::{parse_blob, to_blob};
use domain::settings::GLOBAL_SETTINGS_ID;
use domain::{CoreError, EntityKind, SettingsRepository, SystemSettings};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::{map_sqerr, SqliteDb};

const KIND: EntityKind = EntityKind::Settings;

/// SQLite settings repository. One row per user id; the global record uses
/// the `global_settings` id.
pub struct SqliteSettingsRepo {
    db: SqliteDb,
}

impl SqliteSettingsRepo {
    pub fn new(db: SqliteDb) -> Result<Self, CoreError> {
        let conn = db.connect(KIND)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY,
                settings_json TEXT NOT NULL
            );",
        )
        .map_err(|e| map_sqerr(KIND, e))?;
        Ok(Self { db })
    }
}

impl SettingsRepository for SqliteSettingsRepo {
    fn get_settings(&self, user_id: Option<&str>) -> Result<Option<SystemSettings>, CoreError> {
        let id = user_id.unwrap_or(GLOBAL_SETTINGS_ID);
        debug!(%id, "get settings");
        let conn = self.db.connect(KIND)?;
        let text: Option<String> = conn
            .query_row(
                "SELECT settings_json FROM settings WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| map_sqerr(KIND, e))?;
        text.map(|t| -> Result<SystemSettings, CoreError> {
            let settings = parse_blob(&t).map_err(|e| e.for_kind(KIND))?;
            Ok(SystemSettings {
                id: id.to_string(),
                settings,
            })
        })
        .transpose()
    }

    fn save_settings(
        &self,
        user_id: Option<&str>,
        settings: &SystemSettings,
    ) -> Result<(), CoreError> {
        let id = user_id.unwrap_or(GLOBAL_SETTINGS_ID);
        debug!(%id, "save settings");
        let mut conn = self.db.connect(KIND)?;
        let tx = conn.transaction().map_err(|e| map_sqerr(KIND, e))?;
        tx.execute(
            "INSERT INTO settings (id, settings_json) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET settings_json = excluded.settings_json",
            params![id, to_blob(&settings.settings)],
        )
        .map_err(|e| map_sqerr(KIND, e))?;
        tx.commit().map_err(|e| map_sqerr(KIND, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmp_db;
    use serde_json::json;

    #[test]
    fn save_overwrites_and_reads_back() {
        let (db, _dir) = tmp_db();
        let repo = SqliteSettingsRepo::new(db).unwrap();
        assert_eq!(repo.get_settings(None).unwrap(), None);

        let mut s = SystemSettings::global();
        s.set_setting("timezone", json!("Europe/Rome"));
        repo.save_settings(None, &s).unwrap();
        s.set_setting("latitude", json!(41.9028));
        repo.save_settings(None, &s).unwrap();

        let loaded = repo.get_settings(None).unwrap().unwrap();
        assert_eq!(loaded, s);
        assert_eq!(repo.get_settings(Some("bob")).unwrap(), None);
    }

    #[test]
    fn corrupted_blob_is_a_configuration_error() {
        let (db, _dir) = tmp_db();
        let repo = SqliteSettingsRepo::new(db.clone()).unwrap();
        db.connect(KIND)
            .unwrap()
            .execute(
                "INSERT INTO settings (id, settings_json) VALUES ('global_settings', '[]')",
                [],
            )
            .unwrap();
        assert!(matches!(
            repo.get_settings(None).unwrap_err(),
            CoreError::Configuration { .. }
        ));
    }
}
