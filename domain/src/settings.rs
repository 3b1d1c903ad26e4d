use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigMap;

/// Id of the settings record used when no user is given.
pub const GLOBAL_SETTINGS_ID: &str = "global_settings";

/// Free-form key/value settings, one record per user plus a global one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub id: String,
    pub settings: ConfigMap,
}

impl SystemSettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settings: ConfigMap::new(),
        }
    }

    pub fn global() -> Self {
        Self::new(GLOBAL_SETTINGS_ID)
    }

    pub fn get_setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: Value) {
        self.settings.insert(key.into(), value);
    }
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self::global()
    }
}
