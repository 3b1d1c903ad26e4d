use serde::{Deserialize, Serialize};

use crate::config::{
    from_config_map, to_config_map, AdapterConfig, AdapterType, ConfigError, ConfigFamily,
    ConfigMap,
};
use crate::entity::AdapterEntity;
use crate::registry::{Registry, RegistryEntry};
use crate::EntityKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationAdapter {
    Dummy,
    Telegram,
}

impl AdapterType for NotificationAdapter {
    fn as_str(&self) -> &'static str {
        match self {
            NotificationAdapter::Dummy => "dummy",
            NotificationAdapter::Telegram => "telegram",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "dummy" => Some(NotificationAdapter::Dummy),
            "telegram" => Some(NotificationAdapter::Telegram),
            _ => None,
        }
    }

    fn all() -> &'static [Self] {
        &[NotificationAdapter::Dummy, NotificationAdapter::Telegram]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyNotificationConfig {
    pub message: String,
}

impl Default for DummyNotificationConfig {
    fn default() -> Self {
        Self {
            message: "This is a dummy notification".to_string(),
        }
    }
}

impl AdapterConfig for DummyNotificationConfig {
    type Adapter = NotificationAdapter;
    const ADAPTER: NotificationAdapter = NotificationAdapter::Dummy;

    fn to_map(&self) -> ConfigMap {
        to_config_map(self)
    }

    fn from_map(map: &ConfigMap) -> Result<Self, ConfigError> {
        from_config_map(Self::ADAPTER.as_str(), map)
    }
}

/// Telegram bot credentials. Both fields are required.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramNotificationConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl AdapterConfig for TelegramNotificationConfig {
    type Adapter = NotificationAdapter;
    const ADAPTER: NotificationAdapter = NotificationAdapter::Telegram;

    fn to_map(&self) -> ConfigMap {
        to_config_map(self)
    }

    fn from_map(map: &ConfigMap) -> Result<Self, ConfigError> {
        from_config_map(Self::ADAPTER.as_str(), map)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationConfig {
    Dummy(DummyNotificationConfig),
    Telegram(TelegramNotificationConfig),
}

impl From<DummyNotificationConfig> for NotificationConfig {
    fn from(c: DummyNotificationConfig) -> Self {
        NotificationConfig::Dummy(c)
    }
}

impl From<TelegramNotificationConfig> for NotificationConfig {
    fn from(c: TelegramNotificationConfig) -> Self {
        NotificationConfig::Telegram(c)
    }
}

impl ConfigFamily for NotificationConfig {
    type Adapter = NotificationAdapter;
    const KIND: EntityKind = EntityKind::Notifier;
    const LINKS_EXTERNAL_SERVICE: bool = true;

    fn registry() -> &'static Registry<NotificationAdapter, Self> {
        &NOTIFIER_REGISTRY
    }

    fn adapter_type(&self) -> NotificationAdapter {
        match self {
            NotificationConfig::Dummy(_) => DummyNotificationConfig::ADAPTER,
            NotificationConfig::Telegram(_) => TelegramNotificationConfig::ADAPTER,
        }
    }

    fn to_map(&self) -> ConfigMap {
        match self {
            NotificationConfig::Dummy(c) => c.to_map(),
            NotificationConfig::Telegram(c) => c.to_map(),
        }
    }

    fn is_valid_for(&self, adapter: NotificationAdapter) -> bool {
        match self {
            NotificationConfig::Dummy(c) => c.is_valid_for(adapter),
            NotificationConfig::Telegram(c) => c.is_valid_for(adapter),
        }
    }
}

fn decode_dummy(map: &ConfigMap) -> Result<NotificationConfig, ConfigError> {
    DummyNotificationConfig::from_map(map).map(Into::into)
}

fn decode_telegram(map: &ConfigMap) -> Result<NotificationConfig, ConfigError> {
    TelegramNotificationConfig::from_map(map).map(Into::into)
}

static NOTIFIER_ENTRIES: [RegistryEntry<NotificationAdapter, NotificationConfig>; 2] = [
    RegistryEntry {
        adapter: NotificationAdapter::Dummy,
        decode: decode_dummy,
        external_service: None,
    },
    RegistryEntry {
        adapter: NotificationAdapter::Telegram,
        decode: decode_telegram,
        external_service: None,
    },
];

pub static NOTIFIER_REGISTRY: Registry<NotificationAdapter, NotificationConfig> =
    Registry::new(&NOTIFIER_ENTRIES);

pub type Notifier = AdapterEntity<NotificationConfig>;
