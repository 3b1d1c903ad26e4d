//! External services: shared connections (e.g. a Home Assistant instance)
//! that other adapters reference by id.

use serde::{Deserialize, Serialize};

use crate::config::{
    from_config_map, to_config_map, AdapterConfig, AdapterType, ConfigError, ConfigFamily,
    ConfigMap,
};
use crate::entity::AdapterEntity;
use crate::registry::{Registry, RegistryEntry};
use crate::EntityKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalServiceAdapter {
    HomeAssistantApi,
}

impl AdapterType for ExternalServiceAdapter {
    fn as_str(&self) -> &'static str {
        match self {
            ExternalServiceAdapter::HomeAssistantApi => "home_assistant_api",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "home_assistant_api" => Some(ExternalServiceAdapter::HomeAssistantApi),
            _ => None,
        }
    }

    fn all() -> &'static [Self] {
        &[ExternalServiceAdapter::HomeAssistantApi]
    }
}

/// Connection to a Home Assistant instance. Both fields are required.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeAssistantServiceConfig {
    pub url: String,
    pub token: String,
}

impl AdapterConfig for HomeAssistantServiceConfig {
    type Adapter = ExternalServiceAdapter;
    const ADAPTER: ExternalServiceAdapter = ExternalServiceAdapter::HomeAssistantApi;

    fn to_map(&self) -> ConfigMap {
        to_config_map(self)
    }

    fn from_map(map: &ConfigMap) -> Result<Self, ConfigError> {
        from_config_map(Self::ADAPTER.as_str(), map)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExternalServiceConfig {
    HomeAssistant(HomeAssistantServiceConfig),
}

impl From<HomeAssistantServiceConfig> for ExternalServiceConfig {
    fn from(c: HomeAssistantServiceConfig) -> Self {
        ExternalServiceConfig::HomeAssistant(c)
    }
}

impl ConfigFamily for ExternalServiceConfig {
    type Adapter = ExternalServiceAdapter;
    const KIND: EntityKind = EntityKind::ExternalService;
    const LINKS_EXTERNAL_SERVICE: bool = false;

    fn registry() -> &'static Registry<ExternalServiceAdapter, Self> {
        &EXTERNAL_SERVICE_REGISTRY
    }

    fn adapter_type(&self) -> ExternalServiceAdapter {
        match self {
            ExternalServiceConfig::HomeAssistant(_) => HomeAssistantServiceConfig::ADAPTER,
        }
    }

    fn to_map(&self) -> ConfigMap {
        match self {
            ExternalServiceConfig::HomeAssistant(c) => c.to_map(),
        }
    }

    fn is_valid_for(&self, adapter: ExternalServiceAdapter) -> bool {
        match self {
            ExternalServiceConfig::HomeAssistant(c) => c.is_valid_for(adapter),
        }
    }
}

fn decode_home_assistant(map: &ConfigMap) -> Result<ExternalServiceConfig, ConfigError> {
    HomeAssistantServiceConfig::from_map(map).map(Into::into)
}

static EXTERNAL_SERVICE_ENTRIES: [RegistryEntry<ExternalServiceAdapter, ExternalServiceConfig>;
    1] = [RegistryEntry {
    adapter: ExternalServiceAdapter::HomeAssistantApi,
    decode: decode_home_assistant,
    external_service: None,
}];

pub static EXTERNAL_SERVICE_REGISTRY: Registry<ExternalServiceAdapter, ExternalServiceConfig> =
    Registry::new(&EXTERNAL_SERVICE_ENTRIES);

/// Entity for an external service. Never references another service.
pub type ExternalService = AdapterEntity<ExternalServiceConfig>;
