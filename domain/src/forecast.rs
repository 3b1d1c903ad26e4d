//! Energy forecast providers.

use serde::{Deserialize, Serialize};

use crate::config::{
    from_config_map, to_config_map, AdapterConfig, AdapterType, ConfigError, ConfigFamily,
    ConfigMap,
};
use crate::entity::AdapterEntity;
use crate::external_service::ExternalServiceAdapter;
use crate::registry::{Registry, RegistryEntry};
use crate::EntityKind;

/// Types of forecast provider adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForecastProviderAdapter {
    DummySolar,
    HomeAssistantApi,
}

impl AdapterType for ForecastProviderAdapter {
    fn as_str(&self) -> &'static str {
        match self {
            ForecastProviderAdapter::DummySolar => "dummy_solar",
            ForecastProviderAdapter::HomeAssistantApi => "home_assistant_api",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "dummy_solar" => Some(ForecastProviderAdapter::DummySolar),
            "home_assistant_api" => Some(ForecastProviderAdapter::HomeAssistantApi),
            _ => None,
        }
    }

    fn all() -> &'static [Self] {
        &[
            ForecastProviderAdapter::DummySolar,
            ForecastProviderAdapter::HomeAssistantApi,
        ]
    }
}

/// Synthetic solar production curve, useful without any hardware.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DummySolarForecastConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub capacity_kwp: f64,
    pub efficiency_percent: f64,
    pub production_start_hour: u8,
    pub production_end_hour: u8,
}

impl Default for DummySolarForecastConfig {
    fn default() -> Self {
        Self {
            latitude: 41.90,
            longitude: 12.49,
            capacity_kwp: 0.0,
            efficiency_percent: 80.0,
            production_start_hour: 6,
            production_end_hour: 20,
        }
    }
}

impl AdapterConfig for DummySolarForecastConfig {
    type Adapter = ForecastProviderAdapter;
    const ADAPTER: ForecastProviderAdapter = ForecastProviderAdapter::DummySolar;

    fn to_map(&self) -> ConfigMap {
        to_config_map(self)
    }

    fn from_map(map: &ConfigMap) -> Result<Self, ConfigError> {
        let cfg: Self = from_config_map(Self::ADAPTER.as_str(), map)?;
        cfg.validate()?;
        Ok(cfg)
    }

    // NaN and infinities have no JSON form; they would be stored as null.
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("capacity_kwp", self.capacity_kwp),
            ("efficiency_percent", self.efficiency_percent),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, _)) => Err(ConfigError::Invalid {
                adapter: Self::ADAPTER.as_str(),
                reason: format!("{name} must be a finite number"),
            }),
            None => Ok(()),
        }
    }
}

/// Forecast read from Home Assistant sensor entities.
///
/// Empty entity ids mean "not provided"; units default to W for power and
/// kWh for energy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantForecastConfig {
    pub entity_forecast_power_actual_h: String,
    pub entity_forecast_power_next_1h: String,
    pub entity_forecast_power_next_12h: String,
    pub entity_forecast_power_next_24h: String,
    pub entity_forecast_energy_actual_h: String,
    pub entity_forecast_energy_next_1h: String,
    pub entity_forecast_energy_today: String,
    pub entity_forecast_energy_tomorrow: String,
    pub entity_forecast_energy_remaining_today: String,
    pub unit_forecast_power_actual_h: String,
    pub unit_forecast_power_next_1h: String,
    pub unit_forecast_power_next_12h: String,
    pub unit_forecast_power_next_24h: String,
    pub unit_forecast_energy_actual_h: String,
    pub unit_forecast_energy_next_1h: String,
    pub unit_forecast_energy_today: String,
    pub unit_forecast_energy_tomorrow: String,
    pub unit_forecast_energy_remaining_today: String,
}

impl Default for HomeAssistantForecastConfig {
    fn default() -> Self {
        let power = || "W".to_string();
        let energy = || "kWh".to_string();
        Self {
            entity_forecast_power_actual_h: String::new(),
            entity_forecast_power_next_1h: String::new(),
            entity_forecast_power_next_12h: String::new(),
            entity_forecast_power_next_24h: String::new(),
            entity_forecast_energy_actual_h: String::new(),
            entity_forecast_energy_next_1h: String::new(),
            entity_forecast_energy_today: String::new(),
            entity_forecast_energy_tomorrow: String::new(),
            entity_forecast_energy_remaining_today: String::new(),
            unit_forecast_power_actual_h: power(),
            unit_forecast_power_next_1h: power(),
            unit_forecast_power_next_12h: power(),
            unit_forecast_power_next_24h: power(),
            unit_forecast_energy_actual_h: energy(),
            unit_forecast_energy_next_1h: energy(),
            unit_forecast_energy_today: energy(),
            unit_forecast_energy_tomorrow: energy(),
            unit_forecast_energy_remaining_today: energy(),
        }
    }
}

impl AdapterConfig for HomeAssistantForecastConfig {
    type Adapter = ForecastProviderAdapter;
    const ADAPTER: ForecastProviderAdapter = ForecastProviderAdapter::HomeAssistantApi;

    fn to_map(&self) -> ConfigMap {
        to_config_map(self)
    }

    fn from_map(map: &ConfigMap) -> Result<Self, ConfigError> {
        from_config_map(Self::ADAPTER.as_str(), map)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ForecastProviderConfig {
    DummySolar(DummySolarForecastConfig),
    HomeAssistant(HomeAssistantForecastConfig),
}

impl From<DummySolarForecastConfig> for ForecastProviderConfig {
    fn from(c: DummySolarForecastConfig) -> Self {
        ForecastProviderConfig::DummySolar(c)
    }
}

impl From<HomeAssistantForecastConfig> for ForecastProviderConfig {
    fn from(c: HomeAssistantForecastConfig) -> Self {
        ForecastProviderConfig::HomeAssistant(c)
    }
}

impl ConfigFamily for ForecastProviderConfig {
    type Adapter = ForecastProviderAdapter;
    const KIND: EntityKind = EntityKind::ForecastProvider;
    const LINKS_EXTERNAL_SERVICE: bool = true;

    fn registry() -> &'static Registry<ForecastProviderAdapter, Self> {
        &FORECAST_PROVIDER_REGISTRY
    }

    fn adapter_type(&self) -> ForecastProviderAdapter {
        match self {
            ForecastProviderConfig::DummySolar(_) => DummySolarForecastConfig::ADAPTER,
            ForecastProviderConfig::HomeAssistant(_) => HomeAssistantForecastConfig::ADAPTER,
        }
    }

    fn to_map(&self) -> ConfigMap {
        match self {
            ForecastProviderConfig::DummySolar(c) => c.to_map(),
            ForecastProviderConfig::HomeAssistant(c) => c.to_map(),
        }
    }

    fn is_valid_for(&self, adapter: ForecastProviderAdapter) -> bool {
        match self {
            ForecastProviderConfig::DummySolar(c) => c.is_valid_for(adapter),
            ForecastProviderConfig::HomeAssistant(c) => c.is_valid_for(adapter),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ForecastProviderConfig::DummySolar(c) => c.validate(),
            ForecastProviderConfig::HomeAssistant(c) => c.validate(),
        }
    }
}

fn decode_dummy_solar(map: &ConfigMap) -> Result<ForecastProviderConfig, ConfigError> {
    DummySolarForecastConfig::from_map(map).map(Into::into)
}

fn decode_home_assistant(map: &ConfigMap) -> Result<ForecastProviderConfig, ConfigError> {
    HomeAssistantForecastConfig::from_map(map).map(Into::into)
}

static FORECAST_PROVIDER_ENTRIES: [RegistryEntry<ForecastProviderAdapter, ForecastProviderConfig>;
    2] = [
    RegistryEntry {
        adapter: ForecastProviderAdapter::DummySolar,
        decode: decode_dummy_solar,
        external_service: None,
    },
    RegistryEntry {
        adapter: ForecastProviderAdapter::HomeAssistantApi,
        decode: decode_home_assistant,
        external_service: Some(ExternalServiceAdapter::HomeAssistantApi),
    },
];

pub static FORECAST_PROVIDER_REGISTRY: Registry<ForecastProviderAdapter, ForecastProviderConfig> =
    Registry::new(&FORECAST_PROVIDER_ENTRIES);

/// Entity for a forecast provider.
pub type ForecastProvider = AdapterEntity<ForecastProviderConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adapter_codes_roundtrip() {
        for a in ForecastProviderAdapter::all() {
            assert_eq!(ForecastProviderAdapter::parse(a.as_str()), Some(*a));
        }
        assert_eq!(ForecastProviderAdapter::parse("solcast"), None);
    }

    #[test]
    fn dummy_solar_roundtrip() {
        let cfg = DummySolarForecastConfig {
            latitude: 45.4642,
            longitude: 9.19,
            capacity_kwp: 6.3,
            efficiency_percent: 77.5,
            production_start_hour: 5,
            production_end_hour: 21,
        };
        assert_eq!(DummySolarForecastConfig::from_map(&cfg.to_map()).unwrap(), cfg);
    }

    #[test]
    fn home_assistant_roundtrip() {
        let cfg = HomeAssistantForecastConfig {
            entity_forecast_power_actual_h: "sensor.power_now".into(),
            entity_forecast_energy_today: "sensor.energy_today".into(),
            unit_forecast_energy_today: "Wh".into(),
            ..Default::default()
        };
        assert_eq!(HomeAssistantForecastConfig::from_map(&cfg.to_map()).unwrap(), cfg);
    }

    #[test]
    fn to_map_is_stable_and_ordered() {
        let map = DummySolarForecastConfig::default().to_map();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(
            keys,
            [
                "latitude",
                "longitude",
                "capacity_kwp",
                "efficiency_percent",
                "production_start_hour",
                "production_end_hour"
            ]
        );
        assert_eq!(map, DummySolarForecastConfig::default().to_map());
    }

    #[test]
    fn missing_optional_keys_fall_back_to_defaults() {
        let mut map = ConfigMap::new();
        map.insert("capacity_kwp".into(), json!(3.5));
        let cfg = DummySolarForecastConfig::from_map(&map).unwrap();
        assert_eq!(cfg.capacity_kwp, 3.5);
        assert_eq!(cfg.production_start_hour, 6);
        assert_eq!(cfg.latitude, 41.90);
    }

    #[test]
    fn wrong_primitive_type_is_rejected() {
        let mut map = ConfigMap::new();
        map.insert("capacity_kwp".into(), json!("lots"));
        let err = DummySolarForecastConfig::from_map(&map).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { adapter: "dummy_solar", .. }));

        let mut map = ConfigMap::new();
        map.insert("unit_forecast_energy_today".into(), json!(42));
        assert!(HomeAssistantForecastConfig::from_map(&map).is_err());
    }

    #[test]
    fn variants_only_accept_their_own_adapter() {
        let dummy = DummySolarForecastConfig::default();
        assert!(dummy.is_valid_for(ForecastProviderAdapter::DummySolar));
        assert!(!dummy.is_valid_for(ForecastProviderAdapter::HomeAssistantApi));
    }

    #[test]
    fn registry_is_consistent() {
        for adapter in FORECAST_PROVIDER_REGISTRY.adapters() {
            let defaults = match adapter {
                ForecastProviderAdapter::DummySolar => DummySolarForecastConfig::default().to_map(),
                ForecastProviderAdapter::HomeAssistantApi => {
                    HomeAssistantForecastConfig::default().to_map()
                }
            };
            let cfg = ForecastProviderConfig::decode(adapter, &defaults).unwrap();
            assert!(cfg.is_valid_for(adapter));
            assert_eq!(cfg.adapter_type(), adapter);
        }
        assert_eq!(
            FORECAST_PROVIDER_REGISTRY.adapters().count(),
            ForecastProviderAdapter::all().len()
        );
        assert_eq!(
            FORECAST_PROVIDER_REGISTRY.external_service_for(ForecastProviderAdapter::HomeAssistantApi),
            Some(ExternalServiceAdapter::HomeAssistantApi)
        );
        assert_eq!(
            FORECAST_PROVIDER_REGISTRY.external_service_for(ForecastProviderAdapter::DummySolar),
            None
        );
    }

    mod generated {
        use super::*;
        use crate::config::{parse_blob, to_blob};
        use proptest::prelude::*;

        fn finite() -> impl Strategy<Value = f64> {
            any::<f64>().prop_filter("finite", |v| v.is_finite())
        }

        prop_compose! {
            fn dummy_solar()(
                latitude in finite(),
                longitude in finite(),
                capacity_kwp in finite(),
                efficiency_percent in finite(),
                production_start_hour in any::<u8>(),
                production_end_hour in any::<u8>(),
            ) -> DummySolarForecastConfig {
                DummySolarForecastConfig {
                    latitude,
                    longitude,
                    capacity_kwp,
                    efficiency_percent,
                    production_start_hour,
                    production_end_hour,
                }
            }
        }

        fn home_assistant() -> impl Strategy<Value = HomeAssistantForecastConfig> {
            proptest::collection::vec("\\PC{0,24}", 18).prop_map(|fields| {
                let mut it = fields.into_iter();
                let mut next = || it.next().unwrap_or_default();
                HomeAssistantForecastConfig {
                    entity_forecast_power_actual_h: next(),
                    entity_forecast_power_next_1h: next(),
                    entity_forecast_power_next_12h: next(),
                    entity_forecast_power_next_24h: next(),
                    entity_forecast_energy_actual_h: next(),
                    entity_forecast_energy_next_1h: next(),
                    entity_forecast_energy_today: next(),
                    entity_forecast_energy_tomorrow: next(),
                    entity_forecast_energy_remaining_today: next(),
                    unit_forecast_power_actual_h: next(),
                    unit_forecast_power_next_1h: next(),
                    unit_forecast_power_next_12h: next(),
                    unit_forecast_power_next_24h: next(),
                    unit_forecast_energy_actual_h: next(),
                    unit_forecast_energy_next_1h: next(),
                    unit_forecast_energy_today: next(),
                    unit_forecast_energy_tomorrow: next(),
                    unit_forecast_energy_remaining_today: next(),
                }
            })
        }

        fn any_config() -> impl Strategy<Value = ForecastProviderConfig> {
            prop_oneof![
                dummy_solar().prop_map(ForecastProviderConfig::from),
                home_assistant().prop_map(ForecastProviderConfig::from),
            ]
        }

        proptest! {
            #[test]
            fn dummy_solar_map_roundtrip(cfg in dummy_solar()) {
                prop_assert_eq!(DummySolarForecastConfig::from_map(&cfg.to_map()).unwrap(), cfg);
            }

            #[test]
            fn home_assistant_map_roundtrip(cfg in home_assistant()) {
                prop_assert_eq!(HomeAssistantForecastConfig::from_map(&cfg.to_map()).unwrap(), cfg);
            }

            #[test]
            fn stored_blob_decodes_to_same_value(cfg in any_config()) {
                let adapter = cfg.adapter_type();
                prop_assert!(cfg.is_valid_for(adapter));
                prop_assert!(cfg.validate().is_ok());
                let map = parse_blob(&to_blob(&cfg.to_map())).unwrap();
                prop_assert_eq!(ForecastProviderConfig::decode(adapter, &map).unwrap(), cfg);
            }
        }
    }
}
