//! Configuration values attached to adapter entities.
//!
//! Every adapter type has exactly one configuration shape. A shape converts to
//! and from a [`ConfigMap`] (a JSON object whose key order follows the field
//! declaration order), and the union of all shapes of one domain implements
//! [`ConfigFamily`], which ties it to the domain's adapter enum and registry.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::registry::Registry;
use crate::{CoreError, EntityKind};

/// Ordered key/value map of primitives and nested maps.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Errors raised while validating or decoding a configuration payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown adapter type '{0}'")]
    UnknownAdapter(String),
    #[error("no configuration registered for adapter type '{0}'")]
    Unregistered(&'static str),
    #[error("configuration blob is not a JSON object")]
    NotAnObject,
    #[error("malformed configuration blob: {0}")]
    Malformed(String),
    #[error("invalid configuration for '{adapter}': {reason}")]
    Invalid {
        adapter: &'static str,
        reason: String,
    },
    #[error("configuration does not match adapter type '{0}'")]
    Mismatch(&'static str),
}

impl ConfigError {
    /// Attach the entity family the payload belongs to.
    pub fn for_kind(self, kind: EntityKind) -> CoreError {
        CoreError::configuration(kind, self.to_string())
    }
}

/// A per-domain discriminant with a stable string code.
pub trait AdapterType: Copy + Eq + Debug + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;
    fn parse(s: &str) -> Option<Self>;
    fn all() -> &'static [Self];

    /// Like [`AdapterType::parse`] but reports the offending code.
    fn from_code(s: &str) -> Result<Self, ConfigError> {
        Self::parse(s).ok_or_else(|| ConfigError::UnknownAdapter(s.to_string()))
    }
}

/// One concrete configuration shape, designed for a single adapter type.
pub trait AdapterConfig: Sized {
    type Adapter: AdapterType;

    /// The adapter type this shape was designed for.
    const ADAPTER: Self::Adapter;

    fn to_map(&self) -> ConfigMap;

    /// Exact inverse of [`AdapterConfig::to_map`]. Missing optional keys take
    /// their defaults; missing required keys and wrong primitive types fail.
    fn from_map(map: &ConfigMap) -> Result<Self, ConfigError>;

    fn is_valid_for(&self, adapter: Self::Adapter) -> bool {
        adapter == Self::ADAPTER
    }

    /// Field-level checks a value must pass before it can be stored.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// The closed union of configuration shapes of one domain.
pub trait ConfigFamily: Clone + Debug + PartialEq + Send + Sync + 'static {
    type Adapter: AdapterType;

    const KIND: EntityKind;

    /// Whether entities of this family may reference an external service.
    const LINKS_EXTERNAL_SERVICE: bool;

    fn registry() -> &'static Registry<Self::Adapter, Self>;

    /// Adapter type of the wrapped shape.
    fn adapter_type(&self) -> Self::Adapter;

    fn to_map(&self) -> ConfigMap;

    fn is_valid_for(&self, adapter: Self::Adapter) -> bool;

    /// Field-level checks of the wrapped shape.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Rebuild a configuration for `adapter`, picking the decoder from the
    /// registry.
    fn decode(adapter: Self::Adapter, map: &ConfigMap) -> Result<Self, ConfigError> {
        Self::registry().decode(adapter, map)
    }
}

/// Serialize a shape through serde. Plain structs always produce an object;
/// anything else is logged and yields an empty map.
pub(crate) fn to_config_map<T: Serialize>(value: &T) -> ConfigMap {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            error!(value = %other, "configuration did not serialize to an object");
            ConfigMap::new()
        }
        Err(e) => {
            error!(error = %e, "configuration failed to serialize");
            ConfigMap::new()
        }
    }
}

pub(crate) fn from_config_map<T: DeserializeOwned>(
    adapter: &'static str,
    map: &ConfigMap,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(map.clone())).map_err(|e| ConfigError::Invalid {
        adapter,
        reason: e.to_string(),
    })
}

/// Encode a map as the structured-text blob stored by persistence adapters.
pub fn to_blob(map: &ConfigMap) -> String {
    Value::Object(map.clone()).to_string()
}

/// Decode a stored blob back into a map. Only JSON objects are accepted.
pub fn parse_blob(text: &str) -> Result<ConfigMap, ConfigError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::NotAnObject),
        Err(e) => Err(ConfigError::Malformed(e.to_string())),
    }
}
