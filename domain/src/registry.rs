//! Adapter type registries.
//!
//! A registry maps each adapter type of a domain to the decoder of its
//! configuration shape and to the external service type it depends on, if
//! any. Registries are `static` tables, never mutated after start-up.

use crate::config::{AdapterType, ConfigError, ConfigMap};
use crate::external_service::ExternalServiceAdapter;

/// Decoder picked by the registry when reading a stored configuration.
pub type Decoder<C> = fn(&ConfigMap) -> Result<C, ConfigError>;

pub struct RegistryEntry<A: 'static, C: 'static> {
    pub adapter: A,
    pub decode: Decoder<C>,
    /// External service type an entity of this adapter type must reference.
    pub external_service: Option<ExternalServiceAdapter>,
}

pub struct Registry<A: 'static, C: 'static> {
    entries: &'static [RegistryEntry<A, C>],
}

impl<A: AdapterType, C> Registry<A, C> {
    pub const fn new(entries: &'static [RegistryEntry<A, C>]) -> Self {
        Self { entries }
    }

    pub fn entry(&self, adapter: A) -> Option<&RegistryEntry<A, C>> {
        self.entries.iter().find(|e| e.adapter == adapter)
    }

    pub fn decode(&self, adapter: A, map: &ConfigMap) -> Result<C, ConfigError> {
        let entry = self
            .entry(adapter)
            .ok_or(ConfigError::Unregistered(adapter.as_str()))?;
        (entry.decode)(map)
    }

    pub fn external_service_for(&self, adapter: A) -> Option<ExternalServiceAdapter> {
        self.entry(adapter).and_then(|e| e.external_service)
    }

    /// Registered adapter types, in registration order.
    pub fn adapters(&self) -> impl Iterator<Item = A> + '_ {
        self.entries.iter().map(|e| e.adapter)
    }
}
