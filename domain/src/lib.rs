//! Domain library for the Edge Mining adapter store.
//!
//! Holds the adapter entities (forecast providers, notifiers, external
//! services), their configuration values and per-domain registries, the
//! optimization unit aggregate, system settings, the repository ports and the
//! error definitions. Storage engines and HTTP concerns live in other crates.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a persisted entity. Assigned once, never reassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// The entity families managed by this crate. Every error carries one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    ForecastProvider,
    Notifier,
    ExternalService,
    OptimizationUnit,
    Settings,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ForecastProvider => "forecast provider",
            EntityKind::Notifier => "notifier",
            EntityKind::ExternalService => "external service",
            EntityKind::OptimizationUnit => "optimization unit",
            EntityKind::Settings => "settings",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core domain errors. Storage adapters translate their own failures into
/// these before returning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: EntityKind, id: String },
    #[error("{kind} configuration error: {message}")]
    Configuration { kind: EntityKind, message: String },
    #[error("invalid {kind} name: {message}")]
    InvalidName { kind: EntityKind, message: String },
    #[error("{kind} {id} is still referenced by {dependents} entities")]
    InUse {
        kind: EntityKind,
        id: String,
        dependents: usize,
    },
    #[error("{kind} repository error: {message}")]
    Repository { kind: EntityKind, message: String },
}

impl CoreError {
    pub fn not_found(kind: EntityKind, id: impl Display) -> Self {
        CoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn already_exists(kind: EntityKind, id: impl Display) -> Self {
        CoreError::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    pub fn configuration(kind: EntityKind, message: impl Into<String>) -> Self {
        CoreError::Configuration {
            kind,
            message: message.into(),
        }
    }

    pub fn repository(kind: EntityKind, message: impl Into<String>) -> Self {
        CoreError::Repository {
            kind,
            message: message.into(),
        }
    }

    /// Which entity family the error belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            CoreError::NotFound { kind, .. }
            | CoreError::AlreadyExists { kind, .. }
            | CoreError::Configuration { kind, .. }
            | CoreError::InvalidName { kind, .. }
            | CoreError::InUse { kind, .. }
            | CoreError::Repository { kind, .. } => *kind,
        }
    }
}

pub mod adapters;
pub mod config;
pub mod entity;
pub mod external_service;
pub mod forecast;
pub mod notification;
pub mod optimization_unit;
pub mod ports;
pub mod registry;
pub mod service;
pub mod settings;
pub mod validate;

pub use config::{AdapterConfig, AdapterType, ConfigError, ConfigFamily, ConfigMap};
pub use entity::{AdapterEntity, AdapterPatch};
pub use external_service::{ExternalService, ExternalServiceAdapter, ExternalServiceConfig};
pub use forecast::{ForecastProvider, ForecastProviderAdapter, ForecastProviderConfig};
pub use notification::{NotificationAdapter, NotificationConfig, Notifier};
pub use optimization_unit::EnergyOptimizationUnit;
pub use ports::{
    AdapterRepository, ExternalServiceRepository, ForecastProviderRepository,
    LinkedAdapterRepository, NotifierRepository, OptimizationUnitRepository, SettingsRepository,
};
pub use settings::SystemSettings;
