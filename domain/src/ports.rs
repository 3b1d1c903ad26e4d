//! Repository ports implemented by the storage adapters.
//!
//! Shared contract: `add` on an existing id fails with `AlreadyExists`,
//! `get_by_id` of a missing id is `Ok(None)`, `update` of a missing id fails
//! with `NotFound`, and `remove` of a missing id is a no-op. Batch reads skip
//! records that cannot be decoded; single reads report them.

use crate::config::ConfigFamily;
use crate::entity::AdapterEntity;
use crate::external_service::ExternalServiceConfig;
use crate::forecast::ForecastProviderConfig;
use crate::notification::NotificationConfig;
use crate::optimization_unit::EnergyOptimizationUnit;
use crate::settings::SystemSettings;
use crate::{CoreError, EntityId};

/// Repository port for one family of adapter entities.
pub trait AdapterRepository<C: ConfigFamily>: Send + Sync {
    fn add(&self, entity: &AdapterEntity<C>) -> Result<(), CoreError>;
    fn get_by_id(&self, id: EntityId) -> Result<Option<AdapterEntity<C>>, CoreError>;
    fn get_all(&self) -> Result<Vec<AdapterEntity<C>>, CoreError>;
    /// Overwrite name, config and external service link. Never touches the
    /// id or the adapter type.
    fn update(&self, entity: &AdapterEntity<C>) -> Result<(), CoreError>;
    fn remove(&self, id: EntityId) -> Result<(), CoreError>;
}

/// Adapter repositories whose entities may reference an external service.
pub trait LinkedAdapterRepository<C: ConfigFamily>: AdapterRepository<C> {
    fn get_by_external_service_id(
        &self,
        external_service_id: EntityId,
    ) -> Result<Vec<AdapterEntity<C>>, CoreError>;
}

pub trait ForecastProviderRepository: LinkedAdapterRepository<ForecastProviderConfig> {}
impl<T: LinkedAdapterRepository<ForecastProviderConfig> + ?Sized> ForecastProviderRepository for T {}

pub trait NotifierRepository: LinkedAdapterRepository<NotificationConfig> {}
impl<T: LinkedAdapterRepository<NotificationConfig> + ?Sized> NotifierRepository for T {}

pub trait ExternalServiceRepository: AdapterRepository<ExternalServiceConfig> {}
impl<T: AdapterRepository<ExternalServiceConfig> + ?Sized> ExternalServiceRepository for T {}

/// Repository port for optimization units.
pub trait OptimizationUnitRepository: Send + Sync {
    fn add(&self, unit: &EnergyOptimizationUnit) -> Result<(), CoreError>;
    fn get_by_id(&self, id: EntityId) -> Result<Option<EnergyOptimizationUnit>, CoreError>;
    fn get_all(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError>;
    fn get_all_enabled(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError>;
    fn update(&self, unit: &EnergyOptimizationUnit) -> Result<(), CoreError>;
    fn remove(&self, id: EntityId) -> Result<(), CoreError>;
}

/// Repository port for system settings. `None` selects the global record.
pub trait SettingsRepository: Send + Sync {
    fn get_settings(&self, user_id: Option<&str>) -> Result<Option<SystemSettings>, CoreError>;
    fn save_settings(
        &self,
        user_id: Option<&str>,
        settings: &SystemSettings,
    ) -> Result<(), CoreError>;
}
