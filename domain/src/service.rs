use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::adapters::memory_repo::{
    InMemoryAdapterRepo, InMemoryOptimizationUnitRepo, InMemorySettingsRepo,
};
use crate::config::{AdapterType, ConfigFamily, ConfigMap};
use crate::entity::{AdapterEntity, AdapterPatch};
use crate::external_service::ExternalServiceConfig;
use crate::forecast::ForecastProviderAdapter;
use crate::notification::NotificationAdapter;
use crate::validate::{normalize_name, validate_service_url};
use crate::{
    AdapterRepository, CoreError, EnergyOptimizationUnit, EntityId, EntityKind, ExternalService,
    ExternalServiceAdapter, ExternalServiceRepository, ForecastProvider, ForecastProviderConfig,
    ForecastProviderRepository, NotificationConfig, Notifier, NotifierRepository,
    OptimizationUnitRepository, SettingsRepository, SystemSettings,
};

/// Repository handles used by [`ConfigurationService`].
#[derive(Clone)]
pub struct Repositories {
    pub external_services: Arc<dyn ExternalServiceRepository>,
    pub forecast_providers: Arc<dyn ForecastProviderRepository>,
    pub notifiers: Arc<dyn NotifierRepository>,
    pub optimization_units: Arc<dyn OptimizationUnitRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Repositories {
    /// Fresh, empty in-memory repositories.
    pub fn in_memory() -> Self {
        Self {
            external_services: Arc::new(InMemoryAdapterRepo::<ExternalServiceConfig>::new()),
            forecast_providers: Arc::new(InMemoryAdapterRepo::<ForecastProviderConfig>::new()),
            notifiers: Arc::new(InMemoryAdapterRepo::<NotificationConfig>::new()),
            optimization_units: Arc::new(InMemoryOptimizationUnitRepo::new()),
            settings: Arc::new(InMemorySettingsRepo::new()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Accept names that are empty after trimming.
    pub allow_blank_name: bool,
}

/// Everything that references a given external service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkedEntities {
    pub forecast_providers: Vec<ForecastProvider>,
    pub notifiers: Vec<Notifier>,
}

impl LinkedEntities {
    pub fn len(&self) -> usize {
        self.forecast_providers.len() + self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Application service for creating, updating and wiring adapter entities,
/// optimization units and settings.
pub struct ConfigurationService {
    repos: Repositories,
    options: ServiceOptions,
}

impl ConfigurationService {
    pub fn new(repos: Repositories, options: ServiceOptions) -> Self {
        Self { repos, options }
    }

    // ============ External services ============

    pub fn create_external_service(
        &self,
        name: &str,
        adapter_type: ExternalServiceAdapter,
        config: Option<ExternalServiceConfig>,
    ) -> Result<ExternalService, CoreError> {
        let name = normalize_name(EntityKind::ExternalService, name, self.options.allow_blank_name)?;
        if let Some(cfg) = &config {
            check_external_service_config(cfg)?;
        }
        let service = ExternalService::new(name, adapter_type, config, None)?;
        self.repos.external_services.add(&service)?;
        info!(id = %service.id(), adapter = adapter_type.as_str(), "external service created");
        Ok(service)
    }

    pub fn get_external_service(&self, id: EntityId) -> Result<Option<ExternalService>, CoreError> {
        self.repos.external_services.get_by_id(id)
    }

    pub fn list_external_services(&self) -> Result<Vec<ExternalService>, CoreError> {
        self.repos.external_services.get_all()
    }

    pub fn update_external_service(
        &self,
        id: EntityId,
        patch: AdapterPatch<ExternalServiceConfig>,
    ) -> Result<ExternalService, CoreError> {
        if let Some(Some(cfg)) = &patch.config {
            check_external_service_config(cfg)?;
        }
        let updated = self.patched(&*self.repos.external_services, id, patch)?;
        self.repos.external_services.update(&updated)?;
        Ok(updated)
    }

    pub fn get_entities_by_external_service(
        &self,
        id: EntityId,
    ) -> Result<LinkedEntities, CoreError> {
        Ok(LinkedEntities {
            forecast_providers: self.repos.forecast_providers.get_by_external_service_id(id)?,
            notifiers: self.repos.notifiers.get_by_external_service_id(id)?,
        })
    }

    /// Clear the reference to `id` on every entity holding it. Returns how
    /// many entities were changed.
    pub fn unlink_external_service(&self, id: EntityId) -> Result<usize, CoreError> {
        let linked = self.get_entities_by_external_service(id)?;
        for provider in &linked.forecast_providers {
            let cleared = provider.apply(AdapterPatch::default().external_service(None))?;
            self.repos.forecast_providers.update(&cleared)?;
        }
        for notifier in &linked.notifiers {
            let cleared = notifier.apply(AdapterPatch::default().external_service(None))?;
            self.repos.notifiers.update(&cleared)?;
        }
        if !linked.is_empty() {
            info!(%id, unlinked = linked.len(), "external service unlinked");
        }
        Ok(linked.len())
    }

    /// Remove an external service. Refused while any entity still links to it.
    pub fn remove_external_service(&self, id: EntityId) -> Result<(), CoreError> {
        let linked = self.get_entities_by_external_service(id)?;
        if !linked.is_empty() {
            return Err(CoreError::InUse {
                kind: EntityKind::ExternalService,
                id: id.to_string(),
                dependents: linked.len(),
            });
        }
        self.repos.external_services.remove(id)?;
        info!(%id, "external service removed");
        Ok(())
    }

    /// Check an external service reference against what the registry of `C`
    /// requires for `adapter`.
    pub fn check_external_service_link<C: ConfigFamily>(
        &self,
        adapter: C::Adapter,
        external_service_id: Option<EntityId>,
    ) -> Result<(), CoreError> {
        let required = C::registry().external_service_for(adapter);
        match (required, external_service_id) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(CoreError::configuration(
                C::KIND,
                format!(
                    "adapter type '{}' does not use an external service",
                    adapter.as_str()
                ),
            )),
            (Some(wanted), None) => Err(CoreError::configuration(
                C::KIND,
                format!(
                    "adapter type '{}' requires an external service of type '{}'",
                    adapter.as_str(),
                    wanted.as_str()
                ),
            )),
            (Some(wanted), Some(service_id)) => {
                let service = self
                    .repos
                    .external_services
                    .get_by_id(service_id)?
                    .ok_or_else(|| {
                        CoreError::configuration(
                            C::KIND,
                            format!("external service {service_id} does not exist"),
                        )
                    })?;
                if service.adapter_type() != wanted {
                    return Err(CoreError::configuration(
                        C::KIND,
                        format!(
                            "external service {service_id} is of type '{}', expected '{}'",
                            service.adapter_type().as_str(),
                            wanted.as_str()
                        ),
                    ));
                }
                Ok(())
            }
        }
    }

    // ============ Forecast providers ============

    pub fn create_forecast_provider(
        &self,
        name: &str,
        adapter_type: ForecastProviderAdapter,
        config: Option<ForecastProviderConfig>,
        external_service_id: Option<EntityId>,
    ) -> Result<ForecastProvider, CoreError> {
        let provider =
            self.new_linked_entity(name, adapter_type, config, external_service_id)?;
        self.repos.forecast_providers.add(&provider)?;
        info!(id = %provider.id(), adapter = adapter_type.as_str(), "forecast provider created");
        Ok(provider)
    }

    pub fn get_forecast_provider(&self, id: EntityId) -> Result<Option<ForecastProvider>, CoreError> {
        self.repos.forecast_providers.get_by_id(id)
    }

    pub fn list_forecast_providers(&self) -> Result<Vec<ForecastProvider>, CoreError> {
        self.repos.forecast_providers.get_all()
    }

    pub fn update_forecast_provider(
        &self,
        id: EntityId,
        patch: AdapterPatch<ForecastProviderConfig>,
    ) -> Result<ForecastProvider, CoreError> {
        let updated = self.patched(&*self.repos.forecast_providers, id, patch)?;
        self.check_external_service_link::<ForecastProviderConfig>(
            updated.adapter_type(),
            updated.external_service_id(),
        )?;
        self.repos.forecast_providers.update(&updated)?;
        Ok(updated)
    }

    pub fn remove_forecast_provider(&self, id: EntityId) -> Result<(), CoreError> {
        self.repos.forecast_providers.remove(id)
    }

    // ============ Notifiers ============

    pub fn create_notifier(
        &self,
        name: &str,
        adapter_type: NotificationAdapter,
        config: Option<NotificationConfig>,
        external_service_id: Option<EntityId>,
    ) -> Result<Notifier, CoreError> {
        let notifier = self.new_linked_entity(name, adapter_type, config, external_service_id)?;
        self.repos.notifiers.add(&notifier)?;
        info!(id = %notifier.id(), adapter = adapter_type.as_str(), "notifier created");
        Ok(notifier)
    }

    pub fn get_notifier(&self, id: EntityId) -> Result<Option<Notifier>, CoreError> {
        self.repos.notifiers.get_by_id(id)
    }

    pub fn list_notifiers(&self) -> Result<Vec<Notifier>, CoreError> {
        self.repos.notifiers.get_all()
    }

    pub fn update_notifier(
        &self,
        id: EntityId,
        patch: AdapterPatch<NotificationConfig>,
    ) -> Result<Notifier, CoreError> {
        let updated = self.patched(&*self.repos.notifiers, id, patch)?;
        self.check_external_service_link::<NotificationConfig>(
            updated.adapter_type(),
            updated.external_service_id(),
        )?;
        self.repos.notifiers.update(&updated)?;
        Ok(updated)
    }

    pub fn remove_notifier(&self, id: EntityId) -> Result<(), CoreError> {
        self.repos.notifiers.remove(id)
    }

    fn new_linked_entity<C: ConfigFamily>(
        &self,
        name: &str,
        adapter_type: C::Adapter,
        config: Option<C>,
        external_service_id: Option<EntityId>,
    ) -> Result<AdapterEntity<C>, CoreError> {
        let name = normalize_name(C::KIND, name, self.options.allow_blank_name)?;
        self.check_external_service_link::<C>(adapter_type, external_service_id)?;
        AdapterEntity::new(name, adapter_type, config, external_service_id)
    }

    /// Load `id` and apply `patch` to it, normalizing a new name.
    fn patched<C, R>(
        &self,
        repo: &R,
        id: EntityId,
        mut patch: AdapterPatch<C>,
    ) -> Result<AdapterEntity<C>, CoreError>
    where
        C: ConfigFamily,
        R: AdapterRepository<C> + ?Sized,
    {
        let current = repo
            .get_by_id(id)?
            .ok_or_else(|| CoreError::not_found(C::KIND, id))?;
        if let Some(name) = patch.name.take() {
            patch.name = Some(normalize_name(
                C::KIND,
                &name,
                self.options.allow_blank_name,
            )?);
        }
        current.apply(patch)
    }

    // ============ Optimization units ============

    pub fn create_optimization_unit(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        let name = normalize_name(
            EntityKind::OptimizationUnit,
            name,
            self.options.allow_blank_name,
        )?;
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let unit = EnergyOptimizationUnit::new(name, description);
        self.repos.optimization_units.add(&unit)?;
        info!(id = %unit.id(), "optimization unit created");
        Ok(unit)
    }

    pub fn get_optimization_unit(
        &self,
        id: EntityId,
    ) -> Result<Option<EnergyOptimizationUnit>, CoreError> {
        self.repos.optimization_units.get_by_id(id)
    }

    pub fn list_optimization_units(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError> {
        self.repos.optimization_units.get_all()
    }

    pub fn list_enabled_optimization_units(
        &self,
    ) -> Result<Vec<EnergyOptimizationUnit>, CoreError> {
        self.repos.optimization_units.get_all_enabled()
    }

    pub fn remove_optimization_unit(&self, id: EntityId) -> Result<(), CoreError> {
        self.repos.optimization_units.remove(id)
    }

    pub fn enable_optimization_unit(
        &self,
        id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        self.modify_unit(id, |u| {
            u.enable();
            Ok(())
        })
    }

    pub fn disable_optimization_unit(
        &self,
        id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        self.modify_unit(id, |u| {
            u.disable();
            Ok(())
        })
    }

    /// Attach a notifier to a unit. The notifier must exist.
    pub fn add_notifier_to_optimization_unit(
        &self,
        unit_id: EntityId,
        notifier_id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        if self.repos.notifiers.get_by_id(notifier_id)?.is_none() {
            return Err(CoreError::not_found(EntityKind::Notifier, notifier_id));
        }
        self.modify_unit(unit_id, |u| {
            u.add_notifier(notifier_id);
            Ok(())
        })
    }

    pub fn remove_notifier_from_optimization_unit(
        &self,
        unit_id: EntityId,
        notifier_id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        self.modify_unit(unit_id, |u| {
            u.remove_notifier(notifier_id);
            Ok(())
        })
    }

    pub fn add_miner_to_optimization_unit(
        &self,
        unit_id: EntityId,
        miner_id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        self.modify_unit(unit_id, |u| {
            u.add_target_miner(miner_id);
            Ok(())
        })
    }

    pub fn remove_miner_from_optimization_unit(
        &self,
        unit_id: EntityId,
        miner_id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        self.modify_unit(unit_id, |u| {
            u.remove_target_miner(miner_id);
            Ok(())
        })
    }

    pub fn assign_policy_to_optimization_unit(
        &self,
        unit_id: EntityId,
        policy_id: EntityId,
    ) -> Result<EnergyOptimizationUnit, CoreError> {
        self.modify_unit(unit_id, |u| {
            u.assign_policy(policy_id);
            Ok(())
        })
    }

    fn modify_unit<F>(&self, id: EntityId, f: F) -> Result<EnergyOptimizationUnit, CoreError>
    where
        F: FnOnce(&mut EnergyOptimizationUnit) -> Result<(), CoreError>,
    {
        let mut unit = self
            .repos
            .optimization_units
            .get_by_id(id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::OptimizationUnit, id))?;
        f(&mut unit)?;
        self.repos.optimization_units.update(&unit)?;
        Ok(unit)
    }

    // ============ Settings ============

    /// Global settings, empty when nothing was saved yet.
    pub fn get_all_settings(&self) -> Result<ConfigMap, CoreError> {
        Ok(self
            .repos
            .settings
            .get_settings(None)?
            .map(|s| s.settings)
            .unwrap_or_default())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<Value>, CoreError> {
        Ok(self.get_all_settings()?.remove(key))
    }

    pub fn update_setting(&self, key: &str, value: Value) -> Result<(), CoreError> {
        let mut changes = ConfigMap::new();
        changes.insert(key.to_string(), value);
        self.update_settings(changes).map(|_| ())
    }

    /// Merge `changes` into the global settings and save them in one write.
    pub fn update_settings(&self, changes: ConfigMap) -> Result<ConfigMap, CoreError> {
        if changes.keys().any(|k| k.trim().is_empty()) {
            return Err(CoreError::configuration(
                EntityKind::Settings,
                "setting keys must not be blank",
            ));
        }
        let mut settings = self
            .repos
            .settings
            .get_settings(None)?
            .unwrap_or_else(SystemSettings::global);
        for (k, v) in changes {
            settings.set_setting(k.trim(), v);
        }
        self.repos.settings.save_settings(None, &settings)?;
        Ok(settings.settings)
    }
}

fn check_external_service_config(config: &ExternalServiceConfig) -> Result<(), CoreError> {
    match config {
        ExternalServiceConfig::HomeAssistant(ha) => {
            validate_service_url(EntityKind::ExternalService, &ha.url)?;
            if ha.token.trim().is_empty() {
                return Err(CoreError::configuration(
                    EntityKind::ExternalService,
                    "token must not be blank",
                ));
            }
            Ok(())
        }
    }
}
