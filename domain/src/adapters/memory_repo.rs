use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::config::{AdapterType, ConfigFamily};
use crate::entity::{adapter_type_locked, AdapterEntity};
use crate::optimization_unit::EnergyOptimizationUnit;
use crate::settings::{SystemSettings, GLOBAL_SETTINGS_ID};
use crate::{
    AdapterRepository, CoreError, EntityId, EntityKind, LinkedAdapterRepository,
    OptimizationUnitRepository, SettingsRepository,
};

fn poisoned(kind: EntityKind) -> CoreError {
    CoreError::repository(kind, "mutex poisoned")
}

/// In-memory repository for any adapter entity family. Keeps insertion order.
pub struct InMemoryAdapterRepo<C: ConfigFamily> {
    items: Mutex<Vec<AdapterEntity<C>>>,
    _family: PhantomData<fn() -> C>,
}

/// In-memory optimization unit repository.
pub struct InMemoryOptimizationUnitRepo {
    units: Mutex<Vec<EnergyOptimizationUnit>>,
}

/// In-memory settings repository, keyed by user id.
pub struct InMemorySettingsRepo {
    records: Mutex<BTreeMap<String, SystemSettings>>,
}

impl<C: ConfigFamily> InMemoryAdapterRepo<C> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            _family: PhantomData,
        }
    }
}

impl<C: ConfigFamily> Default for InMemoryAdapterRepo<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ConfigFamily> AdapterRepository<C> for InMemoryAdapterRepo<C> {
    fn add(&self, entity: &AdapterEntity<C>) -> Result<(), CoreError> {
        debug!(kind = %C::KIND, id = %entity.id(), "add");
        let mut items = self.items.lock().map_err(|_| poisoned(C::KIND))?;
        if items.iter().any(|e| e.id() == entity.id()) {
            return Err(CoreError::already_exists(C::KIND, entity.id()));
        }
        items.push(entity.clone());
        Ok(())
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<AdapterEntity<C>>, CoreError> {
        debug!(kind = %C::KIND, %id, "get_by_id");
        let items = self.items.lock().map_err(|_| poisoned(C::KIND))?;
        Ok(items.iter().find(|e| e.id() == id).cloned())
    }

    fn get_all(&self) -> Result<Vec<AdapterEntity<C>>, CoreError> {
        debug!(kind = %C::KIND, "get_all");
        let items = self.items.lock().map_err(|_| poisoned(C::KIND))?;
        Ok(items.clone())
    }

    fn update(&self, entity: &AdapterEntity<C>) -> Result<(), CoreError> {
        debug!(kind = %C::KIND, id = %entity.id(), "update");
        let mut items = self.items.lock().map_err(|_| poisoned(C::KIND))?;
        let slot = items
            .iter_mut()
            .find(|e| e.id() == entity.id())
            .ok_or_else(|| CoreError::not_found(C::KIND, entity.id()))?;
        if slot.adapter_type() != entity.adapter_type() {
            return Err(adapter_type_locked(
                C::KIND,
                entity.id(),
                slot.adapter_type().as_str(),
            ));
        }
        *slot = entity.clone();
        Ok(())
    }

    fn remove(&self, id: EntityId) -> Result<(), CoreError> {
        debug!(kind = %C::KIND, %id, "remove");
        let mut items = self.items.lock().map_err(|_| poisoned(C::KIND))?;
        let before = items.len();
        items.retain(|e| e.id() != id);
        if items.len() == before {
            warn!(kind = %C::KIND, %id, "remove: nothing stored under this id");
        }
        Ok(())
    }
}

impl<C: ConfigFamily> LinkedAdapterRepository<C> for InMemoryAdapterRepo<C> {
    fn get_by_external_service_id(
        &self,
        external_service_id: EntityId,
    ) -> Result<Vec<AdapterEntity<C>>, CoreError> {
        debug!(kind = %C::KIND, %external_service_id, "get_by_external_service_id");
        let items = self.items.lock().map_err(|_| poisoned(C::KIND))?;
        Ok(items
            .iter()
            .filter(|e| e.external_service_id() == Some(external_service_id))
            .cloned()
            .collect())
    }
}

// ============ InMemoryOptimizationUnitRepo ============

impl InMemoryOptimizationUnitRepo {
    pub fn new() -> Self {
        Self {
            units: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryOptimizationUnitRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationUnitRepository for InMemoryOptimizationUnitRepo {
    fn add(&self, unit: &EnergyOptimizationUnit) -> Result<(), CoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| poisoned(EntityKind::OptimizationUnit))?;
        if units.iter().any(|u| u.id() == unit.id()) {
            return Err(CoreError::already_exists(
                EntityKind::OptimizationUnit,
                unit.id(),
            ));
        }
        units.push(unit.clone());
        Ok(())
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<EnergyOptimizationUnit>, CoreError> {
        let units = self
            .units
            .lock()
            .map_err(|_| poisoned(EntityKind::OptimizationUnit))?;
        Ok(units.iter().find(|u| u.id() == id).cloned())
    }

    fn get_all(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError> {
        let units = self
            .units
            .lock()
            .map_err(|_| poisoned(EntityKind::OptimizationUnit))?;
        Ok(units.clone())
    }

    fn get_all_enabled(&self) -> Result<Vec<EnergyOptimizationUnit>, CoreError> {
        let units = self
            .units
            .lock()
            .map_err(|_| poisoned(EntityKind::OptimizationUnit))?;
        Ok(units.iter().filter(|u| u.is_enabled()).cloned().collect())
    }

    fn update(&self, unit: &EnergyOptimizationUnit) -> Result<(), CoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| poisoned(EntityKind::OptimizationUnit))?;
        match units.iter_mut().find(|u| u.id() == unit.id()) {
            Some(slot) => {
                *slot = unit.clone();
                Ok(())
            }
            None => Err(CoreError::not_found(EntityKind::OptimizationUnit, unit.id())),
        }
    }

    fn remove(&self, id: EntityId) -> Result<(), CoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| poisoned(EntityKind::OptimizationUnit))?;
        let before = units.len();
        units.retain(|u| u.id() != id);
        if units.len() == before {
            warn!(%id, "remove optimization unit: nothing stored under this id");
        }
        Ok(())
    }
}

// ============ InMemorySettingsRepo ============

impl InMemorySettingsRepo {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemorySettingsRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsRepository for InMemorySettingsRepo {
    fn get_settings(&self, user_id: Option<&str>) -> Result<Option<SystemSettings>, CoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| poisoned(EntityKind::Settings))?;
        Ok(records.get(user_id.unwrap_or(GLOBAL_SETTINGS_ID)).cloned())
    }

    fn save_settings(
        &self,
        user_id: Option<&str>,
        settings: &SystemSettings,
    ) -> Result<(), CoreError> {
        let key = user_id.unwrap_or(GLOBAL_SETTINGS_ID).to_string();
        let mut records = self
            .records
            .lock()
            .map_err(|_| poisoned(EntityKind::Settings))?;
        let mut stored = settings.clone();
        stored.id = key.clone();
        records.insert(key, stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{DummySolarForecastConfig, ForecastProviderAdapter};
    use crate::notification::{NotificationAdapter, TelegramNotificationConfig};
    use crate::{AdapterPatch, ForecastProvider, ForecastProviderConfig, NotificationConfig, Notifier};
    use serde_json::json;

    fn solar(name: &str) -> ForecastProvider {
        ForecastProvider::new(
            name,
            ForecastProviderAdapter::DummySolar,
            Some(DummySolarForecastConfig::default().into()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn add_get_and_duplicate() {
        let repo = InMemoryAdapterRepo::<ForecastProviderConfig>::new();
        let p = solar("roof");
        repo.add(&p).unwrap();
        assert_eq!(repo.get_by_id(p.id()).unwrap(), Some(p.clone()));
        assert!(matches!(
            repo.add(&p).unwrap_err(),
            CoreError::AlreadyExists {
                kind: EntityKind::ForecastProvider,
                ..
            }
        ));
        assert_eq!(repo.get_by_id(EntityId::new()).unwrap(), None);
    }

    #[test]
    fn returned_values_are_copies() {
        let repo = InMemoryAdapterRepo::<ForecastProviderConfig>::new();
        let p = solar("roof");
        repo.add(&p).unwrap();
        let changed = repo
            .get_by_id(p.id())
            .unwrap()
            .unwrap()
            .apply(AdapterPatch::default().name("renamed"))
            .unwrap();
        assert_eq!(changed.name(), "renamed");
        assert_eq!(repo.get_by_id(p.id()).unwrap().unwrap().name(), "roof");
    }

    #[test]
    fn update_missing_is_not_found_and_remove_is_idempotent() {
        let repo = InMemoryAdapterRepo::<ForecastProviderConfig>::new();
        let p = solar("roof");
        assert!(matches!(
            repo.update(&p).unwrap_err(),
            CoreError::NotFound { .. }
        ));
        repo.add(&p).unwrap();
        repo.remove(p.id()).unwrap();
        repo.remove(p.id()).unwrap();
        assert!(repo.get_all().unwrap().is_empty());
    }

    #[test]
    fn update_replaces_mutable_fields() {
        let repo = InMemoryAdapterRepo::<NotificationConfig>::new();
        let n = Notifier::new("desk", NotificationAdapter::Telegram, None, None).unwrap();
        repo.add(&n).unwrap();
        let cfg = TelegramNotificationConfig {
            bot_token: "t".into(),
            chat_id: "c".into(),
        };
        let updated = n
            .apply(AdapterPatch::default().name("phone").config(Some(cfg.into())))
            .unwrap();
        repo.update(&updated).unwrap();
        assert_eq!(repo.get_by_id(n.id()).unwrap(), Some(updated));
    }

    #[test]
    fn update_cannot_change_adapter_type() {
        let repo = InMemoryAdapterRepo::<NotificationConfig>::new();
        let n = Notifier::new("desk", NotificationAdapter::Dummy, None, None).unwrap();
        repo.add(&n).unwrap();
        let retyped =
            Notifier::restore(n.id(), "desk", NotificationAdapter::Telegram, None, None).unwrap();
        assert!(matches!(
            repo.update(&retyped).unwrap_err(),
            CoreError::Configuration {
                kind: EntityKind::Notifier,
                ..
            }
        ));
        assert_eq!(repo.get_by_id(n.id()).unwrap(), Some(n));
    }

    #[test]
    fn lookup_by_external_service() {
        let repo = InMemoryAdapterRepo::<NotificationConfig>::new();
        let svc = EntityId::new();
        let linked = Notifier::new("a", NotificationAdapter::Dummy, None, Some(svc)).unwrap();
        let other = Notifier::new("b", NotificationAdapter::Dummy, None, None).unwrap();
        repo.add(&linked).unwrap();
        repo.add(&other).unwrap();
        assert_eq!(repo.get_by_external_service_id(svc).unwrap(), vec![linked]);
        assert!(repo
            .get_by_external_service_id(EntityId::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn optimization_units_enabled_filter() {
        let repo = InMemoryOptimizationUnitRepo::new();
        let mut on = EnergyOptimizationUnit::new("on", None);
        on.enable();
        let off = EnergyOptimizationUnit::new("off", None);
        repo.add(&on).unwrap();
        repo.add(&off).unwrap();
        assert!(repo.add(&off).is_err());
        assert_eq!(repo.get_all().unwrap().len(), 2);
        assert_eq!(repo.get_all_enabled().unwrap(), vec![on.clone()]);

        let mut off2 = off.clone();
        off2.enable();
        repo.update(&off2).unwrap();
        assert_eq!(repo.get_all_enabled().unwrap().len(), 2);
        repo.remove(on.id()).unwrap();
        repo.remove(on.id()).unwrap();
        assert_eq!(repo.get_all().unwrap().len(), 1);
    }

    #[test]
    fn settings_default_to_global_record() {
        let repo = InMemorySettingsRepo::new();
        assert_eq!(repo.get_settings(None).unwrap(), None);

        let mut s = SystemSettings::default();
        s.set_setting("timezone", json!("UTC"));
        repo.save_settings(None, &s).unwrap();
        let loaded = repo.get_settings(None).unwrap().unwrap();
        assert_eq!(loaded.id, GLOBAL_SETTINGS_ID);
        assert_eq!(loaded.get_setting("timezone"), Some(&json!("UTC")));

        repo.save_settings(Some("alice"), &s).unwrap();
        assert_eq!(repo.get_settings(Some("alice")).unwrap().unwrap().id, "alice");
    }
}
