//! The adapter entity record shared by forecast providers, notifiers and
//! external services.

use crate::config::{AdapterType, ConfigError, ConfigFamily};
use crate::{CoreError, EntityId, EntityKind};

/// A named, typed, configurable adapter instance.
///
/// `id` and `adapter_type` never change after creation. When present, `config`
/// always satisfies `is_valid_for(adapter_type)`.
#[derive(Clone, Debug, PartialEq)]
pub struct AdapterEntity<C: ConfigFamily> {
    id: EntityId,
    name: String,
    adapter_type: C::Adapter,
    config: Option<C>,
    external_service_id: Option<EntityId>,
}

impl<C: ConfigFamily> AdapterEntity<C> {
    /// Build a new record with a fresh id.
    pub fn new(
        name: impl Into<String>,
        adapter_type: C::Adapter,
        config: Option<C>,
        external_service_id: Option<EntityId>,
    ) -> Result<Self, CoreError> {
        Self::restore(
            EntityId::new(),
            name,
            adapter_type,
            config,
            external_service_id,
        )
    }

    /// Rebuild a record that already has an id, e.g. one read back from storage.
    pub fn restore(
        id: EntityId,
        name: impl Into<String>,
        adapter_type: C::Adapter,
        config: Option<C>,
        external_service_id: Option<EntityId>,
    ) -> Result<Self, CoreError> {
        check_pairing(adapter_type, config.as_ref())?;
        if external_service_id.is_some() && !C::LINKS_EXTERNAL_SERVICE {
            return Err(CoreError::configuration(
                C::KIND,
                "cannot reference an external service",
            ));
        }
        Ok(Self {
            id,
            name: name.into(),
            adapter_type,
            config,
            external_service_id,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter_type(&self) -> C::Adapter {
        self.adapter_type
    }

    pub fn config(&self) -> Option<&C> {
        self.config.as_ref()
    }

    pub fn external_service_id(&self) -> Option<EntityId> {
        self.external_service_id
    }

    /// Return a copy with the patch applied. Identity and adapter type carry
    /// over unchanged.
    pub fn apply(&self, patch: AdapterPatch<C>) -> Result<Self, CoreError> {
        let config = match patch.config {
            Some(c) => c,
            None => self.config.clone(),
        };
        let external_service_id = match patch.external_service_id {
            Some(link) => link,
            None => self.external_service_id,
        };
        Self::restore(
            self.id,
            patch.name.unwrap_or_else(|| self.name.clone()),
            self.adapter_type,
            config,
            external_service_id,
        )
    }
}

fn check_pairing<C: ConfigFamily>(adapter: C::Adapter, config: Option<&C>) -> Result<(), CoreError> {
    match config {
        Some(c) if !c.is_valid_for(adapter) => {
            Err(ConfigError::Mismatch(adapter.as_str()).for_kind(C::KIND))
        }
        Some(c) => c.validate().map_err(|e| e.for_kind(C::KIND)),
        None => Ok(()),
    }
}

/// Error returned by repositories when an update would change the adapter
/// type stored under `id`.
pub fn adapter_type_locked(kind: EntityKind, id: EntityId, stored: &str) -> CoreError {
    CoreError::configuration(
        kind,
        format!("adapter type of {id} is '{stored}' and cannot be changed"),
    )
}

/// Replacement values for a partial update. `None` leaves a field alone;
/// `Some(None)` clears an optional one.
#[derive(Clone, Debug, PartialEq)]
pub struct AdapterPatch<C: ConfigFamily> {
    pub name: Option<String>,
    pub config: Option<Option<C>>,
    pub external_service_id: Option<Option<EntityId>>,
}

impl<C: ConfigFamily> Default for AdapterPatch<C> {
    fn default() -> Self {
        Self {
            name: None,
            config: None,
            external_service_id: None,
        }
    }
}

impl<C: ConfigFamily> AdapterPatch<C> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(mut self, config: Option<C>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn external_service(mut self, id: Option<EntityId>) -> Self {
        self.external_service_id = Some(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.config.is_none() && self.external_service_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_service::{ExternalServiceAdapter, HomeAssistantServiceConfig};
    use crate::forecast::{DummySolarForecastConfig, ForecastProviderAdapter};
    use crate::notification::{DummyNotificationConfig, NotificationAdapter};
    use crate::{ExternalService, ForecastProvider, Notifier};

    #[test]
    fn new_rejects_mismatched_config() {
        let err = ForecastProvider::new(
            "roof",
            ForecastProviderAdapter::HomeAssistantApi,
            Some(DummySolarForecastConfig::default().into()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn non_finite_numbers_are_rejected_before_storage() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let cfg = DummySolarForecastConfig {
                capacity_kwp: bad,
                ..Default::default()
            };
            let err = ForecastProvider::new(
                "roof",
                ForecastProviderAdapter::DummySolar,
                Some(cfg.into()),
                None,
            )
            .unwrap_err();
            match err {
                CoreError::Configuration { kind, message } => {
                    assert_eq!(kind, EntityKind::ForecastProvider);
                    assert!(message.contains("capacity_kwp"), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let ok = ForecastProvider::new(
            "roof",
            ForecastProviderAdapter::DummySolar,
            Some(DummySolarForecastConfig::default().into()),
            None,
        )
        .unwrap();
        let poisoned = DummySolarForecastConfig {
            latitude: f64::NAN,
            ..Default::default()
        };
        assert!(ok
            .apply(AdapterPatch::default().config(Some(poisoned.into())))
            .is_err());
    }

    #[test]
    fn entity_without_config_is_allowed() {
        let n = Notifier::new("quiet", NotificationAdapter::Telegram, None, None).unwrap();
        assert!(n.config().is_none());
        assert_eq!(n.adapter_type(), NotificationAdapter::Telegram);
    }

    #[test]
    fn external_services_never_link() {
        let cfg = HomeAssistantServiceConfig {
            url: "http://ha".into(),
            token: "t".into(),
        };
        let err = ExternalService::new(
            "ha",
            ExternalServiceAdapter::HomeAssistantApi,
            Some(cfg.into()),
            Some(EntityId::new()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Configuration {
                kind: crate::EntityKind::ExternalService,
                ..
            }
        ));
    }

    #[test]
    fn apply_keeps_identity_and_adapter() {
        let original = Notifier::new(
            "desk",
            NotificationAdapter::Dummy,
            Some(DummyNotificationConfig::default().into()),
            None,
        )
        .unwrap();
        let link = EntityId::new();
        let patched = original
            .apply(
                AdapterPatch::default()
                    .name("kitchen")
                    .external_service(Some(link)),
            )
            .unwrap();
        assert_eq!(patched.id(), original.id());
        assert_eq!(patched.adapter_type(), NotificationAdapter::Dummy);
        assert_eq!(patched.name(), "kitchen");
        assert_eq!(patched.external_service_id(), Some(link));
        assert_eq!(patched.config(), original.config());

        let cleared = patched
            .apply(AdapterPatch::default().config(None).external_service(None))
            .unwrap();
        assert!(cleared.config().is_none());
        assert!(cleared.external_service_id().is_none());
        assert_eq!(cleared.name(), "kitchen");
    }

    #[test]
    fn empty_patch_is_identity() {
        let p = AdapterPatch::<crate::NotificationConfig>::default();
        assert!(p.is_empty());
        let n = Notifier::new("x", NotificationAdapter::Dummy, None, None).unwrap();
        assert_eq!(n.apply(p).unwrap(), n);
    }
}
