//! The energy optimization unit aggregate.

use serde::Serialize;

use crate::EntityId;

/// Groups the policy, target miners, energy source and adapters used for one
/// optimization loop. All references are weak: nothing here checks that the
/// referenced entities exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnergyOptimizationUnit {
    id: EntityId,
    name: String,
    description: Option<String>,
    is_enabled: bool,
    policy_id: Option<EntityId>,
    target_miner_ids: Vec<EntityId>,
    energy_source_id: Option<EntityId>,
    home_forecast_provider_id: Option<EntityId>,
    performance_tracker_id: Option<EntityId>,
    notifier_ids: Vec<EntityId>,
}

/// Every stored column of a unit, used by repositories to rebuild one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptimizationUnitParts {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub is_enabled: bool,
    pub policy_id: Option<EntityId>,
    pub target_miner_ids: Vec<EntityId>,
    pub energy_source_id: Option<EntityId>,
    pub home_forecast_provider_id: Option<EntityId>,
    pub performance_tracker_id: Option<EntityId>,
    pub notifier_ids: Vec<EntityId>,
}

impl EnergyOptimizationUnit {
    /// A new, disabled unit with no references.
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self::from_parts(OptimizationUnitParts {
            name: name.into(),
            description,
            ..Default::default()
        })
    }

    /// Rebuild a unit from stored values. Duplicate list entries collapse to
    /// their first occurrence.
    pub fn from_parts(parts: OptimizationUnitParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            description: parts.description,
            is_enabled: parts.is_enabled,
            policy_id: parts.policy_id,
            target_miner_ids: dedup(parts.target_miner_ids),
            energy_source_id: parts.energy_source_id,
            home_forecast_provider_id: parts.home_forecast_provider_id,
            performance_tracker_id: parts.performance_tracker_id,
            notifier_ids: dedup(parts.notifier_ids),
        }
    }

    pub fn into_parts(self) -> OptimizationUnitParts {
        OptimizationUnitParts {
            id: self.id,
            name: self.name,
            description: self.description,
            is_enabled: self.is_enabled,
            policy_id: self.policy_id,
            target_miner_ids: self.target_miner_ids,
            energy_source_id: self.energy_source_id,
            home_forecast_provider_id: self.home_forecast_provider_id,
            performance_tracker_id: self.performance_tracker_id,
            notifier_ids: self.notifier_ids,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn policy_id(&self) -> Option<EntityId> {
        self.policy_id
    }

    pub fn target_miner_ids(&self) -> &[EntityId] {
        &self.target_miner_ids
    }

    pub fn energy_source_id(&self) -> Option<EntityId> {
        self.energy_source_id
    }

    pub fn home_forecast_provider_id(&self) -> Option<EntityId> {
        self.home_forecast_provider_id
    }

    pub fn performance_tracker_id(&self) -> Option<EntityId> {
        self.performance_tracker_id
    }

    pub fn notifier_ids(&self) -> &[EntityId] {
        &self.notifier_ids
    }

    pub fn add_target_miner(&mut self, miner_id: EntityId) {
        if !self.target_miner_ids.contains(&miner_id) {
            self.target_miner_ids.push(miner_id);
        }
    }

    pub fn remove_target_miner(&mut self, miner_id: EntityId) {
        self.target_miner_ids.retain(|id| *id != miner_id);
    }

    pub fn add_notifier(&mut self, notifier_id: EntityId) {
        if !self.notifier_ids.contains(&notifier_id) {
            self.notifier_ids.push(notifier_id);
        }
    }

    pub fn remove_notifier(&mut self, notifier_id: EntityId) {
        self.notifier_ids.retain(|id| *id != notifier_id);
    }

    pub fn assign_policy(&mut self, policy_id: EntityId) {
        self.policy_id = Some(policy_id);
    }

    pub fn assign_energy_source(&mut self, energy_source_id: EntityId) {
        self.energy_source_id = Some(energy_source_id);
    }

    pub fn assign_home_forecast_provider(&mut self, provider_id: EntityId) {
        self.home_forecast_provider_id = Some(provider_id);
    }

    pub fn assign_performance_tracker(&mut self, tracker_id: EntityId) {
        self.performance_tracker_id = Some(tracker_id);
    }

    pub fn enable(&mut self) {
        self.is_enabled = true;
    }

    pub fn disable(&mut self) {
        self.is_enabled = false;
    }
}

fn dedup(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
