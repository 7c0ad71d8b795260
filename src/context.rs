//! Shared, read-only state handed to every supervisor.

use std::collections::{BTreeMap, HashMap};

use crate::config::{Config, SupervisorConfig};
use crate::deps::{InstanceRegistry, ProviderRegistry};
use crate::error::Result;

/// Broker instances, environment groups and supervisor timing.
///
/// Built once at startup; supervisors hold it behind an `Arc`.
#[derive(Default)]
pub struct AppContext {
    instances: InstanceRegistry,
    environments: HashMap<String, BTreeMap<String, String>>,
    supervisor: SupervisorConfig,
}

impl AppContext {
    /// Build every configured broker with `providers`.
    pub fn from_config(providers: &ProviderRegistry, config: &Config) -> Result<Self> {
        let instances = InstanceRegistry::from_config(providers, &config.brokers)?;
        Ok(Self::new(
            instances,
            config.environments.clone(),
            config.supervisor.clone(),
        ))
    }

    pub fn new(
        instances: InstanceRegistry,
        environments: HashMap<String, BTreeMap<String, String>>,
        supervisor: SupervisorConfig,
    ) -> Self {
        Self {
            instances,
            environments,
            supervisor,
        }
    }

    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    pub fn environment(&self, group: &str) -> Option<&BTreeMap<String, String>> {
        self.environments.get(group)
    }

    pub fn supervisor(&self) -> &SupervisorConfig {
        &self.supervisor
    }
}
