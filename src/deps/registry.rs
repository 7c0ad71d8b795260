//! Provider and broker instance registries.
//!
//! Registration is two-phase: providers are registered and instances built
//! while the registries are still mutable, then the finished
//! [`InstanceRegistry`] is frozen behind an `Arc` and only read afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::types::{Broker, Depender, ProviderFactory, StringMap};
use crate::config::BrokerConfig;
use crate::error::{CynoError, Result};

/// Kind reported by the placeholder for identities with no instance.
pub const UNCONFIGURED: &str = "unconfigured";

/// Maps provider kinds to broker factories.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in provider already registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        super::providers::register_builtin(&mut registry);
        registry
    }

    /// Register a factory for `kind`. A later registration replaces an
    /// earlier one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&StringMap) -> Result<Arc<dyn Broker>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        debug!(kind = %kind, "Registered broker provider");
        self.factories.insert(kind, Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    fn factory(&self, kind: &str) -> Option<&ProviderFactory> {
        self.factories.get(kind)
    }
}

/// Broker instances keyed by identity, then namespace.
///
/// The empty namespace holds the default instance for an identity.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: HashMap<String, HashMap<String, Arc<dyn Broker>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured broker: one default instance per identity plus
    /// one per namespaced settings block.
    pub fn from_config(
        providers: &ProviderRegistry,
        brokers: &HashMap<String, BrokerConfig>,
    ) -> Result<Self> {
        let mut registry = Self::new();

        let mut identities: Vec<&String> = brokers.keys().collect();
        identities.sort();

        for identity in identities {
            let broker = &brokers[identity];
            registry.new_instance(
                providers,
                identity,
                "",
                &broker.kind,
                &broker.config.default,
            )?;

            let mut namespaces: Vec<&String> = broker.config.namespaced.keys().collect();
            namespaces.sort();
            for namespace in namespaces {
                registry.new_instance(
                    providers,
                    identity,
                    namespace,
                    &broker.kind,
                    &broker.config.namespaced[namespace],
                )?;
            }
        }

        Ok(registry)
    }

    /// Build a broker with the factory registered for `kind` and store it
    /// under `(identity, namespace)`.
    ///
    /// Factory errors are returned unchanged.
    pub fn new_instance(
        &mut self,
        providers: &ProviderRegistry,
        identity: &str,
        namespace: &str,
        kind: &str,
        config: &StringMap,
    ) -> Result<()> {
        let factory = providers
            .factory(kind)
            .ok_or_else(|| CynoError::UnknownProvider(kind.to_string()))?;

        let broker = factory(config)?;
        debug!(
            identity = %identity,
            namespace = %namespace,
            kind = %kind,
            "Created broker instance"
        );

        self.instances
            .entry(identity.to_string())
            .or_default()
            .insert(namespace.to_string(), broker);
        Ok(())
    }

    /// Look up the broker for `identity` in `namespace`, falling back to the
    /// identity's default instance.
    ///
    /// Unknown identities yield a placeholder whose every `dep` call fails.
    pub fn instance(&self, identity: &str, namespace: &str) -> Arc<dyn Broker> {
        let found = self.instances.get(identity).and_then(|namespaces| {
            namespaces
                .get(namespace)
                .or_else(|| namespaces.get(""))
                .cloned()
        });

        match found {
            Some(broker) => broker,
            None => Arc::new(UnconfiguredBroker {
                identity: identity.to_string(),
                namespace: namespace.to_string(),
            }),
        }
    }

    /// Number of `(identity, namespace)` pairs with an instance.
    pub fn len(&self) -> usize {
        self.instances.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stand-in returned for identities nobody configured.
struct UnconfiguredBroker {
    identity: String,
    namespace: String,
}

impl Broker for UnconfiguredBroker {
    fn kind(&self) -> &str {
        UNCONFIGURED
    }

    fn dep(&self, _wait: &str) -> Result<Arc<dyn Depender>> {
        Err(CynoError::Unconfigured(format!(
            "no instance of '{}' for namespace '{}'",
            self.identity, self.namespace
        )))
    }
}
