//! Readiness dependencies: brokers, dependers and requirement lists.
//!
//! Provider factories are registered by kind in a [`ProviderRegistry`].
//! Configured broker instances live in an [`InstanceRegistry`] keyed by
//! identity and namespace. A [`DependencyList`] groups the dependers a
//! process waits on before it is started.

pub mod list;
pub mod providers;
pub mod registry;
pub mod types;

pub use list::{CheckReport, DependencyList};
pub use registry::{InstanceRegistry, ProviderRegistry, UNCONFIGURED};
pub use types::{Broker, CheckOutcome, Depender, ProviderFactory, StringMap};
