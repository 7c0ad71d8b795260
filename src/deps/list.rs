//! Requirement aggregation.
//!
//! Dependers under one requirement name are alternatives (any one suffices);
//! distinct names must all be satisfied.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use super::registry::InstanceRegistry;
use super::types::Depender;
use crate::config::RequirementSpec;
use crate::error::{CynoError, Result};

/// Requirement name to its alternative dependers.
#[derive(Clone, Default)]
pub struct DependencyList {
    requirements: BTreeMap<String, Vec<Arc<dyn Depender>>>,
}

/// Aggregated result of checking a [`DependencyList`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckReport {
    /// One `[ OK ]` / `[FAIL]` line per requirement name, in name order.
    pub lines: Vec<String>,
    /// True when every requirement holds (vacuously true when empty).
    pub satisfied: bool,
}

impl CheckReport {
    /// Lines joined as a bullet list, the form written to process logs.
    pub fn summary(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        format!("Requirements:\n - {}", self.lines.join("\n - "))
    }
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve configured requirements against the broker instances visible
    /// from `namespace`.
    pub fn resolve(
        instances: &InstanceRegistry,
        namespace: &str,
        requirements: &BTreeMap<String, Vec<RequirementSpec>>,
    ) -> Result<Self> {
        let mut list = Self::new();
        for (name, alternatives) in requirements {
            for requirement in alternatives {
                let broker = instances.instance(&requirement.broker, namespace);
                let dep = broker.dep(&requirement.wait).map_err(|e| {
                    CynoError::Dependency(format!(
                        "failed to build requirement {}/{}: {}",
                        name, requirement.broker, e
                    ))
                })?;
                list.add(name.clone(), dep);
            }
        }
        Ok(list)
    }

    pub fn add(&mut self, name: impl Into<String>, dep: Arc<dyn Depender>) {
        self.requirements.entry(name.into()).or_default().push(dep);
    }

    /// Number of requirement names.
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.requirements.keys().map(String::as_str)
    }

    /// Check every requirement. Names are checked concurrently; alternatives
    /// within a name are tried in order until one succeeds.
    pub async fn check(&self) -> CheckReport {
        let results = join_all(
            self.requirements
                .iter()
                .map(|(name, deps)| check_requirement(name, deps)),
        )
        .await;

        let satisfied = results.iter().all(|(_, ok)| *ok);
        CheckReport {
            lines: results.into_iter().map(|(line, _)| line).collect(),
            satisfied,
        }
    }
}

async fn check_requirement(name: &str, deps: &[Arc<dyn Depender>]) -> (String, bool) {
    let mut failures = Vec::with_capacity(deps.len());
    for dep in deps {
        let outcome = dep.check().await;
        if outcome.satisfied {
            return (format!("[ OK ] {}: {}", name, outcome.message), true);
        }
        failures.push(outcome.message);
    }
    (format!("[FAIL] {}: {}", name, failures.join("; ")), false)
}
