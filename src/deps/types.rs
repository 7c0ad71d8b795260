//! Core types for the dependency layer: brokers, dependers and check outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Flat string settings handed to a provider factory.
pub type StringMap = HashMap<String, String>;

/// Builds a broker instance from its settings.
pub type ProviderFactory = Arc<dyn Fn(&StringMap) -> Result<Arc<dyn Broker>> + Send + Sync>;

/// Result of one readiness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Human-readable status, shown in requirement reports.
    pub message: String,
    /// Whether the condition currently holds.
    pub satisfied: bool,
}

impl CheckOutcome {
    pub fn new(message: impl Into<String>, satisfied: bool) -> Self {
        Self {
            message: message.into(),
            satisfied,
        }
    }

    pub fn ready(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self::new(message, false)
    }
}

/// A single readiness condition.
///
/// Checks may do network I/O and must never fail: problems are reported as
/// an unsatisfied outcome with a descriptive message.
#[async_trait]
pub trait Depender: Send + Sync {
    async fn check(&self) -> CheckOutcome;
}

/// A configured broker instance that turns wait expressions into dependers.
pub trait Broker: Send + Sync {
    /// Provider kind this broker was built from.
    fn kind(&self) -> &str;

    /// Parse a wait expression into a depender.
    fn dep(&self, wait: &str) -> Result<Arc<dyn Depender>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let ok = CheckOutcome::ready("port open");
        assert!(ok.satisfied);
        assert_eq!(ok.message, "port open");

        let waiting = CheckOutcome::waiting("port closed");
        assert!(!waiting.satisfied);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CheckOutcome::new("always true", true);
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"message":"always true","satisfied":true}"#);
    }
}
