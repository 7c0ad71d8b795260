//! Configuration types for Cynosure.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deps::StringMap;
use crate::pipes::WatchEffect;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker instances keyed by identity.
    pub brokers: HashMap<String, BrokerConfig>,
    /// Named environment groups that commands can pull in.
    pub environments: HashMap<String, BTreeMap<String, String>>,
    /// Processes to supervise.
    pub processes: Vec<CommandSpec>,
    pub supervisor: SupervisorConfig,
    pub logging: LoggingConfig,
}

// ============================================================================
// Brokers
// ============================================================================

/// A configured broker identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Provider kind, e.g. `port` or `http`.
    pub kind: String,
    #[serde(default)]
    pub config: BrokerSettings,
}

/// Default settings plus per-namespace overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub default: StringMap,
    pub namespaced: HashMap<String, StringMap>,
}

// ============================================================================
// Processes
// ============================================================================

/// One supervised command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Informational image reference, echoed in status output.
    #[serde(default)]
    pub image: String,
    /// Program to execute.
    pub entry: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Variables applied after every environment group.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Environment groups applied in order.
    #[serde(default)]
    pub environments: Vec<String>,
    /// Requirement name to alternative conditions.
    #[serde(default)]
    pub requirements: BTreeMap<String, Vec<RequirementSpec>>,
    /// Watch name to pattern and effect.
    #[serde(default)]
    pub watches: BTreeMap<String, WatchSpec>,
    /// Also copy output to the supervisor's stdout/stderr.
    #[serde(default)]
    pub echo: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: entry.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, group: impl Into<String>) -> Self {
        self.environments.push(group.into());
        self
    }

    pub fn with_requirement(
        mut self,
        name: impl Into<String>,
        broker: impl Into<String>,
        wait: impl Into<String>,
    ) -> Self {
        self.requirements
            .entry(name.into())
            .or_default()
            .push(RequirementSpec::new(broker, wait));
        self
    }

    pub fn with_watch(
        mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        state: WatchEffect,
    ) -> Self {
        self.watches.insert(
            name.into(),
            WatchSpec {
                pattern: pattern.into(),
                state,
            },
        );
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// `argv` as the child sees it: the command name, then the arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// A condition on a broker identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSpec {
    /// Broker identity.
    #[serde(alias = "identity")]
    pub broker: String,
    /// Wait expression understood by the broker's provider.
    #[serde(default)]
    pub wait: String,
}

impl RequirementSpec {
    pub fn new(broker: impl Into<String>, wait: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            wait: wait.into(),
        }
    }
}

/// A substring pattern and what matching it does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSpec {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default)]
    pub state: WatchEffect,
}

// ============================================================================
// Supervisor
// ============================================================================

/// Restart backoff and shutdown timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Delay before the first retry and after every reset.
    pub min_delay_ms: u64,
    /// Ceiling for the retry delay.
    pub max_delay_ms: u64,
    /// Added to the delay after every attempt.
    pub increment_ms: u64,
    /// A run at least this long resets the delay.
    pub reset_after_ms: u64,
    /// Time between SIGINT and SIGKILL on close.
    pub kill_grace_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1_000,
            max_delay_ms: 30_000,
            increment_ms: 500,
            reset_after_ms: 60_000,
            kill_grace_ms: 10_000,
        }
    }
}

impl SupervisorConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn increment(&self) -> Duration {
        Duration::from_millis(self.increment_ms)
    }

    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Output format for the supervisor's own diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Component,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append JSON logs to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_defaults() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.min_delay(), Duration::from_secs(1));
        assert_eq!(cfg.max_delay(), Duration::from_secs(30));
        assert_eq!(cfg.increment(), Duration::from_millis(500));
        assert_eq!(cfg.reset_after(), Duration::from_secs(60));
        assert_eq!(cfg.kill_grace(), Duration::from_secs(10));
    }

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("api", "/usr/bin/api")
            .with_args(["--port", "8080"])
            .with_namespace("prod")
            .with_env("MODE", "fast")
            .with_environment("common")
            .with_requirement("db", "postgres", ":5432")
            .with_requirement("db", "replica", "replica:5432")
            .with_watch("up", "listening", WatchEffect::MakeReady)
            .with_echo(true);

        assert_eq!(spec.argv(), vec!["api", "--port", "8080"]);
        assert_eq!(spec.namespace, "prod");
        assert_eq!(spec.env["MODE"], "fast");
        assert_eq!(spec.environments, vec!["common"]);
        assert_eq!(spec.requirements["db"].len(), 2);
        assert_eq!(spec.watches["up"].state, WatchEffect::MakeReady);
        assert!(spec.echo);
    }

    #[test]
    fn test_command_spec_deserialize() {
        let spec: CommandSpec = serde_json::from_str(
            r#"{
                "name": "worker",
                "entry": "/bin/worker",
                "requirements": {"queue": [{"identity": "rabbit", "wait": ":5672"}]},
                "watches": {"up": {"match": "consuming"}}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.requirements["queue"][0].broker, "rabbit");
        assert_eq!(spec.watches["up"].pattern, "consuming");
        assert_eq!(spec.watches["up"].state, WatchEffect::Neutral);
        assert!(spec.args.is_empty());
        assert!(!spec.echo);
    }

    #[test]
    fn test_broker_config_deserialize() {
        let broker: BrokerConfig = serde_json::from_str(
            r#"{"kind": "always", "config": {"default": {"state": "true"}, "namespaced": {"dev": {"state": "false"}}}}"#,
        )
        .unwrap();
        assert_eq!(broker.kind, "always");
        assert_eq!(broker.config.default["state"], "true");
        assert_eq!(broker.config.namespaced["dev"]["state"], "false");
    }

    #[test]
    fn test_partial_supervisor_config() {
        let cfg: SupervisorConfig = serde_json::from_str(r#"{"min_delay_ms": 10}"#).unwrap();
        assert_eq!(cfg.min_delay_ms, 10);
        assert_eq!(cfg.max_delay_ms, 30_000);
    }
}
