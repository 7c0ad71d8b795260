//! Configuration validation with unknown field detection.

use std::collections::HashSet;

use serde_json::Value;

use super::Config;
use crate::deps::ProviderRegistry;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "brokers",
    "environments",
    "processes",
    "supervisor",
    "logging",
];

/// Known fields of a process entry.
const KNOWN_PROCESS: &[&str] = &[
    "name",
    "namespace",
    "image",
    "entry",
    "args",
    "env",
    "environments",
    "requirements",
    "watches",
    "echo",
];

const KNOWN_SUPERVISOR: &[&str] = &[
    "min_delay_ms",
    "max_delay_ms",
    "increment_ms",
    "reset_after_ms",
    "kill_grace_ms",
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// True when any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b_chars.len() + 1];
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }
    previous[b_chars.len()]
}

/// Suggest the closest known name (if distance <= 3).
pub fn suggest_field<S: AsRef<str>>(unknown: &str, known: &[S]) -> Option<String> {
    known
        .iter()
        .map(|k| (k.as_ref(), levenshtein(unknown, k.as_ref())))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_message<S: AsRef<str>>(kind: &str, name: &str, known: &[S]) -> String {
    match suggest_field(name, known) {
        Some(suggestion) => format!("Unknown {} '{}'; {}", kind, name, suggestion),
        None => format!("Unknown {} '{}'", kind, name),
    }
}

fn check_keys(
    obj: &serde_json::Map<String, Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if !known_set.contains(key.as_str()) {
            has_unknown = true;
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                path,
                unknown_message("field", key, known),
            ));
        }
    }
    has_unknown
}

/// Validate a raw config value against known field names.
pub fn validate_raw(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                "Config must be an object",
            ));
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON5"));

    let mut has_unknown = check_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);

    if let Some(processes) = obj.get("processes").and_then(|v| v.as_array()) {
        for (i, process) in processes.iter().enumerate() {
            if let Some(fields) = process.as_object() {
                has_unknown |= check_keys(
                    fields,
                    KNOWN_PROCESS,
                    &format!("processes[{}]", i),
                    &mut diagnostics,
                );
            }
        }
    }

    if let Some(supervisor) = obj.get("supervisor").and_then(|v| v.as_object()) {
        has_unknown |= check_keys(supervisor, KNOWN_SUPERVISOR, "supervisor", &mut diagnostics);
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    diagnostics
}

/// Check cross references: broker kinds, requirement identities and
/// environment groups.
pub fn validate_config(config: &Config, providers: &ProviderRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let kinds = providers.kinds();

    let mut identities: Vec<&String> = config.brokers.keys().collect();
    identities.sort();
    for identity in &identities {
        let broker = &config.brokers[*identity];
        if !providers.contains(&broker.kind) {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                format!("brokers.{}.kind", identity),
                unknown_message("provider kind", &broker.kind, &kinds),
            ));
        }
    }

    let mut groups: Vec<&String> = config.environments.keys().collect();
    groups.sort();

    if config.processes.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "processes",
            "No processes configured",
        ));
    }

    for (i, process) in config.processes.iter().enumerate() {
        let path = format!("processes[{}]", i);
        if process.name.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                format!("{}.name", path),
                "Name must not be empty",
            ));
        }
        if process.entry.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                format!("{}.entry", path),
                "Entry must not be empty",
            ));
        }

        for group in &process.environments {
            if !config.environments.contains_key(group) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warn,
                    format!("{}.environments", path),
                    unknown_message("environment group", group, &groups),
                ));
            }
        }

        for (name, alternatives) in &process.requirements {
            if alternatives.is_empty() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warn,
                    format!("{}.requirements.{}", path, name),
                    "No conditions listed; requirement can never be met",
                ));
            }
            for requirement in alternatives {
                if !config.brokers.contains_key(&requirement.broker) {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticLevel::Error,
                        format!("{}.requirements.{}", path, name),
                        unknown_message("broker", &requirement.broker, &identities),
                    ));
                }
            }
        }

        for (name, watch) in &process.watches {
            if watch.pattern.is_empty() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warn,
                    format!("{}.watches.{}", path, name),
                    "Empty match pattern matches every chunk",
                ));
            }
        }
    }

    let supervisor = &config.supervisor;
    if supervisor.min_delay_ms > supervisor.max_delay_ms {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "supervisor",
            "min_delay_ms exceeds max_delay_ms; delays are capped at max_delay_ms",
        ));
    }

    diagnostics
}
