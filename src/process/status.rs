//! Serializable process status.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RequirementSpec;

/// Point-in-time view of a supervised process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub identifier: String,
    pub namespace: String,
    /// Child pid while running.
    pub pid: Option<u32>,
    /// Start of the current run, epoch milliseconds; 0 when not running.
    pub started: i64,
    /// Milliseconds the current run has lasted; 0 when not running.
    pub running: i64,
    pub ready: bool,
    pub command: CommandEcho,
    /// Listening addresses of the current run.
    pub ports: Vec<String>,
    /// Last matched line per watch.
    pub observations: BTreeMap<String, String>,
}

/// The command as last launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEcho {
    pub name: String,
    pub image: String,
    pub entry: String,
    /// Full argv, starting with the command name.
    pub args: Vec<String>,
    /// `KEY=value` pairs of the last launch; empty before the first.
    pub env: Vec<String>,
    pub requirements: BTreeMap<String, Vec<RequirementSpec>>,
    /// Lines captured so far.
    pub lines: u64,
}
