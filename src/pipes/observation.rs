//! Watch patterns and readiness observation.
//!
//! Watches can be declared until the watch set is first read, after which it
//! is frozen. Every raw output chunk is matched against the frozen set.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CynoError, Result};

/// What a matching watch does to the readiness flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEffect {
    MakeReady,
    NotReady,
    /// Record the observation only.
    #[default]
    Neutral,
}

/// A named substring watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub name: String,
    pub pattern: String,
    pub effect: WatchEffect,
}

impl Watch {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, effect: WatchEffect) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            effect,
        }
    }
}

pub type WatchSet = Arc<BTreeMap<String, Watch>>;

#[derive(Default)]
struct State {
    live: bool,
    ready: bool,
    watches: WatchSet,
    observed: BTreeMap<String, String>,
}

/// Readiness flag, watch set and last observed line per watch.
#[derive(Default)]
pub struct Observation {
    state: RwLock<State>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Declare a watch. Replaces a watch of the same name; fails once the set
    /// is live.
    pub fn add_watch(&self, watch: Watch) -> Result<()> {
        let mut state = self.write();
        if state.live {
            return Err(CynoError::Watch(format!(
                "cannot add watch '{}' after output matching started",
                watch.name
            )));
        }
        Arc::make_mut(&mut state.watches).insert(watch.name.clone(), watch);
        Ok(())
    }

    /// Snapshot of the watch set. Freezes it.
    pub fn watches(&self) -> WatchSet {
        {
            let state = self.read();
            if state.live {
                return state.watches.clone();
            }
        }
        let mut state = self.write();
        state.live = true;
        state.watches.clone()
    }

    pub fn is_live(&self) -> bool {
        self.read().live
    }

    /// Match a raw chunk against every watch, in name order. Returns the
    /// names that matched.
    pub fn observe(&self, chunk: &[u8]) -> Vec<String> {
        let watches = self.watches();
        let mut matched = Vec::new();
        for watch in watches.values() {
            if let Some(line) = matching_line(chunk, watch.pattern.as_bytes()) {
                self.record(watch, line);
                matched.push(watch.name.clone());
            }
        }
        matched
    }

    /// Record `line` as the latest observation for `watch` and apply its
    /// effect.
    pub fn record(&self, watch: &Watch, line: String) {
        let mut state = self.write();
        match watch.effect {
            WatchEffect::MakeReady => state.ready = true,
            WatchEffect::NotReady => state.ready = false,
            WatchEffect::Neutral => {}
        }
        debug!(watch = %watch.name, ready = state.ready, "Watch matched");
        state.observed.insert(watch.name.clone(), line);
    }

    /// Reset readiness and observations. The watch set is kept.
    pub fn clear(&self) {
        let mut state = self.write();
        state.ready = false;
        state.observed.clear();
    }

    pub fn ready(&self) -> bool {
        self.read().ready
    }

    pub fn observed(&self) -> BTreeMap<String, String> {
        self.read().observed.clone()
    }
}

/// The line of `chunk` containing `pattern`, if any.
fn matching_line(chunk: &[u8], pattern: &[u8]) -> Option<String> {
    let at = find(chunk, pattern)?;
    let start = chunk[..at]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let end = chunk[at..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(chunk.len(), |i| at + i);
    let line = String::from_utf8_lossy(&chunk[start..end]);
    Some(line.trim_end_matches('\r').to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
