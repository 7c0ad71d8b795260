//! `cynosure run`: supervise every configured process until a shutdown signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use cynosure::config::Config;
use cynosure::deps::ProviderRegistry;
use cynosure::process::{ProcessManager, ProcessStatus};
use cynosure::AppContext;

/// How often the status snapshot is refreshed.
const STATE_INTERVAL: Duration = Duration::from_secs(2);

pub fn state_path() -> PathBuf {
    Config::dir().join("status.json")
}

/// Snapshot written while `run` is active and read by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub processes: Vec<ProcessStatus>,
}

impl RunState {
    fn new(status: &str, started_at: &str, processes: Vec<ProcessStatus>) -> Self {
        Self {
            status: status.to_string(),
            started_at: started_at.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            processes,
        }
    }
}

/// Write the snapshot to disk.
pub fn write_state(path: &Path, state: &RunState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read the snapshot from disk.
pub fn read_state(path: &Path) -> Option<RunState> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Completes on SIGINT, SIGTERM or SIGQUIT (Ctrl-C elsewhere).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// CLI entry point for `cynosure run`.
pub(crate) async fn cmd_run(config_path: Option<PathBuf>, state_file: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path.as_deref()).context("Failed to load configuration")?;

    let providers = ProviderRegistry::with_builtin();
    let ctx = AppContext::from_config(&providers, &config).context("Failed to build brokers")?;
    let manager = ProcessManager::new(Arc::new(ctx));

    for spec in &config.processes {
        manager
            .create(spec.clone())
            .with_context(|| format!("Failed to start process '{}'", spec.name))?;
    }
    if manager.is_empty() {
        warn!("No processes configured");
    }
    info!(processes = manager.len(), "Supervising");

    let state_path = state_file.unwrap_or_else(state_path);
    let started_at = chrono::Utc::now().to_rfc3339();

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(STATE_INTERVAL);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                match result {
                    Ok(()) => info!("Received shutdown signal"),
                    Err(e) => error!(error = %e, "Failed to listen for shutdown signals"),
                }
                break;
            }
            _ = ticker.tick() => {
                let state = RunState::new("running", &started_at, manager.statuses());
                if let Err(e) = write_state(&state_path, &state) {
                    warn!(error = %e, path = %state_path.display(), "Failed to write status snapshot");
                }
                if manager.is_finished() {
                    warn!("Every supervisor has stopped");
                    break;
                }
            }
        }
    }

    manager.quit();
    let failures = manager.wait().await;

    let state = RunState::new("stopped", &started_at, manager.statuses());
    let _ = write_state(&state_path, &state);

    if failures.is_empty() {
        info!("All processes stopped");
        return Ok(());
    }
    for (identity, e) in &failures {
        error!(process = %identity, error = %e, "Supervisor failed");
    }
    anyhow::bail!("{} process(es) could not be supervised", failures.len())
}
