//! Process manager: owns every supervisor and its task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::status::ProcessStatus;
use super::supervisor::Supervisor;
use crate::config::CommandSpec;
use crate::context::AppContext;
use crate::error::{CynoError, Result};

type Task = (String, JoinHandle<Result<()>>);

/// Starts supervisors and tracks them by identity.
pub struct ProcessManager {
    ctx: Arc<AppContext>,
    processes: RwLock<HashMap<String, Arc<Supervisor>>>,
    tasks: Mutex<Vec<Task>>,
}

impl ProcessManager {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            processes: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Create a supervisor for `spec` and start it on the runtime.
    pub fn create(&self, spec: CommandSpec) -> Result<Arc<Supervisor>> {
        let supervisor = Supervisor::new(self.ctx.clone(), spec)?;
        let identity = supervisor.identity().to_string();

        let handle = tokio::spawn(supervisor.clone().run());
        info!(process = %identity, "Process registered");

        self.processes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identity.clone(), supervisor.clone());
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((identity, handle));
        Ok(supervisor)
    }

    /// Look up a supervisor by identity. An empty id selects the only
    /// process when exactly one exists.
    pub fn get(&self, id: &str) -> Option<Arc<Supervisor>> {
        let processes = self.processes.read().unwrap_or_else(|e| e.into_inner());
        if id.is_empty() && processes.len() == 1 {
            return processes.values().next().cloned();
        }
        processes.get(id).cloned()
    }

    /// Every supervisor, ordered by identity.
    pub fn list(&self) -> Vec<Arc<Supervisor>> {
        let processes = self.processes.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<Arc<Supervisor>> = processes.values().cloned().collect();
        list.sort_by(|a, b| a.identity().cmp(b.identity()));
        list
    }

    pub fn statuses(&self) -> Vec<ProcessStatus> {
        self.list().iter().map(|p| p.status()).collect()
    }

    pub fn len(&self) -> usize {
        self.processes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once every started supervisor has returned.
    pub fn is_finished(&self) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .all(|(_, handle)| handle.is_finished())
    }

    /// Close every supervisor.
    pub fn quit(&self) {
        for process in self.list() {
            process.close();
        }
    }

    /// Wait for every started supervisor to finish. Returns the errors that
    /// ended supervisors early, keyed by identity.
    pub async fn wait(&self) -> Vec<(String, CynoError)> {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));

        let mut failures = Vec::new();
        for (identity, handle) in tasks {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push((identity, e)),
                Err(e) => {
                    warn!(process = %identity, error = %e, "Supervisor task aborted");
                    failures.push((
                        identity,
                        CynoError::Io(std::io::Error::other(e.to_string())),
                    ));
                }
            }
        }
        failures
    }
}
