//! Supervision of a single command.
//!
//! A supervisor loops until closed: check requirements, run the child when
//! they hold, then wait out the backoff delay. Output goes through the
//! process pipe, so watches see every chunk and the in-memory log keeps
//! every line.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use once_cell::sync::OnceCell;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::backoff::Backoff;
use super::env;
use super::ports::listening_ports;
use super::signal;
use super::status::{CommandEcho, ProcessStatus};
use crate::config::CommandSpec;
use crate::context::AppContext;
use crate::deps::{CheckReport, DependencyList};
use crate::error::{CynoError, Result};
use crate::log_component;
use crate::pipes::{LoggingPipe, Pipe, PlexingPipe, StandardPipe, StreamClass, Watch};

const COMPONENT: &str = "supervisor";

/// Bytes read from a child stream per write to the pipe.
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Default)]
struct RunState {
    pid: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    /// Environment of the most recent launch.
    env: Vec<(String, String)>,
}

pub struct Supervisor {
    identity: String,
    spec: CommandSpec,
    ctx: Arc<AppContext>,
    log: Arc<LoggingPipe>,
    pipe: Arc<dyn Pipe>,
    deps: OnceCell<DependencyList>,
    backoff: Mutex<Backoff>,
    last_report: Mutex<String>,
    state: watch::Sender<RunState>,
    closed: watch::Sender<bool>,
    /// Set once the current run has been signalled.
    stopping: AtomicBool,
}

impl Supervisor {
    /// Prepare a supervisor for `spec`. Nothing runs until [`run`](Self::run).
    pub fn new(ctx: Arc<AppContext>, spec: CommandSpec) -> Result<Arc<Self>> {
        let identity = format!("{}-{}", spec.name, Uuid::new_v4().simple());

        let log = Arc::new(LoggingPipe::new());
        let pipe: Arc<dyn Pipe> = if spec.echo {
            Arc::new(PlexingPipe::new(vec![
                log.clone(),
                Arc::new(StandardPipe::new()),
            ]))
        } else {
            log.clone()
        };

        for (name, watch) in &spec.watches {
            pipe.observation()
                .add_watch(Watch::new(name, &watch.pattern, watch.state))?;
        }

        let backoff = Backoff::new(ctx.supervisor());
        let (state, _) = watch::channel(RunState::default());
        let (closed, _) = watch::channel(false);

        Ok(Arc::new(Self {
            identity,
            spec,
            ctx,
            log,
            pipe,
            deps: OnceCell::new(),
            backoff: Mutex::new(backoff),
            last_report: Mutex::new(String::new()),
            state,
            closed,
            stopping: AtomicBool::new(false),
        }))
    }

    /// Unique id: the command name plus a random suffix.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn namespace(&self) -> &str {
        &self.spec.namespace
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Line log of everything the child wrote.
    pub fn log(&self) -> &Arc<LoggingPipe> {
        &self.log
    }

    /// The pipe child output is written to.
    pub fn pipe(&self) -> &Arc<dyn Pipe> {
        &self.pipe
    }

    pub fn pid(&self) -> Option<u32> {
        self.state.borrow().pid
    }

    pub fn is_running(&self) -> bool {
        self.pid().is_some()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn ready(&self) -> bool {
        self.pipe.observation().ready()
    }

    fn backoff(&self) -> MutexGuard<'_, Backoff> {
        self.backoff.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The requirement list, resolved once against the broker instances.
    pub fn dependencies(&self) -> Result<&DependencyList> {
        self.deps.get_or_try_init(|| {
            DependencyList::resolve(
                self.ctx.instances(),
                &self.spec.namespace,
                &self.spec.requirements,
            )
        })
    }

    /// Check requirements once.
    pub async fn check(&self) -> Result<CheckReport> {
        Ok(self.dependencies()?.check().await)
    }

    /// Supervise until [`close`](Self::close) is called or the command
    /// cannot be launched.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut closed = self.closed.subscribe();
        log_component!(info, COMPONENT, "Supervisor started", process = self.identity.as_str());

        loop {
            if self.is_closed() {
                break;
            }

            match self.try_run().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    log_component!(
                        error,
                        COMPONENT,
                        "Supervisor giving up",
                        process = self.identity.as_str(),
                        error = e.to_string()
                    );
                    return Err(e);
                }
                Err(e) => {
                    log_component!(
                        warn,
                        COMPONENT,
                        "Attempt failed",
                        process = self.identity.as_str(),
                        error = e.to_string()
                    );
                }
            }

            if self.is_closed() {
                break;
            }

            let delay = self.backoff().next_delay();
            debug!(
                process = %self.identity,
                delay_ms = delay.as_millis() as u64,
                "Waiting before next attempt"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_closed(&mut closed) => break,
            }
        }

        log_component!(info, COMPONENT, "Supervisor stopped", process = self.identity.as_str());
        Ok(())
    }

    async fn try_run(&self) -> Result<()> {
        let report = self.check().await?;
        self.report_requirements(&report);
        if !report.satisfied || self.is_closed() {
            return Ok(());
        }

        let started = Instant::now();
        let status = self.execute().await?;
        let ran_for = started.elapsed();

        let success = status.success();
        let reset = self.backoff().record_exit(success, ran_for);
        if success {
            log_component!(
                info,
                COMPONENT,
                "Process exited cleanly",
                process = self.identity.as_str(),
                ran_for_ms = ran_for.as_millis() as u64
            );
        } else {
            log_component!(
                warn,
                COMPONENT,
                "Process exited with failure",
                process = self.identity.as_str(),
                status = status.to_string(),
                ran_for_ms = ran_for.as_millis() as u64,
                backoff_reset = reset
            );
        }
        Ok(())
    }

    /// Write the requirement report to the process log when it changed.
    fn report_requirements(&self, report: &CheckReport) {
        let summary = report.summary();
        {
            let mut last = self.last_report.lock().unwrap_or_else(|e| e.into_inner());
            if *last == summary {
                return;
            }
            *last = summary.clone();
        }

        for line in summary.lines() {
            self.log.add(StreamClass::Out, line);
        }
        debug!(
            process = %self.identity,
            satisfied = report.satisfied,
            "Requirements changed"
        );
    }

    /// Environment for the next launch: ambient, then each group, then the
    /// command's own variables.
    fn environment(&self) -> Vec<(String, String)> {
        let mut layers = Vec::with_capacity(self.spec.environments.len() + 1);
        for group in &self.spec.environments {
            match self.ctx.environment(group) {
                Some(vars) => layers.push(vars),
                None => warn!(process = %self.identity, group = %group, "Unknown environment group"),
            }
        }
        layers.push(&self.spec.env);
        env::build_env(env::ambient(), layers)
    }

    async fn execute(&self) -> Result<ExitStatus> {
        let environment = self.environment();

        let mut command = Command::new(&self.spec.entry);
        #[cfg(unix)]
        command.arg0(&self.spec.name).process_group(0);
        command
            .args(&self.spec.args)
            .env_clear()
            .envs(environment.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        self.pipe.observation().clear();

        let mut child = command.spawn().map_err(|e| {
            CynoError::Launch(format!("failed to execute {}: {}", self.spec.entry, e))
        })?;
        let pid = child.id();

        log_component!(
            info,
            COMPONENT,
            "Process started",
            process = self.identity.as_str(),
            pid = pid,
            command = self.spec.argv().join(" ")
        );
        self.stopping.store(false, Ordering::SeqCst);
        self.state.send_replace(RunState {
            pid,
            started_at: Some(Utc::now()),
            env: environment,
        });

        if let (true, Some(pid)) = (self.is_closed(), pid) {
            self.stop(pid);
        }

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(
                self.pipe.clone(),
                StreamClass::Out,
                stdout,
                self.identity.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(
                self.pipe.clone(),
                StreamClass::Err,
                stderr,
                self.identity.clone(),
            )));
        }

        let status = child.wait().await;
        self.state.send_modify(|state| {
            state.pid = None;
            state.started_at = None;
        });

        // Grandchildren may still hold the pipes open after the leader exits.
        let grace = self.ctx.supervisor().kill_grace();
        match tokio::time::timeout(grace, join_all(pumps.iter_mut())).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(process = %self.identity, error = %e, "Output pump failed");
                    }
                }
            }
            Err(_) => {
                warn!(process = %self.identity, "Output still open after exit, killing process group");
                if let Some(pid) = pid {
                    if let Err(e) = signal::kill_group(pid) {
                        debug!(process = %self.identity, pid, error = %e, "Process group already gone");
                    }
                }
                for pump in &pumps {
                    pump.abort();
                }
            }
        }
        for class in [StreamClass::Out, StreamClass::Err] {
            if let Err(e) = self.pipe.flush(class) {
                warn!(process = %self.identity, stream = %class, error = %e, "Flush failed");
            }
        }

        Ok(status?)
    }

    /// Stop supervising. A running child gets SIGINT, then SIGKILL if it is
    /// still alive after the configured grace period.
    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        log_component!(info, COMPONENT, "Closing", process = self.identity.as_str());

        if let Some(pid) = self.pid() {
            self.stop(pid);
        }
    }

    /// Signal the current run's process group. Returns false when this run
    /// was already signalled.
    fn stop(&self, pid: u32) -> bool {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = signal::interrupt_group(pid) {
            warn!(process = %self.identity, pid, error = %e, "Failed to interrupt process");
            return true;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(process = %self.identity, pid, "No runtime for kill escalation");
            return true;
        };

        let mut state = self.state.subscribe();
        let grace = self.ctx.supervisor().kill_grace();
        let identity = self.identity.clone();
        runtime.spawn(async move {
            let exited = tokio::time::timeout(grace, state.wait_for(|s| s.pid != Some(pid)))
                .await
                .is_ok();
            if !exited {
                warn!(process = %identity, pid, "Process ignored interrupt, killing");
                if let Err(e) = signal::kill_group(pid) {
                    warn!(process = %identity, pid, error = %e, "Failed to kill process");
                }
            }
        });
        true
    }

    /// Snapshot for status output.
    pub fn status(&self) -> ProcessStatus {
        let state = self.state.borrow().clone();
        let (started, running) = match state.started_at {
            Some(at) => (
                at.timestamp_millis(),
                (Utc::now() - at).num_milliseconds().max(0),
            ),
            None => (0, 0),
        };
        let observation = self.pipe.observation();

        ProcessStatus {
            identifier: self.identity.clone(),
            namespace: self.spec.namespace.clone(),
            pid: state.pid,
            started,
            running,
            ready: observation.ready(),
            command: CommandEcho {
                name: self.spec.name.clone(),
                image: self.spec.image.clone(),
                entry: self.spec.entry.clone(),
                args: self.spec.argv(),
                env: env::to_pairs(&state.env),
                requirements: self.spec.requirements.clone(),
                lines: self.log.count(),
            },
            ports: state.pid.map(listening_ports).unwrap_or_default(),
            observations: observation.observed(),
        }
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Copy a child stream into the pipe until EOF. A failing sink is reported
/// once; the stream keeps draining so the child never blocks on a full pipe.
async fn pump<R>(pipe: Arc<dyn Pipe>, class: StreamClass, mut reader: R, identity: String)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut sink_failed = false;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = pipe.write(class, &buf[..n]) {
                    if !sink_failed {
                        warn!(process = %identity, stream = %class, error = %e, "Output sink failed");
                        sink_failed = true;
                    }
                }
            }
            Err(e) => {
                warn!(process = %identity, stream = %class, error = %e, "Read failed");
                break;
            }
        }
    }
}
