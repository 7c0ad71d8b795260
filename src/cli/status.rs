//! `cynosure status`: print the snapshot written by `run`.

use std::path::PathBuf;

use anyhow::Result;

use cynosure::process::ProcessStatus;

use super::run::{read_state, state_path};

/// CLI entry point for `cynosure status`.
pub(crate) fn cmd_status(state_file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = state_file.unwrap_or_else(state_path);
    let Some(state) = read_state(&path) else {
        anyhow::bail!("No status snapshot at {}; is `cynosure run` active?", path.display());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("Cynosure Status");
    println!("===============");
    println!("  State:    {}", state.status);
    println!("  Started:  {}", state.started_at);
    println!("  Updated:  {}", state.updated_at);
    println!();

    if state.processes.is_empty() {
        println!("  No processes.");
        return Ok(());
    }

    for process in &state.processes {
        println!("{}", describe(process));
    }
    Ok(())
}

fn describe(process: &ProcessStatus) -> String {
    let pid = process
        .pid
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut out = format!(
        "  {} pid={} ready={} running={}s lines={}",
        process.identifier,
        pid,
        if process.ready { "yes" } else { "no" },
        process.running / 1000,
        process.command.lines
    );
    if !process.ports.is_empty() {
        out.push_str(&format!(" ports={}", process.ports.join(",")));
    }
    for (watch, line) in &process.observations {
        out.push_str(&format!("\n      {}: {}", watch, line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynosure::process::CommandEcho;
    use std::collections::BTreeMap;

    #[test]
    fn test_describe() {
        let status = ProcessStatus {
            identifier: "api-abc".to_string(),
            namespace: String::new(),
            pid: Some(42),
            started: 1,
            running: 12_500,
            ready: true,
            command: CommandEcho {
                name: "api".to_string(),
                image: String::new(),
                entry: "/bin/api".to_string(),
                args: vec!["api".to_string()],
                env: Vec::new(),
                requirements: BTreeMap::new(),
                lines: 7,
            },
            ports: vec![":8080".to_string()],
            observations: BTreeMap::from([("up".to_string(), "listening".to_string())]),
        };

        let text = describe(&status);
        assert!(text.starts_with("  api-abc pid=42 ready=yes running=12s lines=7 ports=:8080"));
        assert!(text.ends_with("up: listening"));
    }
}
