//! `cynosure check`: validate the config and resolve every requirement.

use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::future::join_all;

use cynosure::config::validate::{
    has_errors, validate_config, validate_raw, Diagnostic, DiagnosticLevel,
};
use cynosure::config::Config;
use cynosure::deps::{DependencyList, ProviderRegistry};
use cynosure::AppContext;

/// CLI entry point for `cynosure check`.
pub(crate) async fn cmd_check(config_path: Option<PathBuf>, live: bool) -> Result<()> {
    let explicit = config_path.is_some();
    let path = config_path.unwrap_or_else(Config::path);
    println!("Checking {}", path.display());
    println!();

    // A missing default file means an empty config; an explicit path must exist.
    let content = if !explicit && !path.exists() {
        println!("  No config file, checking defaults");
        "{}".to_string()
    } else {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    let raw = Config::parse_raw(&content)?;
    let mut diagnostics = validate_raw(&raw);
    let config = Config::parse(&content)?;

    let providers = ProviderRegistry::with_builtin();
    diagnostics.extend(validate_config(&config, &providers));

    let mut resolved = Vec::new();
    if !has_errors(&diagnostics) {
        match AppContext::from_config(&providers, &config) {
            Ok(ctx) => {
                for (i, spec) in config.processes.iter().enumerate() {
                    match DependencyList::resolve(ctx.instances(), &spec.namespace, &spec.requirements) {
                        Ok(list) => resolved.push((spec.name.clone(), list)),
                        Err(e) => diagnostics.push(Diagnostic::new(
                            DiagnosticLevel::Error,
                            format!("processes[{}].requirements", i),
                            e.to_string(),
                        )),
                    }
                }
            }
            Err(e) => diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "brokers",
                e.to_string(),
            )),
        }
    }

    for diagnostic in &diagnostics {
        println!("  {}", diagnostic);
    }

    if has_errors(&diagnostics) {
        anyhow::bail!("Configuration has errors");
    }

    if live {
        println!();
        let reports = join_all(resolved.iter().map(|(_, list)| list.check())).await;
        for ((name, _), report) in resolved.iter().zip(reports) {
            let verdict = if report.satisfied { "ready" } else { "waiting" };
            println!("{} ({})", name, verdict);
            for line in &report.lines {
                println!("  {}", line);
            }
        }
    }

    println!();
    println!("Configuration OK");
    Ok(())
}
