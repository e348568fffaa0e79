//! Command-line interface for AAA protocol plugins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aaa_core::config::env_vars;
use aaa_core::{AaaLoader, LoadReport, LoaderConfig, Protocol, SharedRegistry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;

/// AAA plugins - discover, check and reload protocol plugins.
#[derive(Parser, Debug)]
#[command(name = "aaa-plugins")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Loader settings, layered over the config file and environment.
#[derive(ClapArgs, Debug, Default)]
struct GlobalArgs {
    /// Loader config file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of plugin descriptors.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Directory of plugin modules.
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,

    /// ABI version to accept from plugins.
    #[arg(long, global = true)]
    abi_version: Option<u32>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Load all protocols and print them with any load failures.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run one descriptor through decode, resolution and setup.
    Check {
        /// Path to the descriptor file.
        #[arg(required = true)]
        descriptor: PathBuf,
    },
    /// Load once, then reload on SIGHUP until interrupted.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.global.verbose);

    let config = resolve_config(&args.global, |key| std::env::var(key).ok())?;
    let loader = AaaLoader::new(config).context("Failed to create plugin loader")?;

    match args.command {
        Command::List { json } => run_list(&loader, json),
        Command::Check { descriptor } => run_check(&loader, &descriptor),
        Command::Watch => run_watch(loader).await,
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "aaa=debug" } else { "aaa=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_directive)
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Defaults, then the config file, then `lookup` (the environment), then flags.
fn resolve_config(
    global: &GlobalArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LoaderConfig> {
    let base = match &global.config {
        Some(path) => LoaderConfig::from_file(path)?,
        None => LoaderConfig::default(),
    };
    let mut config = base.apply_env_from(lookup);

    if let Some(dir) = &global.config_dir {
        config.config_dir = dir.clone();
    }
    if let Some(dir) = &global.plugin_dir {
        config.plugin_dir = dir.clone();
    }
    if let Some(version) = global.abi_version {
        config.abi_version = version;
    }
    Ok(config)
}

#[derive(Debug, Serialize)]
struct ProtocolSummary {
    name: String,
    command_accounting: bool,
    command_authorization: bool,
    abi_version: u32,
    module: PathBuf,
    source: PathBuf,
    loaded_at: DateTime<Utc>,
}

impl From<&Protocol> for ProtocolSummary {
    fn from(protocol: &Protocol) -> Self {
        Self {
            name: protocol.name().to_string(),
            command_accounting: protocol.command_accounting(),
            command_authorization: protocol.command_authorization(),
            abi_version: protocol.abi_version(),
            module: protocol.module_path().to_path_buf(),
            source: protocol.source().to_path_buf(),
            loaded_at: protocol.loaded_at(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FailureSummary {
    source: PathBuf,
    stage: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    protocols: Vec<ProtocolSummary>,
    failures: Vec<FailureSummary>,
}

impl From<&LoadReport> for ListOutput {
    fn from(report: &LoadReport) -> Self {
        let protocols = report
            .registry
            .names()
            .into_iter()
            .filter_map(|name| report.registry.get(name))
            .map(|p| ProtocolSummary::from(p.as_ref()))
            .collect();
        let failures = report
            .failures
            .iter()
            .map(|f| FailureSummary {
                source: f.source.clone(),
                stage: f.error.stage().to_string(),
                error: f.error.to_string(),
            })
            .collect();
        Self {
            protocols,
            failures,
        }
    }
}

fn flag(enabled: bool) -> &'static str {
    if enabled {
        "yes"
    } else {
        "no"
    }
}

fn render_table(output: &ListOutput) -> String {
    let mut out = String::new();
    if output.protocols.is_empty() {
        out.push_str("No AAA protocols loaded.\n");
    } else {
        out.push_str(&format!(
            "{:<20} {:<11} {:<14} {:<4} {}\n",
            "NAME", "ACCOUNTING", "AUTHORIZATION", "ABI", "MODULE"
        ));
        for p in &output.protocols {
            out.push_str(&format!(
                "{:<20} {:<11} {:<14} {:<4} {}\n",
                p.name,
                flag(p.command_accounting),
                flag(p.command_authorization),
                p.abi_version,
                p.module.display()
            ));
        }
    }

    if !output.failures.is_empty() {
        out.push_str(&format!("\nConfigured but not loaded ({}):\n", output.failures.len()));
        for f in &output.failures {
            out.push_str(&format!("  {} [{}]: {}\n", f.source.display(), f.stage, f.error));
        }
    }
    out
}

fn run_list(loader: &AaaLoader, json: bool) -> Result<()> {
    let report = loader.load_with_report()?;
    let output = ListOutput::from(&report);
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_table(&output));
    }
    Ok(())
}

fn run_check(loader: &AaaLoader, descriptor: &Path) -> Result<()> {
    match loader.load_descriptor_file(descriptor) {
        Ok(protocol) => {
            println!("Protocol Check: PASSED");
            println!();
            println!("Name:            {}", protocol.name());
            println!("ABI version:     {}", protocol.abi_version());
            println!("Module:          {}", protocol.module_path().display());
            println!("Accounting:      {}", flag(protocol.command_accounting()));
            println!("Authorization:   {}", flag(protocol.command_authorization()));
            Ok(())
        }
        Err(e) => {
            println!("Protocol Check: FAILED");
            println!();
            println!("Stage:           {}", e.stage());
            println!("Error:           {}", e);
            anyhow::bail!("{} did not load", descriptor.display())
        }
    }
}

async fn run_watch(loader: AaaLoader) -> Result<()> {
    let loader = Arc::new(loader);
    let initial = {
        let loader = loader.clone();
        tokio::task::spawn_blocking(move || loader.load()).await??
    };
    let shared = Arc::new(SharedRegistry::new(initial));
    tracing::info!(
        category = "aaa",
        protocols = ?shared.snapshot().names(),
        "Watching for SIGHUP"
    );

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    let loader = loader.clone();
                    let shared = shared.clone();
                    // Failures are logged by the registry; keep watching.
                    let _ = tokio::task::spawn_blocking(move || shared.reload(&loader)).await?;
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to install Ctrl+C handler")?;
                    tracing::info!("Received Ctrl+C, exiting");
                    return Ok(());
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")?;
        tracing::info!("Received Ctrl+C, exiting");
        Ok(())
    }
}
