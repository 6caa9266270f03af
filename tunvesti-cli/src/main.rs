//! Tunvesti CLI: run the BVMT price pipeline and manage its configuration.
//!
//! Commands:
//! - `run`: normalize, reconcile, derive, correlate and write every table
//! - `check`: report which configured inputs exist
//! - `correlate`: recompute correlation tables from a written enriched table
//! - `init-config`: write the default configuration as TOML

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tunvesti_runner::{
    check_inputs, run_correlation_stage, run_pipeline, InputRole, InputStatus, PipelineConfig,
    RunOutcome,
};

#[derive(Parser)]
#[command(
    name = "tunvesti",
    version,
    about = "Tunvesti: BVMT price history integration and metric derivation"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log detail (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Per-invocation overrides for the configured paths.
#[derive(Args, Default)]
struct PathOverrides {
    /// Historical bulk CSV.
    #[arg(long)]
    historical: Option<PathBuf>,

    /// Directory holding updated_stocks_* and updated_index_* batches.
    #[arg(long)]
    daily_updates: Option<PathBuf>,

    /// Benchmark (TUNINDEX) CSV.
    #[arg(long)]
    benchmark: Option<PathBuf>,

    /// Sector reference CSV.
    #[arg(long)]
    sectors: Option<PathBuf>,

    /// Dividend reference CSV.
    #[arg(long)]
    dividends: Option<PathBuf>,

    /// Output directory for all tables and the run manifest.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl PathOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        let inputs = &mut config.inputs;
        if let Some(p) = self.historical {
            inputs.historical = p;
        }
        if let Some(p) = self.daily_updates {
            inputs.daily_updates_dir = p;
        }
        if let Some(p) = self.benchmark {
            inputs.benchmark = p;
        }
        if let Some(p) = self.sectors {
            inputs.sectors = p;
        }
        if let Some(p) = self.dividends {
            inputs.dividends = p;
        }
        if let Some(p) = self.output_dir {
            config.outputs.dir = p;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every output table.
    Run {
        #[command(flatten)]
        paths: PathOverrides,
    },
    /// Report which inputs exist. Fails when the historical source is absent.
    Check {
        #[command(flatten)]
        paths: PathOverrides,
    },
    /// Recompute correlation tables from the enriched table of a previous run.
    Correlate {
        /// Output directory holding the enriched table.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Write the default configuration as TOML.
    InitConfig {
        /// Destination file.
        #[arg(default_value = "tunvesti.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { paths } => {
            let config = load_config(cli.config.as_deref(), paths)?;
            run_cmd(&config)
        }
        Commands::Check { paths } => {
            let config = load_config(cli.config.as_deref(), paths)?;
            check_cmd(&config)
        }
        Commands::Correlate { output_dir } => {
            let paths = PathOverrides {
                output_dir,
                ..PathOverrides::default()
            };
            let config = load_config(cli.config.as_deref(), paths)?;
            correlate_cmd(&config)
        }
        Commands::InitConfig { path, force } => init_config_cmd(&path, force),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, overrides: PathOverrides) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);
    let hash = config.config_hash().context("failed to hash config")?;
    tracing::debug!(config_hash = %hash, "effective configuration");
    Ok(config)
}

fn run_cmd(config: &PipelineConfig) -> Result<()> {
    let outcome = run_pipeline(config)?;
    print_summary(&outcome);
    Ok(())
}

fn print_summary(outcome: &RunOutcome) {
    let manifest = &outcome.manifest;
    println!();
    println!("=== Pipeline Summary ===");
    for stage in &manifest.stages {
        println!("{stage}");
    }
    println!();
    println!("Tables written to {}:", outcome.output_dir.display());
    for t in &manifest.tables {
        println!("  {:<20} {:>8} rows  {}", t.name, t.rows, t.file);
    }
    let skipped: Vec<&str> = manifest
        .inputs
        .iter()
        .filter(|i| i.status != InputStatus::Loaded)
        .map(|i| i.name.as_str())
        .collect();
    if !skipped.is_empty() {
        println!();
        println!("Inputs not used: {}", skipped.join(", "));
    }
    if !manifest.warnings.is_empty() {
        println!("{} warning(s) recorded in the run manifest", manifest.warnings.len());
    }
}

fn check_cmd(config: &PipelineConfig) -> Result<()> {
    let check = check_inputs(config);
    for input in &check.inputs {
        let role = match input.role {
            InputRole::Required => "required",
            InputRole::Optional => "optional",
        };
        let state = if input.exists { "ok" } else { "missing" };
        print!("{:<14} {:<8} {:<8} {}", input.name, role, state, input.path.display());
        if let Some(detail) = &input.detail {
            print!("  ({detail})");
        }
        println!();
    }
    println!("{:<14} {:<8} {:<8} {}", "output_dir", "-", "-", config.outputs.dir.display());

    if !check.is_ready() {
        bail!("required input missing: {}", config.inputs.historical.display());
    }
    Ok(())
}

fn correlate_cmd(config: &PipelineConfig) -> Result<()> {
    let outcome = run_correlation_stage(config)?;
    println!("{}", outcome.report.summary);
    for t in &outcome.tables {
        println!("  {:<20} {:>8} rows  {}", t.name, t.rows, t.file);
    }
    Ok(())
}

fn init_config_cmd(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let toml = PipelineConfig::default().to_toml()?;
    std::fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
