// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for EcoCompute.
//!
//! This crate wires the audit and calibration libraries into the
//! `ecocompute` binary. Reports go to stdout (or `--output`), logs go to
//! stderr.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use ecocompute_audit::markdown::{generate_marked_report, generate_report, to_json};
use ecocompute_audit::{all_rules, discover_files, run_audit, AuditReport, DiscoveryOptions};
use ecocompute_calibration::markdown::{
    estimation_section, hardware_section, relative_change_section,
};
use ecocompute_calibration::{
    calibrate, compare_with_store, estimate_energy, Baseline, BaselineStore, CalibrationResult,
    HardwareProfile, NoComputeRuntime, NvidiaSmiProbe, Quantization, RegressionPolicy, RunSummary,
};
use ecocompute_core::{Settings, Severity};

/// EcoCompute CLI.
#[derive(Parser, Debug)]
#[command(name = "ecocompute")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML), layered over `ecocompute.toml`.
    #[arg(long, global = true, env = "ECOCOMPUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Report format.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Markdown, suitable for pull request comments.
    #[default]
    Markdown,
    /// Pretty-printed JSON.
    Json,
}

/// Options shared by `audit` and `compare`.
#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Files or directories to scan.
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Minimum severity to report: info, warning or critical.
    #[arg(short, long)]
    pub severity: Option<Severity>,

    /// Maximum number of files to scan.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Always exit 0, even with critical findings or a failed gate.
    #[arg(long)]
    pub no_fail: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan source files for energy-waste patterns.
    Audit(AuditArgs),

    /// Detect the local GPU and print its hardware profile.
    Detect {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Measure throughput and power on the local GPU.
    Calibrate {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Audit, calibrate and compare against the stored baseline.
    ///
    /// Exits 1 when the regression gate fails.
    Compare {
        /// Audit options.
        #[command(flatten)]
        audit: AuditArgs,

        /// Store this run as the baseline for the detected hardware.
        #[arg(long)]
        save: bool,

        /// Energy regression tolerance in percent.
        #[arg(long)]
        threshold: Option<f64>,

        /// Commit recorded with a saved baseline.
        #[arg(long, env = "GITHUB_SHA", default_value = "")]
        commit: String,

        /// Branch recorded with a saved baseline.
        #[arg(long, env = "GITHUB_REF_NAME", default_value = "")]
        branch: String,
    },

    /// Estimate inference energy for a model on the local GPU.
    Estimate {
        /// Model size in billions of parameters.
        #[arg(short, long)]
        params: f64,

        /// Quantization: fp16, nf4, int8_default or int8_pure. Other labels use fp16 data.
        #[arg(short, long, default_value = "fp16")]
        quantization: Quantization,

        /// Batch size.
        #[arg(short, long, default_value_t = 1)]
        batch_size: u32,

        /// Model name shown in the report.
        #[arg(short, long)]
        model: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show configuration, rules and stored baselines.
    Status,
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report.
    Success,
    /// Critical findings or a failed regression gate.
    Failed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::from(1),
        }
    }
}

/// Install the stderr tracing subscriber.
pub fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // a subscriber may already be installed (tests)
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Run the CLI with the process arguments.
pub fn run() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    execute(cli.command, settings).map(ExitCode::from)
}

/// Run one command with resolved settings.
pub fn execute(command: Commands, mut settings: Settings) -> Result<Outcome> {
    match command {
        Commands::Audit(args) => {
            let report = audit(&args, &mut settings);
            let text = match args.format {
                OutputFormat::Markdown => generate_report(&report),
                OutputFormat::Json => to_json(&report)?,
            };
            emit(args.output.as_deref(), &text)?;
            Ok(audit_outcome(&report, &args, &settings))
        }
        Commands::Detect { format } => {
            let hardware = HardwareProfile::detect(&probe(&settings));
            let text = match format {
                OutputFormat::Markdown => hardware_section(&hardware),
                OutputFormat::Json => serde_json::to_string_pretty(&hardware)?,
            };
            emit(None, &text)?;
            Ok(Outcome::Success)
        }
        Commands::Calibrate { format } => {
            let probe = probe(&settings);
            let hardware = HardwareProfile::detect(&probe);
            let calibration = calibrate(
                &hardware,
                &probe,
                &mut NoComputeRuntime,
                &settings.calibration,
            );
            let text = match format {
                OutputFormat::Markdown => format!(
                    "{}{}",
                    hardware_section(&hardware),
                    calibration_section(&calibration)
                ),
                OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                    "hardware": hardware,
                    "calibration": calibration,
                }))?,
            };
            emit(None, &text)?;
            Ok(Outcome::Success)
        }
        Commands::Compare {
            audit: args,
            save,
            threshold,
            commit,
            branch,
        } => {
            if let Some(threshold) = threshold {
                settings.baseline.regression_threshold_pct = threshold;
                settings.validate()?;
            }
            compare(&args, save, &commit, &branch, &mut settings)
        }
        Commands::Estimate {
            params,
            quantization,
            batch_size,
            model,
            format,
        } => {
            if !params.is_finite() || params <= 0.0 {
                bail!("--params must be a positive number of billions, got {params}");
            }
            let hardware = HardwareProfile::detect(&probe(&settings));
            let estimate = estimate_energy(params, &quantization, batch_size, &hardware);
            let model = model.unwrap_or_else(|| format!("{params}B"));
            let text = match format {
                OutputFormat::Markdown => estimation_section(&estimate, &model, batch_size),
                OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                    "model": model,
                    "batch_size": batch_size,
                    "hardware": hardware,
                    "estimate": estimate,
                    "reference_key": estimate.reference_key(),
                }))?,
            };
            emit(None, &text)?;
            Ok(Outcome::Success)
        }
        Commands::Status => {
            print_status(&settings)?;
            Ok(Outcome::Success)
        }
    }
}

fn probe(settings: &Settings) -> NvidiaSmiProbe {
    NvidiaSmiProbe::new(
        settings.calibration.detect_timeout(),
        settings.calibration.probe_timeout(),
    )
}

fn audit(args: &AuditArgs, settings: &mut Settings) -> AuditReport {
    if let Some(severity) = args.severity {
        settings.audit.severity_threshold = severity;
    }
    if let Some(max_files) = args.max_files {
        settings.audit.max_files = max_files;
    }

    let options = DiscoveryOptions {
        extensions: settings.audit.extensions.clone(),
        max_files: settings.audit.max_files,
    };
    let files = discover_files(&args.paths, &options);
    if files.is_empty() {
        warn!("No source files found to scan");
    }
    run_audit(&files, settings.audit.severity_threshold)
}

fn audit_outcome(report: &AuditReport, args: &AuditArgs, settings: &Settings) -> Outcome {
    if report.has_critical() && settings.audit.fail_on_critical && !args.no_fail {
        Outcome::Failed
    } else {
        Outcome::Success
    }
}

fn compare(
    args: &AuditArgs,
    save: bool,
    commit: &str,
    branch: &str,
    settings: &mut Settings,
) -> Result<Outcome> {
    let report = audit(args, settings);

    let probe = probe(settings);
    let hardware = HardwareProfile::detect(&probe);
    let calibration = calibrate(
        &hardware,
        &probe,
        &mut NoComputeRuntime,
        &settings.calibration,
    );

    let workspace = std::env::current_dir().context("failed to resolve working directory")?;
    let store = BaselineStore::new(settings.baseline.path_in(&workspace));
    let policy = RegressionPolicy {
        threshold_pct: settings.baseline.regression_threshold_pct,
        gate_on_throughput: settings.baseline.gate_on_throughput,
    };
    let comparison = compare_with_store(
        &store,
        &hardware,
        &RunSummary::from(&report.counts),
        &calibration,
        &policy,
    );

    if save {
        let baseline = Baseline::from_run(&hardware, &calibration, &report.counts, commit, branch);
        let key = store
            .save(&baseline)
            .with_context(|| format!("failed to save baseline to {}", store.path().display()))?;
        info!(key = %key, "Baseline updated");
    }

    let text = match args.format {
        OutputFormat::Markdown => format!(
            "{}\n{}{}",
            generate_marked_report(&report),
            hardware_section(&hardware),
            relative_change_section(&comparison.change, comparison.baseline.as_ref())
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "audit": report,
            "hardware": hardware,
            "calibration": calibration,
            "relative_change": comparison.change,
            "baseline": comparison.baseline,
        }))?,
    };
    emit(args.output.as_deref(), &text)?;

    let verdict = if comparison.change.passed {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    eprintln!("Regression gate: {verdict} ({})", comparison.change.reason);

    if args.no_fail {
        return Ok(Outcome::Success);
    }
    if !comparison.change.passed {
        return Ok(Outcome::Failed);
    }
    Ok(audit_outcome(&report, args, settings))
}

fn calibration_section(calibration: &CalibrationResult) -> String {
    let mut lines = vec![
        "### 🔬 Calibration".to_string(),
        String::new(),
        "| Metric | Value |".to_string(),
        "|--------|-------|".to_string(),
        format!("| Method | {} |", calibration.method),
    ];
    if calibration.has_throughput() {
        lines.push(format!(
            "| Throughput | {:.1} TFLOPS |",
            calibration.benchmark_score_tflops
        ));
    }
    if calibration.has_power() {
        lines.push(format!("| Power | {:.1} W |", calibration.avg_power_draw_w));
    }
    if calibration.energy_per_tflop_joules > 0.0 {
        lines.push(format!(
            "| Energy/TFLOP | {:.2} J |",
            calibration.energy_per_tflop_joules
        ));
    }
    lines.push(String::new());
    lines.join("\n") + "\n"
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn print_status(settings: &Settings) -> Result<()> {
    println!("{}", "EcoCompute Energy Audit".bold());
    println!("Version: {}", env!("CARGO_PKG_VERSION"));

    println!("\n{}", "Audit:".bold());
    println!("  Severity threshold: {}", settings.audit.severity_threshold);
    println!("  Max files: {}", settings.audit.max_files);
    println!("  Extensions: {}", settings.audit.extensions.join(", "));
    println!("  Rules:");
    for rule in all_rules() {
        println!("    - {} ({})", rule.id(), rule.severity());
    }

    let workspace = std::env::current_dir().context("failed to resolve working directory")?;
    let store = BaselineStore::new(settings.baseline.path_in(&workspace));
    println!("\n{}", "Baselines:".bold());
    println!("  Path: {}", store.path().display());
    println!(
        "  Regression threshold: {:.1}%",
        settings.baseline.regression_threshold_pct
    );
    match store.read_document() {
        Ok(Some(document)) if !document.baselines.is_empty() => {
            for (key, baseline) in &document.baselines {
                println!(
                    "    - {} {} ({}, {} issue(s))",
                    key.cyan(),
                    baseline.gpu_name,
                    baseline.timestamp,
                    baseline.total_issues
                );
            }
        }
        Ok(_) => println!("  {}", "No baselines stored".dimmed()),
        Err(e) => println!("  {} {e}", "Unreadable:".yellow()),
    }
    Ok(())
}
