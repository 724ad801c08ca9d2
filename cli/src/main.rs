//! CLI for the pull request migrator.
//!
//! This tool recreates open Bitbucket pull requests on GitHub and archives
//! closed ones, driven by a TOML configuration file.

use clap::Parser;
use pr_migrator::{RunReport, RunSummary, Runner, RunnerConfig, RunnerError, TargetMode};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Migrate pull requests from Bitbucket Cloud to GitHub.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Identity mapping file, overriding `identity-mapping`.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Only process these source pull request ids.
    #[arg(long, value_delimiter = ',')]
    pr_numbers: Vec<u64>,

    /// Read everything but suppress writes to GitHub.
    #[arg(long)]
    dry_run: bool,

    /// Send writes to the `[test-mode]` repository.
    #[arg(long)]
    test_mode: bool,

    /// Classify and validate only; write nothing anywhere.
    #[arg(long)]
    audit: bool,

    /// Check access to both platforms and exit.
    #[arg(long)]
    test_connection: bool,

    /// Pull requests processed in parallel.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Explicitly install aws-lc-rs for rustls
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    init_tracing();

    let args = Args::parse();

    match run(args).await {
        Ok(None) => {
            println!("\nConnection test passed.");
            ExitCode::from(0)
        }
        Ok(Some(report)) => {
            print_summary(&report.summary);
            print_failures(&report);

            if report.classification_complete() {
                ExitCode::from(0)
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info")
fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Main execution logic. Returns `None` for a connection test.
async fn run(args: Args) -> Result<Option<RunReport>, RunnerError> {
    let mut config = RunnerConfig::new(args.config)
        .with_selection(args.pr_numbers)
        .with_dry_run(args.dry_run)
        .with_audit(args.audit)
        .with_target_mode(if args.test_mode {
            TargetMode::TestRepository
        } else {
            TargetMode::Production
        });
    if let Some(path) = args.mapping {
        config = config.with_mapping_path(path);
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }

    let runner = Runner::new(config)?;
    if args.test_connection {
        runner.test_connection().await?;
        return Ok(None);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing pull requests already in progress");
                cancel.cancel();
            }
        }
    });

    info!("Starting migration");
    runner.run(cancel).await.map(Some)
}

/// Prints the final run summary.
fn print_summary(summary: &RunSummary) {
    println!("\nSummary:");
    println!(
        "  Mode: {}",
        if summary.audit {
            "Audit"
        } else if summary.dry_run {
            "Dry Run"
        } else {
            "Live"
        }
    );
    println!("  Pull requests processed: {}", summary.total);
    println!(
        "  Open: {}  Merged: {}  Declined: {}  Superseded: {}",
        summary.open, summary.merged, summary.declined, summary.superseded
    );

    if summary.audit || summary.dry_run {
        println!("  PRs that would be created: {}", summary.prs_would_create);
        println!("  PRs that would be archived: {}", summary.would_archive);
    } else {
        println!("  PRs created: {}", summary.prs_created);
        println!("  PRs already existing: {}", summary.prs_already_existing);
        println!("  PRs archived: {}", summary.archived);
        println!("  PRs already archived: {}", summary.already_archived);
        println!("  Tracking issues filed: {}", summary.issues_filed);
    }
    println!("  Skipped: {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
}

/// Lists failed records and why the run may be incomplete.
fn print_failures(report: &RunReport) {
    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("\nFailures:");
        for record in failures {
            println!(
                "  #{} {} [{}]: {}",
                record.pr_id,
                record.title,
                record.step,
                record.outcome.failure_reason().unwrap_or("unknown")
            );
        }
    }

    if let Some(error) = &report.enumeration_error {
        println!("\nEnumeration stopped early: {error}");
    }
    if report.cancelled {
        println!("\nRun was cancelled; re-run to process the remaining pull requests.");
    }
}
