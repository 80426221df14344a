use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lockaudit::{
    api::HttpApi,
    config::Config,
    matcher::{apply_ignores, match_vulnerable, meets_severity},
    model::Severity,
    pipeline::{resolve_packages, ResolveOptions},
    report::{render_markdown, write_reports},
    resolver::RESOLVER_NAMES,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNERABILITY_FOUND: u8 = 2;
}

#[derive(Parser)]
#[command(name = "lockaudit")]
#[command(
    author,
    version,
    about = "Audit dependency lock files for known security advisories"
)]
struct Cli {
    /// Lock file to audit
    #[arg(short, long, default_value = "deno.lock")]
    lock: PathBuf,

    /// Lock file format (deno-lock, package-lock, bun-lock)
    #[arg(short, long, default_value = "deno-lock")]
    resolver: String,

    /// Minimum advisory severity for a non-zero exit (low, medium, high, critical)
    #[arg(short, long)]
    severity: Option<Severity>,

    /// Directory for report.md and resolved-packages.json
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// GitHub token for higher advisory-API rate limits (falls back to $GITHUB_TOKEN)
    #[arg(long)]
    github_token: Option<String>,

    /// Config file path (default: ./audit.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of concurrent remote lookups
    #[arg(long)]
    concurrency: Option<usize>,

    /// Abort remote lookups after this many seconds, keeping partial results
    #[arg(long)]
    timeout: Option<u64>,

    /// Mute output
    #[arg(long)]
    silent: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "lockaudit=debug"
    } else {
        "lockaudit=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let severity = cli.severity.unwrap_or(config.severity);
    let output_dir = cli.output_dir.unwrap_or_else(|| config.output_dir.clone());
    let concurrency = cli.concurrency.unwrap_or(config.concurrency);
    let timeout = cli.timeout.or(config.timeout_secs);
    let github_token = cli
        .github_token
        .or_else(|| std::env::var("GITHUB_TOKEN").ok());

    let api = Arc::new(HttpApi::new(github_token));
    let cancel = CancellationToken::new();

    if let Some(secs) = timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            cancel.cancel();
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let spinner = if cli.silent {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.yellow} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!(
            "[{}] Resolving packages from {}...",
            cli.resolver,
            cli.lock.display()
        ));
        Some(pb)
    };

    let outcome = resolve_packages(
        &cli.lock,
        &cli.resolver,
        api.clone(),
        api,
        ResolveOptions {
            concurrency,
            cancel,
        },
    )
    .await
    .map_err(|err| {
        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }
        if matches!(err, lockaudit::AuditError::UnknownResolver(_)) {
            anyhow::anyhow!("{} (available: {})", err, RESOLVER_NAMES.join(", "))
        } else {
            anyhow::Error::new(err)
        }
    })?;

    if let Some(pb) = &spinner {
        pb.finish_with_message(format!("Resolved {} packages", outcome.packages.len()));
    }

    let matched = apply_ignores(match_vulnerable(&outcome.packages), &config.ignore);

    write_reports(&output_dir, &outcome.packages, &matched)?;

    if !cli.silent {
        println!("{}", render_markdown(&matched));

        if !outcome.unresolved.is_empty() {
            println!("Unresolved packages (no linked GitHub repository):");
            for pkg in &outcome.unresolved {
                println!("  [{}] {}", pkg.origin, pkg.package);
            }
        }
        if outcome.cancelled {
            println!("\nRun was cancelled; results are partial.");
        }
    }

    if meets_severity(&matched, severity) {
        Ok(exit_codes::VULNERABILITY_FOUND)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}
