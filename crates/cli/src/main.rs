//! `pipegen` CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: [`CliConfig`] from arguments and environment.
//! 2. **Wire observability**: `tracing-subscriber` writing to stderr, as
//!    human-readable lines or JSON, filtered by `RUST_LOG` (default `info`).
//! 3. **Construct the generator**: the sample pipelines in [`generator`],
//!    frozen once and installed into a [`MemoryHost`] session.
//! 4. **Run**: read the compilation, run the requested passes on a blocking
//!    worker, cancel on Ctrl-C, and print the last [`SessionReport`] as JSON
//!    on stdout.
//!
//! Exits with `1` when the report carries failures or error diagnostics and
//! with `2` when the run itself could not complete.

mod generator;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use memory_host::{Compilation, MemoryHost, SessionReport};
use pipeline::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pipegen")]
#[command(about = "Runs the sample incremental generator over a JSON-described compilation")]
struct CliConfig {
    /// Path to the compilation snapshot (JSON).
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, env = "PIPEGEN_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Number of generation passes over the same snapshot.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    passes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = CliConfig::parse();
    init_tracing(config.log_format);

    match run(config).await {
        Ok(report) => {
            let clean = report.failures.is_empty() && !report.has_errors();
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    error!(error = %err, "failed to serialize session report");
                    return ExitCode::from(2);
                }
            }
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            error!(error = format!("{err:#}"), "pipegen failed");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(config: CliConfig) -> Result<SessionReport> {
    let source = tokio::fs::read_to_string(&config.input)
        .await
        .with_context(|| format!("failed to read {}", config.input.display()))?;
    let compilation = Compilation::from_json(&source)
        .with_context(|| format!("failed to parse {}", config.input.display()))?;
    let built = generator::sample_generator().context("failed to declare sample pipelines")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling generation");
            on_signal.cancel();
        }
    });

    let passes = config.passes;
    let report = tokio::task::spawn_blocking(move || {
        let mut host = MemoryHost::new(&built);
        info!(session_id = %host.session_id(), passes, "session started");
        let mut report = host.run(&compilation, &cancel)?;
        for _ in 1..passes {
            report = host.run(&compilation, &cancel)?;
        }
        Ok::<_, memory_host::HostError>(report)
    })
    .await
    .context("generation task terminated abnormally")?
    .context("generation pass did not complete")?;

    Ok(report)
}
