mod collectors;
mod config;
mod render;
mod sampler;

use clap::Parser;
use collectors::system::SysinfoProvider;
use config::{Config, ConfigError};
use render::OutputMode;
use sampler::{SampleLoop, TerminationReason};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resmon")]
#[command(version, about = "Prints system-wide CPU and RAM usage at a fixed interval")]
struct Cli {
    /// Optional YAML file; flags and environment override its values.
    #[arg(long, env = "RESMON_CONFIG")]
    config: Option<PathBuf>,
    /// Seconds between samples.
    #[arg(long, env = "RESMON_INTERVAL")]
    interval: Option<f64>,
    /// Stop after this many reports instead of running until Ctrl+C.
    #[arg(long, env = "RESMON_ITERATIONS")]
    iterations: Option<u64>,
    /// Bound for a single sample, e.g. "2s" or "500ms".
    #[arg(long, env = "RESMON_SAMPLE_TIMEOUT", value_parser = humantime::parse_duration)]
    sample_timeout: Option<Duration>,
    #[arg(long, value_enum, env = "RESMON_OUTPUT")]
    output: Option<OutputMode>,
    #[arg(long)]
    print_default_config: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => Config::load_from_file(path)?,
            None => Config::default(),
        };
        if let Some(interval) = self.interval {
            cfg.interval_secs = interval;
        }
        if let Some(iterations) = self.iterations {
            cfg.iterations = Some(iterations);
        }
        if let Some(timeout) = self.sample_timeout {
            if timeout < Duration::from_millis(1) {
                return Err(ConfigError::Validation(format!(
                    "--sample-timeout must be at least 1ms, got {}",
                    humantime::format_duration(timeout)
                )));
            }
            cfg.sample_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(output) = self.output {
            cfg.output = output;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match cli.resolve_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            return;
        }
        info!("received Ctrl+C, stopping");
        let _ = shutdown_tx.send(true);
    });

    let stdout = io::stdout();
    let is_terminal = stdout.is_terminal();
    let mut renderer = render::select_renderer(cfg.output, is_terminal, stdout);
    let mut provider = SysinfoProvider::new(cfg.sample_timeout());
    let mut sampler = SampleLoop::new(cfg.interval(), cfg.iterations);

    let reason = sampler
        .run(&mut provider, renderer.as_mut(), shutdown_rx)
        .await;
    debug!(phase = ?sampler.phase(), ticks = sampler.completed(), "sampler finished");

    if let Some(line) = failure_diagnostic(&reason) {
        eprintln!("{line}");
    }
    std::process::exit(reason.exit_code());
}

/// The single stderr line printed for a fatal stop; clean stops print none.
fn failure_diagnostic(reason: &TerminationReason) -> Option<String> {
    match reason {
        TerminationReason::ProviderFailed(err) => Some(format!(
            "error: metrics provider failed ({}): {err}",
            err.kind()
        )),
        TerminationReason::IterationLimitReached | TerminationReason::Cancelled => None,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
