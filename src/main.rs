use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use gpubeat::duration::{format_duration, parse_duration};
use gpubeat::Config;

#[derive(Parser, Debug)]
#[command(name = "gpubeat")]
#[command(about = "Polls nvidia-smi and publishes GPU metric events")]
#[command(version)]
struct Args {
    /// Path to a TOML or YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Polling period (e.g., "1s", "500ms", "1m"); overrides the config file
    #[arg(short, long)]
    period: Option<String>,

    /// Log filter, e.g. "info" or "gpubeat_sdk=debug" (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Only emit per-device events
    #[arg(long)]
    no_processes: bool,

    /// Collect a single snapshot, publish it and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level)
            .with_context(|| format!("invalid log level: {}", args.log_level))?,
    };

    // stdout is reserved for the stdout output
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = Config::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("loading config from {}", path.display()),
        None => "loading config".to_string(),
    })?;

    if let Some(period) = &args.period {
        cfg.period = parse_duration(period).context("invalid --period")?;
    }
    if args.no_processes {
        cfg.track_processes = false;
    }
    cfg.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        period = %format_duration(cfg.period),
        smi = %cfg.smi.path,
        track_processes = cfg.track_processes,
        "starting gpubeat",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    if args.once {
        rt.block_on(run_once(cfg))
    } else {
        rt.block_on(run(cfg))
    }
}

async fn run(cfg: Config) -> Result<()> {
    let beater = cfg.beater()?;
    let (stop_tx, stop_rx) = watch::channel(false);

    let run = beater.run(stop_rx);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            // The loop only ends on its own if the output failed.
            return result.context("gpubeat exited unexpectedly");
        }
        signal = shutdown_signal() => signal?,
    }

    let _ = stop_tx.send(true);
    run.await.context("closing output")
}

async fn run_once(cfg: Config) -> Result<()> {
    let collector = cfg.collector();
    let output = cfg.output()?;
    let description = output.to_string();

    let mut publisher = output
        .connect()
        .await
        .with_context(|| format!("opening output {}", description))?;

    let result = collector.poll_once(&mut publisher).await;
    publisher.close().await.context("closing output")?;

    let report = result.context("collecting GPU metrics")?;
    tracing::info!(
        devices = report.devices,
        published = report.published,
        "collected one snapshot"
    );

    if report.failed > 0 {
        bail!("{} events could not be published", report.failed);
    }
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for SIGINT")?;
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        tracing::info!("received ctrl-c, shutting down");
    }

    Ok(())
}
