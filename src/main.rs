//! Bubble Tea Pipeline Simulator - CLI entrypoint.
//!
//! Loads `config.json`, spins up the simulation engine for the configured
//! duration, and prints the final statistics report (§6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

use boba_pipeline_lib::config::{ConfigLoader, LogConfig, PipelineConfig, Validate};
use boba_pipeline_lib::engine::SimulationEngine;
use boba_pipeline_lib::report;

/// Command-line arguments for the bubble tea pipeline simulator.
#[derive(Parser, Debug)]
#[clap(name = "boba_pipeline", version, author, about)]
struct Args {
    /// Path to the configuration file (defaults to `config.json`).
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Command to execute.
    #[clap(subcommand)]
    command: Option<Command>,
}

/// Available subcommands. `Run` is the default when none is given, so the
/// simulator behaves correctly when invoked with no arguments (§6).
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the simulation for the configured duration.
    Run,

    /// Validate the configuration file without running anything.
    Validate,

    /// Write a default configuration file to the given path.
    GenConfig {
        /// Path to write the generated configuration to.
        #[clap(short, long, value_parser)]
        output: PathBuf,
    },
}

/// Custom timer rendering wall-clock time as `HH:MM:SS` (§6). Deliberately
/// UTC and dependency-free rather than pulling in a timezone-aware crate
/// the rest of the stack never otherwise needs.
struct HmsTimer;

impl tracing_subscriber::fmt::time::FormatTime for HmsTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let secs_of_day = now.as_secs() % 86_400;
        write!(
            w,
            "{:02}:{:02}:{:02}",
            secs_of_day / 3600,
            (secs_of_day % 3600) / 60,
            secs_of_day % 60
        )
    }
}

/// Renders each log line as `HH:MM:SS - message` (§6), in place of the
/// default `tracing_subscriber` layout.
struct PipelineFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for PipelineFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::FormatTime;

        HmsTimer.format_time(&mut writer)?;
        write!(writer, " - ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Sets up the global `tracing` subscriber per the `LogConfig`: the
/// `HH:MM:SS - ` line format above (or JSON), written to the configured log
/// file and, if `stdout` is set, mirrored to stdout (§6).
fn init_logging(log: &LogConfig) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.level.clone()));

    let log_dir = log.file.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = log
        .file
        .file_name()
        .map(|name| name.to_owned())
        .unwrap_or_else(|| std::ffi::OsString::from("simulation.log"));
    let appender = tracing_appender::rolling::never(
        log_dir.unwrap_or_else(|| std::path::Path::new(".")),
        file_name,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let registry = tracing_subscriber::registry().with(env_filter);

    if log.json {
        let file_layer = fmt::layer()
            .json()
            .with_timer(HmsTimer)
            .with_writer(non_blocking)
            .with_ansi(false);
        if log.stdout {
            registry
                .with(file_layer)
                .with(fmt::layer().json().with_timer(HmsTimer))
                .init();
        } else {
            registry.with(file_layer).init();
        }
    } else {
        let file_layer = fmt::layer()
            .event_format(PipelineFormat)
            .with_writer(non_blocking)
            .with_ansi(false);
        if log.stdout {
            registry
                .with(file_layer)
                .with(fmt::layer().event_format(PipelineFormat))
                .init();
        } else {
            registry.with(file_layer).init();
        }
    }

    Ok(guard)
}

fn load_config(config_path: &Option<PathBuf>) -> anyhow::Result<PipelineConfig> {
    let loader = ConfigLoader::new(config_path.as_deref(), "BOBA_PIPELINE");
    Ok(loader.load()?)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Run) {
        Command::Run => match load_config(&args.config) {
            Ok(config) => {
                let _guard = match init_logging(&config.log) {
                    Ok(guard) => guard,
                    Err(e) => {
                        eprintln!("failed to initialize logging: {e}");
                        return ExitCode::FAILURE;
                    }
                };

                info!(version = boba_pipeline_lib::VERSION, "starting simulation");
                let master_seed: u64 = rand::random();
                let engine = SimulationEngine::new(config, master_seed);
                let stats = engine.run().await;
                let rendered = report::render(&stats);
                println!("{rendered}");
                info!("simulation complete");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("configuration error: {e}");
                ExitCode::FAILURE
            }
        },
        Command::Validate => match load_config(&args.config) {
            Ok(_) => {
                println!("configuration is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("configuration error: {e}");
                ExitCode::FAILURE
            }
        },
        Command::GenConfig { output } => {
            let defaults = PipelineConfig::default();
            if let Err(e) = defaults.validate() {
                eprintln!("internal default configuration is invalid: {e}");
                return ExitCode::FAILURE;
            }
            let json = match serde_json::to_string_pretty(&defaults) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("failed to serialize default configuration: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        eprintln!("failed to create output directory: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            if let Err(e) = std::fs::write(&output, json) {
                eprintln!("failed to write configuration: {e}");
                return ExitCode::FAILURE;
            }
            println!("default configuration written to {}", output.display());
            ExitCode::SUCCESS
        }
    }
}
