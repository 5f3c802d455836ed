//! procvisor — wrap an executable and expose the readiness and liveness
//! http endpoints needed by kubernetes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use procvisor::config::{Config, FileConfig, Overrides};
use procvisor::error::GENERIC_EXIT_CODE;
use procvisor::{Orchestrator, RestartPolicy};

#[derive(Parser)]
#[command(
    name = "procvisor",
    version,
    about = "An executable wrapper with readiness/liveness endpoints",
    long_about = "A tool to wrap another executable and generate the readiness and \
                  the liveness http endpoints needed by kubernetes."
)]
struct Cli {
    /// Path to a TOML config file (defaults to ~/.procvisor.toml when present)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path of the wrapped process executable
    #[arg(short = 'p', long, value_name = "PATH")]
    process_path: Option<PathBuf>,

    /// Comma separated list of arguments for the wrapped process
    #[arg(long, value_name = "ARGS", value_delimiter = ',')]
    process_args: Option<Vec<String>>,

    /// When to restart the wrapped process after it ends
    #[arg(short = 'r', long, value_enum, value_name = "POLICY")]
    restart: Option<RestartArg>,

    /// Hide the stdout of the wrapped process from the logs
    #[arg(long)]
    process_hide_stdout: bool,

    /// Hide the stderr of the wrapped process from the logs
    #[arg(long)]
    process_hide_stderr: bool,

    /// Mark the wrapped process as failed if it writes logs on stderr
    #[arg(long)]
    process_fail_on_stderr: bool,

    /// Timeout to wait for a graceful shutdown of the wrapped process
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    process_timeout: Option<Duration>,

    /// Bind address for the http server
    #[arg(short = 'a', long, value_name = "ADDR")]
    server_address: Option<String>,

    /// Ping endpoint timeout, use 0s to disable
    #[arg(short = 't', long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    server_ping_timeout: Option<Duration>,

    /// Http server shutdown timeout
    #[arg(short = 's', long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    server_shutdown_timeout: Option<Duration>,

    /// Output level of logs (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RestartArg {
    /// Never restart the wrapped process
    Never,
    /// Restart only when it ends with a non-zero exit code
    OnError,
    /// Restart after every exit
    Always,
}

impl From<RestartArg> for RestartPolicy {
    fn from(arg: RestartArg) -> Self {
        match arg {
            RestartArg::Never => RestartPolicy::Never,
            RestartArg::OnError => RestartPolicy::OnError,
            RestartArg::Always => RestartPolicy::Always,
        }
    }
}

impl Cli {
    fn into_overrides(self) -> Overrides {
        Overrides {
            process_path: self.process_path,
            process_args: self.process_args,
            restart: self.restart.map(Into::into),
            hide_stdout: self.process_hide_stdout,
            hide_stderr: self.process_hide_stderr,
            fail_on_stderr: self.process_fail_on_stderr,
            stop_grace: self.process_timeout,
            address: self.server_address,
            ping_interval: self.server_ping_timeout,
            shutdown_timeout: self.server_shutdown_timeout,
            log_level: self.log_level,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("procvisor: {err:#}");
            std::process::exit(GENERIC_EXIT_CODE);
        }
    };

    init_tracing(&config.log_level);

    if let Err(err) = Orchestrator::new(config).run().await {
        tracing::error!(error = %err, label = err.as_label(), "wrapper ended with an error");
        std::process::exit(err.exit_code().clamp(1, 255));
    }
}

fn load_config(cli: Cli) -> anyhow::Result<Config> {
    let file = match &cli.config {
        Some(path) => {
            FileConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => match default_config_file() {
            Some(path) if path.exists() => {
                FileConfig::load(&path).with_context(|| format!("loading {}", path.display()))?
            }
            _ => FileConfig::default(),
        },
    };

    Ok(Config::resolve(cli.into_overrides(), file)?)
}

fn default_config_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".procvisor.toml"))
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}
