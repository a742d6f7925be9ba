//! spectra-relay binary: load config, start the relay, run until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use spectra_config::{config_to_json, load_config, validate, LogLevel, SpectraConfig};
use spectra_relay::RelayServer;

#[derive(Parser)]
#[command(name = "spectra-relay", about = "Room relay for shared live audio spectra")]
struct Args {
    /// Config file (default: platform config dir, created on first run).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// WebSocket handshake path.
    #[arg(long)]
    path: Option<String>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<CliLogLevel> for LogLevel {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Trace => LogLevel::Trace,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Error => LogLevel::Error,
        }
    }
}

impl Args {
    fn apply(&self, config: &mut SpectraConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.path {
            config.server.path = path.clone();
        }
        if let Some(level) = self.log_level {
            config.logging.level = level.into();
        }
    }
}

fn init_tracing(level: LogLevel) {
    let default_filter = format!(
        "spectra_relay={level},spectra_common={level},spectra_config={level}",
        level = level.as_str()
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("spectra-relay: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);

    if args.print_config {
        println!("{}", config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    init_tracing(config.logging.level);

    if let Err(e) = validate(&config) {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    let server = RelayServer::new(config);
    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "Failed to start relay");
        return ExitCode::FAILURE;
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutting down");
            server.shutdown();
        }
        _ = server.wait_for_shutdown() => {}
    }

    ExitCode::SUCCESS
}
