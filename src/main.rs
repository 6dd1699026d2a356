// src/main.rs - gcode-receiver entry point
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gcode_receiver::channel::channel_pair;
use gcode_receiver::config::{load_config, Config};
use gcode_receiver::receiver::{tcp, terminal, ReceiverError, TransportError};
use gcode_receiver::worker::Worker;

#[derive(Debug, Parser)]
#[command(name = "gcode-receiver", version, about = "A very simple GRBL-like G-code receiver for integration tests")]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// TRACE, DEBUG, INFO, WARN(ING) or ERROR
    #[arg(long)]
    loglevel: Option<String>,

    /// Start a socket server on the specified port instead of using the terminal
    #[arg(long)]
    socket: Option<u16>,

    /// Amount of time each move command takes to complete (s)
    #[arg(long = "move-delay")]
    move_delay: Option<f64>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.loglevel {
            config.loglevel = level.clone();
        }
        if let Some(port) = self.socket {
            config.socket = Some(port);
        }
        if let Some(delay) = self.move_delay {
            config.move_delay = delay;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    // Protocol traffic owns stdout in terminal mode, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .with_writer(std::io::stderr)
        .init();

    let (frontend, worker_channels) = channel_pair();
    let worker = Worker::new(worker_channels, config.worker_config()).spawn();

    let served = async {
        match config.socket {
            Some(port) => match TcpListener::bind((config.bind_address.as_str(), port)).await {
                Ok(listener) => tcp::serve(listener, frontend, config.idle_sleep()).await,
                Err(e) => Err(ReceiverError::Transport(TransportError::from(e))),
            },
            None => terminal::serve(frontend, config.idle_sleep()).await,
        }
    };

    let result: Result<(), ReceiverError> = tokio::select! {
        result = served => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!("Receiver failed: {}", e);
    }
    worker.abort();

    result.map_err(Into::into)
}
