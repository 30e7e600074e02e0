//! tcp-dataflow: a two-port TCP dispatcher
//!
//! - The echo port uppercases every chunk it reads and writes it back.
//! - The control port accepts `stop-read` and `start-read`, which switch
//!   reading on and off for every echo-port connection at once.
//!
//! One thread, one mio poll, no locks. Configuration via CLI arguments or
//! TOML file; with neither, listens on 0.0.0.0 ports 4444 (control) and
//! 5555 (echo).

mod config;
mod protocols;
mod runtime;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        bind = %config.bind,
        command_port = config.command_port,
        echo_port = config.echo_port,
        buffer_size = config.buffer_size,
        events_capacity = config.events_capacity,
        "Starting tcp-dataflow server"
    );

    runtime::run(config)?;
    info!("Server stopped");
    Ok(())
}
