// CLI entry point for the particle sync server.
//
// Starts a standalone server that viewers connect to, seeds the simulation
// from the config file, and runs the tick thread that moves particles and
// pushes them to every client. See `server.rs` for the networking
// architecture and `session.rs` for per-client state.
//
// Usage:
//   particle-sync-server [OPTIONS]
//     --config <FILE>       TOML config file (all keys optional)
//     --bind <ADDR>         Listen address (default: 127.0.0.1)
//     --port <PORT>         Listen port (default: 1234)
//     --echo <MODE>         snapshot | update (default: snapshot)
//     --log-level <LEVEL>   Default tracing level when RUST_LOG is unset
//     --no-tick             Do not run the simulation tick thread

use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use particle_sync_server::config::ExplorerEcho;
use particle_sync_server::logging::init_logging;
use particle_sync_server::{ServerConfig, ServerError, SharedSimulation, start_server};

#[derive(Debug, Parser)]
#[command(name = "particle-sync-server", version, about)]
struct Args {
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// How explorer updates are echoed to other clients.
    #[arg(long, value_enum)]
    echo: Option<ExplorerEcho>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Do not run the simulation tick thread.
    #[arg(long)]
    no_tick: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, ServerError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(echo) = self.echo {
            config.explorer_echo = echo;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.no_tick {
            config.tick_interval_ms = 0;
        }
        Ok(config)
    }
}

fn main() {
    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    init_logging(&config.log_level);

    if let Err(e) = run(&config) {
        error!(error = %e, "server failed");
        process::exit(1);
    }
}

fn run(config: &ServerConfig) -> Result<(), ServerError> {
    let sim = Arc::new(SharedSimulation::with_particles(config.world, &config.particles));
    let (mut handle, addr) = start_server(config, sim.clone())?;
    info!(%addr, particles = config.particles.len(), "press Ctrl+C to stop");

    if let Some(period) = config.tick_interval() {
        handle.start_ticker(sim, period, config.broadcast_every_ticks)?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    if let Err(e) = ctrlc::set_handler(move || running_handler.store(false, Ordering::SeqCst)) {
        error!(error = %e, "failed to install signal handler; stop with SIGKILL");
    }

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutting down");
    handle.stop();
    Ok(())
}
