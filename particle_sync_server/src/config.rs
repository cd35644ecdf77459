// Server configuration.
//
// `ServerConfig` has a `Default` that runs a usable server, can be read from
// a TOML file (every field optional), and is further overridden by CLI flags
// in `main.rs`. Library callers (tests, embedding processes) build it
// directly with struct-update syntax.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ServerError;
use crate::session::DEFAULT_OUTBOUND_QUEUE;

/// How a position report is echoed to the other clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExplorerEcho {
    /// Full explorer list as a JSON array.
    #[default]
    Snapshot,
    /// Only the changed explorer, as a JSON object.
    Update,
}

/// Size of the simulated area. Particles bounce off its edges.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// A particle present when the simulation starts. `angle` is in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ParticleSeed {
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
    pub angle: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Socket write timeout per session, in milliseconds. 0 disables it.
    pub write_timeout_ms: u64,
    /// Frames a session may have waiting for its writer. A client that
    /// falls this far behind is disconnected.
    pub outbound_queue_frames: usize,
    /// Simulation tick period in milliseconds. 0 disables the tick thread.
    pub tick_interval_ms: u64,
    /// Broadcast a particle snapshot every N ticks.
    pub broadcast_every_ticks: u32,
    pub explorer_echo: ExplorerEcho,
    pub remove_explorer_on_disconnect: bool,
    pub log_level: String,
    pub world: WorldConfig,
    pub particles: Vec<ParticleSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 1234,
            write_timeout_ms: 5000,
            outbound_queue_frames: DEFAULT_OUTBOUND_QUEUE,
            tick_interval_ms: 10,
            broadcast_every_ticks: 5,
            explorer_echo: ExplorerEcho::Snapshot,
            remove_explorer_on_disconnect: true,
            log_level: "info".into(),
            world: WorldConfig::default(),
            particles: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(text)?)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_ms > 0).then(|| Duration::from_millis(self.tick_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config = ServerConfig::from_toml(
            r#"
            port = 4321
            explorer_echo = "update"

            [world]
            width = 800.0

            [[particles]]
            x = 10.0
            y = 20.0
            velocity = 5.0
            angle = 45.0
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 4321);
        assert_eq!(config.explorer_echo, ExplorerEcho::Update);
        assert_eq!(config.world.width, 800.0);
        assert_eq!(config.world.height, 720.0);
        assert_eq!(config.particles.len(), 1);
        assert_eq!(config.particles[0].angle, 45.0);
        assert!(config.remove_explorer_on_disconnect);
    }

    #[test]
    fn zero_disables_timers() {
        let config = ServerConfig {
            write_timeout_ms: 0,
            tick_interval_ms: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.write_timeout(), None);
        assert_eq!(config.tick_interval(), None);
    }

    #[test]
    fn rejects_unknown_echo_mode() {
        let err = ServerConfig::from_toml(r#"explorer_echo = "loud""#).unwrap_err();
        assert!(matches!(err, ServerError::ConfigParse(_)));
    }

    #[test]
    fn listen_addr_combines_bind_and_port() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:1234");
    }
}
