// particle_sync_server: session and broadcast layer of the particle sync
// server.
//
// The server owns no simulation logic. It accepts TCP connections, gives
// each client an ID, routes client commands into an injected
// `SimulationStateSource`, and fans snapshots out to every connected client.
//
// Module overview:
// - `server.rs`:   `start_server` / `ServerHandle`: the acceptor thread,
//                  per-session threads, full-state pushes on join, and the
//                  optional tick thread.
// - `session.rs`:  `Session`: one client's socket, its outbound queue and
//                  writer thread, and its blocking inbound command loop.
// - `registry.rs`: `SessionRegistry`: live sessions, broadcast-to-all and
//                  broadcast-to-all-but-one with per-recipient isolation.
// - `router.rs`:   `CommandRouter`: parses commands, applies explorer
//                  updates, and orders every state broadcast.
// - `state.rs`:    The `SimulationStateSource` trait the server consumes.
// - `sim.rs`:      `SharedSimulation`, a mutex-guarded in-memory
//                  implementation with simple bouncing-particle physics.
// - `client.rs`:   `NetClient`, a blocking client with a reader thread.
// - `config.rs`:   `ServerConfig` (TOML + defaults).
// - `logging.rs`:  tracing subscriber setup for the binary.
// - `error.rs`:    `ServerError`, `ClientError`.
//
// Dependencies: `particle_sync_protocol` for framing and messages.
//
// The server runs as a standalone binary (`main.rs`) or embedded in another
// process via `start_server`.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod sim;
pub mod state;

pub use config::ServerConfig;
pub use error::{ClientError, ServerError};
pub use server::{ServerHandle, start_server};
pub use sim::SharedSimulation;
pub use state::SimulationStateSource;
