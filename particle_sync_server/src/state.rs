// The boundary between the protocol layer and the simulation.
//
// The server never touches simulation internals. Everything it needs goes
// through `SimulationStateSource`, injected into `start_server` and shared by
// the acceptor (full-state pushes), the command router (explorer upserts),
// and broadcasts. Implementations must do their own locking: every method
// takes `&self` and may be called from any session thread concurrently.

use particle_sync_protocol::{ClientId, ExplorerSnapshot, ParticleSnapshot};

pub trait SimulationStateSource: Send + Sync {
    /// Point-in-time copy of every particle.
    fn list_particles(&self) -> Vec<ParticleSnapshot>;

    /// Point-in-time copy of every explorer, ordered by client ID.
    fn list_explorers(&self) -> Vec<ExplorerSnapshot>;

    fn explorer_exists(&self, client_id: ClientId) -> bool;

    /// Insert the client's explorer, or move it if it already exists.
    fn upsert_explorer(&self, client_id: ClientId, x: f64, y: f64);

    /// Drop the client's explorer. Returns whether one existed.
    fn remove_explorer(&self, client_id: ClientId) -> bool;
}
