// Command routing: the only place client input changes shared state.
//
// Every session thread calls `CommandRouter::handle` with the raw command
// string it just read. Parsing failures are logged and dropped.
//
// Ordering: every broadcast that carries simulation state (explorer updates,
// departures, join-time full state, particle snapshots) reads the state and
// queues the result under the router's mutation lock. Snapshots therefore
// reach every client in the order they were taken, and an older snapshot can
// never overwrite a newer one. Queueing never touches a socket, so holding
// the lock across it cannot let one slow client stall the others.
//
// Echo suppression: a position report is broadcast to everyone *except* the
// client that sent it.

use std::sync::Arc;

use parking_lot::Mutex;
use particle_sync_protocol::{
    ClientCommand, ClientId, ExplorerPayload, ExplorerSnapshot, ParticlePayload, ParticleSnapshot,
    ServerMessage,
};
use tracing::{debug, info, warn};

use crate::config::ExplorerEcho;
use crate::registry::SessionRegistry;
use crate::state::SimulationStateSource;

/// What the session should do after a command was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Disconnect,
}

pub struct CommandRouter {
    state: Arc<dyn SimulationStateSource>,
    registry: Arc<SessionRegistry>,
    echo: ExplorerEcho,
    mutation: Mutex<()>,
}

impl CommandRouter {
    pub fn new(
        state: Arc<dyn SimulationStateSource>,
        registry: Arc<SessionRegistry>,
        echo: ExplorerEcho,
    ) -> Self {
        Self {
            state,
            registry,
            echo,
            mutation: Mutex::new(()),
        }
    }

    /// Parse and apply one command from `client_id`.
    pub fn handle(&self, client_id: ClientId, line: &str) -> Flow {
        match ClientCommand::parse(line) {
            Ok(ClientCommand::ExplorerCoordinates { x, y }) => {
                self.update_explorer(client_id, x, y);
                Flow::Continue
            }
            Ok(ClientCommand::Disconnect) => {
                info!(%client_id, "client requested disconnect");
                Flow::Disconnect
            }
            Err(e) => {
                warn!(%client_id, command = line, error = %e, "ignoring command");
                Flow::Continue
            }
        }
    }

    /// Insert or move the client's explorer and tell everyone else.
    pub fn update_explorer(&self, client_id: ClientId, x: f64, y: f64) -> ExplorerSnapshot {
        let _guard = self.mutation.lock();
        if self.state.explorer_exists(client_id) {
            debug!(%client_id, x, y, "moving explorer");
        } else {
            info!(%client_id, x, y, "adding explorer");
        }
        self.state.upsert_explorer(client_id, x, y);

        let updated = ExplorerSnapshot { client_id, x, y };
        let payload = match self.echo {
            ExplorerEcho::Snapshot => ExplorerPayload::Snapshot(self.state.list_explorers()),
            ExplorerEcho::Update => ExplorerPayload::Update(updated),
        };
        self.registry
            .broadcast_except(client_id, &ServerMessage::Explorers(payload));
        updated
    }

    /// Drop a departed client's explorer and push the shrunken list to the
    /// remaining clients. Nothing is sent when the list became empty.
    pub fn remove_explorer(&self, client_id: ClientId) {
        let _guard = self.mutation.lock();
        if self.state.remove_explorer(client_id) {
            info!(%client_id, "removed explorer of departed client");
            let explorers = self.state.list_explorers();
            self.registry
                .broadcast_all(|| ServerMessage::Explorers(ExplorerPayload::Snapshot(explorers)));
        }
    }

    /// Push every particle to every client.
    pub fn broadcast_particles(&self) -> usize {
        let _guard = self.mutation.lock();
        self.registry.broadcast_all(|| {
            ServerMessage::Particles(ParticlePayload::Snapshot(self.state.list_particles()))
        })
    }

    /// Push a single particle (e.g. one just added) to every client.
    pub fn broadcast_particle(&self, particle: ParticleSnapshot) -> usize {
        let _guard = self.mutation.lock();
        self.registry
            .broadcast_all(|| ServerMessage::Particles(ParticlePayload::Update(particle)))
    }

    pub fn broadcast_explorers(&self) -> usize {
        let _guard = self.mutation.lock();
        self.registry.broadcast_all(|| {
            ServerMessage::Explorers(ExplorerPayload::Snapshot(self.state.list_explorers()))
        })
    }

    /// Particles, then explorers, to every client, as one step.
    pub fn broadcast_full_state(&self) {
        let _guard = self.mutation.lock();
        self.registry.broadcast_all(|| {
            ServerMessage::Particles(ParticlePayload::Snapshot(self.state.list_particles()))
        });
        self.registry.broadcast_all(|| {
            ServerMessage::Explorers(ExplorerPayload::Snapshot(self.state.list_explorers()))
        });
    }
}
