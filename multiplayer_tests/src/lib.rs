// Test-only viewer for multi-client integration tests.
//
// Wraps the real `NetClient` (from `particle_sync_server::client`) and keeps
// a local mirror of what a rendering client would draw: the latest particle
// list and every known explorer. Snapshots replace the mirror; updates
// patch it.
//
// The only test-specific code here is the synchronous polling wrappers
// (blocking loops around `NetClient::poll()`). All networking uses the same
// code paths as a real client.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use particle_sync_protocol::{
    ClientId, ExplorerPayload, ExplorerSnapshot, ParticlePayload, ParticleSnapshot, ServerMessage,
};
use particle_sync_server::client::NetClient;

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What a viewer currently believes the world looks like.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ViewerState {
    pub particles: Vec<ParticleSnapshot>,
    pub explorers: BTreeMap<ClientId, ExplorerSnapshot>,
    pub particle_snapshots: usize,
    pub particle_updates: usize,
    pub explorer_snapshots: usize,
    pub explorer_updates: usize,
}

impl ViewerState {
    pub fn apply(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Id(_) => {}
            ServerMessage::Particles(ParticlePayload::Snapshot(list)) => {
                self.particles = list;
                self.particle_snapshots += 1;
            }
            ServerMessage::Particles(ParticlePayload::Update(p)) => {
                self.particles.push(p);
                self.particle_updates += 1;
            }
            ServerMessage::Explorers(ExplorerPayload::Snapshot(list)) => {
                self.explorers = list.into_iter().map(|e| (e.client_id, e)).collect();
                self.explorer_snapshots += 1;
            }
            ServerMessage::Explorers(ExplorerPayload::Update(e)) => {
                self.explorers.insert(e.client_id, e);
                self.explorer_updates += 1;
            }
        }
    }

    pub fn explorer_ids(&self) -> Vec<ClientId> {
        self.explorers.keys().copied().collect()
    }
}

/// A test viewer wrapping a real NetClient.
pub struct TestViewer {
    client: NetClient,
    pub state: ViewerState,
}

impl TestViewer {
    /// Connect and receive the client ID.
    pub fn connect(addr: SocketAddr) -> Self {
        let client = NetClient::connect(addr).expect("TestViewer::connect failed");
        Self {
            client,
            state: ViewerState::default(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.client.client_id()
    }

    pub fn move_explorer(&mut self, x: f64, y: f64) {
        self.client
            .send_explorer_coordinates(x, y)
            .expect("send_explorer_coordinates failed");
    }

    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    /// Non-blocking: apply everything queued. Returns how many messages
    /// were applied.
    pub fn drain(&mut self) -> usize {
        let messages = self.client.poll();
        let count = messages.len();
        for msg in messages {
            self.state.apply(msg);
        }
        count
    }

    /// Blocking poll until `condition` holds on the mirrored state.
    pub fn poll_until(&mut self, what: &str, mut condition: impl FnMut(&ViewerState) -> bool) {
        let start = Instant::now();
        loop {
            self.drain();
            if condition(&self.state) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Blocking wait for a condition outside any viewer (server-side state).
pub fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
        thread::sleep(POLL_INTERVAL);
    }
}
