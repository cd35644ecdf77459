// TCP acceptor, per-session threads, and the optional tick thread.
//
// Architecture: thread-per-session with blocking I/O.
//
// - **Acceptor thread**: non-blocking `accept()` polled every 50 ms so it can
//   notice `keep_running` going false. For each connection it allocates the
//   next `ClientId`, opens a `Session` (which queues the ID frame), registers
//   it, spawns its inbound thread, and queues the full simulation state for
//   every registered client. A fatal accept error or running out of client
//   IDs stops the acceptor.
// - **Session threads** (two per client): the inbound thread runs
//   `Session::run_inbound_loop`, which feeds the `CommandRouter`
//   synchronously. When the loop returns the thread deregisters the session,
//   applies the departed-explorer policy, and shuts the socket down, in that
//   order. The writer thread drains the session's outbound queue.
// - **Tick thread** (optional, `ServerHandle::start_ticker`): steps a
//   `SharedSimulation` at a fixed period and broadcasts a particle snapshot
//   every N ticks.
//
// Every state broadcast goes through the router (see `router.rs`), so
// snapshots are queued in the order they were read no matter which thread
// produced them. No thread here ever writes to a client socket directly.
//
// Shutdown: `ServerHandle::stop` clears `keep_running` and joins the
// acceptor and tick threads, which releases the listening socket. Sessions
// are not interrupted; each ends on its own EOF, error, or `Disconnect`.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use particle_sync_protocol::{ClientId, ParticleSnapshot};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::SessionRegistry;
use crate::router::CommandRouter;
use crate::session::{Session, SessionEnd};
use crate::sim::SharedSimulation;
use crate::state::SimulationStateSource;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time step handed to `SharedSimulation::step` on every tick.
pub const TICK_DT: f64 = 0.1;

/// Handle returned by `start_server` to observe and control the server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    registry: Arc<SessionRegistry>,
    router: Arc<CommandRouter>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently registered sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.registry.ids()
    }

    /// Push the current particle list to every client.
    pub fn broadcast_particles(&self) -> usize {
        self.router.broadcast_particles()
    }

    /// Push a single particle (e.g. one just added) to every client.
    pub fn broadcast_particle(&self, particle: ParticleSnapshot) -> usize {
        self.router.broadcast_particle(particle)
    }

    /// Push all particles and all explorers to every client.
    pub fn broadcast_full_state(&self) {
        self.router.broadcast_full_state();
    }

    /// Start stepping `sim` every `period`, broadcasting particles every
    /// `broadcast_every` ticks. `sim` should be the same object the server
    /// was started with. Replaces nothing if a ticker is already running.
    pub fn start_ticker(
        &mut self,
        sim: Arc<SharedSimulation>,
        period: Duration,
        broadcast_every: u32,
    ) -> Result<(), ServerError> {
        if self.ticker.is_some() {
            warn!("tick thread already running");
            return Ok(());
        }
        let keep_running = self.keep_running.clone();
        let router = self.router.clone();
        let broadcast_every = u64::from(broadcast_every.max(1));
        let handle = thread::Builder::new()
            .name("tick".into())
            .spawn(move || {
                run_ticker(&sim, &router, period, broadcast_every, &keep_running);
            })?;
        self.ticker = Some(handle);
        Ok(())
    }

    /// Stop accepting connections and wait for the acceptor and tick
    /// threads. Connected sessions keep running until they end themselves.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        for handle in [self.acceptor.take(), self.ticker.take()].into_iter().flatten() {
            let _ = handle.join();
        }
        info!(addr = %self.local_addr, "server stopped");
    }
}

/// Everything the acceptor thread and session threads share.
struct Shared {
    registry: Arc<SessionRegistry>,
    router: Arc<CommandRouter>,
    write_timeout: Option<Duration>,
    outbound_queue_frames: usize,
    remove_explorer_on_disconnect: bool,
}

/// Hands out sequential client IDs starting at 1. IDs are never reused, so
/// once `u32::MAX` has been issued there are no more.
#[derive(Debug)]
struct IdAllocator {
    next: Option<u32>,
}

impl IdAllocator {
    fn starting_at(first: u32) -> Self {
        Self { next: Some(first) }
    }

    fn allocate(&mut self) -> Option<ClientId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(ClientId(id))
    }
}

/// Bind the listening socket and start the acceptor thread. Returns the
/// handle and the actual bound address (useful with port 0).
pub fn start_server(
    config: &ServerConfig,
    state: Arc<dyn SimulationStateSource>,
) -> Result<(ServerHandle, SocketAddr), ServerError> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let registry = Arc::new(SessionRegistry::new());
    let router = Arc::new(CommandRouter::new(
        state,
        registry.clone(),
        config.explorer_echo,
    ));
    let shared = Shared {
        registry: registry.clone(),
        router: router.clone(),
        write_timeout: config.write_timeout(),
        outbound_queue_frames: config.outbound_queue_frames,
        remove_explorer_on_disconnect: config.remove_explorer_on_disconnect,
    };

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_acceptor = keep_running.clone();
    let acceptor = thread::Builder::new()
        .name("acceptor".into())
        .spawn(move || {
            run_acceptor(listener, shared, IdAllocator::starting_at(1), keep_running_acceptor);
        })?;

    info!(addr = %local_addr, "server listening");
    Ok((
        ServerHandle {
            keep_running,
            acceptor: Some(acceptor),
            ticker: None,
            registry,
            router,
            local_addr,
        },
        local_addr,
    ))
}

/// Accept loop. Runs until `keep_running` is false, accept fails, or the
/// client IDs run out.
fn run_acceptor(
    listener: TcpListener,
    shared: Shared,
    mut ids: IdAllocator,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let Some(id) = ids.allocate() else {
                    error!(%peer, "client ids exhausted; acceptor stopping");
                    break;
                };
                handle_new_connection(&shared, id, stream, peer);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                error!(error = %e, "accept failed; acceptor stopping");
                break;
            }
        }
    }
    debug!("acceptor exited");
}

/// Open, register, and start a session, then converge every client.
fn handle_new_connection(shared: &Shared, id: ClientId, stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = configure_stream(&stream, shared.write_timeout) {
        warn!(client_id = %id, %peer, error = %e, "failed to configure socket; dropping");
        return;
    }
    let session = match Session::open(id, stream, shared.outbound_queue_frames) {
        Ok(session) => Arc::new(session),
        Err(e) => {
            warn!(client_id = %id, %peer, error = %e, "failed to open session; dropping");
            return;
        }
    };
    shared.registry.register(session.clone());
    info!(client_id = %id, %peer, sessions = shared.registry.len(), "client connected");

    let registry = shared.registry.clone();
    let router = shared.router.clone();
    let remove_explorer = shared.remove_explorer_on_disconnect;
    let spawned = thread::Builder::new()
        .name(format!("session-{id}"))
        .spawn({
            let session = session.clone();
            move || {
                let end = session.run_inbound_loop(&router);
                registry.deregister(id);
                match &end {
                    SessionEnd::Failed(e) => {
                        warn!(client_id = %id, error = %e, "session ended with error");
                    }
                    other => info!(client_id = %id, reason = ?other, "client disconnected"),
                }
                if remove_explorer {
                    router.remove_explorer(id);
                }
                session.shutdown();
            }
        });
    if let Err(e) = spawned {
        error!(client_id = %id, error = %e, "failed to spawn session thread");
        shared.registry.deregister(id);
        session.shutdown();
        return;
    }

    shared.router.broadcast_full_state();
}

fn configure_stream(stream: &TcpStream, write_timeout: Option<Duration>) -> io::Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode.
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(write_timeout)
}

fn run_ticker(
    sim: &SharedSimulation,
    router: &CommandRouter,
    period: Duration,
    broadcast_every: u64,
    keep_running: &AtomicBool,
) {
    debug!(?period, broadcast_every, "tick thread started");
    while keep_running.load(Ordering::SeqCst) {
        thread::sleep(period);
        let tick = sim.step(TICK_DT);
        if tick % broadcast_every == 0 {
            router.broadcast_particles();
        }
    }
    debug!("tick thread exited");
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::time::Instant;

    use particle_sync_protocol::framing::write_string;
    use particle_sync_protocol::{
        ExplorerPayload, ExplorerSnapshot, ParticlePayload, ServerMessage, read_server_message,
    };

    use super::*;
    use crate::config::{ParticleSeed, WorldConfig};

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            tick_interval_ms: 0,
            ..ServerConfig::default()
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let start = Instant::now();
        while !condition() {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let sim = Arc::new(SharedSimulation::new(WorldConfig::default()));
        let (handle, addr) = start_server(&test_config(), sim).unwrap();

        for expected in 1..=3 {
            let stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let mut reader = BufReader::new(stream);
            assert_eq!(
                read_server_message(&mut reader).unwrap(),
                ServerMessage::id(ClientId(expected))
            );
        }
        handle.stop();
    }

    #[test]
    fn session_count_follows_connections() {
        let sim = Arc::new(SharedSimulation::new(WorldConfig::default()));
        let (handle, addr) = start_server(&test_config(), sim).unwrap();

        let a = TcpStream::connect(addr).unwrap();
        let _b = TcpStream::connect(addr).unwrap();
        wait_for(|| handle.session_count() == 2);

        drop(a);
        wait_for(|| handle.session_count() == 1);
        handle.stop();
    }

    #[test]
    fn stop_releases_the_port() {
        let sim = Arc::new(SharedSimulation::new(WorldConfig::default()));
        let (handle, addr) = start_server(&test_config(), sim).unwrap();
        handle.stop();
        assert!(TcpListener::bind(addr).is_ok());
    }

    #[test]
    fn bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            port: taken.local_addr().unwrap().port(),
            ..test_config()
        };
        let sim = Arc::new(SharedSimulation::new(WorldConfig::default()));
        assert!(matches!(
            start_server(&config, sim),
            Err(ServerError::Bind { .. })
        ));
    }

    #[test]
    fn ticker_steps_and_broadcasts() {
        let sim = Arc::new(SharedSimulation::with_particles(
            WorldConfig::default(),
            &[ParticleSeed {
                x: 100.0,
                y: 100.0,
                velocity: 10.0,
                angle: 0.0,
            }],
        ));
        let (mut handle, addr) = start_server(&test_config(), sim.clone()).unwrap();

        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut reader = BufReader::new(stream);
        let _id = read_server_message(&mut reader).unwrap();
        // Join snapshot: the particle at its seed position.
        let joined = read_server_message(&mut reader).unwrap();
        assert!(matches!(joined, ServerMessage::Particles(ParticlePayload::Snapshot(_))));

        handle
            .start_ticker(sim.clone(), Duration::from_millis(5), 2)
            .unwrap();
        match read_server_message(&mut reader).unwrap() {
            ServerMessage::Particles(ParticlePayload::Snapshot(list)) => {
                assert_eq!(list.len(), 1);
                assert!(list[0].x > 100.0, "particle should have moved: {list:?}");
            }
            other => panic!("expected Particles, got {other:?}"),
        }
        assert!(sim.tick() >= 2);
        handle.stop();
    }

    #[test]
    fn ids_run_out_instead_of_wrapping() {
        let mut ids = IdAllocator::starting_at(u32::MAX - 1);
        assert_eq!(ids.allocate(), Some(ClientId(u32::MAX - 1)));
        assert_eq!(ids.allocate(), Some(ClientId(u32::MAX)));
        assert_eq!(ids.allocate(), None);
        assert_eq!(ids.allocate(), None);
    }

    /// Sleeps after reading explorers on the acceptor thread, widening the
    /// window between a join snapshot being taken and being queued.
    struct SlowJoinSnapshots(SharedSimulation);

    impl SimulationStateSource for SlowJoinSnapshots {
        fn list_particles(&self) -> Vec<ParticleSnapshot> {
            self.0.list_particles()
        }

        fn list_explorers(&self) -> Vec<ExplorerSnapshot> {
            let list = self.0.list_explorers();
            if thread::current().name() == Some("acceptor") {
                thread::sleep(Duration::from_millis(300));
            }
            list
        }

        fn explorer_exists(&self, client_id: ClientId) -> bool {
            self.0.explorer_exists(client_id)
        }

        fn upsert_explorer(&self, client_id: ClientId, x: f64, y: f64) {
            self.0.upsert_explorer(client_id, x, y);
        }

        fn remove_explorer(&self, client_id: ClientId) -> bool {
            self.0.remove_explorer(client_id)
        }
    }

    #[test]
    fn join_snapshot_never_lands_after_a_newer_update() {
        let state = Arc::new(SlowJoinSnapshots(SharedSimulation::new(WorldConfig::default())));
        let (handle, addr) = start_server(&test_config(), state.clone()).unwrap();

        let mut a = TcpStream::connect(addr).unwrap();
        let b = TcpStream::connect(addr).unwrap();
        b.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        let mut b = BufReader::new(b);
        wait_for(|| handle.session_count() == 2);

        write_string(&mut a, "ExplorerCoordinates 1 1").unwrap();
        wait_for(|| state.explorer_exists(ClientId(1)));

        // C's join snapshot is read now and held for a while; A moves again
        // in the meantime.
        let _c = TcpStream::connect(addr).unwrap();
        thread::sleep(Duration::from_millis(100));
        write_string(&mut a, "ExplorerCoordinates 2 2").unwrap();
        let newest = vec![ExplorerSnapshot {
            client_id: ClientId(1),
            x: 2.0,
            y: 2.0,
        }];
        wait_for(|| state.0.list_explorers() == newest);

        // Read everything B was sent; the last explorer list must be the
        // newest position.
        let _id = read_server_message(&mut b).unwrap();
        let mut last = None;
        while let Ok(msg) = read_server_message(&mut b) {
            if let ServerMessage::Explorers(ExplorerPayload::Snapshot(list)) = msg {
                last = Some(list);
            }
        }
        assert_eq!(last, Some(newest));
        handle.stop();
    }
}
