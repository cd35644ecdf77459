// One connected client.
//
// A `Session` owns the client's socket and is shared (`Arc`) between its own
// inbound-loop thread and whichever threads broadcast to it. Reads happen
// only on the inbound thread. Writes never happen on the caller's thread:
// `send_frame` pushes complete frames onto a bounded queue and returns, and
// a dedicated writer thread drains the queue onto the socket in order. A
// client that stops reading can therefore only stall its own writer thread,
// never a broadcaster or a lock shared with other sessions.
//
// Lifecycle:
// - `Session::open` queues the `ID` frame before the session is visible to
//   anything else, so it is always the first frame on the wire.
// - `run_inbound_loop` reads one command string at a time and hands it to the
//   router synchronously. It returns on EOF, I/O error, or `Disconnect`.
// - A write failure (including a write timeout) or a full outbound queue
//   shuts the socket down. The inbound thread then sees EOF/error, returns,
//   and the caller deregisters. The session is therefore only ever removed
//   from the registry by its own inbound thread.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;

use particle_sync_protocol::framing::read_string;
use particle_sync_protocol::{ClientId, ServerMessage};
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::router::{CommandRouter, Flow};

/// Frames a session may have queued before it is considered stalled.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 1024;

/// Why an inbound loop returned.
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer closed its end of the connection.
    PeerClosed,
    /// The client sent `Disconnect`.
    Disconnected,
    /// Reading failed (reset, shutdown after a failed write, ...).
    Failed(io::Error),
}

pub struct Session {
    id: ClientId,
    peer: Option<SocketAddr>,
    stream: TcpStream,
    outbound: SyncSender<Arc<[u8]>>,
}

impl Session {
    /// Wrap an accepted stream, start its writer thread, and queue the
    /// client's ID. At most `queue_frames` frames may wait for the writer.
    pub fn open(id: ClientId, stream: TcpStream, queue_frames: usize) -> Result<Self, ServerError> {
        let peer = stream.peer_addr().ok();
        let writer = BufWriter::new(stream.try_clone()?);
        let (outbound, queued) = mpsc::sync_channel(queue_frames.max(1));
        let session = Self {
            id,
            peer,
            stream,
            outbound,
        };
        session.send(&ServerMessage::id(id))?;
        thread::Builder::new()
            .name(format!("session-{id}-writer"))
            .spawn(move || run_writer(id, writer, queued))?;
        Ok(session)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Serialize and queue one message. Empty snapshots are skipped.
    pub fn send(&self, msg: &ServerMessage) -> Result<(), ServerError> {
        match msg.encode_frame()? {
            Some(frame) => Ok(self.send_frame(frame.into())?),
            None => {
                debug!(client_id = %self.id, tag = msg.tag().as_str(), "skipping empty message");
                Ok(())
            }
        }
    }

    /// Queue pre-encoded frame bytes for the writer thread. Never blocks.
    ///
    /// A full queue means the client has stopped keeping up: the session is
    /// shut down and the frame is dropped.
    pub fn send_frame(&self, frame: Arc<[u8]>) -> io::Result<()> {
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(client_id = %self.id, "outbound queue full; closing session");
                self.shutdown();
                Err(io::Error::new(io::ErrorKind::WouldBlock, "outbound queue full"))
            }
            Err(TrySendError::Disconnected(_)) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "session writer has stopped",
            )),
        }
    }

    /// Read and route commands until the connection ends.
    pub fn run_inbound_loop(&self, router: &CommandRouter) -> SessionEnd {
        let mut reader = match self.stream.try_clone() {
            Ok(stream) => BufReader::new(stream),
            Err(e) => return SessionEnd::Failed(e),
        };
        loop {
            match read_string(&mut reader) {
                Ok(line) => {
                    if router.handle(self.id, &line) == Flow::Disconnect {
                        return SessionEnd::Disconnected;
                    }
                }
                // A non-UTF-8 command was consumed whole, so the stream is
                // still aligned on the next command.
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(client_id = %self.id, error = %e, "ignoring malformed command");
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return SessionEnd::PeerClosed;
                }
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }

    /// Close both directions. Idempotent; errors (already closed) ignored.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Writer thread: one frame at a time, in queue order. Exits when the
/// session is dropped or a write fails.
fn run_writer(id: ClientId, mut writer: BufWriter<TcpStream>, queued: Receiver<Arc<[u8]>>) {
    for frame in queued {
        if let Err(e) = writer.write_all(&frame).and_then(|()| writer.flush()) {
            warn!(client_id = %id, error = %e, "write failed; closing session");
            let _ = writer.get_ref().shutdown(Shutdown::Both);
            return;
        }
    }
    debug!(client_id = %id, "writer exited");
}
