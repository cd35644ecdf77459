// TCP client for viewers and controllers.
//
// Architecture:
// - `connect()` performs the TCP connect and reads the `ID` frame on the
//   calling thread (with a handshake timeout), then spawns a reader thread.
// - The reader thread decodes frames into `ServerMessage`s and pushes them
//   into an `mpsc` channel. A frame that arrives whole but fails to decode
//   is logged and skipped; an I/O error ends the thread.
// - The caller keeps a `BufWriter<TcpStream>` for commands.
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   the next message.
//
// This lives next to the server so integration tests and embedding
// applications can talk to a server without reimplementing the protocol.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use particle_sync_protocol::framing::write_string;
use particle_sync_protocol::{ClientCommand, ClientId, ProtocolError, ServerMessage, read_server_message};
use tracing::{debug, warn};

use crate::error::ClientError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    client_id: ClientId,
}

impl NetClient {
    /// Connect and wait for the server to assign an ID.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).map_err(ClientError::Connect)?;
        stream
            .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
            .map_err(ClientError::Connect)?;
        stream.set_nodelay(true).map_err(ClientError::Connect)?;

        let reader_stream = stream.try_clone().map_err(ClientError::Connect)?;
        let writer = BufWriter::new(stream);
        let mut reader = BufReader::new(reader_stream);

        let client_id = match read_server_message(&mut reader).map_err(ClientError::Handshake)? {
            ServerMessage::Id(body) => body.client_id,
            other => return Err(ClientError::UnexpectedFirstMessage(other.tag())),
        };
        debug!(%client_id, "received client id");

        // Clear the handshake timeout for the long-lived reader loop.
        reader
            .get_ref()
            .set_read_timeout(None)
            .map_err(ClientError::Connect)?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::Builder::new()
            .name(format!("client-{client_id}-reader"))
            .spawn(move || reader_loop(reader, tx))
            .map_err(ClientError::Connect)?;

        Ok(Self {
            writer,
            inbox: rx,
            _reader_thread: Some(reader_thread),
            client_id,
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn send_command(&mut self, command: &ClientCommand) -> Result<(), ClientError> {
        write_string(&mut self.writer, &command.to_string()).map_err(ClientError::Send)
    }

    /// Report this client's explorer position.
    pub fn send_explorer_coordinates(&mut self, x: f64, y: f64) -> Result<(), ClientError> {
        self.send_command(&ClientCommand::ExplorerCoordinates { x, y })
    }

    /// Ask the server to end the session. The connection closes afterwards.
    pub fn disconnect(&mut self) {
        let _ = self.send_command(&ClientCommand::Disconnect);
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        self.inbox.try_iter().collect()
    }

    /// Wait up to `timeout` for the next message. `None` on timeout or once
    /// the connection has closed and the inbox is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ServerMessage> {
        match self.inbox.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Reader thread: decode frames in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    loop {
        match read_server_message(&mut reader) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break; // Client dropped the receiver
                }
            }
            Err(ProtocolError::Io(e)) => {
                debug!(error = %e, "connection closed");
                break;
            }
            Err(e) => warn!(error = %e, "skipping undecodable message"),
        }
    }
}
