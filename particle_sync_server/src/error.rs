// Error types for the server and client halves of this crate.
//
// Transport failures on one session never surface as `ServerError` to the
// acceptor; they end that session and are logged. `ServerError` is what
// callers of the public API (`start_server`, `ServerConfig::load`,
// `Session::send`) see.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use particle_sync_protocol::{MessageTag, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("handshake failed: {0}")]
    Handshake(#[source] ProtocolError),

    #[error("expected ID as the first message, got {0:?}")]
    UnexpectedFirstMessage(MessageTag),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),
}
