// Error types for encoding and decoding protocol traffic.
//
// `ProtocolError` covers server-to-client frames (I/O, JSON, compression,
// unknown tags). `CommandError` covers the plain-text client commands; the
// server logs and drops a command that fails to parse, so this type carries
// enough context for a useful log line and nothing more.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message tag {0:?}")]
    UnknownTag(String),

    #[error("{0} message has an empty payload")]
    EmptyPayload(&'static str),
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}")]
    Unknown(String),

    #[error("{command} is missing argument {position}")]
    MissingArgument {
        command: &'static str,
        position: usize,
    },

    #[error("{command}: {token:?} is not a number")]
    InvalidNumber {
        command: &'static str,
        token: String,
    },
}
