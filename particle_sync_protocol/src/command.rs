// Client-to-server commands.
//
// Commands are plain text: a command name followed by space-separated
// arguments, sent as one length-prefixed string field per command (see
// `framing::write_string`). Runs of spaces are tolerated; extra trailing
// arguments are ignored so older servers accept newer clients that append
// fields.

use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;

const EXPLORER_COORDINATES: &str = "ExplorerCoordinates";
const DISCONNECT: &str = "Disconnect";

/// Commands a client can send.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClientCommand {
    /// Report the position of the client's explorer.
    ExplorerCoordinates { x: f64, y: f64 },
    /// Close the session from the client side.
    Disconnect,
}

impl ClientCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            None => Err(CommandError::Empty),
            Some(EXPLORER_COORDINATES) => {
                let x = parse_coordinate(tokens.next(), 1)?;
                let y = parse_coordinate(tokens.next(), 2)?;
                Ok(Self::ExplorerCoordinates { x, y })
            }
            Some(DISCONNECT) => Ok(Self::Disconnect),
            Some(other) => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

fn parse_coordinate(token: Option<&str>, position: usize) -> Result<f64, CommandError> {
    let token = token.ok_or(CommandError::MissingArgument {
        command: EXPLORER_COORDINATES,
        position,
    })?;
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber {
            command: EXPLORER_COORDINATES,
            token: token.to_owned(),
        })
}

impl FromStr for ClientCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplorerCoordinates { x, y } => write!(f, "{EXPLORER_COORDINATES} {x} {y}"),
            Self::Disconnect => f.write_str(DISCONNECT),
        }
    }
}
