// Server-to-client messages.
//
// `ServerMessage` is a tagged variant over the three message kinds. The wire
// tag string is derived from the variant, never the other way round, so
// serialization never has to compare strings to decide what it is looking
// at. Decoding goes through `MessageTag::parse` once and then straight to the
// matching payload type.
//
// `Particles` and `Explorers` each have two payload shapes under the same
// tag: a full snapshot (JSON array) and a single-entity update (JSON object).
// Both are `#[serde(untagged)]` so the JSON carries no extra discriminator.
//
// Empty snapshots are never transmitted. `encode_frame` returns `Ok(None)`
// for them and callers treat that as "nothing to send".

use serde::{Deserialize, Serialize};

use crate::compression::{compress, decompress};
use crate::error::ProtocolError;
use crate::framing::encode_frame;
use crate::types::{ClientId, ExplorerSnapshot, ParticleSnapshot};

/// Type tag written at the start of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageTag {
    Id,
    Particles,
    Explorers,
}

impl MessageTag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Particles => "Particles",
            Self::Explorers => "Explorers",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, ProtocolError> {
        match tag {
            "ID" => Ok(Self::Id),
            "Particles" => Ok(Self::Particles),
            "Explorers" => Ok(Self::Explorers),
            other => Err(ProtocolError::UnknownTag(other.to_owned())),
        }
    }
}

/// JSON body of an `ID` message: `{"clientID": n}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdPayload {
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Body of a `Particles` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParticlePayload {
    Snapshot(Vec<ParticleSnapshot>),
    Update(ParticleSnapshot),
}

/// Body of an `Explorers` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplorerPayload {
    Snapshot(Vec<ExplorerSnapshot>),
    Update(ExplorerSnapshot),
}

/// Messages sent by the server to a client.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    /// The client's own ID. Always the first frame on a connection.
    Id(IdPayload),
    Particles(ParticlePayload),
    Explorers(ExplorerPayload),
}

impl ServerMessage {
    pub fn id(client_id: ClientId) -> Self {
        Self::Id(IdPayload { client_id })
    }

    pub fn tag(&self) -> MessageTag {
        match self {
            Self::Id(_) => MessageTag::Id,
            Self::Particles(_) => MessageTag::Particles,
            Self::Explorers(_) => MessageTag::Explorers,
        }
    }

    /// True for snapshots with no entries. Such messages are suppressed.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Particles(ParticlePayload::Snapshot(list)) => list.is_empty(),
            Self::Explorers(ExplorerPayload::Snapshot(list)) => list.is_empty(),
            _ => false,
        }
    }

    /// Serialize to JSON and gzip it. `Ok(None)` for empty snapshots.
    pub fn encode_payload(&self) -> Result<Option<Vec<u8>>, ProtocolError> {
        if self.is_empty() {
            return Ok(None);
        }
        let json = match self {
            Self::Id(body) => serde_json::to_vec(body)?,
            Self::Particles(body) => serde_json::to_vec(body)?,
            Self::Explorers(body) => serde_json::to_vec(body)?,
        };
        Ok(Some(compress(&json)?))
    }

    /// Build the complete frame bytes. `Ok(None)` for empty snapshots.
    pub fn encode_frame(&self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.encode_payload()? {
            Some(payload) => Ok(Some(encode_frame(self.tag().as_str(), &payload)?)),
            None => Ok(None),
        }
    }

    /// Decode a frame previously split by `framing::read_frame`.
    pub fn decode(tag: &str, payload: &[u8]) -> Result<Self, ProtocolError> {
        let tag = MessageTag::parse(tag)?;
        if payload.is_empty() {
            return Err(ProtocolError::EmptyPayload(tag.as_str()));
        }
        let json = decompress(payload)?;
        Ok(match tag {
            MessageTag::Id => Self::Id(serde_json::from_slice(&json)?),
            MessageTag::Particles => Self::Particles(serde_json::from_slice(&json)?),
            MessageTag::Explorers => Self::Explorers(serde_json::from_slice(&json)?),
        })
    }
}

/// Read and decode one server message from a stream.
pub fn read_server_message<R: std::io::Read>(reader: &mut R) -> Result<ServerMessage, ProtocolError> {
    let (tag, payload) = crate::framing::read_frame(reader)?;
    ServerMessage::decode(&tag, &payload)
}
