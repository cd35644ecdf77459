// particle_sync_protocol: wire protocol between the particle sync server
// and its viewers.
//
// Shared by the server (`particle_sync_server`) and by any Rust client. It
// has no knowledge of sockets, threads, or the simulation; everything works
// over `std::io::Read`/`Write`.
//
// Module overview:
// - `types.rs`:       `ClientId`, `ParticleSnapshot`, `ExplorerSnapshot`.
// - `framing.rs`:     Big-endian framing: u16-prefixed string fields and
//                     tag + u32 length + payload frames.
// - `compression.rs`: gzip wrapping of JSON payloads (flate2).
// - `message.rs`:     `ServerMessage`, a tagged variant over ID / Particles /
//                     Explorers, with snapshot and single-update shapes.
// - `command.rs`:     `ClientCommand`, the space-separated text commands
//                     clients send.
// - `error.rs`:       `ProtocolError` and `CommandError`.
//
// Design decisions:
// - **Asymmetric directions.** Server frames carry a compressed JSON payload;
//   client commands are bare strings. Commands are tiny and the format is
//   what existing clients already speak.
// - **Suppress, don't send empty.** An empty snapshot encodes to `None`, so
//   no client ever sees a zero-length payload.

pub mod command;
pub mod compression;
pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use command::ClientCommand;
pub use error::{CommandError, ProtocolError};
pub use framing::{MAX_PAYLOAD_SIZE, read_frame, read_string, write_frame, write_string};
pub use message::{ExplorerPayload, IdPayload, MessageTag, ParticlePayload, ServerMessage, read_server_message};
pub use types::{ClientId, ExplorerSnapshot, ParticleSnapshot};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// The exact bytes a client sees for the documented example exchange.
    #[test]
    fn explorer_broadcast_wire_bytes() {
        let msg = ServerMessage::Explorers(ExplorerPayload::Snapshot(vec![ExplorerSnapshot {
            client_id: ClientId(1),
            x: 10.5,
            y: 20.25,
        }]));
        let frame = msg.encode_frame().unwrap().unwrap();

        // Tag header.
        assert_eq!(&frame[..11], b"\x00\x09Explorers");
        let len = u32::from_be_bytes(frame[11..15].try_into().unwrap()) as usize;
        assert_eq!(frame.len(), 15 + len);

        let json = compression::decompress(&frame[15..]).unwrap();
        assert_eq!(
            std::str::from_utf8(&json).unwrap(),
            r#"[{"client_id":1,"x_coord":10.5,"y_coord":20.25}]"#
        );
    }

    #[test]
    fn command_travels_as_string_field() {
        let mut wire = Vec::new();
        let cmd = ClientCommand::ExplorerCoordinates { x: 3.0, y: 4.0 };
        write_string(&mut wire, &cmd.to_string()).unwrap();

        let line = read_string(&mut Cursor::new(&wire)).unwrap();
        assert_eq!(ClientCommand::parse(&line), Ok(cmd));
    }

    #[test]
    fn id_frame_is_first_class() {
        let frame = ServerMessage::id(ClientId(42)).encode_frame().unwrap().unwrap();
        let msg = read_server_message(&mut Cursor::new(frame)).unwrap();
        assert_eq!(msg, ServerMessage::id(ClientId(42)));
        assert_eq!(msg.tag(), MessageTag::Id);
    }
}
