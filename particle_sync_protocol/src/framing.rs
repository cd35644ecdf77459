// Typed-frame wire format over TCP.
//
// Two primitives, both big-endian:
// - A *string field*: 2-byte unsigned length, then that many UTF-8 bytes.
//   Client commands travel as bare string fields.
// - A *frame*: a string field holding the type tag, then a 4-byte unsigned
//   payload length, then the payload bytes.
//
// Every write is assembled into one buffer and handed to the writer with a
// single `write_all` + `flush`, so a caller holding the writer's lock emits
// the whole frame or nothing. The functions operate on raw bytes; payload
// serialization lives in `message.rs`.
//
// `MAX_PAYLOAD_SIZE` (16 MB) bounds the allocation a hostile length prefix
// can trigger. Full particle snapshots are the largest expected payloads.

use std::io::{self, Read, Write};

/// Maximum payload size accepted on read or write (16 MB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Maximum byte length of a string field (tag or command).
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Append a length-prefixed UTF-8 string field to `buf`.
fn put_string(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string too long: {} bytes (max {MAX_STRING_LEN})", s.len()),
        )
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Build the bytes of a complete frame without writing them anywhere. Used
/// by broadcasts, which encode once and write the same bytes to every
/// recipient.
pub fn encode_frame(tag: &str, payload: &[u8]) -> io::Result<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "payload too large: {} bytes (max {MAX_PAYLOAD_SIZE})",
                    payload.len()
                ),
            )
        })?;
    let mut buf = Vec::with_capacity(2 + tag.len() + 4 + payload.len());
    put_string(&mut buf, tag)?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Write a frame: tag string field, 4-byte payload length, payload.
pub fn write_frame<W: Write>(writer: &mut W, tag: &str, payload: &[u8]) -> io::Result<()> {
    let buf = encode_frame(tag, payload)?;
    writer.write_all(&buf)?;
    writer.flush()
}

/// Read one frame, returning `(tag, payload)`.
///
/// Returns `UnexpectedEof` if the stream closes before or during the frame,
/// and `InvalidData` if the tag is not UTF-8 or the payload length exceeds
/// `MAX_PAYLOAD_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<(String, Vec<u8>)> {
    let tag = read_string(reader)?;
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_PAYLOAD_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("payload too large: {len} bytes (max {MAX_PAYLOAD_SIZE})"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok((tag, payload))
}

/// Write a bare string field. This is how clients send commands.
pub fn write_string<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    let mut buf = Vec::with_capacity(2 + s.len());
    put_string(&mut buf, s)?;
    writer.write_all(&buf)?;
    writer.flush()
}

/// Read a bare string field.
pub fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut len_buf = [0u8; 2];
    reader.read_exact(&mut len_buf)?;
    let mut bytes = vec![0u8; usize::from(u16::from_be_bytes(len_buf))];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_layout_is_tag_then_length_then_payload() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "ID", &[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(
            buf,
            vec![0, 2, b'I', b'D', 0, 0, 0, 3, 0xAA, 0xBB, 0xCC]
        );
    }

    #[test]
    fn roundtrip_every_tag() {
        for tag in ["ID", "Particles", "Explorers"] {
            let payload: Vec<u8> = (0..=255).collect();
            let mut buf = Vec::new();
            write_frame(&mut buf, tag, &payload).unwrap();

            let (read_tag, read_payload) = read_frame(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(read_tag, tag);
            assert_eq!(read_payload, payload);
        }
    }

    #[test]
    fn frames_back_to_back() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "Particles", b"first").unwrap();
        write_frame(&mut buf, "Explorers", b"").unwrap();
        write_frame(&mut buf, "ID", b"third").unwrap();

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), (String::from("Particles"), b"first".to_vec()));
        assert_eq!(read_frame(&mut cursor).unwrap(), (String::from("Explorers"), Vec::new()));
        assert_eq!(read_frame(&mut cursor).unwrap(), (String::from("ID"), b"third".to_vec()));
    }

    #[test]
    fn command_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "ExplorerCoordinates 10.5 20.25").unwrap();
        assert_eq!(&buf[..2], &[0, 30]);

        let s = read_string(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(s, "ExplorerCoordinates 10.5 20.25");
    }

    #[test]
    fn rejects_oversized_string() {
        let long = "x".repeat(MAX_STRING_LEN + 1);
        let mut buf = Vec::new();
        let err = write_string(&mut buf, &long).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_oversized_payload_write() {
        let big = vec![0u8; MAX_PAYLOAD_SIZE as usize + 1];
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, "Particles", &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty(), "nothing may be written for a rejected frame");
    }

    #[test]
    fn rejects_oversized_payload_read() {
        let mut wire = vec![0, 2, b'I', b'D'];
        wire.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_non_utf8_string() {
        let wire = vec![0, 2, 0xFF, 0xFE];
        let err = read_string(&mut Cursor::new(wire)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_frame_is_unexpected_eof() {
        // Tag complete, payload length promises 10 bytes, only 3 present.
        let wire = vec![0, 2, b'I', b'D', 0, 0, 0, 10, 1, 2, 3];
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
