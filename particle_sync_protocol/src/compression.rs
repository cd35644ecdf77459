// Gzip wrapping for frame payloads.
//
// Every server-to-client payload is a JSON document compressed into a gzip
// container (RFC 1952), which any zlib-based client can inflate with
// `inflateInit2(.., 16 + MAX_WBITS)`.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Compress `data` into a gzip stream.
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate a gzip stream produced by `compress` (or any gzip encoder).
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_json_document() {
        let doc = br#"[{"x_coord":1.0,"y_coord":2.0,"velocity":3.0,"angle":90.0}]"#;
        let packed = compress(doc).unwrap();
        assert_eq!(decompress(&packed).unwrap(), doc.to_vec());
    }

    #[test]
    fn output_has_gzip_magic() {
        let packed = compress(b"{}").unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn repetitive_snapshots_shrink() {
        let doc = r#"{"x_coord":640.0,"y_coord":360.0,"velocity":5.0,"angle":30.0},"#.repeat(200);
        let packed = compress(doc.as_bytes()).unwrap();
        assert!(packed.len() < doc.len() / 4);
    }

    #[test]
    fn garbage_fails_to_decompress() {
        assert!(decompress(b"definitely not gzip").is_err());
    }
}
