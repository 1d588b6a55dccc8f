//! Framed package protocol carried over streams: a `Package` pairs a
//! protocol tag with a payload and an optional gzip compression flag,
//! serialized with a fixed binary framing.
//!
//! Grounded in `original_source/core/protocol/datapackage.go`'s
//! `Package.ToBytes`/`FromBytes` (compress-then-marshal on encode,
//! unmarshal-then-decompress on decode); wire format uses `bincode`, the
//! production variant's choice for `NetworkMessage` framing.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed package: {0}")]
    Malformed(String),
    #[error("gzip compression failed: {0}")]
    CompressionFailed(String),
    #[error("gzip decompression failed: {0}")]
    DecompressionFailed(String),
}

/// Wire payload carried over a stream: a protocol tag plus an application
/// payload, with an optional gzip compression flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub protocol_tag: String,
    pub payload: Vec<u8>,
    pub compressed: bool,
}

impl Package {
    pub fn new(protocol_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            protocol_tag: protocol_tag.into(),
            payload,
            compressed: false,
        }
    }
}

/// Serialize `pkg`, gzip-compressing the payload first when
/// `compress_enabled` is set. Mirrors the original's compress-then-marshal
/// ordering: the `compressed` flag on the wire always reflects what was
/// actually done to the bytes that follow it.
pub fn encode(pkg: &Package, compress_enabled: bool) -> Result<Vec<u8>, CodecError> {
    let mut wire = pkg.clone();
    wire.compressed = compress_enabled;
    if compress_enabled {
        wire.payload = gzip_compress(&pkg.payload)?;
    }
    bincode::serialize(&wire).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Deserialize `bytes` into a `Package`, decompressing the payload in place
/// when the wire-level `compressed` flag is set.
pub fn decode(bytes: &[u8]) -> Result<Package, CodecError> {
    let mut pkg: Package =
        bincode::deserialize(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if pkg.compressed {
        pkg.payload = gzip_decompress(&pkg.payload)?;
        pkg.compressed = false;
    }
    Ok(pkg)
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))
}

fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_without_compression() {
        let pkg = Package::new("proto/1", b"hello world".to_vec());
        let bytes = encode(&pkg, false).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, pkg);
    }

    #[test]
    fn round_trips_with_compression() {
        let pkg = Package::new("proto/1", b"hello world, compressed this time".to_vec());
        let bytes = encode(&pkg, true).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.protocol_tag, pkg.protocol_tag);
        assert_eq!(decoded.payload, pkg.payload);
        assert!(!decoded.compressed);
    }

    #[test]
    fn round_trips_empty_payload() {
        let pkg = Package::new("proto/empty", Vec::new());
        let bytes = encode(&pkg, true).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.payload, Vec::<u8>::new());
    }

    #[test]
    fn decode_rejects_malformed_bytes() {
        let err = decode(&[0xff, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn compressed_wire_bytes_flag_is_set_before_transmission() {
        let pkg = Package::new("proto/1", b"payload".to_vec());
        let bytes = encode(&pkg, true).unwrap();
        // The flag on the wire reflects compression was applied, even though
        // `decode` clears it back to false once it has done its job.
        let raw: Package = bincode::deserialize(&bytes).unwrap();
        assert!(raw.compressed);
    }
}
