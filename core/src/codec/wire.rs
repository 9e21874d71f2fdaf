//! Wire decoding with fail-fast contract checks
//!
//! Validation order is fixed: declared header, then (optionally) gzip/zlib
//! inflation, then the stride invariant. Nothing is parsed from a buffer whose
//! length is not a multiple of [`STRIDE`].
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::{VertexRecord, FORMAT_NAME, STRIDE};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Buffer length {len} is not a multiple of the {stride}-byte record stride")]
    MisalignedLength { len: usize, stride: usize },

    #[error("Declared stride {declared} does not match the {expected}-byte record contract")]
    StrideMismatch { declared: u32, expected: usize },

    #[error("Declared format '{declared}' does not match '{expected}'")]
    FormatMismatch { declared: String, expected: &'static str },

    #[error("Payload could not be decoded: {reason}")]
    DecodeFailure { reason: String },
}

impl CodecError {
    /// Whether this error is a breach of the byte contract rather than corruption
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::DecodeFailure { .. })
    }
}

/// What to do when a payload that looks compressed does not inflate cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionFallback {
    /// Validate the raw bytes against the stride contract before failing
    RawFallback,
    /// Fail the attempt as soon as inflation fails
    Strict,
}

/// Codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Policy for failed decompression
    pub fallback: CompressionFallback,

    /// Upper bound on inflated size (bytes)
    pub max_decompressed_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            fallback: CompressionFallback::RawFallback,
            max_decompressed_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Transport-declared content encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// Parse an HTTP `Content-Encoding` value
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            _ => Self::Identity,
        }
    }
}

/// Stride/format metadata a producer may declare with the payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatHeader {
    pub stride: Option<u32>,
    pub format: Option<String>,
}

impl FormatHeader {
    /// Reject any declared stride or format that differs from the record contract
    pub fn validate(&self) -> Result<(), CodecError> {
        if let Some(declared) = self.stride {
            if declared as usize != STRIDE {
                return Err(CodecError::StrideMismatch { declared, expected: STRIDE });
            }
        }
        if let Some(format) = &self.format {
            if format != FORMAT_NAME {
                return Err(CodecError::FormatMismatch {
                    declared: format.clone(),
                    expected: FORMAT_NAME,
                });
            }
        }
        Ok(())
    }
}

/// One response body plus its transport metadata
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub body: Vec<u8>,
    pub header: FormatHeader,
    pub encoding: ContentEncoding,
}

impl Payload {
    pub fn raw(body: Vec<u8>) -> Self {
        Self { body, ..Default::default() }
    }

    pub fn with_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_header(mut self, header: FormatHeader) -> Self {
        self.header = header;
        self
    }

    /// Declared compressed, or carrying the gzip magic
    pub fn may_be_compressed(&self) -> bool {
        self.encoding != ContentEncoding::Identity || self.body.starts_with(&GZIP_MAGIC)
    }
}

/// Which path produced the records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    Raw,
    Decompressed,
    RawFallback,
}

#[derive(Debug, Clone)]
pub struct DecodedPayload {
    pub records: Vec<VertexRecord>,
    pub path: DecodePath,
}

/// Wire codec
#[derive(Debug, Clone, Default)]
pub struct WireCodec {
    config: CodecConfig,
}

impl WireCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decode a payload, applying header checks and the compression policy
    pub fn decode(&self, payload: &Payload) -> Result<DecodedPayload, CodecError> {
        payload.header.validate()?;

        if !payload.may_be_compressed() {
            let records = decode_records(&payload.body)?;
            return Ok(DecodedPayload { records, path: DecodePath::Raw });
        }

        let reason = match self.inflate(payload) {
            Ok(inflated) if inflated.len() % STRIDE == 0 => {
                debug!("Inflated {} -> {} bytes", payload.body.len(), inflated.len());
                let records = decode_records(&inflated)?;
                return Ok(DecodedPayload { records, path: DecodePath::Decompressed });
            }
            Ok(inflated) => format!(
                "inflated length {} is not a multiple of {}",
                inflated.len(),
                STRIDE
            ),
            Err(reason) => reason,
        };

        match self.config.fallback {
            CompressionFallback::Strict => {
                warn!("Compressed payload rejected ({}); strict policy, no raw fallback", reason);
                Err(CodecError::DecodeFailure { reason })
            }
            CompressionFallback::RawFallback => {
                warn!(
                    "Compressed payload rejected ({}); validating {} raw bytes instead",
                    reason,
                    payload.body.len()
                );
                if payload.body.len() % STRIDE != 0 {
                    return Err(CodecError::DecodeFailure {
                        reason: format!(
                            "{}; raw length {} is not a multiple of {} either",
                            reason,
                            payload.body.len(),
                            STRIDE
                        ),
                    });
                }
                let records = decode_records(&payload.body)?;
                Ok(DecodedPayload { records, path: DecodePath::RawFallback })
            }
        }
    }

    fn inflate(&self, payload: &Payload) -> Result<Vec<u8>, String> {
        let cap = self.config.max_decompressed_bytes as u64;
        let mut inflated = Vec::new();

        let read = match payload.encoding {
            ContentEncoding::Deflate => ZlibDecoder::new(payload.body.as_slice())
                .take(cap + 1)
                .read_to_end(&mut inflated),
            ContentEncoding::Gzip | ContentEncoding::Identity => GzDecoder::new(payload.body.as_slice())
                .take(cap + 1)
                .read_to_end(&mut inflated),
        };

        read.map_err(|e| format!("inflate failed: {}", e))?;
        if inflated.len() as u64 > cap {
            return Err(format!("inflated size exceeds cap of {} bytes", cap));
        }
        Ok(inflated)
    }
}

/// Decode an uncompressed record buffer.
///
/// The stride check happens before any field is read.
pub fn decode_records(buffer: &[u8]) -> Result<Vec<VertexRecord>, CodecError> {
    if buffer.len() % STRIDE != 0 {
        return Err(CodecError::MisalignedLength { len: buffer.len(), stride: STRIDE });
    }
    Ok(buffer.chunks_exact(STRIDE).map(VertexRecord::from_slot).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::record::encode_records;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::io::Write;

    fn record(id: u32, x: f32) -> VertexRecord {
        VertexRecord { id, meta: id * 7, position: [x, x * 0.5, 1.0], risk: 0.1, shock: 0.9 }
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_yields_len_over_stride_records() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let count = rng.gen_range(1..200);
            let records: Vec<_> = (0..count)
                .map(|i| VertexRecord {
                    id: rng.gen(),
                    meta: rng.gen(),
                    position: [rng.gen_range(-1e6..1e6), rng.gen_range(-1e6..1e6), rng.gen()],
                    risk: rng.gen(),
                    shock: i as f32,
                })
                .collect();
            let bytes = encode_records(&records);

            let decoded = decode_records(&bytes).unwrap();
            assert_eq!(decoded.len(), bytes.len() / STRIDE);
            assert_eq!(decoded, records);
        }
    }

    #[test]
    fn test_misaligned_lengths_are_contract_violations() {
        for len in [1usize, 27, 29, 55, 57, 83] {
            let err = decode_records(&vec![0u8; len]).unwrap_err();
            assert_eq!(err, CodecError::MisalignedLength { len, stride: STRIDE });
            assert!(err.is_contract_violation());
        }
    }

    #[test]
    fn test_empty_buffer_decodes_to_no_records() {
        assert!(decode_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_declared_stride_mismatch_fails_before_parse() {
        let codec = WireCodec::default();
        let payload = Payload::raw(encode_records(&[record(1, 0.0)]))
            .with_header(FormatHeader { stride: Some(32), format: None });

        let err = codec.decode(&payload).unwrap_err();
        assert!(matches!(err, CodecError::StrideMismatch { declared: 32, .. }));
    }

    #[test]
    fn test_declared_format_mismatch_fails() {
        let codec = WireCodec::default();
        let payload = Payload::raw(encode_records(&[record(1, 0.0)])).with_header(FormatHeader {
            stride: Some(28),
            format: Some("edge-record".into()),
        });

        assert!(matches!(codec.decode(&payload), Err(CodecError::FormatMismatch { .. })));
    }

    #[test]
    fn test_matching_header_is_accepted() {
        let codec = WireCodec::default();
        let payload = Payload::raw(encode_records(&[record(1, 0.0), record(2, 1.0)])).with_header(FormatHeader {
            stride: Some(28),
            format: Some(FORMAT_NAME.into()),
        });

        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.path, DecodePath::Raw);
    }

    #[test]
    fn test_gzip_payload_is_inflated() {
        let records = vec![record(1, 0.0), record(2, 5.0), record(3, 10.0)];
        let codec = WireCodec::default();
        let payload = Payload::raw(gzip(&encode_records(&records))).with_encoding(ContentEncoding::Gzip);

        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(decoded.path, DecodePath::Decompressed);
        assert_eq!(decoded.records, records);
    }

    #[test]
    fn test_gzip_magic_is_detected_without_declared_encoding() {
        let records = vec![record(9, 2.0)];
        let decoded = WireCodec::default()
            .decode(&Payload::raw(gzip(&encode_records(&records))))
            .unwrap();
        assert_eq!(decoded.path, DecodePath::Decompressed);
        assert_eq!(decoded.records, records);
    }

    #[test]
    fn test_deflate_payload_is_inflated() {
        let records = vec![record(4, 1.0), record(5, 2.0)];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&encode_records(&records)).unwrap();
        let payload = Payload::raw(encoder.finish().unwrap()).with_encoding(ContentEncoding::Deflate);

        let decoded = WireCodec::default().decode(&payload).unwrap();
        assert_eq!(decoded.records, records);
    }

    #[test]
    fn test_claimed_gzip_with_valid_raw_body_falls_back() {
        let records = vec![record(1, 0.0), record(2, 1.0)];
        let payload = Payload::raw(encode_records(&records)).with_encoding(ContentEncoding::Gzip);

        let decoded = WireCodec::default().decode(&payload).unwrap();
        assert_eq!(decoded.path, DecodePath::RawFallback);
        assert_eq!(decoded.records, records);
    }

    #[test]
    fn test_strict_policy_refuses_raw_fallback() {
        let codec = WireCodec::new(CodecConfig {
            fallback: CompressionFallback::Strict,
            ..CodecConfig::default()
        });
        let payload = Payload::raw(encode_records(&[record(1, 0.0)])).with_encoding(ContentEncoding::Gzip);

        assert!(matches!(codec.decode(&payload), Err(CodecError::DecodeFailure { .. })));
    }

    #[test]
    fn test_corrupt_gzip_with_misaligned_raw_is_decode_failure() {
        // Valid gzip header followed by a deflate block with a reserved type
        let mut body = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 255];
        body.extend_from_slice(&[0xFF; 20]);
        assert_ne!(body.len() % STRIDE, 0);

        let err = WireCodec::default().decode(&Payload::raw(body)).unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailure { .. }));
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_inflated_misaligned_buffer_is_rejected() {
        let codec = WireCodec::new(CodecConfig {
            fallback: CompressionFallback::Strict,
            ..CodecConfig::default()
        });
        let payload = Payload::raw(gzip(&[0u8; 30]));

        match codec.decode(&payload) {
            Err(CodecError::DecodeFailure { reason }) => assert!(reason.contains("inflated length 30")),
            other => panic!("expected decode failure, got {:?}", other),
        }
    }

    #[test]
    fn test_decompression_cap_is_enforced() {
        let codec = WireCodec::new(CodecConfig {
            fallback: CompressionFallback::Strict,
            max_decompressed_bytes: STRIDE * 2,
        });
        let body = gzip(&encode_records(&[record(1, 0.0), record(2, 0.0), record(3, 0.0)]));

        let err = codec.decode(&Payload::raw(body)).unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailure { .. }));
    }

    #[test]
    fn test_non_finite_positions_are_kept() {
        let records = vec![
            VertexRecord { id: 1, meta: 0, position: [f32::NAN, 1.0, 0.0], risk: 0.0, shock: 0.0 },
            VertexRecord { id: 2, meta: 0, position: [1.0, f32::INFINITY, 0.0], risk: 0.0, shock: 0.0 },
        ];
        let decoded = decode_records(&encode_records(&records)).unwrap();

        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].x().is_nan());
        assert!(decoded[1].y().is_infinite());
    }

    #[test]
    fn test_content_encoding_header_parsing() {
        assert_eq!(ContentEncoding::from_header("gzip"), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header(" GZIP "), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header("deflate"), ContentEncoding::Deflate);
        assert_eq!(ContentEncoding::from_header("br"), ContentEncoding::Identity);
    }
}
