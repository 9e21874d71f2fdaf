//! Binary Vertex Record codec
//!
//! The 28-byte record layout is the one bit-exact compatibility surface of the
//! engine. Producers that deviate from it are rejected before any field is read.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod record;
pub mod wire;

pub use record::{encode_records, VertexRecord, FORMAT_NAME, STRIDE};
pub use wire::{
    decode_records, CodecConfig, CodecError, CompressionFallback, ContentEncoding, DecodePath,
    DecodedPayload, FormatHeader, Payload, WireCodec,
};
