//! Vertex Record layout
//!
//! One record occupies exactly [`STRIDE`] bytes, little-endian:
//!
//! ```text
//!  0        4        8                     20       24       28
//!  +--------+--------+---------------------+--------+--------+
//!  |  id    |  meta  |  x  |  y  |  z      |  risk  | shock  |
//!  +--------+--------+---------------------+--------+--------+
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use crate::semantic::SemanticTuple;

/// Byte size of one record on the wire
pub const STRIDE: usize = 28;

/// Format name a producer may declare alongside the payload
pub const FORMAT_NAME: &str = "vertex-record";

pub const OFFSET_ID: usize = 0;
pub const OFFSET_META: usize = 4;
pub const OFFSET_POSITION: usize = 8;
pub const OFFSET_RISK: usize = 20;
pub const OFFSET_SHOCK: usize = 24;

/// One decoded point entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexRecord {
    /// Identity key (spatial/taxonomy code)
    pub id: u32,

    /// Packed semantic bitfield, see [`crate::semantic`]
    pub meta: u32,

    /// Position; non-finite components are preserved as received
    pub position: [f32; 3],

    /// Risk score
    pub risk: f32,

    /// Shock score
    pub shock: f32,
}

impl VertexRecord {
    /// Read a record from one stride-sized slot.
    ///
    /// Callers hand in slots from `chunks_exact(STRIDE)`, so the length is
    /// always exact.
    #[inline]
    pub fn from_slot(slot: &[u8]) -> Self {
        debug_assert_eq!(slot.len(), STRIDE);
        Self {
            id: le_u32(slot, OFFSET_ID),
            meta: le_u32(slot, OFFSET_META),
            position: [
                le_f32(slot, OFFSET_POSITION),
                le_f32(slot, OFFSET_POSITION + 4),
                le_f32(slot, OFFSET_POSITION + 8),
            ],
            risk: le_f32(slot, OFFSET_RISK),
            shock: le_f32(slot, OFFSET_SHOCK),
        }
    }

    /// Write this record into a stride-sized slot
    pub fn write_slot(&self, slot: &mut [u8]) {
        debug_assert_eq!(slot.len(), STRIDE);
        slot[OFFSET_ID..OFFSET_ID + 4].copy_from_slice(&self.id.to_le_bytes());
        slot[OFFSET_META..OFFSET_META + 4].copy_from_slice(&self.meta.to_le_bytes());
        for (axis, value) in self.position.iter().enumerate() {
            let start = OFFSET_POSITION + axis * 4;
            slot[start..start + 4].copy_from_slice(&value.to_le_bytes());
        }
        slot[OFFSET_RISK..OFFSET_RISK + 4].copy_from_slice(&self.risk.to_le_bytes());
        slot[OFFSET_SHOCK..OFFSET_SHOCK + 4].copy_from_slice(&self.shock.to_le_bytes());
    }

    pub fn x(&self) -> f32 {
        self.position[0]
    }

    pub fn y(&self) -> f32 {
        self.position[1]
    }

    /// Decoded semantic tuple of the packed `meta` field
    pub fn semantic(&self) -> SemanticTuple {
        SemanticTuple::decode(self.meta)
    }
}

/// Serialise records into the wire layout
pub fn encode_records(records: &[VertexRecord]) -> Vec<u8> {
    let mut buffer = vec![0u8; records.len() * STRIDE];
    for (record, slot) in records.iter().zip(buffer.chunks_exact_mut(STRIDE)) {
        record.write_slot(slot);
    }
    buffer
}

#[inline]
fn le_u32(slot: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([slot[offset], slot[offset + 1], slot[offset + 2], slot[offset + 3]])
}

#[inline]
fn le_f32(slot: &[u8], offset: usize) -> f32 {
    f32::from_bits(le_u32(slot, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets_fill_stride() {
        assert_eq!(OFFSET_SHOCK + 4, STRIDE);
        assert_eq!(OFFSET_POSITION + 12, OFFSET_RISK);
    }

    #[test]
    fn test_slot_layout_is_little_endian() {
        let record = VertexRecord {
            id: 0x0403_0201,
            meta: 0x0807_0605,
            position: [1.0, -2.0, 0.5],
            risk: 0.25,
            shock: 0.75,
        };
        let bytes = encode_records(&[record]);

        assert_eq!(bytes.len(), STRIDE);
        assert_eq!(&bytes[0..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[8..12], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[24..28], &0.75f32.to_le_bytes());
        assert_eq!(VertexRecord::from_slot(&bytes), record);
    }
}
