//! Semantic Bitfield Decoder
//!
//! Every vertex carries one 32-bit packed metadata word. This module owns the
//! single definition of its bit layout:
//!
//! | Bits      | Field            | Range  |
//! |-----------|------------------|--------|
//! | `[0, 8)`  | shock            | 0..=255 |
//! | `[8, 16)` | risk             | 0..=255 |
//! | `[16, 18)`| trend category   | 0..=3  |
//! | `[18, 24)`| vitality         | 0..=63 |
//! | `[24, 32)`| macro pressure   | 0..=255 |
//!
//! Scalars are normalised by dividing by the field's maximum representable
//! value. The GPU shading path generates its WGSL decode function from the same
//! [`FieldLayout`] constants, so the CPU tooltip path and the shader never read
//! different bits.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

/// Position and width of one field inside the packed word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Field name as exposed to shader code generation
    pub name: &'static str,

    /// Bit offset of the least significant bit
    pub shift: u32,

    /// Field width in bits
    pub bits: u32,
}

impl FieldLayout {
    /// Mask of the field after shifting down
    pub const fn mask(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    /// Largest raw value the field can hold
    pub const fn max_value(&self) -> u32 {
        self.mask()
    }

    /// Extract the raw field value from a packed word
    #[inline]
    pub const fn extract(&self, word: u32) -> u32 {
        (word >> self.shift) & self.mask()
    }

    /// Write `value` into the field, truncating to the field width
    #[inline]
    pub const fn insert(&self, word: u32, value: u32) -> u32 {
        let cleared = word & !(self.mask() << self.shift);
        cleared | ((value & self.mask()) << self.shift)
    }

    /// Normalise a raw value into `[0, 1]`
    #[inline]
    pub fn normalize(&self, raw: u32) -> f32 {
        raw as f32 / self.max_value() as f32
    }
}

pub const SHOCK: FieldLayout = FieldLayout { name: "shock", shift: 0, bits: 8 };
pub const RISK: FieldLayout = FieldLayout { name: "risk", shift: 8, bits: 8 };
pub const TREND: FieldLayout = FieldLayout { name: "trend", shift: 16, bits: 2 };
pub const VITAL: FieldLayout = FieldLayout { name: "vital", shift: 18, bits: 6 };
pub const MACRO: FieldLayout = FieldLayout { name: "macro", shift: 24, bits: 8 };

/// All fields in bit order
pub const SEMANTIC_FIELDS: [FieldLayout; 5] = [SHOCK, RISK, TREND, VITAL, MACRO];

/// Trend category stored in bits `[16, 18)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TrendCategory {
    Flat = 0,
    Bull = 1,
    Bear = 2,
    Reserved = 3,
}

impl TrendCategory {
    /// Map the two-bit raw value to a category
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0b11 {
            0 => Self::Flat,
            1 => Self::Bull,
            2 => Self::Bear,
            _ => Self::Reserved,
        }
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Bull => "bull",
            Self::Bear => "bear",
            Self::Reserved => "reserved",
        }
    }
}

/// Integer view of the packed word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawSemantic {
    pub shock: u8,
    pub risk: u8,
    pub trend: u8,
    pub vital: u8,
    pub macro_pressure: u8,
}

impl RawSemantic {
    /// Split a packed word into its integer fields
    pub fn unpack(word: u32) -> Self {
        Self {
            shock: SHOCK.extract(word) as u8,
            risk: RISK.extract(word) as u8,
            trend: TREND.extract(word) as u8,
            vital: VITAL.extract(word) as u8,
            macro_pressure: MACRO.extract(word) as u8,
        }
    }

    /// Pack the integer fields; out-of-range values are truncated to field width
    pub fn pack(&self) -> u32 {
        let mut word = 0;
        word = SHOCK.insert(word, self.shock as u32);
        word = RISK.insert(word, self.risk as u32);
        word = TREND.insert(word, self.trend as u32);
        word = VITAL.insert(word, self.vital as u32);
        MACRO.insert(word, self.macro_pressure as u32)
    }
}

/// Decoded semantic tuple consumed by tooltips, detail panels and picking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SemanticTuple {
    /// Shock intensity in `[0, 1]`
    pub shock: f32,

    /// Risk level in `[0, 1]`
    pub risk: f32,

    /// Trend category
    pub trend: TrendCategory,

    /// Vitality in `[0, 1]`
    pub vital: f32,

    /// Macro pressure in `[0, 1]`
    pub macro_pressure: f32,
}

impl SemanticTuple {
    /// Decode a packed metadata word
    pub fn decode(word: u32) -> Self {
        let raw = RawSemantic::unpack(word);
        Self {
            shock: SHOCK.normalize(raw.shock as u32),
            risk: RISK.normalize(raw.risk as u32),
            trend: TrendCategory::from_raw(raw.trend),
            vital: VITAL.normalize(raw.vital as u32),
            macro_pressure: MACRO.normalize(raw.macro_pressure as u32),
        }
    }

    /// Re-encode into the packed layout, rounding each scalar to the nearest step
    pub fn encode(&self) -> u32 {
        RawSemantic {
            shock: quantize(self.shock, SHOCK) as u8,
            risk: quantize(self.risk, RISK) as u8,
            trend: self.trend.as_raw(),
            vital: quantize(self.vital, VITAL) as u8,
            macro_pressure: quantize(self.macro_pressure, MACRO) as u8,
        }
        .pack()
    }
}

fn quantize(value: f32, field: FieldLayout) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let max = field.max_value() as f32;
    (value.clamp(0.0, 1.0) * max).round() as u32
}

/// Decoder handle shared by the ingest projection and the interaction layer
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticDecoder;

impl SemanticDecoder {
    pub fn decode(&self, word: u32) -> SemanticTuple {
        SemanticTuple::decode(word)
    }

    pub fn layout(&self) -> &'static [FieldLayout; 5] {
        &SEMANTIC_FIELDS
    }
}
