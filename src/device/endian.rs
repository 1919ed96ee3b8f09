// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte order and real-number layout selection.
//!
//! Vendor files disagree on both integer byte order and floating-point
//! representation. Three layouts cover the formats handled by mocodec:
//!
//! | Variant | Integers | Reals |
//! |---|---|---|
//! | [`Endian::Little`] | little endian | IEEE 754 |
//! | [`Endian::Big`] | big endian | IEEE 754 |
//! | [`Endian::Vax`] | little endian | DEC VAX F-floating |
//!
//! VAX F-floating stores the two 16-bit halves of the value swapped with
//! respect to IEEE little endian, and its exponent bias is offset by two,
//! which amounts to a factor of four. 64-bit reals have no VAX counterpart in
//! the supported formats and use IEEE little endian.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Byte order and real layout used for a typed read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    /// Little-endian integers, IEEE reals
    Little,
    /// Big-endian integers, IEEE reals
    Big,
    /// Little-endian integers, DEC VAX F-floating reals
    Vax,
}

impl Endian {
    /// Byte order of the running machine.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub(crate) fn decode_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Big => BigEndian::read_u16(buf),
            Endian::Little | Endian::Vax => LittleEndian::read_u16(buf),
        }
    }

    pub(crate) fn decode_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(buf),
            Endian::Little | Endian::Vax => LittleEndian::read_u32(buf),
        }
    }

    pub(crate) fn decode_f32(self, buf: &[u8]) -> f32 {
        match self {
            Endian::Big => BigEndian::read_f32(buf),
            Endian::Little => LittleEndian::read_f32(buf),
            Endian::Vax => vax_to_ieee([buf[0], buf[1], buf[2], buf[3]]),
        }
    }

    pub(crate) fn decode_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endian::Big => BigEndian::read_f64(buf),
            Endian::Little | Endian::Vax => LittleEndian::read_f64(buf),
        }
    }

    pub(crate) fn encode_u16(self, value: u16) -> [u8; 2] {
        let mut buf = [0u8; 2];
        match self {
            Endian::Big => BigEndian::write_u16(&mut buf, value),
            Endian::Little | Endian::Vax => LittleEndian::write_u16(&mut buf, value),
        }
        buf
    }

    pub(crate) fn encode_u32(self, value: u32) -> [u8; 4] {
        let mut buf = [0u8; 4];
        match self {
            Endian::Big => BigEndian::write_u32(&mut buf, value),
            Endian::Little | Endian::Vax => LittleEndian::write_u32(&mut buf, value),
        }
        buf
    }

    /// Stored form of `value`; `None` when a VAX real cannot hold it
    /// (infinities, NaN and magnitudes from 2^127 up).
    pub(crate) fn encode_f32(self, value: f32) -> Option<[u8; 4]> {
        let mut buf = [0u8; 4];
        match self {
            Endian::Big => BigEndian::write_f32(&mut buf, value),
            Endian::Little => LittleEndian::write_f32(&mut buf, value),
            Endian::Vax => buf = ieee_to_vax(value)?,
        }
        Some(buf)
    }

    pub(crate) fn encode_f64(self, value: f64) -> [u8; 8] {
        let mut buf = [0u8; 8];
        match self {
            Endian::Big => BigEndian::write_f64(&mut buf, value),
            Endian::Little | Endian::Vax => LittleEndian::write_f64(&mut buf, value),
        }
        buf
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endian::Little => write!(f, "little endian"),
            Endian::Big => write!(f, "big endian"),
            Endian::Vax => write!(f, "VAX"),
        }
    }
}

/// Smallest VAX F-floating magnitude, 2^-128.
const VAX_MIN: f32 = 2.938_735_9e-39;

const EXPONENT_MASK: u32 = 0x7f80_0000;

/// VAX exponents run two above IEEE ones for the same value.
const EXPONENT_SHIFT: u32 = 2 << 23;

fn vax_to_ieee(stored: [u8; 4]) -> f32 {
    let bits = LittleEndian::read_u32(&[stored[2], stored[3], stored[0], stored[1]]);
    let exponent = bits & EXPONENT_MASK;
    // A zero exponent is a true zero in VAX, whatever the mantissa.
    if exponent == 0 {
        return 0.0;
    }
    if exponent > EXPONENT_SHIFT {
        f32::from_bits(bits - EXPONENT_SHIFT)
    } else {
        // Lands below the IEEE normal range
        f32::from_bits(bits) / 4.0
    }
}

fn ieee_to_vax(value: f32) -> Option<[u8; 4]> {
    if value == 0.0 || value.abs() < VAX_MIN {
        return Some([0; 4]);
    }
    let bits = value.to_bits();
    let exponent = bits & EXPONENT_MASK;
    let vax = if exponent == 0 {
        // IEEE subnormal at or above 2^-128; scaling by four is exact
        (value * 4.0).to_bits()
    } else if exponent > EXPONENT_MASK - EXPONENT_SHIFT {
        // Infinity, NaN or beyond the largest VAX exponent
        return None;
    } else {
        bits + EXPONENT_SHIFT
    };
    let mut stored = [0u8; 4];
    LittleEndian::write_u32(&mut stored, vax);
    Some([stored[2], stored[3], stored[0], stored[1]])
}
