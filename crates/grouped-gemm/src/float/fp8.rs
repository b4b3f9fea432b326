use core::fmt::{Debug, Display};

use bytemuck::{Pod, Zeroable};

/// A 8-bit floating point type with 4 exponent bits and 3 mantissa bits.
///
/// Follows the `E4M3FN` encoding: exponent bias of 7, no infinities, a single NaN mantissa pattern
/// per sign. Conversions from `f32` round to nearest even and saturate to [`e4m3::MAX`].
///
/// [`Minifloat`]: https://en.wikipedia.org/wiki/Minifloat
#[allow(non_camel_case_types)]
#[repr(transparent)]
#[derive(Clone, Copy, Default, Zeroable, Pod, PartialEq, Eq, Hash)]
pub struct e4m3(u8);

const EXPONENT_BIAS: i32 = 7;
const MANTISSA_BITS: u32 = 3;
const MANTISSA_MASK: u8 = 0x07;
const EXPONENT_MASK: u8 = 0x0F;
const SIGN_MASK: u8 = 0x80;
const NAN_BITS: u8 = 0x7F;
const MAX_BITS: u8 = 0x7E;
/// Smallest positive normal value, `2^-6`.
const MIN_POSITIVE_NORMAL: f32 = 0.015625;

impl e4m3 {
    /// Maximum representable value
    pub const MAX: f64 = 448.0;

    /// Builds a value from its raw encoding.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw encoding of the value.
    pub const fn to_bits(self) -> u8 {
        self.0
    }

    pub fn is_nan(self) -> bool {
        self.0 & !SIGN_MASK == NAN_BITS
    }

    pub fn to_f32(self) -> f32 {
        if self.is_nan() {
            return f32::NAN;
        }

        let exponent = ((self.0 >> MANTISSA_BITS) & EXPONENT_MASK) as i32;
        let mantissa = (self.0 & MANTISSA_MASK) as f32 / 8.0;

        let magnitude = if exponent == 0 {
            mantissa * MIN_POSITIVE_NORMAL
        } else {
            (1.0 + mantissa) * 2f32.powi(exponent - EXPONENT_BIAS)
        };

        if self.0 & SIGN_MASK != 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return Self(NAN_BITS);
        }

        let sign = if value.is_sign_negative() { SIGN_MASK } else { 0 };
        let abs = value.abs();

        if abs >= Self::MAX as f32 {
            return Self(sign | MAX_BITS);
        }

        let magnitude = if abs < MIN_POSITIVE_NORMAL {
            // Subnormals are multiples of 2^-9; a result of 8 lands on the smallest normal.
            (abs * 512.0).round_ties_even() as u8
        } else {
            // `abs` is a normal f32 here, so its biased exponent is exact.
            let mut exponent = ((abs.to_bits() >> 23) & 0xFF) as i32 - 127;
            let fraction = abs / 2f32.powi(exponent) - 1.0;
            let mut mantissa = (fraction * 8.0).round_ties_even() as u8;
            if mantissa == 8 {
                mantissa = 0;
                exponent += 1;
            }
            (((exponent + EXPONENT_BIAS) as u8) << MANTISSA_BITS) | mantissa
        };

        Self(sign | magnitude)
    }
}

impl Display for e4m3 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

impl Debug for e4m3 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "e4m3({})", self.to_f32())
    }
}

impl From<e4m3> for f32 {
    fn from(value: e4m3) -> Self {
        value.to_f32()
    }
}
