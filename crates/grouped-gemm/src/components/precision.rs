use core::fmt::Debug;

use bytemuck::Pod;
use half::{bf16, f16};

use crate::float::e4m3;

/// Storage element of a global buffer.
///
/// Every element is widened to `f32` before accumulation and narrowed back on store.
pub trait GemmElement: Pod + Default + Debug + PartialEq + Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;

    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl GemmElement for f32 {
    const NAME: &'static str = "f32";

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

impl GemmElement for f16 {
    const NAME: &'static str = "f16";

    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

impl GemmElement for bf16 {
    const NAME: &'static str = "bf16";

    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        bf16::from_f32(value)
    }
}

impl GemmElement for e4m3 {
    const NAME: &'static str = "e4m3";

    fn to_f32(self) -> f32 {
        e4m3::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        e4m3::from_f32(value)
    }
}

/// Storage types of a grouped GEMM. Accumulation is always done in `f32`.
pub trait GemmPrecision: Send + Sync + 'static {
    /// Element type of the input and the weights.
    type EI: GemmElement;
    /// Element type of the output.
    type EO: GemmElement;
}

/// `f32` in, `f32` out.
pub struct F32Precision;

/// `f16` in, `f16` out.
pub struct F16Precision;

/// `bf16` in, `bf16` out.
pub struct Bf16Precision;

/// `e4m3` in, `bf16` out. Used with row-wise scales.
pub struct Fp8Rowwise;

impl GemmPrecision for F32Precision {
    type EI = f32;
    type EO = f32;
}

impl GemmPrecision for F16Precision {
    type EI = f16;
    type EO = f16;
}

impl GemmPrecision for Bf16Precision {
    type EI = bf16;
    type EO = bf16;
}

impl GemmPrecision for Fp8Rowwise {
    type EI = e4m3;
    type EO = bf16;
}
