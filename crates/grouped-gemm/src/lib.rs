//! Grouped GEMM on a many-worker device.
//!
//! A grouped GEMM multiplies `G` row slices of an input matrix `[M, K]` by `G` weight slices of a
//! weight matrix `[G * N, K]`, writing every result into a single output `[M, N]`. The number of
//! rows owned by each group is only known when the group-size array is read, so the kernel maps a
//! flat, worker-strided tile index onto the ragged `(group, tile)` space at execution time.
//!
//! The entry points are [`grouped_gemm`], [`grouped_gemm_fp8_rowwise`] and [`launch_ref`].

/// Components shared by every kernel: problem definition, tiling, precision and errors.
pub mod components;
/// Global configuration loaded from `grouped-gemm.toml` and the environment.
pub mod config;
/// Reduced precision float types.
pub mod float;
/// Global memory access: views, bulk transfer descriptors, readers and writers.
pub mod global;
/// Worker program and launcher.
pub mod kernels;
/// Row-wise quantization helpers.
pub mod quantization;
/// Straightforward grouped GEMM used to validate kernel outputs.
pub mod reference;
/// Group/tile resolution and worker traversals.
pub mod scheduler;
/// Per-tile compute: accumulator, stage memory and epilogues.
pub mod tile;

mod base;
mod tensor;

pub use base::*;
pub use tensor::*;
