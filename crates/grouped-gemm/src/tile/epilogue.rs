use crate::{
    components::{KernelConfig, KernelFault},
    global::GlobalView,
    scheduler::ResolvedTile,
};

use super::Accumulator;

/// Transformation applied to the accumulator once the reduction over `K` is done.
pub trait Epilogue: Sync {
    fn apply(&self, tile: &ResolvedTile, acc: &mut Accumulator) -> Result<(), KernelFault>;
}

/// Leaves the accumulator untouched.
pub struct PlainEpilogue;

impl Epilogue for PlainEpilogue {
    fn apply(&self, _tile: &ResolvedTile, _acc: &mut Accumulator) -> Result<(), KernelFault> {
        Ok(())
    }
}

/// Rescales the accumulator by one scale per input row and one per weight row.
///
/// Scales of rows outside the group and of columns past `N` are zero.
pub struct RowwiseScaleEpilogue<'a> {
    lhs_scale: GlobalView<'a, f32>,
    rhs_scale: GlobalView<'a, f32>,
    config: KernelConfig,
}

impl<'a> RowwiseScaleEpilogue<'a> {
    pub fn new(
        lhs_scale: GlobalView<'a, f32>,
        rhs_scale: GlobalView<'a, f32>,
        config: KernelConfig,
    ) -> Self {
        Self {
            lhs_scale,
            rhs_scale,
            config,
        }
    }
}

impl Epilogue for RowwiseScaleEpilogue<'_> {
    fn apply(&self, tile: &ResolvedTile, acc: &mut Accumulator) -> Result<(), KernelFault> {
        let n = self.config.n;
        let first_row = tile.row_tile as usize * self.config.tiling_scheme.block_m as usize;
        let first_col = tile.col_tile as usize * self.config.tiling_scheme.block_n as usize;

        let (row_scale, col_scale) = acc.scales_mut();

        for (i, scale) in row_scale.iter_mut().enumerate() {
            let offs_m = first_row + i;
            *scale = match offs_m < tile.m_size {
                true => self.lhs_scale.read(tile.row_offset + offs_m)?,
                false => 0.0,
            };
        }

        for (j, scale) in col_scale.iter_mut().enumerate() {
            let offs_n = first_col + j;
            *scale = match offs_n < n {
                true => self.rhs_scale.read(tile.group * n + offs_n)?,
                false => 0.0,
            };
        }

        acc.apply_scales();

        Ok(())
    }
}
