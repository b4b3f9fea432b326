use crate::{
    components::{GemmElement, GemmIdent, KernelConfig, KernelFault},
    scheduler::ResolvedTile,
};

use super::{GlobalOutput, TensorMapDescriptor, TensorMapSlot};

/// Writes the `block_m x block_n` output block of a tile at its group's row offset.
///
/// Only elements inside the group's rows and the first `N` columns are written.
pub(crate) trait GlobalWriter<'a, E: GemmElement>: Sized + Send {
    fn init(
        worker: u32,
        out: &'a GlobalOutput<'a, E>,
        map: Option<TensorMapSlot<'a>>,
        config: KernelConfig,
    ) -> Result<Self, KernelFault>;

    /// Called before the first tile of every group the worker enters.
    fn begin_group(&mut self, tile: &ResolvedTile) -> Result<(), KernelFault>;

    fn store(&mut self, tile: &ResolvedTile, values: &[E]) -> Result<(), KernelFault>;
}

/// Stores row by row, masked by row and column.
pub(crate) struct ManualWriter<'a, E> {
    out: &'a GlobalOutput<'a, E>,
    config: KernelConfig,
}

impl<'a, E: GemmElement> GlobalWriter<'a, E> for ManualWriter<'a, E> {
    fn init(
        _worker: u32,
        out: &'a GlobalOutput<'a, E>,
        _map: Option<TensorMapSlot<'a>>,
        config: KernelConfig,
    ) -> Result<Self, KernelFault> {
        Ok(Self { out, config })
    }

    fn begin_group(&mut self, _tile: &ResolvedTile) -> Result<(), KernelFault> {
        Ok(())
    }

    fn store(&mut self, tile: &ResolvedTile, values: &[E]) -> Result<(), KernelFault> {
        let n = self.config.n;
        let block_m = self.config.tiling_scheme.block_m as usize;
        let block_n = self.config.tiling_scheme.block_n as usize;

        let first_row = tile.row_tile as usize * block_m;
        let first_col = tile.col_tile as usize * block_n;
        let valid_cols = n.saturating_sub(first_col).min(block_n);

        for (i, row) in values.chunks_exact(block_n).enumerate() {
            let offs_m = first_row + i;
            if offs_m >= tile.m_size {
                break;
            }

            let start = (tile.row_offset + offs_m) * self.out.row_stride() + first_col;
            // SAFETY: the tile is owned by this worker only.
            unsafe {
                self.out.write_row(start, &row[..valid_cols])?;
            }
        }

        Ok(())
    }
}

/// Stores boxes through a per group tensor map.
pub(crate) struct TmaWriter<'a, E> {
    out: &'a GlobalOutput<'a, E>,
    map: TensorMapSlot<'a>,
    config: KernelConfig,
}

impl<'a, E: GemmElement> GlobalWriter<'a, E> for TmaWriter<'a, E> {
    fn init(
        worker: u32,
        out: &'a GlobalOutput<'a, E>,
        map: Option<TensorMapSlot<'a>>,
        config: KernelConfig,
    ) -> Result<Self, KernelFault> {
        let map = map.ok_or(KernelFault::InvalidDescriptor {
            worker,
            ident: GemmIdent::Out,
        })?;

        Ok(Self { out, map, config })
    }

    fn begin_group(&mut self, tile: &ResolvedTile) -> Result<(), KernelFault> {
        let n = self.config.n;

        self.map.configure(&TensorMapDescriptor::new_2d::<E>(
            GemmIdent::Out,
            (tile.row_offset * n) as u64,
            [tile.m_size as u32, n as u32],
            n as u32,
            self.config.tiling_scheme.block_shape(GemmIdent::Out),
        ));
        self.map.fence_proxy_acquire();

        Ok(())
    }

    fn store(&mut self, tile: &ResolvedTile, values: &[E]) -> Result<(), KernelFault> {
        let tiling = &self.config.tiling_scheme;
        let coords = [
            tile.row_tile * tiling.block_m,
            tile.col_tile * tiling.block_n,
        ];

        self.map.store_box(self.out, coords, values)
    }
}
