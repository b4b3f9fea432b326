use crate::{
    components::{GemmElement, GemmIdent, KernelConfig, KernelFault},
    scheduler::ResolvedTile,
};

use super::{GlobalView, TensorMapDescriptor, TensorMapSlot};

/// Brings input and weight blocks of a tile into a worker's stage.
///
/// Blocks are row-major, `block_m x block_k` for the input and `block_n x block_k` for the
/// weights. Rows outside the group or past `N` are zero.
pub trait GlobalReader<'a, E: GemmElement>: Sized + Send {
    fn init(
        worker: u32,
        lhs: GlobalView<'a, E>,
        rhs: GlobalView<'a, E>,
        maps: Option<(TensorMapSlot<'a>, TensorMapSlot<'a>)>,
        config: KernelConfig,
    ) -> Result<Self, KernelFault>;

    /// Called before the first tile of every group the worker enters.
    fn begin_group(&mut self, tile: &ResolvedTile) -> Result<(), KernelFault>;

    fn load_lhs(
        &mut self,
        tile: &ResolvedTile,
        k_offset: usize,
        stage: &mut [E],
    ) -> Result<(), KernelFault>;

    fn load_rhs(
        &mut self,
        tile: &ResolvedTile,
        k_offset: usize,
        stage: &mut [E],
    ) -> Result<(), KernelFault>;
}

/// Loads rows one by one with explicit masks.
pub struct ManualReader<'a, E> {
    lhs: GlobalView<'a, E>,
    rhs: GlobalView<'a, E>,
    config: KernelConfig,
}

impl<'a, E: GemmElement> GlobalReader<'a, E> for ManualReader<'a, E> {
    fn init(
        _worker: u32,
        lhs: GlobalView<'a, E>,
        rhs: GlobalView<'a, E>,
        _maps: Option<(TensorMapSlot<'a>, TensorMapSlot<'a>)>,
        config: KernelConfig,
    ) -> Result<Self, KernelFault> {
        Ok(Self { lhs, rhs, config })
    }

    fn begin_group(&mut self, _tile: &ResolvedTile) -> Result<(), KernelFault> {
        Ok(())
    }

    fn load_lhs(
        &mut self,
        tile: &ResolvedTile,
        k_offset: usize,
        stage: &mut [E],
    ) -> Result<(), KernelFault> {
        let block_m = self.config.tiling_scheme.block_m as usize;
        let first_row = tile.row_tile as usize * block_m;

        load_masked_rows(
            &self.lhs,
            stage,
            self.config.tiling_scheme.block_k as usize,
            |i| {
                let offs_m = first_row + i;
                (offs_m < tile.m_size).then_some(tile.row_offset + offs_m)
            },
            k_offset,
        )
    }

    fn load_rhs(
        &mut self,
        tile: &ResolvedTile,
        k_offset: usize,
        stage: &mut [E],
    ) -> Result<(), KernelFault> {
        let n = self.config.n;
        let block_n = self.config.tiling_scheme.block_n as usize;
        let first_col = tile.col_tile as usize * block_n;

        load_masked_rows(
            &self.rhs,
            stage,
            self.config.tiling_scheme.block_k as usize,
            |j| {
                let offs_n = first_col + j;
                (offs_n < n).then_some(tile.group * n + offs_n)
            },
            k_offset,
        )
    }
}

/// Fills every row of `stage` from the global row given by `global_row`, or with zeros
/// when it is masked out.
fn load_masked_rows<E: GemmElement>(
    view: &GlobalView<'_, E>,
    stage: &mut [E],
    block_k: usize,
    global_row: impl Fn(usize) -> Option<usize>,
    k_offset: usize,
) -> Result<(), KernelFault> {
    for (i, row) in stage.chunks_exact_mut(block_k).enumerate() {
        match global_row(i) {
            Some(global_row) => {
                view.read_into(global_row * view.row_stride() + k_offset, row)?
            }
            None => row.fill(E::default()),
        }
    }

    Ok(())
}

/// Loads boxes through per group tensor maps.
pub struct TmaReader<'a, E> {
    lhs: GlobalView<'a, E>,
    rhs: GlobalView<'a, E>,
    lhs_map: TensorMapSlot<'a>,
    rhs_map: TensorMapSlot<'a>,
    config: KernelConfig,
}

impl<'a, E: GemmElement> GlobalReader<'a, E> for TmaReader<'a, E> {
    fn init(
        worker: u32,
        lhs: GlobalView<'a, E>,
        rhs: GlobalView<'a, E>,
        maps: Option<(TensorMapSlot<'a>, TensorMapSlot<'a>)>,
        config: KernelConfig,
    ) -> Result<Self, KernelFault> {
        let (lhs_map, rhs_map) = maps.ok_or(KernelFault::InvalidDescriptor {
            worker,
            ident: GemmIdent::Lhs,
        })?;

        Ok(Self {
            lhs,
            rhs,
            lhs_map,
            rhs_map,
            config,
        })
    }

    fn begin_group(&mut self, tile: &ResolvedTile) -> Result<(), KernelFault> {
        let KernelConfig {
            n,
            k,
            tiling_scheme,
        } = self.config;

        self.lhs_map.configure(&TensorMapDescriptor::new_2d::<E>(
            GemmIdent::Lhs,
            (tile.row_offset * k) as u64,
            [tile.m_size as u32, k as u32],
            k as u32,
            tiling_scheme.block_shape(GemmIdent::Lhs),
        ));
        self.rhs_map.configure(&TensorMapDescriptor::new_2d::<E>(
            GemmIdent::Rhs,
            (tile.group * n * k) as u64,
            [n as u32, k as u32],
            k as u32,
            tiling_scheme.block_shape(GemmIdent::Rhs),
        ));

        self.lhs_map.fence_proxy_acquire();
        self.rhs_map.fence_proxy_acquire();

        Ok(())
    }

    fn load_lhs(
        &mut self,
        tile: &ResolvedTile,
        k_offset: usize,
        stage: &mut [E],
    ) -> Result<(), KernelFault> {
        let row = tile.row_tile * self.config.tiling_scheme.block_m;
        self.lhs_map.load_box(&self.lhs, [row, k_offset as u32], stage)
    }

    fn load_rhs(
        &mut self,
        tile: &ResolvedTile,
        k_offset: usize,
        stage: &mut [E],
    ) -> Result<(), KernelFault> {
        let row = tile.col_tile * self.config.tiling_scheme.block_n;
        self.rhs_map.load_box(&self.rhs, [row, k_offset as u32], stage)
    }
}
