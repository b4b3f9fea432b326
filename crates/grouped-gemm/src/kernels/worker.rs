use crate::{
    components::{GemmIdent, GemmPrecision, KernelConfig, KernelFault},
    global::{GlobalReader, GlobalWriter},
    scheduler::ResolvedTile,
    tile::{Accumulator, Epilogue, Stage},
};

/// What one worker did during a launch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: u32,
    /// Tiles computed and stored.
    pub tiles: u32,
    /// Groups the worker entered. On the tensor map paths each one costs a reconfiguration.
    pub groups_entered: u32,
}

/// Program executed by one worker over its sequence of tiles.
///
/// Monomorphized over the reader, the writer, the epilogue and the traversal so the tile loop
/// has no strategy branch.
pub(crate) fn run_worker<'a, P, R, W, E, I>(
    worker: u32,
    reader: &mut R,
    writer: &mut W,
    epilogue: &E,
    tiles: I,
    config: &KernelConfig,
) -> Result<WorkerReport, KernelFault>
where
    P: GemmPrecision,
    R: GlobalReader<'a, P::EI>,
    W: GlobalWriter<'a, P::EO>,
    E: Epilogue,
    I: Iterator<Item = ResolvedTile>,
{
    let tiling_scheme = &config.tiling_scheme;
    let block_k = tiling_scheme.block_k as usize;

    let mut stage = Stage::<P::EI>::new(tiling_scheme);
    let mut acc = Accumulator::new(tiling_scheme);
    let mut out_tile = vec![P::EO::default(); tiling_scheme.elements_in_block(GemmIdent::Out)];

    let mut report = WorkerReport {
        worker,
        ..Default::default()
    };
    let mut current_group = None;

    for tile in tiles {
        if current_group != Some(tile.group) {
            log::trace!(
                "Worker {worker} enters group {} at row {} ({} rows)",
                tile.group,
                tile.row_offset,
                tile.m_size
            );

            reader.begin_group(&tile)?;
            writer.begin_group(&tile)?;
            current_group = Some(tile.group);
            report.groups_entered += 1;
        }

        acc.reset();

        for k_offset in (0..config.k).step_by(block_k) {
            reader.load_lhs(&tile, k_offset, stage.lhs_mut())?;
            reader.load_rhs(&tile, k_offset, stage.rhs_mut())?;

            let (lhs, rhs) = stage.registers();
            acc.mma(lhs, rhs, block_k);
        }

        epilogue.apply(&tile, &mut acc)?;
        acc.cast_into(&mut out_tile);
        writer.store(&tile, &out_tile)?;

        report.tiles += 1;
    }

    Ok(report)
}
