use std::any::Any;

use crate::{
    components::{
        GemmElement, GemmIdent, GemmPrecision, GroupedGemmProblem, KernelConfig, KernelFault,
        LaunchPlan, LoadStrategy, StoreStrategy,
    },
    global::{
        GlobalOutput, GlobalReader, GlobalView, GlobalWriter, ManualReader, ManualWriter,
        TensorMapWorkspace, TmaReader, TmaWriter, WorkerTensorMaps,
    },
    scheduler::{CursorTiles, GridStrideTiles, GroupSizes, GroupTileResolver, Traversal},
    tile::{Epilogue, PlainEpilogue, RowwiseScaleEpilogue},
};

use super::worker::{WorkerReport, run_worker};

/// Summary of a launch, one entry per worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchReport {
    pub num_workers: u32,
    pub traversal: Traversal,
    pub load: LoadStrategy,
    pub store: StoreStrategy,
    pub workers: Vec<WorkerReport>,
}

impl LaunchReport {
    pub fn total_tiles(&self) -> u64 {
        self.workers.iter().map(|worker| worker.tiles as u64).sum()
    }

    pub fn groups_entered(&self) -> u64 {
        self.workers
            .iter()
            .map(|worker| worker.groups_entered as u64)
            .sum()
    }
}

/// Everything a worker reads, shared by all of them.
struct WorkerInputs<'a, P: GemmPrecision> {
    lhs: GlobalView<'a, P::EI>,
    rhs: GlobalView<'a, P::EI>,
    output: &'a GlobalOutput<'a, P::EO>,
    resolver: GroupTileResolver<'a>,
    config: KernelConfig,
    plan: &'a LaunchPlan,
}

/// Runs the grouped GEMM on `plan.num_workers` workers and waits for all of them.
///
/// Inputs must already be validated against `problem`.
pub(crate) fn launch<P: GemmPrecision>(
    plan: &LaunchPlan,
    problem: &GroupedGemmProblem,
    group_sizes: GroupSizes<'_>,
    lhs: &[P::EI],
    rhs: &[P::EI],
    scales: Option<(&[f32], &[f32])>,
    out: &mut [P::EO],
) -> Result<LaunchReport, KernelFault> {
    let config = plan.kernel_config(problem);
    let resolver = GroupTileResolver::new(group_sizes, problem.n, &plan.tiling_scheme);
    let output = GlobalOutput::new(out, problem.n);
    let mut workspace = plan
        .uses_tma()
        .then(|| TensorMapWorkspace::new(plan.num_workers));

    log::debug!(
        "Launching grouped gemm {problem:?} ({} -> {}) on {} workers: {} tiles, load {:?}, store {:?}, traversal {:?}, scaled {}",
        <P::EI as GemmElement>::NAME,
        <P::EO as GemmElement>::NAME,
        plan.num_workers,
        resolver.total_tiles(),
        plan.load,
        plan.store,
        plan.traversal,
        scales.is_some(),
    );

    let inputs = WorkerInputs::<P> {
        lhs: GlobalView::new(lhs, problem.k, GemmIdent::Lhs),
        rhs: GlobalView::new(rhs, problem.k, GemmIdent::Rhs),
        output: &output,
        resolver,
        config,
        plan,
    };

    let workers = match scales {
        None => dispatch(&inputs, &PlainEpilogue, workspace.as_mut())?,
        Some((lhs_scale, rhs_scale)) => {
            let epilogue = RowwiseScaleEpilogue::new(
                GlobalView::new(lhs_scale, 1, GemmIdent::Lhs),
                GlobalView::new(rhs_scale, 1, GemmIdent::Rhs),
                config,
            );
            dispatch(&inputs, &epilogue, workspace.as_mut())?
        }
    };

    for report in workers.iter() {
        log::debug!(
            "Worker {} computed {} tiles over {} groups",
            report.worker,
            report.tiles,
            report.groups_entered
        );
    }

    Ok(LaunchReport {
        num_workers: plan.num_workers,
        traversal: plan.traversal,
        load: plan.load,
        store: plan.store,
        workers,
    })
}

/// Selects the reader and writer once for the whole launch.
fn dispatch<'a, P: GemmPrecision, E: Epilogue>(
    inputs: &WorkerInputs<'a, P>,
    epilogue: &E,
    workspace: Option<&'a mut TensorMapWorkspace>,
) -> Result<Vec<WorkerReport>, KernelFault> {
    match (inputs.plan.load, inputs.plan.store) {
        (LoadStrategy::Manual, StoreStrategy::Manual) => spawn_workers::<
            P,
            ManualReader<'a, P::EI>,
            ManualWriter<'a, P::EO>,
            E,
        >(inputs, epilogue, workspace),
        (LoadStrategy::Manual, StoreStrategy::Tma) => spawn_workers::<
            P,
            ManualReader<'a, P::EI>,
            TmaWriter<'a, P::EO>,
            E,
        >(inputs, epilogue, workspace),
        (LoadStrategy::Tma, StoreStrategy::Manual) => spawn_workers::<
            P,
            TmaReader<'a, P::EI>,
            ManualWriter<'a, P::EO>,
            E,
        >(inputs, epilogue, workspace),
        (LoadStrategy::Tma, StoreStrategy::Tma) => {
            spawn_workers::<P, TmaReader<'a, P::EI>, TmaWriter<'a, P::EO>, E>(
                inputs, epilogue, workspace,
            )
        }
    }
}

fn spawn_workers<'a, P, R, W, E>(
    inputs: &WorkerInputs<'a, P>,
    epilogue: &E,
    workspace: Option<&'a mut TensorMapWorkspace>,
) -> Result<Vec<WorkerReport>, KernelFault>
where
    P: GemmPrecision,
    R: GlobalReader<'a, P::EI>,
    W: GlobalWriter<'a, P::EO>,
    E: Epilogue,
{
    let num_workers = inputs.plan.num_workers;
    let traversal = inputs.plan.traversal;
    let resolver = inputs.resolver;
    let config = inputs.config;

    let mut slots = workspace.map(|workspace| workspace.slots());
    let mut programs = Vec::with_capacity(num_workers as usize);

    for worker in 0..num_workers {
        let (reader_maps, writer_map) = match slots.as_mut().and_then(|slots| slots.next()) {
            Some(WorkerTensorMaps { lhs, rhs, out }) => (Some((lhs, rhs)), Some(out)),
            None => (None, None),
        };

        let reader = R::init(worker, inputs.lhs, inputs.rhs, reader_maps, config)?;
        let writer = W::init(worker, inputs.output, writer_map, config)?;
        programs.push((worker, reader, writer));
    }

    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = programs
            .into_iter()
            .map(|(worker, mut reader, mut writer)| {
                let handle = scope.spawn(move || match traversal {
                    Traversal::GridStride => run_worker::<P, R, W, E, _>(
                        worker,
                        &mut reader,
                        &mut writer,
                        epilogue,
                        GridStrideTiles::new(resolver, worker, num_workers),
                        &config,
                    ),
                    Traversal::Cursor => run_worker::<P, R, W, E, _>(
                        worker,
                        &mut reader,
                        &mut writer,
                        epilogue,
                        CursorTiles::new(resolver, worker, num_workers),
                        &config,
                    ),
                });
                (worker, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(worker, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    Err(KernelFault::WorkerPanicked {
                        worker,
                        message: panic_message(payload.as_ref()),
                    })
                })
            })
            .collect::<Vec<_>>()
    });

    results.into_iter().collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }

    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
