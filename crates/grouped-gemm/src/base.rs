use half::bf16;

use crate::{
    Tensor, TensorRef,
    components::{
        CpuDevice, FormattedConfigError, Fp8Rowwise, GemmIdent, GemmPrecision, GroupedGemmConfig,
        GroupedGemmError, GroupedGemmProblem, InvalidConfigError,
    },
    float::e4m3,
    kernels::{self, LaunchReport},
    scheduler::GroupSizes,
};

/// Inputs of a grouped GEMM.
///
/// `lhs` is `[M, K]` and `rhs` is `[G * N, K]` where `G` is the number of group sizes. Scales
/// are given together or not at all, `lhs_scale` with `M` values and `rhs_scale` with `G * N`.
pub struct GroupedGemmInputs<'a, P: GemmPrecision> {
    pub lhs: TensorRef<'a, P::EI>,
    pub rhs: TensorRef<'a, P::EI>,
    pub group_sizes: &'a [i32],
    pub lhs_scale: Option<&'a [f32]>,
    pub rhs_scale: Option<&'a [f32]>,
}

impl<'a, P: GemmPrecision> GroupedGemmInputs<'a, P> {
    pub fn new(
        lhs: TensorRef<'a, P::EI>,
        rhs: TensorRef<'a, P::EI>,
        group_sizes: &'a [i32],
    ) -> Self {
        Self {
            lhs,
            rhs,
            group_sizes,
            lhs_scale: None,
            rhs_scale: None,
        }
    }

    pub fn with_scales(mut self, lhs_scale: &'a [f32], rhs_scale: &'a [f32]) -> Self {
        self.lhs_scale = Some(lhs_scale);
        self.rhs_scale = Some(rhs_scale);
        self
    }
}

/// Grouped GEMM without scaling.
///
/// Returns a freshly allocated `[M, N]` output.
pub fn grouped_gemm<P: GemmPrecision>(
    device: &CpuDevice,
    config: &GroupedGemmConfig,
    lhs: TensorRef<'_, P::EI>,
    rhs: TensorRef<'_, P::EI>,
    m_sizes: &[i32],
) -> Result<Tensor<P::EO>, GroupedGemmError> {
    launch_ref::<P>(device, config, GroupedGemmInputs::new(lhs, rhs, m_sizes))
}

/// Grouped GEMM over `e4m3` inputs with row-wise scales, producing `bf16`.
///
/// `output[r, c] = (Σ lhs[r, k] · rhs[g · N + c, k]) · lhs_scale[r] · rhs_scale[g · N + c]`
/// where `g` is the group of row `r`.
pub fn grouped_gemm_fp8_rowwise(
    device: &CpuDevice,
    config: &GroupedGemmConfig,
    lhs: TensorRef<'_, e4m3>,
    lhs_scale: &[f32],
    rhs: TensorRef<'_, e4m3>,
    rhs_scale: &[f32],
    m_sizes: &[i32],
) -> Result<Tensor<bf16>, GroupedGemmError> {
    launch_ref::<Fp8Rowwise>(
        device,
        config,
        GroupedGemmInputs::new(lhs, rhs, m_sizes).with_scales(lhs_scale, rhs_scale),
    )
}

/// Launches a grouped GEMM on borrowed inputs.
pub fn launch_ref<P: GemmPrecision>(
    device: &CpuDevice,
    config: &GroupedGemmConfig,
    inputs: GroupedGemmInputs<'_, P>,
) -> Result<Tensor<P::EO>, GroupedGemmError> {
    launch_ref_with_report(device, config, inputs).map(|(out, _)| out)
}

/// Same as [`launch_ref`], also returning what every worker did.
pub fn launch_ref_with_report<P: GemmPrecision>(
    device: &CpuDevice,
    config: &GroupedGemmConfig,
    inputs: GroupedGemmInputs<'_, P>,
) -> Result<(Tensor<P::EO>, LaunchReport), GroupedGemmError> {
    let problem = problem_from_inputs(&inputs)?;
    let group_sizes = GroupSizes::new(inputs.group_sizes, problem.m)?;
    let scales = check_scales(&inputs, &problem)?;

    let plan = config.plan(device, scales.is_some())?;
    plan.tiling_scheme.check(&problem)?;

    let mut out = Tensor::<P::EO>::zeros(problem.shape(GemmIdent::Out));
    let report = kernels::launch::<P>(
        &plan,
        &problem,
        group_sizes,
        inputs.lhs.data,
        inputs.rhs.data,
        scales,
        &mut out.data,
    )?;

    if out.shape != [problem.m, problem.n] {
        let (shape, m, n) = (out.shape, problem.m, problem.n);
        return Err(FormattedConfigError::new(move || {
            format!("Output shape {shape:?} does not match [{m}, {n}]")
        })
        .into());
    }

    Ok((out, report))
}

fn problem_from_inputs<P: GemmPrecision>(
    inputs: &GroupedGemmInputs<'_, P>,
) -> Result<GroupedGemmProblem, InvalidConfigError> {
    check_buffer(&inputs.lhs, GemmIdent::Lhs)?;
    check_buffer(&inputs.rhs, GemmIdent::Rhs)?;

    let [m, k] = inputs.lhs.shape;
    let [weight_rows, rhs_k] = inputs.rhs.shape;
    let num_groups = inputs.group_sizes.len();

    if k != rhs_k {
        return Err(FormattedConfigError::new(move || {
            format!("Input K ({k}) must match weight K ({rhs_k})")
        }));
    }

    if num_groups == 0 {
        return Err(Box::new("At least one group is required"));
    }

    if weight_rows % num_groups != 0 {
        return Err(FormattedConfigError::new(move || {
            format!(
                "Weight rows ({weight_rows}) must be a multiple of the number of groups ({num_groups})"
            )
        }));
    }

    let n = weight_rows / num_groups;

    for (name, dim) in [("M", m), ("N", n), ("K", k)] {
        if u32::try_from(dim).is_err() {
            return Err(FormattedConfigError::new(move || {
                format!("{name} ({dim}) does not fit in 32 bits")
            }));
        }
    }

    Ok(GroupedGemmProblem {
        m,
        n,
        k,
        num_groups,
    })
}

fn check_buffer<E>(tensor: &TensorRef<'_, E>, ident: GemmIdent) -> Result<(), InvalidConfigError> {
    if !tensor.is_contiguous() {
        let (shape, strides) = (tensor.shape, tensor.strides);
        return Err(FormattedConfigError::new(move || {
            format!("{ident:?} must be contiguous, got strides {strides:?} for shape {shape:?}")
        }));
    }

    let shape = tensor.shape;
    let Some(expected) = shape[0].checked_mul(shape[1]) else {
        return Err(FormattedConfigError::new(move || {
            format!("{ident:?} shape {shape:?} overflows the addressable size")
        }));
    };

    if tensor.data.len() != expected {
        let len = tensor.data.len();
        return Err(FormattedConfigError::new(move || {
            format!("{ident:?} holds {len} elements but its shape {shape:?} needs {expected}")
        }));
    }

    Ok(())
}

fn check_scales<'a, P: GemmPrecision>(
    inputs: &GroupedGemmInputs<'a, P>,
    problem: &GroupedGemmProblem,
) -> Result<Option<(&'a [f32], &'a [f32])>, InvalidConfigError> {
    let (lhs_scale, rhs_scale) = match (inputs.lhs_scale, inputs.rhs_scale) {
        (None, None) => return Ok(None),
        (Some(lhs_scale), Some(rhs_scale)) => (lhs_scale, rhs_scale),
        _ => {
            return Err(Box::new(
                "Input and weight scales must be given together or not at all",
            ));
        }
    };

    for (ident, scale) in [(GemmIdent::Lhs, lhs_scale), (GemmIdent::Rhs, rhs_scale)] {
        let expected = problem.scale_len(ident);
        if scale.len() != expected {
            let len = scale.len();
            return Err(FormattedConfigError::new(move || {
                format!("{ident:?} scale holds {len} values, expected {expected}")
            }));
        }
    }

    Ok(Some((lhs_scale, rhs_scale)))
}
