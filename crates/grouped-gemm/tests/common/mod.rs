#![allow(dead_code)]

use grouped_gemm::{
    GroupedGemmInputs, Tensor, TensorRef,
    components::{
        CpuDevice, GemmElement, GemmPrecision, GroupedGemmConfig, GroupedGemmError, TilingScheme,
    },
    launch_ref,
    reference::grouped_gemm_reference,
    scheduler::Traversal,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const RTOL: f32 = 1e-2;
pub const ATOL: f32 = 1e-2;

/// A grouped GEMM problem with seeded inputs.
///
/// Inputs are multiples of 0.25 in `[-2, 2]`, exact in every storage precision, so only the
/// output cast can introduce an error.
pub struct GroupedGemmTestCase {
    pub group_sizes: Vec<i32>,
    pub n: usize,
    pub k: usize,
}

impl GroupedGemmTestCase {
    pub fn new(group_sizes: Vec<i32>, n: usize, k: usize) -> Self {
        Self { group_sizes, n, k }
    }

    pub fn m(&self) -> usize {
        self.group_sizes.iter().map(|size| *size as usize).sum()
    }

    pub fn num_groups(&self) -> usize {
        self.group_sizes.len()
    }

    pub fn lhs_f32(&self) -> Vec<f32> {
        random_values(self.m() * self.k, 1234)
    }

    pub fn rhs_f32(&self) -> Vec<f32> {
        random_values(self.num_groups() * self.n * self.k, 5678)
    }

    /// Scales are multiples of 1/8 in `[1/8, 2]`.
    pub fn scales(&self) -> (Vec<f32>, Vec<f32>) {
        let mut rng = StdRng::seed_from_u64(42);
        let mut sample = |len: usize| -> Vec<f32> {
            (0..len)
                .map(|_| rng.random_range(1..=16) as f32 * 0.125)
                .collect()
        };

        let lhs_scale = sample(self.m());
        let rhs_scale = sample(self.num_groups() * self.n);
        (lhs_scale, rhs_scale)
    }

    pub fn lhs<E: GemmElement>(&self) -> Vec<E> {
        self.lhs_f32().into_iter().map(E::from_f32).collect()
    }

    pub fn rhs<E: GemmElement>(&self) -> Vec<E> {
        self.rhs_f32().into_iter().map(E::from_f32).collect()
    }

    pub fn lhs_shape(&self) -> [usize; 2] {
        [self.m(), self.k]
    }

    pub fn rhs_shape(&self) -> [usize; 2] {
        [self.num_groups() * self.n, self.k]
    }

    pub fn expected(&self, scales: Option<(&[f32], &[f32])>) -> Vec<f32> {
        grouped_gemm_reference(
            &self.lhs_f32(),
            &self.rhs_f32(),
            &self.group_sizes,
            self.n,
            self.k,
            scales,
        )
    }

    pub fn run<P: GemmPrecision>(
        &self,
        device: &CpuDevice,
        config: &GroupedGemmConfig,
        scales: Option<(&[f32], &[f32])>,
    ) -> Result<Tensor<P::EO>, GroupedGemmError> {
        let lhs = self.lhs::<P::EI>();
        let rhs = self.rhs::<P::EI>();
        let mut inputs = GroupedGemmInputs::<P>::new(
            TensorRef::new(&lhs, self.lhs_shape()),
            TensorRef::new(&rhs, self.rhs_shape()),
            &self.group_sizes,
        );
        if let Some((lhs_scale, rhs_scale)) = scales {
            inputs = inputs.with_scales(lhs_scale, rhs_scale);
        }

        launch_ref::<P>(device, config, inputs)
    }

    /// Runs the kernel and checks it against the reference.
    pub fn test<P: GemmPrecision>(&self, device: &CpuDevice, config: &GroupedGemmConfig) {
        let out = self.run::<P>(device, config, None).unwrap();

        assert_eq!(out.shape, [self.m(), self.n]);
        assert_approx_equal(&out.to_f32(), &self.expected(None));
    }
}

pub fn random_values(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.random_range(-8..=8) as f32 * 0.25)
        .collect()
}

pub fn assert_approx_equal(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "Output lengths differ");

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let diff = (a - e).abs();
        assert!(
            diff <= ATOL + RTOL * e.abs(),
            "Values are not approx equal: index={i} actual={a}, expected={e}, difference={diff}"
        );
    }
}

pub fn device(num_sms: u32) -> CpuDevice {
    CpuDevice::with_sms(num_sms)
}

/// Every load path, store path and traversal over `tiling_scheme`.
pub fn all_strategies(tiling_scheme: TilingScheme) -> Vec<GroupedGemmConfig> {
    let mut configs = Vec::new();

    for tma_load in [false, true] {
        for tma_store in [false, true] {
            for traversal in [Traversal::GridStride, Traversal::Cursor] {
                configs.push(
                    GroupedGemmConfig::builder()
                        .tiling_scheme(tiling_scheme)
                        .tma_load(tma_load)
                        .tma_store(tma_store)
                        .traversal(Some(traversal))
                        .build(),
                );
            }
        }
    }

    configs
}
