use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::{config::GlobalConfig, scheduler::Traversal};

use super::{
    CpuDevice, FormattedConfigError, GemmAvailabilityError, GroupedGemmProblem,
    GroupedGemmSetupError, TilingScheme,
};

/// User facing configuration of a grouped GEMM launch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedGemmConfig {
    #[serde(default)]
    pub tiling_scheme: TilingScheme,
    /// Upper bound on the number of workers. Defaults to every parallel unit of the device.
    #[serde(default)]
    pub max_workers: Option<u32>,
    /// Load input and weight blocks through tensor maps.
    #[serde(default)]
    pub tma_load: bool,
    /// Store output blocks through a tensor map.
    #[serde(default)]
    pub tma_store: bool,
    /// Tile traversal. When absent it is chosen from the epilogue.
    #[serde(default)]
    pub traversal: Option<Traversal>,
}

impl Default for GroupedGemmConfig {
    fn default() -> Self {
        GroupedGemmConfigBuilder::new().build()
    }
}

impl GroupedGemmConfig {
    pub fn builder() -> GroupedGemmConfigBuilder {
        GroupedGemmConfigBuilder::new()
    }

    /// Config built from the process wide [`GlobalConfig`].
    pub fn from_global() -> Self {
        let launch = &GlobalConfig::get().launch;

        Self::builder()
            .tiling_scheme(launch.tiling_scheme)
            .max_workers(launch.max_workers)
            .tma_load(launch.tma.load())
            .tma_store(launch.tma.store())
            .traversal(launch.traversal)
            .build()
    }

    /// Resolves the config against the device.
    ///
    /// Fails before any worker is spawned when the device lacks a requested capability.
    pub fn plan(
        &self,
        device: &CpuDevice,
        quantized: bool,
    ) -> Result<LaunchPlan, GroupedGemmSetupError> {
        let properties = device.properties();

        if (self.tma_load || self.tma_store) && !properties.tma_supported {
            return Err(GemmAvailabilityError::TmaUnavailable.into());
        }

        if properties.num_sms == 0 {
            return Err(GemmAvailabilityError::NoParallelUnits.into());
        }

        let num_workers = match self.max_workers {
            Some(0) => {
                return Err(FormattedConfigError::new(|| {
                    "The worker cap must be at least 1".to_string()
                })
                .into());
            }
            Some(cap) if cap < properties.num_sms => {
                log::debug!(
                    "Capping grouped gemm workers from {} to {cap}",
                    properties.num_sms
                );
                cap
            }
            Some(cap) => {
                if cap > properties.num_sms {
                    log::warn!(
                        "Requested {cap} workers but the device only has {} parallel units",
                        properties.num_sms
                    );
                }
                properties.num_sms
            }
            None => properties.num_sms,
        };

        let traversal = self
            .traversal
            .unwrap_or_else(|| Traversal::default_for(quantized));

        Ok(LaunchPlan {
            tiling_scheme: self.tiling_scheme,
            num_workers,
            load: LoadStrategy::from_tma(self.tma_load),
            store: StoreStrategy::from_tma(self.tma_store),
            traversal,
        })
    }
}

pub struct GroupedGemmConfigBuilder {
    tiling_scheme: TilingScheme,
    max_workers: Option<u32>,
    tma_load: bool,
    tma_store: bool,
    traversal: Option<Traversal>,
}

impl GroupedGemmConfigBuilder {
    fn new() -> Self {
        Self {
            tiling_scheme: TilingScheme::default(),
            max_workers: None,
            tma_load: false,
            tma_store: false,
            traversal: None,
        }
    }

    pub fn tiling_scheme(mut self, tiling_scheme: TilingScheme) -> Self {
        self.tiling_scheme = tiling_scheme;
        self
    }

    pub fn max_workers(mut self, max_workers: Option<u32>) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn tma_load(mut self, tma_load: bool) -> Self {
        self.tma_load = tma_load;
        self
    }

    pub fn tma_store(mut self, tma_store: bool) -> Self {
        self.tma_store = tma_store;
        self
    }

    /// Enables or disables both tensor map paths.
    pub fn tma(self, enabled: bool) -> Self {
        self.tma_load(enabled).tma_store(enabled)
    }

    pub fn traversal(mut self, traversal: Option<Traversal>) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn build(self) -> GroupedGemmConfig {
        GroupedGemmConfig {
            tiling_scheme: self.tiling_scheme,
            max_workers: self.max_workers,
            tma_load: self.tma_load,
            tma_store: self.tma_store,
            traversal: self.traversal,
        }
    }
}

#[derive(Default, Copy, Clone, Debug, Hash, PartialEq, Eq)]
/// How input and weight blocks are brought in
pub enum LoadStrategy {
    /// Per element offsets with row masks
    #[default]
    Manual,
    /// Box loads through a per group tensor map
    Tma,
}

#[derive(Default, Copy, Clone, Debug, Hash, PartialEq, Eq)]
/// How output blocks are written back
pub enum StoreStrategy {
    /// Per element offsets with row and column masks
    #[default]
    Manual,
    /// Box stores through a per group tensor map
    Tma,
}

impl LoadStrategy {
    fn from_tma(tma: bool) -> Self {
        match tma {
            true => Self::Tma,
            false => Self::Manual,
        }
    }
}

impl StoreStrategy {
    fn from_tma(tma: bool) -> Self {
        match tma {
            true => Self::Tma,
            false => Self::Manual,
        }
    }
}

/// A config resolved against a device. Fixed for one launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchPlan {
    pub tiling_scheme: TilingScheme,
    pub num_workers: u32,
    pub load: LoadStrategy,
    pub store: StoreStrategy,
    pub traversal: Traversal,
}

impl LaunchPlan {
    /// Whether any worker needs a tensor map workspace slot.
    pub fn uses_tma(&self) -> bool {
        self.load == LoadStrategy::Tma || self.store == StoreStrategy::Tma
    }

    pub fn kernel_config(&self, problem: &GroupedGemmProblem) -> KernelConfig {
        KernelConfig::new(problem.n, problem.k, self.tiling_scheme)
    }
}

/// Compile time constants of the kernel, shared by every worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, new)]
pub struct KernelConfig {
    pub n: usize,
    pub k: usize,
    pub tiling_scheme: TilingScheme,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::DeviceProperties;

    fn device(num_sms: u32, tma_supported: bool) -> CpuDevice {
        CpuDevice::new(DeviceProperties::new(num_sms, tma_supported))
    }

    #[test]
    fn defaults_to_manual_paths_on_every_unit() {
        let plan = GroupedGemmConfig::default()
            .plan(&device(12, true), false)
            .unwrap();

        assert_eq!(plan.num_workers, 12);
        assert_eq!(plan.load, LoadStrategy::Manual);
        assert_eq!(plan.store, StoreStrategy::Manual);
        assert!(!plan.uses_tma());
    }

    #[test]
    fn traversal_follows_the_epilogue_unless_overridden() {
        let config = GroupedGemmConfig::default();
        let device = device(4, true);

        assert_eq!(
            config.plan(&device, false).unwrap().traversal,
            Traversal::GridStride
        );
        assert_eq!(config.plan(&device, true).unwrap().traversal, Traversal::Cursor);

        let config = GroupedGemmConfig::builder()
            .traversal(Some(Traversal::Cursor))
            .build();
        assert_eq!(
            config.plan(&device, false).unwrap().traversal,
            Traversal::Cursor
        );
    }

    #[test]
    fn worker_cap_never_exceeds_the_device() {
        let capped = GroupedGemmConfig::builder().max_workers(Some(3)).build();
        assert_eq!(capped.plan(&device(8, true), false).unwrap().num_workers, 3);

        let generous = GroupedGemmConfig::builder().max_workers(Some(64)).build();
        assert_eq!(generous.plan(&device(8, true), false).unwrap().num_workers, 8);

        let zero = GroupedGemmConfig::builder().max_workers(Some(0)).build();
        assert!(matches!(
            zero.plan(&device(8, true), false),
            Err(GroupedGemmSetupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tma_request_fails_fast_without_support() {
        let config = GroupedGemmConfig::builder().tma_store(true).build();

        assert!(matches!(
            config.plan(&device(8, false), false),
            Err(GroupedGemmSetupError::Unavailable(
                GemmAvailabilityError::TmaUnavailable
            ))
        ));

        let plan = config.plan(&device(8, true), false).unwrap();
        assert_eq!(plan.load, LoadStrategy::Manual);
        assert_eq!(plan.store, StoreStrategy::Tma);
        assert!(plan.uses_tma());
    }

    #[test]
    fn device_without_units_is_unavailable() {
        assert!(matches!(
            GroupedGemmConfig::default().plan(&device(0, true), false),
            Err(GroupedGemmSetupError::Unavailable(
                GemmAvailabilityError::NoParallelUnits
            ))
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: GroupedGemmConfig = toml::from_str(
            r#"
            tma_load = true
            traversal = "cursor"

            [tiling_scheme]
            block_m = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.tiling_scheme, TilingScheme::new(128, 64, 32));
        assert!(config.tma_load);
        assert!(!config.tma_store);
        assert_eq!(config.max_workers, None);
        assert_eq!(config.traversal, Some(Traversal::Cursor));
    }
}
