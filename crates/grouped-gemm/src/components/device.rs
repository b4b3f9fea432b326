use derive_new::new;

/// Capabilities of the device a grouped GEMM is launched on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, new)]
pub struct DeviceProperties {
    /// Number of parallel units, one worker each.
    pub num_sms: u32,
    /// Whether bulk tensor transfers through tensor maps are available.
    pub tma_supported: bool,
}

/// Emulated many-worker device.
///
/// Workers are OS threads and global memory is host memory. Tensor maps are emulated
/// by [`TensorMapDescriptor`](crate::global::TensorMapDescriptor).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuDevice {
    properties: DeviceProperties,
}

impl Default for CpuDevice {
    fn default() -> Self {
        let num_sms = std::thread::available_parallelism()
            .map(|count| count.get() as u32)
            .unwrap_or(1);

        Self {
            properties: DeviceProperties::new(num_sms, true),
        }
    }
}

impl CpuDevice {
    pub fn new(properties: DeviceProperties) -> Self {
        Self { properties }
    }

    /// Device with `num_sms` parallel units and tensor map support.
    pub fn with_sms(num_sms: u32) -> Self {
        Self::new(DeviceProperties::new(num_sms, true))
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }
}
