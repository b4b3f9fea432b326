use std::fmt::{Debug, Display};

use super::GemmIdent;

/// Errors that can occur during the setup phase of a grouped GEMM.
pub enum GroupedGemmSetupError {
    /// A required hardware or runtime feature is not available.
    Unavailable(GemmAvailabilityError),

    /// The provided inputs or configuration are invalid.
    InvalidConfig(InvalidConfigError),
}

/// A specific feature required for the grouped GEMM is not available on the device.
pub enum GemmAvailabilityError {
    /// Bulk tensor transfers were requested but the device has no TMA support.
    TmaUnavailable,

    /// The device exposes no parallel unit to run workers on.
    NoParallelUnits,
}

/// Fatal fault raised while the kernel runs.
///
/// A fault aborts the whole invocation, no partial output is returned.
pub enum KernelFault {
    /// An access fell outside the bound buffer.
    IllegalAddress {
        ident: GemmIdent,
        index: usize,
        len: usize,
    },

    /// A tensor map descriptor does not describe a usable region.
    InvalidDescriptor { worker: u32, ident: GemmIdent },

    /// A tensor map was used after being configured but before being fenced.
    DescriptorNotAcquired { worker: u32, ident: GemmIdent },

    /// A worker terminated abnormally.
    WorkerPanicked { worker: u32, message: String },
}

/// Any error returned by a grouped GEMM launch.
pub enum GroupedGemmError {
    /// The launch was rejected before any worker ran.
    Setup(GroupedGemmSetupError),
    /// The kernel faulted during execution.
    Launch(KernelFault),
}

impl From<GemmAvailabilityError> for GroupedGemmSetupError {
    fn from(value: GemmAvailabilityError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<InvalidConfigError> for GroupedGemmSetupError {
    fn from(value: InvalidConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl From<GroupedGemmSetupError> for GroupedGemmError {
    fn from(value: GroupedGemmSetupError) -> Self {
        Self::Setup(value)
    }
}

impl From<GemmAvailabilityError> for GroupedGemmError {
    fn from(value: GemmAvailabilityError) -> Self {
        Self::Setup(value.into())
    }
}

impl From<InvalidConfigError> for GroupedGemmError {
    fn from(value: InvalidConfigError) -> Self {
        Self::Setup(value.into())
    }
}

impl From<KernelFault> for GroupedGemmError {
    fn from(value: KernelFault) -> Self {
        Self::Launch(value)
    }
}

impl Display for GroupedGemmSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for GroupedGemmSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupedGemmSetupError::Unavailable(err) => {
                write!(
                    f,
                    "Unable to launch grouped gemm because a required feature is unavailable: {err:?}"
                )
            }
            GroupedGemmSetupError::InvalidConfig(err) => {
                write!(
                    f,
                    "Unable to launch grouped gemm because the config is invalid: {err}"
                )
            }
        }
    }
}

impl Debug for GemmAvailabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GemmAvailabilityError::TmaUnavailable => write!(f, "TMA is not available."),
            GemmAvailabilityError::NoParallelUnits => {
                write!(f, "The device has no parallel unit.")
            }
        }
    }
}

impl Display for KernelFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for KernelFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelFault::IllegalAddress { ident, index, len } => write!(
                f,
                "Illegal address on {ident:?}: index {index} is outside a buffer of {len} elements"
            ),
            KernelFault::InvalidDescriptor { worker, ident } => {
                write!(f, "Worker {worker} used an invalid tensor map for {ident:?}")
            }
            KernelFault::DescriptorNotAcquired { worker, ident } => write!(
                f,
                "Worker {worker} used the tensor map for {ident:?} before fencing it"
            ),
            KernelFault::WorkerPanicked { worker, message } => {
                write!(f, "Worker {worker} panicked: {message}")
            }
        }
    }
}

impl Display for GroupedGemmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for GroupedGemmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupedGemmError::Setup(err) => write!(f, "{err:?}"),
            GroupedGemmError::Launch(fault) => {
                write!(f, "Grouped gemm faulted during execution: {fault:?}")
            }
        }
    }
}

impl std::error::Error for GroupedGemmError {}

/// Message carried by an invalid configuration error.
pub trait ConfigErrorMessage: Display + Debug + Send + Sync {}

impl<T: Display + Debug + Send + Sync> ConfigErrorMessage for T {}

/// Error that arises from invalid configurations
pub type InvalidConfigError = Box<dyn ConfigErrorMessage>;

/// Invalid configuration whose message is only formatted when displayed
pub struct FormattedConfigError {
    func: Box<dyn Fn() -> String + Send + Sync>,
}

impl FormattedConfigError {
    #[allow(clippy::new_ret_no_self)]
    pub fn new<F: Fn() -> String + Send + Sync + 'static>(func: F) -> InvalidConfigError {
        Box::new(Self {
            func: Box::new(func),
        })
    }
}

impl Display for FormattedConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = (self.func)();
        write!(f, "{string}")
    }
}

impl Debug for FormattedConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}
