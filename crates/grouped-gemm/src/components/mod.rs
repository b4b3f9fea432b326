mod device;
mod error;
mod precision;
mod problem;
mod selection;
mod tiling_scheme;

pub use device::*;
pub use error::*;
pub use precision::*;
pub use problem::*;
pub use selection::*;
pub use tiling_scheme::*;
