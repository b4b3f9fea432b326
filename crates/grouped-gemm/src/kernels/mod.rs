mod launch;
mod worker;

pub(crate) use launch::launch;
pub use launch::LaunchReport;
pub use worker::WorkerReport;
