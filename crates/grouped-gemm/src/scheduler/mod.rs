mod group_sizes;
mod resolver;
mod traversal;

pub use group_sizes::*;
pub use resolver::*;
pub use traversal::*;
