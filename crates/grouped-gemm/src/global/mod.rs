mod memory;
mod read;
mod tensor_map;
mod write;

pub use memory::*;
pub use read::*;
pub use tensor_map::*;
pub(crate) use write::*;
