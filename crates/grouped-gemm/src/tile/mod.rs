mod accumulator;
mod epilogue;
mod stage;

pub use accumulator::*;
pub use epilogue::*;
pub use stage::*;
