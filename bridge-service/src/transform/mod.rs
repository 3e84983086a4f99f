mod accumulator;
mod mapper;

pub use accumulator::ReadingAccumulator;
pub use mapper::resolve;
