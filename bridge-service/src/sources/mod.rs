pub mod slimmelezer;

pub use slimmelezer::SlimmelezerSource;

/// A single named scalar pushed by the meter adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub entity: String,
    pub value: f64,
}
