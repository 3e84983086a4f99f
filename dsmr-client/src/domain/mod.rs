mod field;
mod reading;

pub use field::Field;
pub use reading::{DsmrReading, Reading};
