//! Cost vectors, calibration data and the model that turns operation counts
//! into comparable estimates.

pub mod calibrate;
mod model;
mod vector;

pub use model::{
    default_class, default_memory, CalibrationEntry, CalibrationTable, Complexity,
    ComplexityClass, CostModel, CostRecord,
};
pub use vector::{CostOrdering, CostVector};
