pub mod constants;
pub mod error;
pub mod size;

pub use size::GrowSize;
