pub mod aggregate;
pub mod filter;
pub mod generator;
pub mod predictor;

pub use aggregate::*;
pub use filter::*;
pub use generator::*;
pub use predictor::*;
