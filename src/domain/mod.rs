pub mod observation;
pub mod types;

pub use observation::*;
pub use types::*;
