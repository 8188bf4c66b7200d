pub mod complaint;
pub mod priority;

pub use complaint::*;
pub use priority::*;
