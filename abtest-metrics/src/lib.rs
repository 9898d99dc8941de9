pub mod aggregators;
pub mod statistical;

pub use aggregators::*;
pub use statistical::*;
