pub mod config;
pub mod dataset;
pub mod verdict;

pub use config::*;
pub use dataset::*;
pub use verdict::*;
