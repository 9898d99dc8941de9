pub mod domain;
pub mod error;

pub use domain::*;
pub use error::*;
