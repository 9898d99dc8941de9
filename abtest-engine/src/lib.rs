//! Automated decision engine for two-arm A/B experiments.
//!
//! One call to [`DecisionEngine::analyze_test`] runs a sample ratio
//! mismatch check over the whole dataset, classifies the metric as binary
//! or continuous (normal / non-normal per arm), and runs the matching
//! hypothesis test:
//!
//! | Metric type | Test |
//! |---|---|
//! | binary | two-proportion Z-test |
//! | continuous, both arms normal | Welch's t-test |
//! | continuous, otherwise | Mann-Whitney U |
//!
//! ```rust,no_run
//! use abtest_core::{EngineConfig, ExperimentDataset};
//! use abtest_engine::DecisionEngine;
//!
//! let dataset = ExperimentDataset::from_observations(
//!     "variant",
//!     "converted",
//!     vec![("A", Some(0.0)), ("B", Some(1.0)), ("A", Some(1.0)), ("B", Some(0.0))],
//! );
//! let engine = DecisionEngine::new(EngineConfig::default().with_seed(7))?;
//! let verdict = engine.analyze_test(&dataset, "converted")?;
//! println!("{} p={}", verdict.test, verdict.p_value);
//! # Ok::<(), abtest_core::CoreError>(())
//! ```

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod normality;
pub mod srm;

pub use classifier::*;
pub use config::*;
pub use dispatcher::*;
pub use engine::*;
pub use normality::*;
pub use srm::*;
