pub mod axis;
pub mod benchmark_utils;
pub mod build;
pub mod error;
pub mod plan;
pub mod reducer;
pub mod runner;
pub mod samples;
pub mod sweep;

pub use error::{HarnessError, Result};
