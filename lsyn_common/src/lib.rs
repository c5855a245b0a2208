//! Common configuration and shared types for the lsyn workspace.
//!
//! This crate provides the pipeline configuration (optimization rounds,
//! strictness, mapping strategy) and a set of small reference circuits used
//! by the tests of the other crates.

mod config;
mod test_cases;

pub use crate::config::*;
pub use crate::test_cases::*;
