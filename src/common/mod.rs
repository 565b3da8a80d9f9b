//! Common types, traits, and error definitions for gem_slam
//!
//! This module provides the foundational building blocks shared by
//! the estimator, the planner and the simulator.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
