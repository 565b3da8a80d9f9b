//! gem_slam - online landmark SLAM and gem extraction planning
//!
//! This crate provides an incremental information-form graph SLAM
//! estimator over 2D landmarks, a planner that uses its belief to reach and
//! extract landmarks of requested types, and a simulated gem field to run
//! both against.

// Core modules
pub mod common;
pub mod linalg;

// Algorithm modules
pub mod slam;
pub mod mission_planning;
pub mod simulation;

// Re-export common types for convenience
pub use common::{LandmarkId, LandmarkMeasurement, Measurements, Point2D};
pub use common::{LandmarkEstimator, MissionPlanner};
pub use common::{RoboticsError, RoboticsResult};
pub use mission_planning::{Action, ExtractionPlanner, PlannerConfig};
pub use slam::{OnlineGraphSlam, SlamConfig};
