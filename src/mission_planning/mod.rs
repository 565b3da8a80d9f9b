// Mission planning module

pub mod action;
pub mod extraction_planner;

// Re-exports
pub use action::Action;
pub use extraction_planner::{ExtractionPlanner, PlannerConfig, PlannerStep, Target, SELF_KEY};
