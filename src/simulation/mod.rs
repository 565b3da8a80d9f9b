// Simulated worlds for exercising the estimator and planner

pub mod gem_field;

// Re-exports
pub use gem_field::{run_mission, Gem, GemField, MissionReport, Outcome, SimulationConfig};
