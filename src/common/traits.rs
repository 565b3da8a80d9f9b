//! Common traits defining interfaces between estimator, planner and simulator

use crate::common::error::RoboticsResult;
use crate::common::types::*;
use crate::mission_planning::PlannerStep;

/// Online landmark SLAM: a measurement batch, then a motion, repeatedly
pub trait LandmarkEstimator {
    /// Fuse a batch of landmark measurements and return the current position estimate
    fn process_measurements(&mut self, measurements: &Measurements) -> RoboticsResult<Point2D>;

    /// Fuse a motion command and return the current position estimate
    fn process_movement(&mut self, steering: f64, distance: f64) -> RoboticsResult<Point2D>;

    /// Estimated position of a previously observed landmark
    fn get_landmark_coordinates(&self, id: &str) -> RoboticsResult<Point2D>;
}

/// Decision policy driving a robot towards the landmarks it still needs
pub trait MissionPlanner {
    /// Choose the next action given the still-needed landmark types and the visible landmarks
    fn next_move(
        &mut self,
        needed: &[char],
        measurements: &Measurements,
    ) -> RoboticsResult<PlannerStep>;
}
