//! Online Graph SLAM
//!
//! Incremental information-form estimator over the robot position and the
//! positions of every landmark seen so far. Each measurement adds a soft
//! relative-position constraint between the pose block and the landmark
//! block; each motion appends a new pose, constrains it to the old one and
//! eliminates the old pose, so the state grows only with the number of
//! landmarks and never with the length of the trajectory.
//!
//! Positions are relative to the start location, which is pinned to the
//! origin by a unit prior. Headings are not estimated: the cumulative
//! commanded steering is used to rotate body-frame readings into the map
//! frame, which keeps the whole system linear.
//!
//! Ref:
//! - Probabilistic Robotics (Thrun, Burgard, Fox), ch. 11.

use std::collections::HashMap;

use itertools::Itertools;

use super::information::{InformationForm, BLOCK, POSE};
use crate::common::{
    normalize_angle, LandmarkEstimator, LandmarkId, LandmarkMeasurement, Measurements, Point2D,
    RoboticsError, RoboticsResult,
};
use crate::linalg::Matrix;

/// Configuration for the online graph estimator
#[derive(Debug, Clone)]
pub struct SlamConfig {
    /// Variance assumed for each motion step
    pub motion_noise: f64,
    /// Lower bound for the range-proportional measurement variance
    pub min_measurement_noise: f64,
    /// Initial rows/cols allocated for the information matrix
    pub initial_capacity: usize,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            motion_noise: 1.5,
            min_measurement_noise: 1.0,
            initial_capacity: 16,
        }
    }
}

/// Online information-form SLAM over 2D landmark positions
#[derive(Debug, Clone)]
pub struct OnlineGraphSlam {
    config: SlamConfig,
    /// `None` until the first measurement or movement
    information: Option<InformationForm>,
    /// Landmark ids in the order their blocks were allocated
    landmarks: Vec<LandmarkId>,
    index: HashMap<LandmarkId, usize>,
    /// Cumulative steering [rad], in (-pi, pi]
    heading: f64,
    pose: Point2D,
    /// Landmark means from the last solve, parallel to `landmarks`
    landmark_estimates: Vec<Point2D>,
}

impl OnlineGraphSlam {
    /// Create a new estimator
    pub fn new(config: SlamConfig) -> Self {
        OnlineGraphSlam {
            config,
            information: None,
            landmarks: Vec::new(),
            index: HashMap::new(),
            heading: 0.0,
            pose: Point2D::origin(),
            landmark_estimates: Vec::new(),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SlamConfig::default())
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    /// Whether any measurement or movement has been processed
    pub fn is_initialized(&self) -> bool {
        self.information.is_some()
    }

    /// Current position estimate
    pub fn pose(&self) -> Point2D {
        self.pose
    }

    /// Cumulative heading [rad]
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.len()
    }

    /// Landmark ids in index order
    pub fn landmark_ids(&self) -> &[LandmarkId] {
        &self.landmarks
    }

    pub fn contains_landmark(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Landmark ids paired with their latest estimates, in index order
    pub fn landmark_estimates(&self) -> impl Iterator<Item = (&LandmarkId, Point2D)> + '_ {
        self.landmarks.iter().zip(self.landmark_estimates.iter().copied())
    }

    /// Number of rows/cols of the information matrix
    pub fn dimension(&self) -> usize {
        self.information.as_ref().map_or(BLOCK, |info| info.dim())
    }

    /// Snapshot of Ω
    pub fn information_matrix(&self) -> RoboticsResult<Matrix> {
        match &self.information {
            Some(info) => info.omega(),
            None => Ok(Matrix::zeros(BLOCK, BLOCK)),
        }
    }

    /// Snapshot of ξ
    pub fn information_vector(&self) -> RoboticsResult<Matrix> {
        match &self.information {
            Some(info) => info.xi(),
            None => Ok(Matrix::zeros(BLOCK, 1)),
        }
    }

    fn information_mut(&mut self) -> &mut InformationForm {
        let capacity = self.config.initial_capacity;
        self.information.get_or_insert_with(|| InformationForm::anchored(capacity))
    }

    /// Offset of the landmark's block, allocating one for a new id
    fn landmark_block(&mut self, id: &str) -> RoboticsResult<usize> {
        if let Some(&i) = self.index.get(id) {
            return Ok(BLOCK + BLOCK * i);
        }
        let offset = self.information_mut().push_block()?;
        let i = self.landmarks.len();
        self.landmarks.push(id.to_string());
        self.index.insert(id.to_string(), i);
        log::debug!("new landmark {} at index {}", id, i);
        Ok(offset)
    }

    /// Fuse one measurement batch given as `(id, measurement)` pairs
    ///
    /// Entries are fused in ascending id order, so the resulting system does
    /// not depend on the iteration order of the caller's container.
    pub fn process_measurement_entries<'a, I>(&mut self, entries: I) -> RoboticsResult<Point2D>
    where
        I: IntoIterator<Item = (&'a LandmarkId, &'a LandmarkMeasurement)>,
    {
        self.information_mut();

        for (id, m) in entries.into_iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            let block = self.landmark_block(id)?;
            let noise = m.distance.max(self.config.min_measurement_noise);
            let angle = self.heading + m.bearing;
            let displacement = [m.distance * angle.cos(), m.distance * angle.sin()];
            log::trace!(
                "fuse {}: d={:.3} b={:.3} -> ({:.3}, {:.3}) w={:.3}",
                id,
                m.distance,
                m.bearing,
                displacement[0],
                displacement[1],
                1.0 / noise
            );
            self.information_mut().fuse(POSE, block, displacement, 1.0 / noise);
        }

        self.refresh()
    }

    /// Fuse a motion: turn by `steering`, then drive `distance`
    pub fn advance(&mut self, steering: f64, distance: f64) -> RoboticsResult<Point2D> {
        self.heading = normalize_angle(self.heading + steering);
        let motion = [distance * self.heading.cos(), distance * self.heading.sin()];
        let weight = 1.0 / self.config.motion_noise;
        self.information_mut().advance_pose(motion, weight)?;
        self.refresh()
    }

    /// Re-solve the mean and refresh the pose and landmark caches
    fn refresh(&mut self) -> RoboticsResult<Point2D> {
        let mean = match &self.information {
            Some(info) => info.solve()?,
            None => return Ok(self.pose),
        };
        self.pose = Point2D::new(mean[0], mean[1]);
        self.landmark_estimates = mean[BLOCK..]
            .chunks(BLOCK)
            .map(|c| Point2D::new(c[0], c[1]))
            .collect();
        Ok(self.pose)
    }

    /// Estimated position of landmark `id`
    pub fn landmark_position(&self, id: &str) -> RoboticsResult<Point2D> {
        self.index
            .get(id)
            .and_then(|&i| self.landmark_estimates.get(i).copied())
            .ok_or_else(|| RoboticsError::UnknownLandmark(id.to_string()))
    }
}

impl Default for OnlineGraphSlam {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LandmarkEstimator for OnlineGraphSlam {
    fn process_measurements(&mut self, measurements: &Measurements) -> RoboticsResult<Point2D> {
        self.process_measurement_entries(measurements)
    }

    fn process_movement(&mut self, steering: f64, distance: f64) -> RoboticsResult<Point2D> {
        self.advance(steering, distance)
    }

    fn get_landmark_coordinates(&self, id: &str) -> RoboticsResult<Point2D> {
        self.landmark_position(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{GemField, SimulationConfig};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn reading(distance: f64, bearing: f64) -> LandmarkMeasurement {
        LandmarkMeasurement::new(distance, bearing, 'A')
    }

    fn batch(entries: &[(&str, f64, f64)]) -> Measurements {
        entries
            .iter()
            .map(|&(id, d, b)| (id.to_string(), reading(d, b)))
            .collect()
    }

    fn assert_symmetric(slam: &OnlineGraphSlam) {
        let omega = slam.information_matrix().unwrap();
        assert!(omega.is_symmetric(1e-9), "omega not symmetric:\n{}", omega);
    }

    #[test]
    fn test_slam_creation() {
        let slam = OnlineGraphSlam::with_defaults();
        assert!(!slam.is_initialized());
        assert_eq!(slam.dimension(), 2);
        assert_eq!(slam.landmark_count(), 0);
        assert_eq!(slam.pose(), Point2D::origin());
    }

    #[test]
    fn test_first_measurement_places_landmark() {
        let mut slam = OnlineGraphSlam::with_defaults();
        let pos = slam.process_measurements(&batch(&[("g1", 2.0, PI / 2.0)])).unwrap();
        assert!(slam.is_initialized());
        assert_abs_diff_eq!(pos.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.y, 0.0, epsilon = 1e-12);
        let lm = slam.get_landmark_coordinates("g1").unwrap();
        assert_abs_diff_eq!(lm.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lm.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repeat_measurement_keeps_index() {
        let mut slam = OnlineGraphSlam::with_defaults();
        slam.process_measurements(&batch(&[("b", 1.0, 0.0), ("a", 2.0, 0.5)])).unwrap();
        slam.process_movement(0.1, 0.5).unwrap();
        slam.process_measurements(&batch(&[("c", 1.5, -0.5), ("a", 1.8, 0.4)])).unwrap();
        slam.process_movement(-0.2, 0.5).unwrap();
        // lexicographic within the first batch, then insertion order
        assert_eq!(slam.landmark_ids(), &["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(slam.dimension(), 8);
    }

    #[test]
    fn test_measurement_noise_floor() {
        // Within unit range the weight is capped at 1
        let mut slam = OnlineGraphSlam::with_defaults();
        slam.process_measurements(&batch(&[("near", 0.01, 0.0)])).unwrap();
        let omega = slam.information_matrix().unwrap();
        assert_abs_diff_eq!(omega[(2, 2)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(omega[(0, 2)], -1.0, epsilon = 1e-12);

        let mut slam = OnlineGraphSlam::with_defaults();
        slam.process_measurements(&batch(&[("far", 4.0, 0.0)])).unwrap();
        let omega = slam.information_matrix().unwrap();
        assert_abs_diff_eq!(omega[(2, 2)], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_symmetry_and_size_invariants() {
        let mut slam = OnlineGraphSlam::with_defaults();
        let steps: Vec<(Vec<(&str, f64, f64)>, f64, f64)> = vec![
            (vec![("a", 2.0, 0.3), ("b", 3.0, -1.0)], 0.2, 1.0),
            (vec![("a", 1.2, 0.1)], -0.4, 0.7),
            (vec![("c", 4.0, 2.0), ("b", 2.5, -0.8), ("d", 0.4, 0.0)], 1.0, 0.3),
            (vec![], 0.0, 0.5),
        ];
        let mut seen = std::collections::HashSet::new();
        for (readings, steering, distance) in steps.iter() {
            slam.process_measurements(&batch(readings)).unwrap();
            assert_symmetric(&slam);
            slam.process_movement(*steering, *distance).unwrap();
            assert_symmetric(&slam);
            for (id, _, _) in readings.iter() {
                seen.insert(*id);
            }
            assert_eq!(slam.dimension(), 2 + 2 * seen.len());
            assert_eq!(slam.information_vector().unwrap().nrows(), slam.dimension());
        }
    }

    #[test]
    fn test_measurement_order_independence() {
        let entries = vec![
            ("x".to_string(), reading(2.0, 0.4)),
            ("m".to_string(), reading(3.5, -2.0)),
            ("b".to_string(), reading(1.1, 1.3)),
        ];
        let forward: Vec<(&LandmarkId, &LandmarkMeasurement)> =
            entries.iter().map(|(id, m)| (id, m)).collect();
        let reversed: Vec<(&LandmarkId, &LandmarkMeasurement)> = forward.iter().rev().copied().collect();

        let mut s1 = OnlineGraphSlam::with_defaults();
        let mut s2 = OnlineGraphSlam::with_defaults();
        let p1 = s1.process_measurement_entries(forward).unwrap();
        let p2 = s2.process_measurement_entries(reversed).unwrap();

        assert_eq!(s1.landmark_ids(), s2.landmark_ids());
        assert_eq!(s1.information_matrix().unwrap(), s2.information_matrix().unwrap());
        assert_eq!(s1.information_vector().unwrap(), s2.information_vector().unwrap());
        assert_abs_diff_eq!(p1.x, p2.x, epsilon = 1e-12);
        assert_abs_diff_eq!(p1.y, p2.y, epsilon = 1e-12);
    }

    #[test]
    fn test_movement_without_landmarks() {
        let mut slam = OnlineGraphSlam::with_defaults();
        let p = slam.process_movement(PI / 2.0, 1.0).unwrap();
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-12);
        let p = slam.process_movement(PI / 2.0, 2.0).unwrap();
        assert_abs_diff_eq!(p.x, -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-12);
        assert_eq!(slam.dimension(), 2);
    }

    #[test]
    fn test_fresh_landmark_is_finite_after_movement() {
        let mut slam = OnlineGraphSlam::with_defaults();
        slam.process_measurements(&batch(&[("g", 7.0, -2.5)])).unwrap();
        slam.process_movement(0.3, 1.0).unwrap();
        let lm = slam.get_landmark_coordinates("g").unwrap();
        assert!(lm.is_finite());
    }

    #[test]
    fn test_unknown_landmark() {
        let mut slam = OnlineGraphSlam::with_defaults();
        slam.process_measurements(&batch(&[("g", 1.0, 0.0)])).unwrap();
        assert_eq!(
            slam.get_landmark_coordinates("nope"),
            Err(RoboticsError::UnknownLandmark("nope".to_string()))
        );
    }

    #[test]
    fn test_convergence_without_noise() {
        let area = ["A....", ".....", "..@.B", ".....", "C...D"];
        let mut field = GemField::from_area_map(&area, &[], SimulationConfig::noiseless(1.0, PI / 2.0 + 0.01))
            .unwrap();
        let mut slam = OnlineGraphSlam::with_defaults();
        let moves = [
            (0.0, 1.0),
            (PI / 2.0, 1.0),
            (PI / 2.0, 1.0),
            (PI / 2.0, 1.0),
            (PI / 2.0, 1.0),
            (0.3, 0.5),
            (-1.2, 0.8),
        ];
        for &(steering, distance) in moves.iter() {
            slam.process_measurements(&field.measurements()).unwrap();
            field.execute_move(steering, distance);
            slam.process_movement(steering, distance).unwrap();
        }
        slam.process_measurements(&field.measurements()).unwrap();

        let robot = field.robot_position();
        let estimate = slam.pose();
        assert!(estimate.distance(&robot) < 0.01, "{:?} vs {:?}", estimate, robot);
        for gem in field.gems() {
            let lm = slam.get_landmark_coordinates(&gem.id).unwrap();
            let truth = field.relative_position(gem.position);
            assert!(lm.distance(&truth) < 0.01, "{}: {:?} vs {:?}", gem.id, lm, truth);
        }
    }

    #[test]
    fn test_noisy_estimate_stays_close() {
        let area = ["A...B", ".....", "..@..", ".....", "C...D"];
        let config = SimulationConfig {
            seed: 7,
            ..SimulationConfig::new(1.0, PI / 2.0 + 0.01)
        };
        let mut field = GemField::from_area_map(&area, &[], config).unwrap();
        let mut slam = OnlineGraphSlam::with_defaults();
        for i in 0..20 {
            let steering = if i % 4 == 0 { PI / 2.0 } else { 0.0 };
            slam.process_measurements(&field.measurements()).unwrap();
            field.execute_move(steering, 0.5);
            slam.process_movement(steering, 0.5).unwrap();
        }
        let error = slam.pose().distance(&field.robot_position());
        assert!(error < 0.5, "position error {}", error);
        assert_symmetric(&slam);
    }
}
