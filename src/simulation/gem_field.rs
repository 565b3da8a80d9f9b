//! Gem field simulation
//!
//! Ground-truth world for exercising the estimator and the planner: gems
//! scattered on a grid, a robot with noisy range/bearing sensing and noisy
//! motion, and the extraction rule. The robot reports everything relative
//! to its start location; this world translates between the two frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::common::{
    normalize_angle, LandmarkId, LandmarkMeasurement, Measurements, MissionPlanner, Point2D,
    RoboticsError, RoboticsResult,
};
use crate::mission_planning::Action;

/// Configuration for the simulated world
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Longest accepted move
    pub max_distance: f64,
    /// Largest accepted turn [rad]
    pub max_steering: f64,
    /// Std dev of range readings
    pub measure_distance_noise: f64,
    /// Std dev of bearing readings [rad]
    pub measure_bearing_noise: f64,
    /// Std dev added to both steering and distance of executed moves
    pub move_noise: f64,
    /// Gems farther than this are not reported
    pub horizon: f64,
    /// Robot and reported position must both be this close to extract
    pub extraction_distance: f64,
    pub seed: u64,
}

impl SimulationConfig {
    pub fn new(max_distance: f64, max_steering: f64) -> Self {
        Self {
            max_distance,
            max_steering,
            ..Self::default()
        }
    }

    /// Same limits with every noise source turned off
    pub fn noiseless(max_distance: f64, max_steering: f64) -> Self {
        Self {
            measure_distance_noise: 0.0,
            measure_bearing_noise: 0.0,
            move_noise: 0.0,
            ..Self::new(max_distance, max_steering)
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            max_steering: std::f64::consts::FRAC_PI_2 + 0.01,
            measure_distance_noise: 0.05,
            measure_bearing_noise: 0.02,
            move_noise: 0.01,
            horizon: f64::INFINITY,
            extraction_distance: 0.15,
            seed: 0,
        }
    }
}

/// A gem in world coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Gem {
    pub id: LandmarkId,
    pub kind: char,
    pub position: Point2D,
}

/// What happened when an action was executed
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Moved,
    /// Move outside the robot's limits, ignored
    MoveRejected,
    Extracted(Gem),
    ExtractionFailed,
}

/// Zero-mean Gaussian that degrades to a constant zero when `std_dev` is 0
fn gaussian(std_dev: f64) -> RoboticsResult<Option<Normal<f64>>> {
    if std_dev == 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, std_dev)
        .map(Some)
        .map_err(|e| RoboticsError::InvalidParameter(format!("noise std dev {}: {}", std_dev, e)))
}

/// Simulated field with a single robot
pub struct GemField {
    config: SimulationConfig,
    gems: Vec<Gem>,
    collected: Vec<Gem>,
    needed: Vec<char>,
    start: Point2D,
    position: Point2D,
    heading: f64,
    rng: StdRng,
    distance_noise: Option<Normal<f64>>,
    bearing_noise: Option<Normal<f64>>,
    move_noise: Option<Normal<f64>>,
}

impl GemField {
    /// Build from an area map
    ///
    /// Each row is a string; upper-case letters are gems and `@` is the
    /// start. The cell in row `r`, column `c` is centred on
    /// `(c + 0.5, -r - 0.5)`. The robot starts facing east.
    pub fn from_area_map(
        rows: &[&str],
        needed: &[char],
        config: SimulationConfig,
    ) -> RoboticsResult<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut gems = Vec::new();
        let mut start = None;

        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.chars().enumerate() {
                let centre = Point2D::new(c as f64 + 0.5, -(r as f64) - 0.5);
                if cell.is_ascii_uppercase() {
                    gems.push(Gem {
                        id: format!("{:016x}", rng.gen::<u64>()),
                        kind: cell,
                        position: centre,
                    });
                } else if cell == '@' {
                    if start.is_some() {
                        return Err(RoboticsError::InvalidParameter(
                            "area map has more than one start".to_string(),
                        ));
                    }
                    start = Some(centre);
                }
            }
        }

        let start = start.ok_or_else(|| {
            RoboticsError::InvalidParameter("area map has no start '@'".to_string())
        })?;

        Ok(GemField {
            distance_noise: gaussian(config.measure_distance_noise)?,
            bearing_noise: gaussian(config.measure_bearing_noise)?,
            move_noise: gaussian(config.move_noise)?,
            config,
            gems,
            collected: Vec::new(),
            needed: needed.to_vec(),
            start,
            position: start,
            heading: 0.0,
            rng,
        })
    }

    fn sample(noise: &Option<Normal<f64>>, rng: &mut StdRng) -> f64 {
        noise.as_ref().map_or(0.0, |n| n.sample(rng))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Gems still in the field
    pub fn gems(&self) -> &[Gem] {
        &self.gems
    }

    pub fn collected(&self) -> &[Gem] {
        &self.collected
    }

    /// Gem types still to extract
    pub fn needed(&self) -> &[char] {
        &self.needed
    }

    /// True robot position relative to the start
    pub fn robot_position(&self) -> Point2D {
        self.relative_position(self.position)
    }

    pub fn robot_heading(&self) -> f64 {
        self.heading
    }

    /// World point expressed relative to the start
    pub fn relative_position(&self, world: Point2D) -> Point2D {
        Point2D::new(world.x - self.start.x, world.y - self.start.y)
    }

    /// Noisy range/bearing readings of every gem within the horizon
    pub fn measurements(&mut self) -> Measurements {
        let mut measurements = Measurements::new();
        for gem in &self.gems {
            let distance = self.position.distance(&gem.position)
                + Self::sample(&self.distance_noise, &mut self.rng);
            let bearing = normalize_angle(
                self.position.bearing_to(&gem.position) - self.heading
                    + Self::sample(&self.bearing_noise, &mut self.rng),
            );
            if distance < self.config.horizon {
                measurements.insert(
                    gem.id.clone(),
                    LandmarkMeasurement::new(distance.max(0.0), bearing, gem.kind),
                );
            }
        }
        measurements
    }

    /// Turn by `steering` then drive `distance`; out-of-limit moves are ignored
    pub fn execute_move(&mut self, steering: f64, distance: f64) -> Outcome {
        let distance_ok = (0.0..=self.config.max_distance).contains(&distance);
        let steering_ok = steering.abs() <= self.config.max_steering;
        if !(distance_ok && steering_ok) {
            log::warn!("move {:.3} {:.3} outside robot limits, ignored", steering, distance);
            return Outcome::MoveRejected;
        }

        let steering = steering + Self::sample(&self.move_noise, &mut self.rng);
        let distance = distance + Self::sample(&self.move_noise, &mut self.rng);
        self.heading = normalize_angle(self.heading + steering);
        self.position = Point2D::new(
            self.position.x + distance * self.heading.cos(),
            self.position.y + distance * self.heading.sin(),
        );
        Outcome::Moved
    }

    /// Extract a gem of `kind` if both the robot and the reported `estimate`
    /// (relative to the start) are close enough to it
    pub fn extract(&mut self, kind: char, estimate: Point2D) -> Outcome {
        let reported = Point2D::new(estimate.x + self.start.x, estimate.y + self.start.y);
        let tolerance = self.config.extraction_distance;
        let found = self.gems.iter().position(|g| {
            g.kind == kind
                && self.position.distance(&g.position) <= tolerance
                && reported.distance(&g.position) <= tolerance
        });

        match found {
            Some(i) => {
                let gem = self.gems.remove(i);
                if let Some(n) = self.needed.iter().position(|&k| k == kind) {
                    self.needed.remove(n);
                }
                log::info!("extracted {} ({})", gem.kind, gem.id);
                self.collected.push(gem.clone());
                Outcome::Extracted(gem)
            }
            None => {
                log::debug!("no {} within {} of robot and estimate", kind, tolerance);
                Outcome::ExtractionFailed
            }
        }
    }

    /// Apply a planner action
    pub fn execute(&mut self, action: &Action) -> Outcome {
        match *action {
            Action::Move { steering, distance } => self.execute_move(steering, distance),
            Action::Extract { kind, x, y } => self.extract(kind, Point2D::new(x, y)),
        }
    }
}

/// Summary of a simulated mission
#[derive(Debug, Clone, PartialEq)]
pub struct MissionReport {
    pub steps: usize,
    pub collected: Vec<Gem>,
    /// Gem types still needed when the mission ended
    pub remaining: Vec<char>,
    pub failed_extractions: usize,
}

impl MissionReport {
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Let `planner` drive the robot until every needed gem is collected or
/// `max_steps` actions have been executed
pub fn run_mission<P: MissionPlanner>(
    field: &mut GemField,
    planner: &mut P,
    max_steps: usize,
) -> RoboticsResult<MissionReport> {
    let mut steps = 0;
    let mut failed_extractions = 0;

    while !field.needed().is_empty() && steps < max_steps {
        let needed = field.needed().to_vec();
        let measurements = field.measurements();
        let step = planner.next_move(&needed, &measurements)?;
        log::trace!("step {}: {}", steps, step.action);
        if field.execute(&step.action) == Outcome::ExtractionFailed {
            failed_extractions += 1;
        }
        steps += 1;
    }

    let report = MissionReport {
        steps,
        collected: field.collected().to_vec(),
        remaining: field.needed().to_vec(),
        failed_extractions,
    };
    log::info!(
        "mission ended after {} steps: {} collected, {} remaining",
        report.steps,
        report.collected.len(),
        report.remaining.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission_planning::ExtractionPlanner;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn field(area: &[&str], needed: &[char]) -> GemField {
        GemField::from_area_map(area, needed, SimulationConfig::noiseless(1.0, PI / 2.0 + 0.01)).unwrap()
    }

    #[test]
    fn test_area_map_parsing() {
        let f = field(&["A..", ".@.", "..B"], &['A']);
        assert_eq!(f.gems().len(), 2);
        assert_eq!(f.robot_position(), Point2D::origin());
        let a = f.gems().iter().find(|g| g.kind == 'A').unwrap();
        assert_eq!(a.position, Point2D::new(0.5, -0.5));
        assert_eq!(f.relative_position(a.position), Point2D::new(-1.0, 1.0));
    }

    #[test]
    fn test_area_map_requires_single_start() {
        let err = GemField::from_area_map(&["A.."], &[], SimulationConfig::default());
        assert!(matches!(err, Err(RoboticsError::InvalidParameter(_))));
        let err = GemField::from_area_map(&["@.@"], &[], SimulationConfig::default());
        assert!(matches!(err, Err(RoboticsError::InvalidParameter(_))));
    }

    #[test]
    fn test_noiseless_measurements() {
        let mut f = field(&["...", ".@A", "..."], &[]);
        let m = f.measurements();
        assert_eq!(m.len(), 1);
        let reading = m.values().next().unwrap();
        assert_abs_diff_eq!(reading.distance, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(reading.bearing, 0.0, epsilon = 1e-12);
        assert_eq!(reading.kind, 'A');
    }

    #[test]
    fn test_horizon_hides_far_gems() {
        let config = SimulationConfig {
            horizon: 1.5,
            ..SimulationConfig::noiseless(1.0, PI / 2.0)
        };
        let mut f = GemField::from_area_map(&["@A..B"], &[], config).unwrap();
        let m = f.measurements();
        assert_eq!(m.len(), 1);
        assert_eq!(m.values().next().unwrap().kind, 'A');
    }

    #[test]
    fn test_out_of_limit_moves_are_ignored() {
        let mut f = field(&["@.."], &[]);
        assert_eq!(f.execute_move(0.0, 1.5), Outcome::MoveRejected);
        assert_eq!(f.execute_move(2.0, 0.5), Outcome::MoveRejected);
        assert_eq!(f.execute_move(0.0, -0.1), Outcome::MoveRejected);
        assert_eq!(f.robot_position(), Point2D::origin());
        assert_eq!(f.execute_move(PI / 2.0, 1.0), Outcome::Moved);
        let p = f.robot_position();
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_extraction_needs_true_and_reported_proximity() {
        let mut f = field(&["@A"], &['A']);
        // reported estimate right, robot too far
        assert_eq!(f.extract('A', Point2D::new(1.0, 0.0)), Outcome::ExtractionFailed);
        f.execute_move(0.0, 0.95);
        // robot close, reported estimate wrong
        assert_eq!(f.extract('A', Point2D::new(0.0, 0.0)), Outcome::ExtractionFailed);
        // wrong type
        assert_eq!(f.extract('B', Point2D::new(0.95, 0.0)), Outcome::ExtractionFailed);
        match f.extract('A', Point2D::new(0.95, 0.0)) {
            Outcome::Extracted(gem) => assert_eq!(gem.kind, 'A'),
            other => panic!("expected extraction, got {:?}", other),
        }
        assert!(f.needed().is_empty());
        assert!(f.gems().is_empty());
        assert!(f.measurements().is_empty());
    }

    #[test]
    fn test_seed_reproducibility() {
        let config = SimulationConfig { seed: 11, ..SimulationConfig::default() };
        let mut f1 = GemField::from_area_map(&["A.@.B"], &[], config.clone()).unwrap();
        let mut f2 = GemField::from_area_map(&["A.@.B"], &[], config).unwrap();
        assert_eq!(f1.gems(), f2.gems());
        assert_eq!(f1.measurements(), f2.measurements());
    }

    #[test]
    fn test_noiseless_mission_collects_everything() {
        let area = [".....", "A....", "..@..", "....B", "..C.."];
        let mut f = field(&area, &['A', 'B', 'C']);
        let mut planner = ExtractionPlanner::with_limits(1.0, PI / 2.0 + 0.01).unwrap();
        let report = run_mission(&mut f, &mut planner, 500).unwrap();
        assert!(report.is_complete(), "{:?}", report);
        assert_eq!(report.collected.len(), 3);
        assert_eq!(report.failed_extractions, 0);
    }

    #[test]
    fn test_noisy_mission_collects_needed_gems() {
        let area = [
            "......",
            "...A..",
            "..@..B",
            "....C.",
            "......",
        ];
        let config = SimulationConfig {
            measure_distance_noise: 0.01,
            measure_bearing_noise: 0.005,
            move_noise: 0.002,
            seed: 3,
            ..SimulationConfig::default()
        };
        let mut f = GemField::from_area_map(&area, &['A', 'C'], config).unwrap();
        let mut planner = ExtractionPlanner::with_limits(1.0, PI / 2.0 + 0.01).unwrap();
        let report = run_mission(&mut f, &mut planner, 1000).unwrap();
        assert!(report.is_complete(), "{:?}", report);
        assert!(report.collected.iter().all(|g| g.kind == 'A' || g.kind == 'C'));
    }
}
