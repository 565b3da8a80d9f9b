//! Extraction planner
//!
//! Drives a robot to the landmarks ("gems") whose types are still needed and
//! extracts them. The planner owns an online graph SLAM estimator: every call
//! fuses the visible landmarks, picks the nearest known landmark of a needed
//! type, and either extracts it (when the estimated range is within
//! tolerance) or steps towards it. The step it commands is fused into the
//! estimator right away, so the belief is current when the next measurement
//! batch arrives.
//!
//! When no needed landmark is known the planner searches: it drives straight
//! with a slowly growing stride and makes a full turn every few attempts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use ordered_float::OrderedFloat;

use super::action::Action;
use crate::common::{
    normalize_angle, LandmarkId, Measurements, MissionPlanner, Point2D, RoboticsError,
    RoboticsResult,
};
use crate::slam::{OnlineGraphSlam, SlamConfig};

/// Key of the robot's own estimate in [`PlannerStep::estimates`]
pub const SELF_KEY: &str = "self";

/// Configuration for the extraction planner
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Longest move the robot accepts
    pub max_distance: f64,
    /// Largest turn the robot accepts [rad]
    pub max_steering: f64,
    /// Estimated range below which the planner extracts
    pub extraction_tolerance: f64,
    /// Fraction of the remaining range covered per move
    pub approach_gain: f64,
    /// Range below which moves are capped to `slow_step`
    pub slow_zone: f64,
    pub slow_step: f64,
    /// Search stride before the first failed search
    pub initial_search_radius: f64,
    /// Stride growth per failed search
    pub search_increment: f64,
    /// Every `sweep_period`-th consecutive failed search turns by `max_steering`
    pub sweep_period: usize,
    /// Estimator settings
    pub slam: SlamConfig,
}

impl PlannerConfig {
    pub fn new(max_distance: f64, max_steering: f64) -> Self {
        Self {
            max_distance,
            max_steering,
            ..Self::default()
        }
    }

    fn validate(&self) -> RoboticsResult<()> {
        let positive = [
            ("max_distance", self.max_distance),
            ("max_steering", self.max_steering),
            ("extraction_tolerance", self.extraction_tolerance),
            ("approach_gain", self.approach_gain),
            ("slow_step", self.slow_step),
            ("search_increment", self.search_increment),
        ];
        for (name, value) in positive.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(RoboticsError::InvalidParameter(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if self.sweep_period == 0 {
            return Err(RoboticsError::InvalidParameter(
                "sweep_period must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            max_steering: std::f64::consts::FRAC_PI_2 + 0.01,
            extraction_tolerance: 0.05,
            approach_gain: 0.8,
            slow_zone: 0.2,
            slow_step: 0.05,
            initial_search_radius: 0.5,
            search_increment: 0.1,
            sweep_period: 5,
            slam: SlamConfig::default(),
        }
    }
}

/// Landmark selected as the current goal
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: LandmarkId,
    pub kind: char,
    pub position: Point2D,
    /// Estimated range from the robot
    pub distance: f64,
    /// Bearing relative to the robot heading, in (-pi, pi]
    pub bearing: f64,
}

/// Result of one planning call
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerStep {
    pub action: Action,
    /// Estimated positions keyed by landmark id, plus [`SELF_KEY`] for the robot
    pub estimates: BTreeMap<String, Point2D>,
}

/// Orders targets by range, then by id
fn closer(a: &Target, b: &Target) -> Ordering {
    OrderedFloat(a.distance)
        .cmp(&OrderedFloat(b.distance))
        .then_with(|| a.id.cmp(&b.id))
}

/// Plans moves and extractions from SLAM estimates
pub struct ExtractionPlanner {
    config: PlannerConfig,
    slam: OnlineGraphSlam,
    /// Type of each landmark, recorded when first seen
    landmark_types: HashMap<LandmarkId, char>,
    /// Landmarks that vanished right after an extraction attempt
    extracted: HashSet<LandmarkId>,
    /// Landmark of the last emitted extraction
    pending_extraction: Option<LandmarkId>,
    target: Option<Target>,
    search_radius: f64,
    failed_searches: usize,
}

impl ExtractionPlanner {
    /// Create a new planner
    pub fn new(config: PlannerConfig) -> RoboticsResult<Self> {
        config.validate()?;
        Ok(ExtractionPlanner {
            slam: OnlineGraphSlam::new(config.slam.clone()),
            search_radius: config.initial_search_radius,
            config,
            landmark_types: HashMap::new(),
            extracted: HashSet::new(),
            pending_extraction: None,
            target: None,
            failed_searches: 0,
        })
    }

    /// Create with the robot's limits and default tuning
    pub fn with_limits(max_distance: f64, max_steering: f64) -> RoboticsResult<Self> {
        Self::new(PlannerConfig::new(max_distance, max_steering))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The underlying estimator
    pub fn slam(&self) -> &OnlineGraphSlam {
        &self.slam
    }

    /// Goal chosen by the last `next_move` call
    pub fn current_target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn landmark_type(&self, id: &str) -> Option<char> {
        self.landmark_types.get(id).copied()
    }

    /// Whether the landmark is considered collected
    pub fn is_extracted(&self, id: &str) -> bool {
        self.extracted.contains(id)
    }

    /// Current search stride
    pub fn search_radius(&self) -> f64 {
        self.search_radius
    }

    /// Consecutive calls without a known needed landmark
    pub fn failed_searches(&self) -> usize {
        self.failed_searches
    }

    fn record_types(&mut self, measurements: &Measurements) {
        for (id, m) in measurements {
            self.landmark_types.entry(id.clone()).or_insert(m.kind);
        }
    }

    /// A landmark that is no longer reported after we tried to extract it is gone
    fn settle_extraction(&mut self, measurements: &Measurements) {
        if let Some(id) = self.pending_extraction.take() {
            if !measurements.contains_key(&id) {
                log::debug!("landmark {} no longer reported, marking extracted", id);
                self.extracted.insert(id);
            }
        }
    }

    /// Nearest known, uncollected landmark of a needed type; equal ranges go to the smaller id
    pub fn select_target(&self, needed: &[char], position: Point2D) -> Option<Target> {
        let heading = self.slam.heading();
        self.slam
            .landmark_estimates()
            .filter(|(id, _)| !self.extracted.contains(*id))
            .filter_map(|(id, lm)| {
                let kind = *self.landmark_types.get(id)?;
                if !needed.contains(&kind) {
                    return None;
                }
                Some(Target {
                    id: id.clone(),
                    kind,
                    position: lm,
                    distance: position.distance(&lm),
                    bearing: normalize_angle(position.bearing_to(&lm) - heading),
                })
            })
            .min_by(closer)
    }

    /// Steering and distance for a step towards a goal `remaining` away at `bearing`
    ///
    /// A turn beyond `max_steering` is clamped and becomes a turn-only step.
    pub fn approach(&self, bearing: f64, remaining: f64) -> (f64, f64) {
        let max_steering = self.config.max_steering;
        let mut distance = remaining.min(self.config.max_distance);
        let steering = if bearing.abs() > max_steering {
            distance = 0.0;
            max_steering.copysign(bearing)
        } else {
            bearing
        };
        distance = distance.min(self.config.approach_gain * remaining);
        if remaining < self.config.slow_zone {
            distance = distance.min(self.config.slow_step);
        }
        (steering, distance)
    }

    /// Steering and distance for the next search step
    fn search(&mut self) -> (f64, f64) {
        self.search_radius += self.config.search_increment;
        self.failed_searches += 1;
        let steering = if self.failed_searches % self.config.sweep_period == 0 {
            self.config.max_steering
        } else {
            0.0
        };
        log::debug!(
            "no needed landmark known, search #{} stride {:.2} steering {:.3}",
            self.failed_searches,
            self.search_radius,
            steering
        );
        (steering, self.search_radius.min(self.config.max_distance))
    }

    fn estimates(&self, position: Point2D) -> BTreeMap<String, Point2D> {
        let mut estimates: BTreeMap<String, Point2D> = self
            .slam
            .landmark_estimates()
            .map(|(id, p)| (id.clone(), p))
            .collect();
        estimates.insert(SELF_KEY.to_string(), position);
        estimates
    }

    /// Plan one step
    pub fn plan(&mut self, needed: &[char], measurements: &Measurements) -> RoboticsResult<PlannerStep> {
        let mut position = self.slam.process_measurement_entries(measurements)?;
        self.record_types(measurements);
        self.settle_extraction(measurements);

        self.target = self.select_target(needed, position);
        let action = match self.target.clone() {
            Some(target) if target.distance < self.config.extraction_tolerance => {
                self.failed_searches = 0;
                log::info!(
                    "extracting {} ({}) at ({:.3}, {:.3}), estimated range {:.3}",
                    target.kind,
                    target.id,
                    position.x,
                    position.y,
                    target.distance
                );
                self.pending_extraction = Some(target.id.clone());
                Action::Extract { kind: target.kind, x: position.x, y: position.y }
            }
            Some(target) => {
                self.failed_searches = 0;
                let (steering, distance) = self.approach(target.bearing, target.distance);
                log::debug!(
                    "target {} ({}) range {:.3} bearing {:.3} -> move {:.3} {:.3}",
                    target.id,
                    target.kind,
                    target.distance,
                    target.bearing,
                    steering,
                    distance
                );
                position = self.slam.advance(steering, distance)?;
                Action::Move { steering, distance }
            }
            None => {
                if !needed.is_empty() {
                    log::trace!("needed types: {}", needed.iter().join(","));
                }
                let (steering, distance) = self.search();
                position = self.slam.advance(steering, distance)?;
                Action::Move { steering, distance }
            }
        };

        Ok(PlannerStep { action, estimates: self.estimates(position) })
    }
}

impl MissionPlanner for ExtractionPlanner {
    fn next_move(&mut self, needed: &[char], measurements: &Measurements) -> RoboticsResult<PlannerStep> {
        self.plan(needed, measurements)
    }
}
