//! Common types used throughout gem_slam

use nalgebra::Vector2;
use std::collections::HashMap;
use std::f64::consts::PI;

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Absolute angle of the vector from `self` to `other`, measured from the x axis
    pub fn bearing_to(&self, other: &Point2D) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Normalize angle to (-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Opaque landmark identifier, stable across measurement batches
pub type LandmarkId = String;

/// Range/bearing reading of a single landmark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkMeasurement {
    /// Range to the landmark
    pub distance: f64,
    /// Angle relative to the robot's current heading [rad]
    pub bearing: f64,
    /// Single-character landmark category
    pub kind: char,
}

impl LandmarkMeasurement {
    pub fn new(distance: f64, bearing: f64, kind: char) -> Self {
        Self { distance, bearing, kind }
    }
}

/// One batch of currently visible landmarks
pub type Measurements = HashMap<LandmarkId, LandmarkMeasurement>;
