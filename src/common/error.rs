//! Error types for gem_slam

use std::fmt;

/// Main error type for the estimator, planner and simulator
#[derive(Debug, Clone, PartialEq)]
pub enum RoboticsError {
    /// Linear-algebra operands have incompatible shapes
    DimensionMismatch(String),
    /// Matrix inversion or solve failed
    SingularMatrix(String),
    /// Lookup of a landmark that was never observed
    UnknownLandmark(String),
    /// Invalid parameter
    InvalidParameter(String),
    /// Malformed action string
    InvalidAction(String),
}

impl fmt::Display for RoboticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoboticsError::DimensionMismatch(msg) => write!(f, "Dimension mismatch: {}", msg),
            RoboticsError::SingularMatrix(msg) => write!(f, "Singular matrix: {}", msg),
            RoboticsError::UnknownLandmark(id) => write!(f, "Unknown landmark: {}", id),
            RoboticsError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            RoboticsError::InvalidAction(msg) => write!(f, "Invalid action: {}", msg),
        }
    }
}

impl std::error::Error for RoboticsError {}

/// Result type alias for robotics operations
pub type RoboticsResult<T> = Result<T, RoboticsError>;
