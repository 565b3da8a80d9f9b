//! Actions emitted by the extraction planner
//!
//! Wire forms:
//! - `move <steering> <distance>`
//! - `extract <type> <x> <y>`

use std::fmt;
use std::str::FromStr;

use crate::common::{Point2D, RoboticsError};

/// One command for the robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Turn by `steering` [rad], then drive `distance`
    Move { steering: f64, distance: f64 },
    /// Try to extract a landmark of type `kind`, reporting the estimated position (x, y)
    Extract { kind: char, x: f64, y: f64 },
}

impl Action {
    pub fn is_extract(&self) -> bool {
        matches!(self, Action::Extract { .. })
    }

    /// Reported position of an extraction
    pub fn reported_position(&self) -> Option<Point2D> {
        match *self {
            Action::Extract { x, y, .. } => Some(Point2D::new(x, y)),
            Action::Move { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { steering, distance } => write!(f, "move {} {}", steering, distance),
            Action::Extract { kind, x, y } => write!(f, "extract {} {} {}", kind, x, y),
        }
    }
}

fn parse_number(token: Option<&str>, what: &str, line: &str) -> Result<f64, RoboticsError> {
    token
        .ok_or_else(|| RoboticsError::InvalidAction(format!("missing {} in '{}'", what, line)))?
        .parse::<f64>()
        .map_err(|_| RoboticsError::InvalidAction(format!("bad {} in '{}'", what, line)))
}

impl FromStr for Action {
    type Err = RoboticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let action = match tokens.next() {
            Some("move") => {
                let steering = parse_number(tokens.next(), "steering", s)?;
                let distance = parse_number(tokens.next(), "distance", s)?;
                Action::Move { steering, distance }
            }
            Some("extract") => {
                let kind_token = tokens
                    .next()
                    .ok_or_else(|| RoboticsError::InvalidAction(format!("missing type in '{}'", s)))?;
                let mut chars = kind_token.chars();
                let kind = match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(RoboticsError::InvalidAction(format!(
                            "type must be a single character in '{}'",
                            s
                        )))
                    }
                };
                let x = parse_number(tokens.next(), "x", s)?;
                let y = parse_number(tokens.next(), "y", s)?;
                Action::Extract { kind, x, y }
            }
            _ => return Err(RoboticsError::InvalidAction(format!("unknown action '{}'", s))),
        };
        if tokens.next().is_some() {
            return Err(RoboticsError::InvalidAction(format!("trailing tokens in '{}'", s)));
        }
        Ok(action)
    }
}
