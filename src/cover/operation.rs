use std::fmt;

use serde::Serialize;

/// What the door is believed to be doing right now
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
  #[default]
  #[serde(rename = "IDLE")]
  Idle,
  #[serde(rename = "OPENING")]
  Opening,
  #[serde(rename = "CLOSING")]
  Closing,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operation::Idle => write!(f, "IDLE"),
      Operation::Opening => write!(f, "OPENING"),
      Operation::Closing => write!(f, "CLOSING"),
    }
  }
}

impl Operation {
  /// The direction of travel, `None` if idle
  pub fn direction(self) -> Option<Direction> {
    match self {
      Operation::Idle => None,
      Operation::Opening => Some(Direction::Opening),
      Operation::Closing => Some(Direction::Closing),
    }
  }

  pub fn is_idle(self) -> bool {
    self == Operation::Idle
  }
}

/// A direction of travel. Unlike [`Operation`] this can never be idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Opening,
  Closing,
}

impl Direction {
  pub fn reversed(self) -> Direction {
    match self {
      Direction::Opening => Direction::Closing,
      Direction::Closing => Direction::Opening,
    }
  }

  /// +1 when opening, -1 when closing
  pub fn sign(self) -> f32 {
    match self {
      Direction::Opening => 1.0,
      Direction::Closing => -1.0,
    }
  }
}

impl From<Direction> for Operation {
  fn from(direction: Direction) -> Self {
    match direction {
      Direction::Opening => Operation::Opening,
      Direction::Closing => Operation::Closing,
    }
  }
}

impl PartialEq<Direction> for Operation {
  fn eq(&self, other: &Direction) -> bool {
    matches!(
      (self, other),
      (Operation::Opening, Direction::Opening) | (Operation::Closing, Direction::Closing)
    )
  }
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Operation::from(*self).fmt(f)
  }
}
