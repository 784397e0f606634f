use std::fmt;

use super::{
  config::{CoverConfig, EndstopConfig},
  operation::Direction,
  position::{CLOSED, OPEN},
};

/// Which travel extreme an endstop reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndstopKind {
  Open,
  Closed,
}

impl EndstopKind {
  /// The position the door is at while this endstop is active
  pub fn position(self) -> f32 {
    match self {
      EndstopKind::Open => OPEN,
      EndstopKind::Closed => CLOSED,
    }
  }

  /// The direction the door travels in to reach this endstop
  pub fn arrival(self) -> Direction {
    match self {
      EndstopKind::Open => Direction::Opening,
      EndstopKind::Closed => Direction::Closing,
    }
  }

  /// The direction the door travels in when it leaves this endstop
  pub fn departure(self) -> Direction {
    self.arrival().reversed()
  }
}

impl fmt::Display for EndstopKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EndstopKind::Open => write!(f, "open_endstop"),
      EndstopKind::Closed => write!(f, "close_endstop"),
    }
  }
}

/// The last known reading of a binary endstop sensor
#[derive(Debug, Clone)]
pub struct Endstop {
  name: String,
  /// `None` until the sensor has reported at least once
  state: Option<bool>,
}

impl Endstop {
  pub fn new(name: impl Into<String>) -> Self {
    Endstop {
      name: name.into(),
      state: None,
    }
  }

  pub fn with_state(name: impl Into<String>, active: bool) -> Self {
    Endstop {
      name: name.into(),
      state: Some(active),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn has_state(&self) -> bool {
    self.state.is_some()
  }

  /// An endstop that has never reported counts as inactive
  pub fn is_active(&self) -> bool {
    self.state == Some(true)
  }

  /// Record a new reading, returning the previous one
  pub fn update(&mut self, active: bool) -> Option<bool> {
    self.state.replace(active)
  }
}

impl From<&EndstopConfig> for Endstop {
  fn from(config: &EndstopConfig) -> Self {
    Endstop::new(config.name.clone())
  }
}

/// The (optional) endstops fitted to a door
#[derive(Debug, Clone, Default)]
pub struct Endstops {
  pub open: Option<Endstop>,
  pub closed: Option<Endstop>,
}

impl Endstops {
  pub fn from_config(config: &CoverConfig) -> Self {
    Endstops {
      open: config.open_endstop.as_ref().map(Endstop::from),
      closed: config.close_endstop.as_ref().map(Endstop::from),
    }
  }

  pub fn with_open(mut self, endstop: Endstop) -> Self {
    self.open = Some(endstop);
    self
  }

  pub fn with_closed(mut self, endstop: Endstop) -> Self {
    self.closed = Some(endstop);
    self
  }

  pub fn get(&self, kind: EndstopKind) -> Option<&Endstop> {
    match kind {
      EndstopKind::Open => self.open.as_ref(),
      EndstopKind::Closed => self.closed.as_ref(),
    }
  }

  pub fn get_mut(&mut self, kind: EndstopKind) -> Option<&mut Endstop> {
    match kind {
      EndstopKind::Open => self.open.as_mut(),
      EndstopKind::Closed => self.closed.as_mut(),
    }
  }

  pub fn is_fitted(&self, kind: EndstopKind) -> bool {
    self.get(kind).is_some()
  }

  /// True if the endstop is fitted and currently active
  pub fn is_active(&self, kind: EndstopKind) -> bool {
    self.get(kind).map_or(false, Endstop::is_active)
  }

  /// The position reported by whichever endstop is active, closed taking precedence
  pub fn sensed_position(&self) -> Option<f32> {
    [EndstopKind::Closed, EndstopKind::Open]
      .into_iter()
      .find(|kind| self.is_active(*kind))
      .map(EndstopKind::position)
  }
}
