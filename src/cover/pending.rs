use super::{operation::Direction, position::millis_since};

/// How long an operation may stay pending before the command is assumed to have failed
pub const PENDING_TIMEOUT_MS: u32 = 3000;

/// What confirms a pending operation has physically started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
  /// The endstop the door is resting on releases
  Sensor,
  /// The presses have had `delay` milliseconds to take effect
  Timer { delay: u32 },
}

/// An operation that has been commanded but not yet confirmed as underway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
  pub direction: Direction,
  /// When the operation was commanded
  pub since: u32,
  pub activation: Activation,
}

impl Pending {
  pub fn deferred_by_sensor(direction: Direction, now: u32) -> Self {
    Pending {
      direction,
      since: now,
      activation: Activation::Sensor,
    }
  }

  pub fn deferred_by_timer(direction: Direction, now: u32, delay: u32) -> Self {
    Pending {
      direction,
      since: now,
      activation: Activation::Timer { delay },
    }
  }

  /// When the action delay ends, or 0 when activation is left to the sensor.
  ///
  /// A deadline that wraps to exactly 0 is reported as 1 so that 0 keeps meaning "no countdown".
  pub fn action_delay_end_time(&self) -> u32 {
    match self.activation {
      Activation::Sensor => 0,
      Activation::Timer { delay } => self.since.wrapping_add(delay).max(1),
    }
  }

  pub fn delay_expired(&self, now: u32) -> bool {
    match self.activation {
      Activation::Sensor => false,
      Activation::Timer { delay } => millis_since(now, self.since) >= delay,
    }
  }

  pub fn timed_out(&self, now: u32) -> bool {
    millis_since(now, self.since) > PENDING_TIMEOUT_MS
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sensor_deferral_has_no_deadline() {
    let pending = Pending::deferred_by_sensor(Direction::Opening, 1000);
    assert_eq!(pending.action_delay_end_time(), 0);
    assert!(!pending.delay_expired(u32::MAX));
  }

  #[test]
  fn timer_expires_after_delay() {
    let pending = Pending::deferred_by_timer(Direction::Closing, 1000, 1200);
    assert_eq!(pending.action_delay_end_time(), 2200);
    assert!(!pending.delay_expired(2199));
    assert!(pending.delay_expired(2200));
  }

  #[test]
  fn timer_survives_clock_wraparound() {
    let pending = Pending::deferred_by_timer(Direction::Opening, u32::MAX - 49, 100);
    assert!(!pending.delay_expired(u32::MAX));
    assert!(pending.delay_expired(50));
  }

  #[test]
  fn deadline_wrapping_to_zero_is_still_counting_down() {
    let pending = Pending::deferred_by_timer(Direction::Opening, u32::MAX - 99, 100);
    assert_eq!(pending.action_delay_end_time(), 1);
    assert!(!pending.delay_expired(u32::MAX));
    assert!(pending.delay_expired(0));
  }

  #[test]
  fn times_out_after_three_seconds() {
    let pending = Pending::deferred_by_sensor(Direction::Opening, 500);
    assert!(!pending.timed_out(3500));
    assert!(pending.timed_out(3501));
  }
}
