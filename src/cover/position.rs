use std::time::Duration;

use super::operation::Direction;

/// Fully closed
pub const CLOSED: f32 = 0.0;
/// Fully open
pub const OPEN: f32 = 1.0;
/// No reliable estimate exists
pub const UNKNOWN: f32 = 0.5;

/// Milliseconds elapsed between two readings of the wrapping millisecond clock.
pub fn millis_since(now: u32, since: u32) -> u32 {
  now.wrapping_sub(since)
}

/// Advance `position` by `elapsed_ms` of travel in `direction`, assuming a constant speed that covers the full range
/// in `travel_duration`.
///
/// The result is always within [`CLOSED`, `OPEN`].
pub fn advance(position: f32, direction: Direction, elapsed_ms: u32, travel_duration: Duration) -> f32 {
  let travel_ms = travel_duration.as_millis() as f32;
  let advanced = if travel_ms > 0.0 {
    position + direction.sign() * elapsed_ms as f32 / travel_ms
  }
  else {
    // a door with no travel time arrives instantly
    direction.sign()
  };
  advanced.clamp(CLOSED, OPEN)
}

/// The position at the end of travel in `direction`
pub fn destination(direction: Direction) -> f32 {
  match direction {
    Direction::Opening => OPEN,
    Direction::Closing => CLOSED,
  }
}

/// True if `position` is exactly one of the extremes
pub fn is_extreme(position: f32) -> bool {
  position == CLOSED || position == OPEN
}
