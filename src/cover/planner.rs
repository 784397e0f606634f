use log::{info, warn};

use super::{
  config::CoverConfig,
  operation::{Direction, Operation},
  position::{CLOSED, OPEN},
  trigger::Press,
};

/// Choose the press needed to move the opener from `current` to `requested`.
///
/// One press steps the opener through its open, stop, close, stop cycle, so the number of presses depends on where
/// the opener's own cycle is believed to be. Returns `None` if nothing should be sent.
pub fn select_press(
  requested: Operation,
  current: Operation,
  position: f32,
  last_direction: Option<Direction>,
) -> Option<Press> {
  match (requested.direction(), current.direction()) {
    (None, None) => None,
    (None, Some(moving)) => {
      info!("Door is {moving}. Asked to stop.");
      Some(Press::Single)
    }
    (Some(requested), Some(moving)) if requested == moving => None,
    (Some(requested), Some(moving)) => {
      info!("Door is {moving}. Asked to reverse and start {requested}.");
      Some(Press::Double)
    }
    (Some(requested), None) => select_from_rest(requested, position, last_direction),
  }
}

fn select_from_rest(requested: Direction, position: f32, last_direction: Option<Direction>) -> Option<Press> {
  let (start, end) = match requested {
    Direction::Opening => (CLOSED, OPEN),
    Direction::Closing => (OPEN, CLOSED),
  };

  if position == end {
    warn!("Door is already at the end of travel. Cannot start {requested}.");
    None
  }
  else if position == start {
    info!("Door is at the start of travel. Asked to start {requested}.");
    Some(Press::Single)
  }
  else {
    match last_direction {
      Some(last) if last == requested => {
        info!("Door stopped while {last}. Asked to resume {requested} (same direction).");
        Some(Press::Triple)
      }
      Some(last) => {
        info!("Door stopped while {last}. Asked to start {requested} (opposite direction).");
        Some(Press::Single)
      }
      None => {
        // no record of the last direction, guess that the opener will reverse
        info!("Door is partially open (unknown direction). Asked to start {requested}.");
        Some(Press::Single)
      }
    }
  }
}

/// How long after sending `press` the door is expected to actually start moving towards `requested`.
///
/// Stops take effect immediately, as do movements started by something other than our own press.
pub fn action_delay(press: Option<Press>, requested: Operation, config: &CoverConfig) -> u32 {
  match press {
    Some(press) if !requested.is_idle() => config.press_duration_ms(press.count()),
    _ => 0,
  }
}
