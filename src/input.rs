//! Console commands accepted by the host binary, one per line.
//!
//! ```text
//! open | close | stop
//! position <0.0..=1.0>
//! open_endstop on|off
//! close_endstop on|off
//! ```

use std::str::FromStr;

use crate::{
  cover::{CoverCall, CoverEvent, EndstopKind},
  error::GdoError,
};

impl FromStr for CoverEvent {
  type Err = GdoError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || GdoError::InvalidInput(s.trim().to_string());
    let mut words = s.split_whitespace();
    let command = words.next().ok_or_else(invalid)?.to_ascii_lowercase();
    let argument = words.next();
    if words.next().is_some() {
      return Err(invalid());
    }

    let event = match (command.as_str(), argument) {
      ("open", None) => CoverEvent::Control(CoverCall::open()),
      ("close", None) => CoverEvent::Control(CoverCall::close()),
      ("stop", None) => CoverEvent::Control(CoverCall::stop()),
      ("position", Some(position)) => {
        let position = position.parse::<f32>().map_err(|_| invalid())?;
        CoverEvent::Control(CoverCall::position(position))
      }
      ("open_endstop", Some(state)) => CoverEvent::Endstop {
        kind: EndstopKind::Open,
        active: parse_state(state).ok_or_else(invalid)?,
      },
      ("close_endstop", Some(state)) => CoverEvent::Endstop {
        kind: EndstopKind::Closed,
        active: parse_state(state).ok_or_else(invalid)?,
      },
      _ => return Err(invalid()),
    };
    Ok(event)
  }
}

fn parse_state(state: &str) -> Option<bool> {
  match state.to_ascii_lowercase().as_str() {
    "on" | "true" | "1" => Some(true),
    "off" | "false" | "0" => Some(false),
    _ => None,
  }
}
