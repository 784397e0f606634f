use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use super::{pending::PENDING_TIMEOUT_MS, trigger::Press};
use crate::error::{GdoError, GdoResult};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct CoverConfig {
  #[serde_as(as = "DurationMilliSeconds<u64>")]
  /// How long the door takes to travel from fully closed to fully open
  pub open_duration: Duration,

  #[serde_as(as = "DurationMilliSeconds<u64>")]
  /// How long the door takes to travel from fully open to fully closed
  pub close_duration: Duration,

  #[serde_as(as = "DurationMilliSeconds<u64>")]
  #[serde(default = "default_relay_on_duration")]
  /// How long the relay is held on for a single press
  pub relay_on_duration: Duration,

  #[serde_as(as = "DurationMilliSeconds<u64>")]
  #[serde(default = "default_pulse_delay")]
  /// The gap between consecutive presses of a double or triple press
  pub pulse_delay: Duration,

  /// The sensor reporting the door is fully open (if fitted)
  #[serde(default)]
  pub open_endstop: Option<EndstopConfig>,

  /// The sensor reporting the door is fully closed (if fitted)
  #[serde(default)]
  pub close_endstop: Option<EndstopConfig>,

  /// The position saved before the last restart, if any
  #[serde(default)]
  pub restored_position: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndstopConfig {
  pub name: String,
}

fn default_relay_on_duration() -> Duration {
  Duration::from_millis(100)
}

fn default_pulse_delay() -> Duration {
  Duration::from_millis(1000)
}

impl CoverConfig {
  /// A config with the default press timings and no endstops
  pub fn new(open_duration: Duration, close_duration: Duration) -> Self {
    CoverConfig {
      open_duration,
      close_duration,
      relay_on_duration: default_relay_on_duration(),
      pulse_delay: default_pulse_delay(),
      open_endstop: None,
      close_endstop: None,
      restored_position: None,
    }
  }

  pub fn validate(&self) -> GdoResult<()> {
    if self.open_duration.is_zero() {
      return Err(GdoError::InvalidConfig("open_duration must be positive".into()));
    }
    if self.close_duration.is_zero() {
      return Err(GdoError::InvalidConfig("close_duration must be positive".into()));
    }
    match self.checked_press_duration_ms(Press::Triple.count()) {
      Some(longest) if longest < PENDING_TIMEOUT_MS => {}
      Some(longest) => {
        return Err(GdoError::InvalidConfig(format!(
          "a triple press takes {longest}ms, which must be under the {PENDING_TIMEOUT_MS}ms pending timeout"
        )));
      }
      None => {
        return Err(GdoError::InvalidConfig(
          "relay_on_duration and pulse_delay are too long for a triple press".into(),
        ));
      }
    }
    if let Some(position) = self.restored_position {
      if !(0.0..=1.0).contains(&position) {
        return Err(GdoError::InvalidConfig(format!(
          "restored_position must be between 0 and 1, got {position}"
        )));
      }
    }
    Ok(())
  }

  /// Milliseconds the relay is busy for a burst of `presses` presses
  ///
  /// Saturates at `u32::MAX`, which `validate` never lets through.
  pub fn press_duration_ms(&self, presses: u32) -> u32 {
    self.checked_press_duration_ms(presses).unwrap_or(u32::MAX)
  }

  fn checked_press_duration_ms(&self, presses: u32) -> Option<u32> {
    if presses == 0 {
      return Some(0);
    }
    let relay_on = u32::try_from(self.relay_on_duration.as_millis()).ok()?;
    let pulse_delay = u32::try_from(self.pulse_delay.as_millis()).ok()?;
    presses
      .checked_mul(relay_on)?
      .checked_add((presses - 1).checked_mul(pulse_delay)?)
  }
}
