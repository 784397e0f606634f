use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

pub use self::{
  config::{CoverConfig, EndstopConfig},
  endstop::{Endstop, EndstopKind, Endstops},
  operation::{Direction, Operation},
  pending::{Activation, Pending, PENDING_TIMEOUT_MS},
  trigger::{Press, PressTrigger, Relay, RemoteTrigger, Triggers},
};
use self::{
  planner::{action_delay, select_press},
  position::{advance, destination, is_extreme, millis_since, CLOSED, OPEN, UNKNOWN},
};
use crate::error::GdoResult;

pub mod config;
pub mod endstop;
pub mod operation;
pub mod pending;
pub mod planner;
pub mod position;
pub mod trigger;

/// How often the position is published while the door is moving
const PUBLISH_INTERVAL_MS: u32 = 1000;

/// What the cover supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverTraits {
  pub supports_stop: bool,
  pub supports_position: bool,
}

/// A request to move or stop the door
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoverCall {
  pub stop: bool,
  pub position: Option<f32>,
}

impl CoverCall {
  pub fn open() -> Self {
    CoverCall::position(OPEN)
  }

  pub fn close() -> Self {
    CoverCall::position(CLOSED)
  }

  pub fn stop() -> Self {
    CoverCall {
      stop: true,
      position: None,
    }
  }

  pub fn position(position: f32) -> Self {
    CoverCall {
      stop: false,
      position: Some(position),
    }
  }
}

/// Everything the cover reacts to besides the periodic tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoverEvent {
  Control(CoverCall),
  /// An endstop sensor reported a reading
  Endstop { kind: EndstopKind, active: bool },
}

/// The state published to whoever is watching the door
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CoverState {
  pub position: f32,
  pub current_operation: Operation,
}

/// A garage door opener driven by a single push button, with its position estimated from travel time and corrected by
/// optional open and closed endstops.
///
/// All methods take `now`, a reading of a wrapping millisecond clock.
#[derive(Debug)]
pub struct GdoCover {
  config: CoverConfig,
  endstops: Endstops,
  triggers: Triggers,
  /// The last press sent, which may still be in progress
  prev_trigger: Option<Press>,
  state_tx: UnboundedSender<CoverState>,

  position: f32,
  target_position: f32,
  current_operation: Operation,
  pending: Option<Pending>,
  /// The direction the door was last moving in before it came to rest
  last_direction_before_idle: Option<Direction>,

  /// When the current operation was confirmed as started
  start_dir_time: u32,
  last_recompute_time: u32,
  last_publish_time: u32,
}

impl fmt::Display for GdoCover {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "GdoCover")
  }
}

impl GdoCover {
  pub fn new(
    config: CoverConfig,
    endstops: Endstops,
    triggers: Triggers,
    state_tx: UnboundedSender<CoverState>,
  ) -> GdoResult<GdoCover> {
    config.validate()?;

    let mut position = config.restored_position.unwrap_or(UNKNOWN);
    // the restored position can't be trusted if an endstop disagrees with it
    for kind in [EndstopKind::Open, EndstopKind::Closed] {
      if let Some(endstop) = endstops.get(kind).filter(|endstop| endstop.has_state()) {
        if endstop.is_active() {
          position = kind.position();
        }
        else if position == kind.position() {
          position = UNKNOWN;
        }
      }
    }

    Ok(GdoCover {
      config,
      endstops,
      triggers,
      prev_trigger: None,
      state_tx,
      position,
      target_position: position,
      current_operation: Operation::Idle,
      pending: None,
      last_direction_before_idle: None,
      start_dir_time: 0,
      last_recompute_time: 0,
      last_publish_time: 0,
    })
  }

  pub fn dump_config(&self) {
    info!("Time based endstop cover");
    match self.endstops.get(EndstopKind::Open) {
      Some(endstop) => info!("  Open endstop: '{}'", endstop.name()),
      None => info!("  Open endstop: none"),
    }
    info!("  Open duration: {:.1}s", self.config.open_duration.as_secs_f32());
    match self.endstops.get(EndstopKind::Closed) {
      Some(endstop) => info!("  Close endstop: '{}'", endstop.name()),
      None => info!("  Close endstop: none"),
    }
    info!("  Close duration: {:.1}s", self.config.close_duration.as_secs_f32());
  }

  pub fn traits(&self) -> CoverTraits {
    CoverTraits {
      supports_stop: true,
      supports_position: true,
    }
  }

  pub fn position(&self) -> f32 {
    self.position
  }

  pub fn target_position(&self) -> f32 {
    self.target_position
  }

  pub fn current_operation(&self) -> Operation {
    self.current_operation
  }

  /// The operation waiting to be confirmed, or idle if there is none
  pub fn pending_operation(&self) -> Operation {
    self.pending.map_or(Operation::Idle, |pending| pending.direction.into())
  }

  pub fn pending(&self) -> Option<&Pending> {
    self.pending.as_ref()
  }

  /// When the current action delay ends, or 0 if nothing is counting down
  pub fn action_delay_end_time(&self) -> u32 {
    self.pending.map_or(0, |pending| pending.action_delay_end_time())
  }

  pub fn last_direction_before_idle(&self) -> Option<Direction> {
    self.last_direction_before_idle
  }

  pub fn endstops(&self) -> &Endstops {
    &self.endstops
  }

  pub fn state(&self) -> CoverState {
    CoverState {
      position: self.position,
      current_operation: self.current_operation,
    }
  }

  pub fn handle_event(&mut self, event: CoverEvent, now: u32) {
    match event {
      CoverEvent::Control(call) => self.control(call, now),
      CoverEvent::Endstop { kind, active } => self.endstop_changed(kind, active, now),
    }
  }

  pub fn control(&mut self, call: CoverCall, now: u32) {
    if call.stop {
      self.start_direction(Operation::Idle, true, now);
      self.publish();
    }

    if let Some(requested) = call.position {
      if requested.is_nan() {
        warn!("{} ignoring request to move to an invalid position", self);
        return;
      }
      let position = requested.clamp(CLOSED, OPEN);
      if position != requested {
        warn!("{} requested position {} is out of range, using {}", self, requested, position);
      }

      if position == self.position {
        info!("Nothing to do. Already at target position.");
      }
      else {
        let operation = if position < self.position {
          Operation::Closing
        }
        else {
          Operation::Opening
        };
        self.target_position = position;
        self.start_direction(operation, true, now);
        self.publish();
      }
    }
  }

  /// Runs every loop iteration
  pub fn tick(&mut self, now: u32) {
    if self.current_operation.is_idle() && self.pending.is_none() {
      self.correct_idle_position();
    }

    if let Some(pending) = self.pending.filter(|pending| pending.delay_expired(now)) {
      info!("Action delay completed, activating {} operation", pending.direction);
      self.activate(pending.direction, now);
      self.publish();
    }

    if let Some(pending) = self.pending.filter(|pending| pending.timed_out(now)) {
      warn!(
        "Pending operation timed out after {}ms. Door did not start moving.",
        millis_since(now, pending.since)
      );
      self.pending = None;
      self.position = self.sensed_position();
      if !self.current_operation.is_idle() {
        // a reversal that never landed leaves the door's motion unknown too
        self.go_idle();
      }
      self.publish();
    }

    if self.current_operation.is_idle() {
      return;
    }

    self.recompute_position(now);

    if self.is_at_target() {
      if is_extreme(self.target_position) {
        // the opener stops by itself at the end of travel
        self.go_idle();
      }
      else {
        self.start_direction(Operation::Idle, true, now);
      }
      self.publish();
    }
    else if self.travel_timed_out(now) {
      info!("Failed to reach endstop. Likely stopped externally.");
      self.position = self.sensed_position();
      self.go_idle();
      self.publish();
    }

    if millis_since(now, self.last_publish_time) > PUBLISH_INTERVAL_MS {
      self.publish();
      self.last_publish_time = now;
    }
  }

  fn endstop_changed(&mut self, kind: EndstopKind, active: bool, now: u32) {
    let Some(endstop) = self.endstops.get_mut(kind)
    else {
      warn!("{} got a reading from {}, which is not configured", self, kind);
      return;
    };

    match (endstop.update(active), active) {
      (Some(previous), _) if previous == active => {}
      (_, true) => self.endstop_reached(kind, now),
      (Some(_), false) => self.endstop_released(kind, now),
      (None, false) => debug!("{} initially released", kind),
    }
  }

  fn endstop_reached(&mut self, kind: EndstopKind, now: u32) {
    let took = millis_since(now, self.start_dir_time) as f32 / 1e3;
    info!("{} reached. Took {:.1}s.", kind, took);
    self.position = kind.position();
    self.target_position = kind.position();
    self.go_idle();
    self.publish();
  }

  fn endstop_released(&mut self, kind: EndstopKind, now: u32) {
    info!("{} released.", kind);
    if !self.current_operation.is_idle() {
      return;
    }

    let departure = kind.departure();
    if self.pending.map_or(false, |pending| pending.direction == departure) {
      info!("Sensor confirmed door movement, activating pending {} operation", departure);
      self.activate(departure, now);
      self.publish();
    }
    else {
      // someone else pressed the button, track the door without pressing it ourselves
      info!("{} moved by external control, assuming it is {}", self, departure);
      self.target_position = destination(departure);
      self.start_direction(departure.into(), false, now);
      self.publish();
    }
  }

  /// Decide which press (if any) moves the door in `requested`, send it and update the operation state.
  ///
  /// With `perform_trigger` unset no press is sent; the state is updated as though the door started by itself.
  fn start_direction(&mut self, requested: Operation, perform_trigger: bool, now: u32) {
    if requested == self.current_operation {
      info!("Nothing to do. Operation {} didn't change.", requested);
      return;
    }

    self.recompute_position(now);
    let Some(press) = select_press(
      requested,
      self.current_operation,
      self.position,
      self.last_direction_before_idle,
    )
    else {
      return;
    };

    if let Some(direction) = self.current_operation.direction() {
      self.last_direction_before_idle = Some(direction);
    }

    // starting from an endstop, wait for it to release rather than trusting a timer
    let defer_state_change = requested.direction().map_or(false, |direction| {
      let leaving = match direction {
        Direction::Opening => EndstopKind::Closed,
        Direction::Closing => EndstopKind::Open,
      };
      let active = self.endstops.is_active(leaving);
      if self.endstops.is_fitted(leaving) {
        debug!("Checking {} state: {}", leaving, active);
      }
      active
    });

    let delay = if perform_trigger {
      action_delay(Some(press), requested, &self.config)
    }
    else {
      0
    };
    debug!("Action delay calculated: {}ms", delay);

    match requested.direction() {
      Some(direction) if defer_state_change => {
        self.pending = Some(Pending::deferred_by_sensor(direction, now));
        info!(
          "Deferred state change until the endstop releases. Current operation stays {}, pending operation set to {}",
          self.current_operation, direction
        );
      }
      Some(direction) if delay > 0 => {
        self.pending = Some(Pending::deferred_by_timer(direction, now, delay));
        info!(
          "Deferring state change for {}ms action delay. Pending operation set to {}",
          delay, direction
        );
      }
      _ => {
        self.current_operation = requested;
        self.pending = None;
        self.start_dir_time = now;
        self.last_recompute_time = now;
        debug!("Immediate state change. Current operation set to {}", requested);
      }
    }

    if perform_trigger {
      self.stop_prev_trigger();
      self.triggers.get_mut(press).fire();
      self.prev_trigger = Some(press);
    }
  }

  fn stop_prev_trigger(&mut self) {
    if let Some(press) = self.prev_trigger.take() {
      self.triggers.get_mut(press).cancel();
    }
  }

  fn recompute_position(&mut self, now: u32) {
    let Some(direction) = self.current_operation.direction()
    else {
      return;
    };
    let travel_duration = match direction {
      Direction::Opening => self.config.open_duration,
      Direction::Closing => self.config.close_duration,
    };
    let elapsed = millis_since(now, self.last_recompute_time);
    self.position = advance(self.position, direction, elapsed, travel_duration);
    self.last_recompute_time = now;
  }

  fn is_at_target(&self) -> bool {
    // waiting to change direction
    if self
      .pending
      .map_or(false, |pending| self.current_operation != pending.direction)
    {
      return false;
    }

    match self.current_operation {
      Operation::Opening => match self.endstops.get(EndstopKind::Open) {
        Some(endstop) if self.target_position == OPEN => endstop.is_active(),
        _ => self.position >= self.target_position,
      },
      Operation::Closing => match self.endstops.get(EndstopKind::Closed) {
        Some(endstop) if self.target_position == CLOSED => endstop.is_active(),
        _ => self.position <= self.target_position,
      },
      Operation::Idle => true,
    }
  }

  /// True if the door has been travelling for longer than a full travel without reaching its endstop
  fn travel_timed_out(&self, now: u32) -> bool {
    let elapsed = millis_since(now, self.start_dir_time) as u128;
    match self.current_operation {
      Operation::Opening => {
        self.endstops.is_fitted(EndstopKind::Open) && elapsed > self.config.open_duration.as_millis()
      }
      Operation::Closing => {
        self.endstops.is_fitted(EndstopKind::Closed) && elapsed > self.config.close_duration.as_millis()
      }
      Operation::Idle => false,
    }
  }

  /// While at rest, snap the position to whichever endstop is active
  fn correct_idle_position(&mut self) {
    if let Some(sensed) = self.endstops.sensed_position() {
      if self.position != sensed {
        info!(
          "Correcting position: endstop is active but position was {:.0}%. Setting to {:.0}%.",
          self.position * 100.0,
          sensed * 100.0
        );
        self.position = sensed;
        self.publish();
      }
    }
  }

  /// The position according to the endstops, or unknown if neither is active
  fn sensed_position(&self) -> f32 {
    match self.endstops.sensed_position() {
      Some(position) => {
        info!("Endstop shows door at {:.0}%. Setting position.", position * 100.0);
        position
      }
      None => {
        info!("No sensor confirmation. Setting position to UNKNOWN.");
        UNKNOWN
      }
    }
  }

  fn activate(&mut self, direction: Direction, now: u32) {
    self.current_operation = direction.into();
    self.pending = None;
    self.start_dir_time = now;
    self.last_recompute_time = now;
  }

  fn go_idle(&mut self) {
    if let Some(direction) = self.current_operation.direction() {
      self.last_direction_before_idle = Some(direction);
    }
    self.current_operation = Operation::Idle;
    self.pending = None;
  }

  fn publish(&self) {
    if self.state_tx.send(self.state()).is_err() {
      warn!("{} state receiver closed, dropping update", self);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tokio::sync::mpsc;

  use super::*;

  #[derive(Debug)]
  struct NoopTrigger;

  impl PressTrigger for NoopTrigger {
    fn fire(&mut self) {}

    fn cancel(&mut self) {}
  }

  fn new_cover(endstops: Endstops, restored_position: Option<f32>) -> (GdoCover, mpsc::UnboundedReceiver<CoverState>) {
    let mut config = CoverConfig::new(Duration::from_secs(10), Duration::from_secs(8));
    config.restored_position = restored_position;
    let triggers = Triggers::new(Box::new(NoopTrigger), Box::new(NoopTrigger), Box::new(NoopTrigger));
    let (state_tx, state_rx) = mpsc::unbounded_channel();
    (GdoCover::new(config, endstops, triggers, state_tx).unwrap(), state_rx)
  }

  #[test]
  fn starts_unknown_without_restore() {
    let (cover, _) = new_cover(Endstops::default(), None);
    assert_eq!(cover.position(), UNKNOWN);
    assert_eq!(cover.current_operation(), Operation::Idle);
  }

  #[test]
  fn restore_is_corrected_by_endstops() {
    let endstops = Endstops::default().with_open(Endstop::with_state("open", false));
    let (cover, _) = new_cover(endstops, Some(OPEN));
    assert_eq!(cover.position(), UNKNOWN);

    let endstops = Endstops::default().with_closed(Endstop::with_state("closed", true));
    let (cover, _) = new_cover(endstops, Some(0.7));
    assert_eq!(cover.position(), CLOSED);

    // no reading yet, so nothing to correct with
    let endstops = Endstops::default().with_open(Endstop::new("open"));
    let (cover, _) = new_cover(endstops, Some(OPEN));
    assert_eq!(cover.position(), OPEN);
  }

  #[test]
  fn idle_position_snaps_to_active_endstop() {
    let endstops = Endstops::default().with_closed(Endstop::with_state("closed", true));
    let (mut cover, mut state_rx) = new_cover(endstops, None);
    cover.position = 0.3;

    cover.tick(1000);
    assert_eq!(cover.position(), CLOSED);
    assert_eq!(state_rx.try_recv().unwrap().position, CLOSED);

    // already correct, nothing more to publish
    cover.tick(1100);
    assert!(state_rx.try_recv().is_err());
  }

  #[test]
  fn mismatched_pending_is_never_at_target() {
    let (mut cover, _) = new_cover(Endstops::default(), Some(0.5));
    cover.current_operation = Operation::Closing;
    cover.target_position = 0.5;
    cover.pending = Some(Pending::deferred_by_timer(Direction::Opening, 0, 1200));
    assert!(!cover.is_at_target());

    cover.pending = None;
    assert!(cover.is_at_target());
  }

  #[test]
  fn pending_timer_times_out_to_unknown() {
    let (mut cover, mut state_rx) = new_cover(Endstops::default(), Some(CLOSED));
    cover.pending = Some(Pending::deferred_by_timer(Direction::Opening, 1000, PENDING_TIMEOUT_MS + 500));

    cover.tick(1000 + PENDING_TIMEOUT_MS);
    assert_eq!(cover.pending_operation(), Operation::Opening);

    cover.tick(1001 + PENDING_TIMEOUT_MS);
    assert!(cover.pending().is_none());
    assert_eq!(cover.current_operation(), Operation::Idle);
    assert_eq!(cover.position(), UNKNOWN);
    assert_eq!(cover.action_delay_end_time(), 0);
    assert_eq!(state_rx.try_recv().unwrap().position, UNKNOWN);
  }

  #[test]
  fn timed_out_reversal_stops_tracking() {
    let (mut cover, _) = new_cover(Endstops::default(), Some(0.5));
    cover.current_operation = Operation::Opening;
    cover.target_position = CLOSED;
    cover.start_dir_time = 1000;
    cover.last_recompute_time = 1000;
    cover.pending = Some(Pending::deferred_by_timer(Direction::Closing, 1000, PENDING_TIMEOUT_MS + 500));

    cover.tick(1001 + PENDING_TIMEOUT_MS);
    assert!(cover.pending().is_none());
    assert_eq!(cover.current_operation(), Operation::Idle);
    assert_eq!(cover.position(), UNKNOWN);
    assert_eq!(cover.last_direction_before_idle(), Some(Direction::Opening));
  }

  #[test]
  fn travel_timeout_reconciles_to_active_endstop() {
    let endstops = Endstops::default()
      .with_open(Endstop::with_state("open", false))
      .with_closed(Endstop::with_state("closed", true));
    let (mut cover, _) = new_cover(endstops, None);
    // the opener never moved off the closed endstop
    cover.current_operation = Operation::Opening;
    cover.target_position = OPEN;
    cover.start_dir_time = 1000;
    cover.last_recompute_time = 1000;

    cover.tick(11_000);
    assert_eq!(cover.current_operation(), Operation::Opening);

    cover.tick(11_001);
    assert_eq!(cover.current_operation(), Operation::Idle);
    assert_eq!(cover.position(), CLOSED);
    assert_eq!(cover.last_direction_before_idle(), Some(Direction::Opening));
  }

  #[test]
  fn idle_position_snaps_to_active_open_endstop() {
    let endstops = Endstops::default().with_open(Endstop::with_state("open", true));
    let (mut cover, mut state_rx) = new_cover(endstops, None);
    cover.position = 0.8;

    cover.tick(1000);
    assert_eq!(cover.position(), OPEN);
    assert_eq!(state_rx.try_recv().unwrap().position, OPEN);
  }

  #[test]
  fn recompute_is_a_no_op_while_idle() {
    let (mut cover, _) = new_cover(Endstops::default(), Some(0.25));
    cover.recompute_position(50_000);
    assert_eq!(cover.position(), 0.25);
  }

  #[test]
  fn advertises_stop_and_position() {
    let (cover, _) = new_cover(Endstops::default(), None);
    assert_eq!(
      cover.traits(),
      CoverTraits {
        supports_stop: true,
        supports_position: true
      }
    );
  }
}
