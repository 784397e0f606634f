#![allow(dead_code)]

use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use gdo_cover::cover::{
  CoverCall, CoverConfig, CoverEvent, CoverState, EndstopKind, Endstops, GdoCover, Press, PressTrigger, Triggers,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Something that happened to a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCall {
  Fire(Press),
  Cancel(Press),
}

pub type TriggerLog = Arc<Mutex<Vec<TriggerCall>>>;

#[derive(Debug)]
pub struct RecordingTrigger {
  press: Press,
  log: TriggerLog,
}

impl PressTrigger for RecordingTrigger {
  fn fire(&mut self) {
    self.log.lock().unwrap().push(TriggerCall::Fire(self.press));
  }

  fn cancel(&mut self) {
    self.log.lock().unwrap().push(TriggerCall::Cancel(self.press));
  }
}

pub fn config(restored_position: Option<f32>) -> CoverConfig {
  let mut config = CoverConfig::new(Duration::from_millis(10_000), Duration::from_millis(8_000));
  config.restored_position = restored_position;
  config
}

/// A cover with recording triggers and a clock the test advances by hand
pub struct TestDoor {
  pub cover: GdoCover,
  pub now: u32,
  log: TriggerLog,
  states: UnboundedReceiver<CoverState>,
}

impl TestDoor {
  pub fn new(config: CoverConfig, endstops: Endstops) -> Self {
    TestDoor::starting_at(config, endstops, 1_000)
  }

  pub fn starting_at(config: CoverConfig, endstops: Endstops, now: u32) -> Self {
    let log = TriggerLog::default();
    let trigger = |press| {
      Box::new(RecordingTrigger {
        press,
        log: Arc::clone(&log),
      })
    };
    let triggers = Triggers::new(trigger(Press::Single), trigger(Press::Double), trigger(Press::Triple));
    let (state_tx, states) = mpsc::unbounded_channel();
    let cover = GdoCover::new(config, endstops, triggers, state_tx).unwrap();

    TestDoor {
      cover,
      now,
      log,
      states,
    }
  }

  pub fn control(&mut self, call: CoverCall) {
    self.cover.handle_event(CoverEvent::Control(call), self.now);
  }

  pub fn endstop(&mut self, kind: EndstopKind, active: bool) {
    self.cover.handle_event(CoverEvent::Endstop { kind, active }, self.now);
  }

  /// Move the clock on by `ms` and run one tick
  pub fn tick_after(&mut self, ms: u32) {
    self.now = self.now.wrapping_add(ms);
    self.cover.tick(self.now);
  }

  /// Run ticks every `step` ms for `ms` ms
  pub fn run_for(&mut self, ms: u32, step: u32) {
    let mut elapsed = 0;
    while elapsed < ms {
      let step = step.min(ms - elapsed);
      self.tick_after(step);
      elapsed += step;
    }
  }

  pub fn trigger_calls(&self) -> Vec<TriggerCall> {
    self.log.lock().unwrap().clone()
  }

  pub fn fired(&self) -> Vec<Press> {
    self
      .trigger_calls()
      .into_iter()
      .filter_map(|call| match call {
        TriggerCall::Fire(press) => Some(press),
        TriggerCall::Cancel(_) => None,
      })
      .collect()
  }

  /// Everything published since the last call
  pub fn published(&mut self) -> Vec<CoverState> {
    let mut states = Vec::new();
    while let Ok(state) = self.states.try_recv() {
      states.push(state);
    }
    states
  }
}

pub fn assert_close(actual: f32, expected: f32) {
  assert!(
    (actual - expected).abs() < 1e-4,
    "expected position {expected}, got {actual}"
  );
}
