use std::{
  fmt,
  sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
  },
  time::Duration,
};

use log::{debug, info};
use tokio::task::JoinHandle;

use super::config::CoverConfig;

/// A burst of relay presses sent to the opener.
///
/// Each press advances the opener's own open/stop/close/stop cycle by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
  Single,
  Double,
  Triple,
}

impl Press {
  pub fn count(self) -> u32 {
    match self {
      Press::Single => 1,
      Press::Double => 2,
      Press::Triple => 3,
    }
  }
}

impl fmt::Display for Press {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Press::Single => write!(f, "single press"),
      Press::Double => write!(f, "double press"),
      Press::Triple => write!(f, "triple press"),
    }
  }
}

/// A fire-and-forget action that can be stopped before it completes
pub trait PressTrigger: fmt::Debug + Send {
  fn fire(&mut self);

  /// Stop the action if it is still running. Does nothing otherwise.
  fn cancel(&mut self);
}

/// The three press actions available to the cover
#[derive(Debug)]
pub struct Triggers {
  single: Box<dyn PressTrigger>,
  double: Box<dyn PressTrigger>,
  triple: Box<dyn PressTrigger>,
}

impl Triggers {
  pub fn new(single: Box<dyn PressTrigger>, double: Box<dyn PressTrigger>, triple: Box<dyn PressTrigger>) -> Self {
    Triggers { single, double, triple }
  }

  pub fn get_mut(&mut self, press: Press) -> &mut dyn PressTrigger {
    match press {
      Press::Single => self.single.as_mut(),
      Press::Double => self.double.as_mut(),
      Press::Triple => self.triple.as_mut(),
    }
  }
}

/// The output driving the opener's push button input
#[derive(Debug, Default)]
pub struct Relay {
  energised: AtomicBool,
  pulses: AtomicU32,
}

impl Relay {
  pub fn new() -> Self {
    Relay::default()
  }

  pub fn set_high(&self) {
    self.energised.store(true, Ordering::SeqCst);
    let pulse = self.pulses.fetch_add(1, Ordering::SeqCst) + 1;
    debug!("Relay energised (pulse {pulse})");
  }

  pub fn set_low(&self) {
    if self.energised.swap(false, Ordering::SeqCst) {
      debug!("Relay released");
    }
  }

  pub fn is_energised(&self) -> bool {
    self.energised.load(Ordering::SeqCst)
  }

  /// How many times the relay has been energised
  pub fn pulses(&self) -> u32 {
    self.pulses.load(Ordering::SeqCst)
  }
}

/// Presses the opener's button by pulsing a [`Relay`] from a background task
#[derive(Debug)]
pub struct RemoteTrigger {
  press: Press,
  relay_on_duration: Duration,
  pulse_delay: Duration,
  relay: Arc<Relay>,
  task: Option<JoinHandle<()>>,
}

impl RemoteTrigger {
  pub fn new(press: Press, config: &CoverConfig, relay: Arc<Relay>) -> Self {
    RemoteTrigger {
      press,
      relay_on_duration: config.relay_on_duration,
      pulse_delay: config.pulse_delay,
      relay,
      task: None,
    }
  }

  /// Single, double and triple press triggers sharing one relay
  pub fn triggers(config: &CoverConfig, relay: Arc<Relay>) -> Triggers {
    Triggers::new(
      Box::new(RemoteTrigger::new(Press::Single, config, Arc::clone(&relay))),
      Box::new(RemoteTrigger::new(Press::Double, config, Arc::clone(&relay))),
      Box::new(RemoteTrigger::new(Press::Triple, config, relay)),
    )
  }

  pub fn is_running(&self) -> bool {
    self.task.as_ref().map_or(false, |task| !task.is_finished())
  }
}

impl PressTrigger for RemoteTrigger {
  fn fire(&mut self) {
    self.cancel();
    info!("Sending {}", self.press);

    let relay = Arc::clone(&self.relay);
    let presses = self.press.count();
    let relay_on_duration = self.relay_on_duration;
    let pulse_delay = self.pulse_delay;
    self.task = Some(tokio::spawn(async move {
      for press in 0..presses {
        if press > 0 {
          tokio::time::sleep(pulse_delay).await;
        }
        relay.set_high();
        tokio::time::sleep(relay_on_duration).await;
        relay.set_low();
      }
    }));
  }

  fn cancel(&mut self) {
    if let Some(task) = self.task.take() {
      if !task.is_finished() {
        debug!("Cancelling {}", self.press);
        task.abort();
      }
      // an aborted task may have left the relay held on
      self.relay.set_low();
    }
  }
}

impl Drop for RemoteTrigger {
  fn drop(&mut self) {
    self.cancel();
  }
}
