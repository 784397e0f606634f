#![warn(rust_2018_idioms)]

use std::{env, process::ExitCode, sync::Arc, time::Instant};

use gdo_cover::{
  config::{Config, DEFAULT_CONFIG_FILE},
  cover::{CoverEvent, CoverState, Endstops, GdoCover, Relay, RemoteTrigger},
  error::{GdoError, GdoResult},
};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tokio::{
  io::{AsyncBufReadExt, BufReader},
  select,
  sync::mpsc::{self, UnboundedSender},
  time::{self, MissedTickBehavior},
};

#[tokio::main]
async fn main() -> ExitCode {
  let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
  let config = Config::load(&path);

  SimpleLogger::new()
    .with_level(config.as_ref().map_or(LevelFilter::Info, |config| config.log_level))
    .init()
    .unwrap();

  let config = match config {
    Ok(config) => config,
    Err(err) => {
      log::error!("Unable to load {}: {}", path, err);
      return ExitCode::FAILURE;
    }
  };

  match run(config).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      log::error!("Error occurred: {:?}", err);
      ExitCode::FAILURE
    }
  }
}

/// Drive the cover from console input until interrupted
async fn run(config: Config) -> GdoResult<()> {
  let relay = Arc::new(Relay::new());
  let triggers = RemoteTrigger::triggers(&config.cover, relay);
  let endstops = Endstops::from_config(&config.cover);
  let (state_tx, mut state_rx) = mpsc::unbounded_channel();

  let mut cover = GdoCover::new(config.cover, endstops, triggers, state_tx)?;
  cover.dump_config();
  print_state(cover.state())?;

  let (event_tx, mut event_rx) = mpsc::unbounded_channel();
  let reader = tokio::spawn(read_input(event_tx));

  let boot = Instant::now();
  // a wrapping millisecond counter, the cover only ever compares readings by difference
  let millis = || boot.elapsed().as_millis() as u32;

  let mut interval = time::interval(config.tick_interval);
  interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
  let mut input_open = true;
  let shutdown = tokio::signal::ctrl_c();
  tokio::pin!(shutdown);

  loop {
    select! {
      _ = interval.tick() => cover.tick(millis()),

      event = event_rx.recv(), if input_open => match event {
        Some(event) => cover.handle_event(event, millis()),
        None => {
          log::info!("Input closed, press Ctrl-C to exit");
          input_open = false;
        }
      },

      state = state_rx.recv() => match state {
        Some(state) => print_state(state)?,
        None => return Err(GdoError::StateChannelClosed),
      },

      _ = &mut shutdown => {
        log::info!("Shutting down");
        break;
      }
    }
  }

  reader.abort();
  match reader.await {
    Ok(result) => result,
    Err(err) if err.is_cancelled() => Ok(()),
    Err(err) => Err(err.into()),
  }
}

/// Forward each line of stdin to the cover as an event
async fn read_input(event_tx: UnboundedSender<CoverEvent>) -> GdoResult<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }
    match line.parse::<CoverEvent>() {
      Ok(event) => {
        if event_tx.send(event).is_err() {
          break;
        }
      }
      Err(err) => log::warn!("{}", err),
    }
  }
  Ok(())
}

fn print_state(state: CoverState) -> GdoResult<()> {
  println!("{}", serde_json::to_string(&state)?);
  Ok(())
}
