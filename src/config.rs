use std::{fs, path::Path, time::Duration};

use log::LevelFilter;
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use crate::{cover::CoverConfig, error::GdoResult};

pub const DEFAULT_CONFIG_FILE: &str = "gdo-config.toml";

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct Config {
  /// The door being controlled
  pub cover: CoverConfig,

  #[serde_as(as = "DurationMilliSeconds<u64>")]
  #[serde(default = "default_tick_interval")]
  /// How often the cover's loop runs
  pub tick_interval: Duration,

  #[serde(default = "default_log_level")]
  pub log_level: LevelFilter,
}

fn default_tick_interval() -> Duration {
  Duration::from_millis(50)
}

fn default_log_level() -> LevelFilter {
  LevelFilter::Info
}

impl Config {
  pub fn from_toml(toml: &str) -> GdoResult<Config> {
    let config: Config = toml::from_str(toml)?;
    config.cover.validate()?;
    Ok(config)
  }

  pub fn load(path: impl AsRef<Path>) -> GdoResult<Config> {
    Config::from_toml(&fs::read_to_string(path)?)
  }
}
