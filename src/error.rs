use thiserror::Error;
use tokio::task::JoinError;

pub type GdoResult<T> = Result<T, GdoError>;

#[derive(Debug, Error)]
pub enum GdoError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  ConfigParse(#[from] toml::de::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error("unrecognised command '{0}'")]
  InvalidInput(String),
  #[error("the state channel has been closed")]
  StateChannelClosed,
  #[error(transparent)]
  JoinError(#[from] JoinError),
}
