use thiserror::Error;

/// Failures of the broker connection. All of them are recoverable by the
/// reconnect cycle.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("not connected to the broker")]
  NotConnected,

  #[error("connection error: {0}")]
  Connection(#[from] rumqttc::ConnectionError),

  #[error("client request failed: {0}")]
  Client(#[from] rumqttc::ClientError),

  /// The outgoing request queue is full. The link itself is still up.
  #[error("outgoing request queue is full")]
  QueueFull,

  #[error("timed out waiting for {0}")]
  Timeout(&'static str),

  #[error("{0}")]
  Broken(String),
}

/// Reasons an inbound payload is discarded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PayloadError {
  #[error("payload is not valid UTF-8")]
  NotUtf8,

  #[error("payload {0:?} is not an integer")]
  NotInteger(String),

  #[error("payload {0:?} is not a finite number")]
  NotNumeric(String),

  #[error("valve command {value} outside {min}..={max}")]
  OutOfRange { value: i64, min: f64, max: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot read config file: {0}")]
  Io(#[from] std::io::Error),

  #[error("cannot parse config: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("invalid config: {0}")]
  Invalid(&'static str),
}
