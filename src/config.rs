use serde::{Serialize, Deserialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;


#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config{
    pub mqtt: MqttConfig,
    pub topics: TopicSet,
    pub control: ControlParameters,
    #[serde(default)]
    pub simulator: SimulatorParameters,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MqttConfig{
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicSet{
    pub valve_control: String,
    pub temperature: String,
    pub valve_position: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PositionBounds{
    pub min: f64,
    pub max: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters{
    pub target_temp: f64,
    pub max_adjustment: f64,
    pub backlash: f64,
    #[serde(default)]
    pub position_bounds: PositionBounds,
    #[serde(default = "default_deadband")]
    pub deadband: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SimulatorParameters{
    #[serde(default = "default_simulator_client_id")]
    pub client_id: String,
    pub hot_limit: f64,
    pub cold_limit: f64,
    pub noise_factor: f64,
    pub inertia: f64,
    pub valve_center: f64,
    pub valve_scale: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StatusConfig{
    pub bind: Option<SocketAddr>,
}

/// Loop cadence shared by the controller and the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing{
    pub poll_interval: Duration,
    pub reconnect_backoff: Duration,
    pub publish_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            poll_interval: Duration::from_millis(100),
            reconnect_backoff: Duration::from_secs(5),
            publish_interval: Duration::from_secs(1),
        }
    }
}

impl PositionBounds {
    pub fn clamp(&self, position: f64) -> f64 {
        position.clamp(self.min, self.max)
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.min && position <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl Default for PositionBounds {
    fn default() -> Self {
        PositionBounds { min: 0.0, max: 90.0 }
    }
}

impl Default for SimulatorParameters {
    fn default() -> Self {
        SimulatorParameters {
            client_id: default_simulator_client_id(),
            hot_limit: 60.0,
            cold_limit: 10.0,
            noise_factor: 0.2,
            inertia: 0.8,
            valve_center: 45.0,
            valve_scale: 1.0,
        }
    }
}

impl MqttConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config{
    pub fn new(file_name: &str) -> Result<Config, ConfigError>{
      let input_file = std::fs::File::open(file_name)?;
      let config: Config = serde_yaml::from_reader(input_file)?;
      config.validate()?;
      Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Config, ConfigError>{
      let config: Config = serde_yaml::from_str(text)?;
      config.validate()?;
      Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
      let control = &self.control;
      if !(control.max_adjustment >= 0.0) {
        return Err(ConfigError::Invalid("control.max_adjustment must be >= 0"));
      }
      if !(control.backlash >= 0.0) {
        return Err(ConfigError::Invalid("control.backlash must be >= 0"));
      }
      if !(control.position_bounds.min < control.position_bounds.max) {
        return Err(ConfigError::Invalid("control.position_bounds.min must be below max"));
      }
      let simulator = &self.simulator;
      if !(simulator.cold_limit <= simulator.hot_limit) {
        return Err(ConfigError::Invalid("simulator.cold_limit must not exceed hot_limit"));
      }
      if !(0.0..=1.0).contains(&simulator.inertia) {
        return Err(ConfigError::Invalid("simulator.inertia must be within 0..=1"));
      }
      Ok(())
    }
}

fn default_port() -> u16 { 1883 }
fn default_client_id() -> String { "servo_controller".to_string() }
fn default_simulator_client_id() -> String { "temp_simulator".to_string() }
fn default_capacity() -> usize { 10 }
fn default_read_timeout_ms() -> u64 { 100 }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_deadband() -> f64 { 0.5 }

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = "
mqtt:
  host: 192.168.1.20
topics:
  valve_control: mixer/valve/set
  temperature: mixer/temperature
  valve_position: mixer/valve/position
control:
  target_temp: 40.0
  max_adjustment: 5.0
  backlash: 10.0
";

  #[test]
  fn minimal_config_fills_defaults() {
    let config = Config::from_yaml(MINIMAL).unwrap();
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.client_id, "servo_controller");
    assert_eq!(config.mqtt.read_timeout(), Duration::from_millis(100));
    assert_eq!(config.control.deadband, 0.5);
    assert_eq!(config.control.position_bounds, PositionBounds { min: 0.0, max: 90.0 });
    assert_eq!(config.simulator.client_id, "temp_simulator");
    assert_eq!(config.simulator.valve_center, 45.0);
    assert!(config.status.bind.is_none());
  }

  #[test]
  fn status_bind_parses_socket_address() {
    let text = format!("{}status:\n  bind: 127.0.0.1:3030\n", MINIMAL);
    let config = Config::from_yaml(&text).unwrap();
    assert_eq!(config.status.bind, Some("127.0.0.1:3030".parse().unwrap()));
  }

  #[test]
  fn negative_backlash_is_rejected() {
    let text = MINIMAL.replace("backlash: 10.0", "backlash: -1.0");
    assert!(matches!(Config::from_yaml(&text), Err(ConfigError::Invalid(_))));
  }

  #[test]
  fn missing_topics_is_a_parse_error() {
    let text = "mqtt:\n  host: localhost\ncontrol:\n  target_temp: 40.0\n  max_adjustment: 5.0\n  backlash: 0.0\n";
    assert!(matches!(Config::from_yaml(text), Err(ConfigError::Yaml(_))));
  }

  #[test]
  fn bounds_helpers() {
    let bounds = PositionBounds::default();
    assert_eq!(bounds.midpoint(), 45.0);
    assert_eq!(bounds.clamp(95.0), 90.0);
    assert_eq!(bounds.clamp(-3.0), 0.0);
    assert!(bounds.contains(90.0));
    assert!(!bounds.contains(90.5));
  }

  #[test]
  fn default_timing() {
    let timing = Timing::default();
    assert_eq!(timing.poll_interval, Duration::from_millis(100));
    assert_eq!(timing.reconnect_backoff, Duration::from_secs(5));
    assert_eq!(timing.publish_interval, Duration::from_secs(1));
  }
}
