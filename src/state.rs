use serde::{Serialize, Deserialize};

use crate::actuator::Move;
use crate::model::{ActuatorState, Direction};
use crate::session::LinkState;

/// Snapshot of the controller served by the status endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControllerStatus {
  pub position: f64,
  pub direction: Option<Direction>,
  pub commanded_angle: Option<i32>,
  pub last_temperature: Option<f64>,
  pub target_temp: f64,
  pub link: LinkState,
  pub moves: u64,
  pub discarded_messages: u64,
}

impl ControllerStatus {
  pub fn new(actuator: ActuatorState, target_temp: f64) -> Self {
    ControllerStatus {
      position: actuator.position,
      direction: actuator.direction,
      commanded_angle: None,
      last_temperature: None,
      target_temp,
      link: LinkState::Disconnected,
      moves: 0,
      discarded_messages: 0,
    }
  }

  pub fn record_move(&mut self, outcome: &Move, actuator: ActuatorState) {
    self.position = actuator.position;
    self.direction = actuator.direction;
    self.commanded_angle = Some(outcome.angle);
    self.moves += 1;
  }

  pub fn record_temperature(&mut self, temperature: f64) {
    self.last_temperature = Some(temperature);
  }

  pub fn record_discard(&mut self) {
    self.discarded_messages += 1;
  }
}
