//! Thermal model of the mixing loop used by the simulator.

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::config::SimulatorParameters;
use crate::model::Direction;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PlantState {
  pub current_temp: f64,
  pub last_position: f64,
  pub last_direction: Option<Direction>,
}

pub struct PlantModel {
  params: SimulatorParameters,
  target_temp: f64,
  backlash: f64,
  state: PlantState,
}

impl PlantModel {
  /// Plant at rest: valve at its center position, water at target temperature.
  pub fn new(params: SimulatorParameters, target_temp: f64, backlash: f64) -> Self {
    let state = PlantState {
      current_temp: target_temp,
      last_position: params.valve_center,
      last_direction: None,
    };
    PlantModel {
      params,
      target_temp,
      backlash,
      state,
    }
  }

  /// Takes a reported (compensated) valve position and recovers the true
  /// mechanical position by undoing the controller's backlash compensation
  /// whenever the report reverses the plant's last direction of travel.
  ///
  /// The direction of travel is taken from the report itself, which keeps the
  /// plant in step with the controller's own direction memory.
  pub fn on_position_report(&mut self, reported: f64) -> f64 {
    let mut position = reported;
    let direction = Direction::between(self.state.last_position, reported);
    if let (Some(direction), Some(last)) = (direction, self.state.last_direction) {
      if direction != last {
        position -= self.backlash * direction.sign();
      }
    }

    if direction.is_some() {
      self.state.last_direction = direction;
    }
    self.state.last_position = position;
    log::info!("valve position updated to: {}° (received: {}°)", position, reported);
    position
  }

  /// Temperature the loop settles at for the current valve position.
  pub fn ideal_temp(&self) -> f64 {
    let offset = (self.state.last_position - self.params.valve_center) * self.params.valve_scale;
    (self.target_temp + offset).clamp(self.params.cold_limit, self.params.hot_limit)
  }

  /// Advances the plant by one publish interval.
  pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
    let ideal = self.ideal_temp();
    let noise = (rng.gen::<f64>() - 0.5) * self.params.noise_factor;
    let inertia = self.params.inertia;
    self.state.current_temp = self.state.current_temp * inertia + ideal * (1.0 - inertia) + noise;
    self.state.current_temp
  }

  pub fn position(&self) -> f64 {
    self.state.last_position
  }

  pub fn target_temp(&self) -> f64 {
    self.target_temp
  }

  pub fn state(&self) -> PlantState {
    self.state
  }

  pub fn params(&self) -> &SimulatorParameters {
    &self.params
  }
}
