use crate::actuator::{BacklashActuator, Move, ServoDriver};
use crate::config::{ControlParameters, PositionBounds};

/// Single-step proportional temperature controller.
///
/// The valve scale is inverted: a higher position is more closed, so a reading
/// above target lowers the position. The correction per reading is limited to
/// `max_adjustment` and corrections smaller than `deadband` are dropped.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureRegulator {
  target_temp: f64,
  max_adjustment: f64,
  deadband: f64,
  bounds: PositionBounds,
}

impl TemperatureRegulator {
  pub fn new(params: &ControlParameters) -> Self {
    TemperatureRegulator {
      target_temp: params.target_temp,
      max_adjustment: params.max_adjustment,
      deadband: params.deadband,
      bounds: params.position_bounds,
    }
  }

  pub fn target_temp(&self) -> f64 {
    self.target_temp
  }

  /// Position the valve should move to for `current_temp`, or `None` when the
  /// correction falls inside the deadband.
  pub fn next_position(&self, current_temp: f64, last_position: f64) -> Option<f64> {
    let error = current_temp - self.target_temp;
    let adjustment = -error.clamp(-self.max_adjustment, self.max_adjustment);
    let new_position = self.bounds.clamp(last_position + adjustment);
    if (new_position - last_position).abs() >= self.deadband {
      Some(new_position)
    } else {
      None
    }
  }

  pub fn on_temperature_reading<D: ServoDriver>(
    &self,
    current_temp: f64,
    actuator: &mut BacklashActuator<D>,
  ) -> Option<Move> {
    let last_position = actuator.position();
    let new_position = self.next_position(current_temp, last_position)?;
    let outcome = actuator.move_to(new_position);
    log::info!(
      "temperature {:.2}°C, adjusting valve to {:.1}° ({})",
      current_temp,
      new_position,
      if new_position < last_position { "more open" } else { "more closed" }
    );
    Some(outcome)
  }
}
