//! Valve actuator with mechanical backlash compensation.

use crate::config::{ControlParameters, PositionBounds};
use crate::model::{ActuatorState, Direction};

/// Fire-and-forget command interface of the servo hardware.
pub trait ServoDriver {
  fn set_angle(&mut self, degrees: i32);
}

/// Driver used when no servo hardware is attached: every command is logged.
#[derive(Debug, Default)]
pub struct LogServo {
  last_angle: Option<i32>,
}

impl LogServo {
  pub fn last_angle(&self) -> Option<i32> {
    self.last_angle
  }
}

impl ServoDriver for LogServo {
  fn set_angle(&mut self, degrees: i32) {
    log::info!("servo set to {}°", degrees);
    self.last_angle = Some(degrees);
  }
}

/// Outcome of a single [`BacklashActuator::move_to`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
  /// Logical position asked for by the caller.
  pub requested: f64,
  /// Stored position after compensation. This is what gets published.
  pub position: f64,
  /// Angle sent to the servo.
  pub angle: i32,
  pub direction: Option<Direction>,
  pub reversal: bool,
}

pub struct BacklashActuator<D> {
  driver: D,
  backlash: f64,
  bounds: PositionBounds,
  state: ActuatorState,
}

impl<D: ServoDriver> BacklashActuator<D> {
  /// Starts at the midpoint of the position bounds with no direction memory.
  pub fn new(driver: D, params: &ControlParameters) -> Self {
    Self::with_state(driver, params, ActuatorState::new(params.position_bounds.midpoint()))
  }

  pub fn with_state(driver: D, params: &ControlParameters, state: ActuatorState) -> Self {
    BacklashActuator {
      driver,
      backlash: params.backlash,
      bounds: params.position_bounds,
      state,
    }
  }

  /// Moves the valve towards `target`.
  ///
  /// On a direction reversal the target is pushed `backlash` degrees further
  /// in the new direction so the load actually reaches `target` once the play
  /// is taken up. The compensated value is clamped to the position bounds,
  /// sent to the servo rounded to whole degrees and stored as the new
  /// position. A zero-length move keeps the previous direction.
  pub fn move_to(&mut self, target: f64) -> Move {
    let new_direction = Direction::between(self.state.position, target);
    let reversal = match (new_direction, self.state.direction) {
      (Some(new), Some(previous)) => new != previous,
      _ => false,
    };

    let mut compensated = target;
    if let (true, Some(direction)) = (reversal, new_direction) {
      compensated += self.backlash * direction.sign();
      log::info!("direction change: moving extra {}° to take up backlash", self.backlash);
    }
    let position = self.bounds.clamp(compensated);
    if position != compensated {
      log::warn!("compensated target {} clamped to {}", compensated, position);
    }

    let angle = position.round() as i32;
    self.driver.set_angle(angle);

    self.state.position = position;
    if new_direction.is_some() {
      self.state.direction = new_direction;
    }
    log::debug!("actuator state {:?}", self.state);

    Move {
      requested: target,
      position,
      angle,
      direction: new_direction,
      reversal,
    }
  }

  pub fn position(&self) -> f64 {
    self.state.position
  }

  pub fn state(&self) -> ActuatorState {
    self.state
  }

  pub fn driver(&self) -> &D {
    &self.driver
  }
}
