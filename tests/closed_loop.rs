use std::time::Duration;

use mixing_valve_controller::config::PositionBounds;
use mixing_valve_controller::{
  ControlLoop, ControlParameters, LogServo, MemoryBus, MessageSession, PlantModel, SimulatorParameters, Simulator,
  Timing, TopicSet,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn topics() -> TopicSet {
  TopicSet {
    valve_control: "mixer/valve/set".to_string(),
    temperature: "mixer/temperature".to_string(),
    valve_position: "mixer/valve/position".to_string(),
  }
}

fn control_params(backlash: f64) -> ControlParameters {
  ControlParameters {
    target_temp: 40.0,
    max_adjustment: 5.0,
    backlash,
    position_bounds: PositionBounds::default(),
    deadband: 0.5,
  }
}

fn quiet_plant(backlash: f64) -> PlantModel {
  let params = SimulatorParameters {
    noise_factor: 0.0,
    inertia: 0.7,
    hot_limit: 60.0,
    cold_limit: 10.0,
    ..SimulatorParameters::default()
  };
  PlantModel::new(params, 40.0, backlash)
}

#[tokio::test(start_paused = true)]
async fn manual_override_is_regulated_back_to_target() {
  let bus = MemoryBus::new();
  let mut operator = MessageSession::new(bus.transport());
  let mut control = ControlLoop::new(
    MessageSession::new(bus.transport()),
    LogServo::default(),
    control_params(0.0),
    topics(),
    Timing::default(),
  );
  let mut simulator = Simulator::new(
    MessageSession::new(bus.transport()),
    quiet_plant(0.0),
    topics(),
    Timing::default(),
    StdRng::seed_from_u64(3),
  );

  control.start().await;
  simulator.start().await;
  assert!(operator.publish(&topics().valve_control, "80").await);

  let _ = tokio::time::timeout(Duration::from_secs(5), async {
    tokio::join!(control.run(), simulator.run())
  })
  .await;
  let overheated = simulator.plant().state().current_temp;
  assert!(overheated > 45.0, "override should heat the loop, got {}", overheated);

  let _ = tokio::time::timeout(Duration::from_secs(120), async {
    tokio::join!(control.run(), simulator.run())
  })
  .await;
  let settled = simulator.plant().state().current_temp;
  assert!((settled - 40.0).abs() < 1.0, "loop settled at {}", settled);

  let status = control.status().borrow().clone();
  assert!(status.moves > 2);
  assert_eq!(status.discarded_messages, 0);
  assert_eq!(status.last_temperature.map(|t| (t - settled).abs() < 1.0), Some(true));
}

#[tokio::test(start_paused = true)]
async fn plant_tracks_logical_targets_through_backlash() {
  let bus = MemoryBus::new();
  let mut operator = MessageSession::new(bus.transport());
  let mut control = ControlLoop::new(
    MessageSession::new(bus.transport()),
    LogServo::default(),
    control_params(10.0),
    topics(),
    Timing::default(),
  );
  // Readings go to a topic nobody listens on so only manual commands move the valve.
  let simulator_topics = TopicSet { temperature: "mixer/unused".to_string(), ..topics() };
  let mut simulator = Simulator::new(
    MessageSession::new(bus.transport()),
    quiet_plant(10.0),
    simulator_topics,
    Timing::default(),
    StdRng::seed_from_u64(5),
  );

  simulator.start().await;
  control.start().await;
  simulator.step().await;
  assert_eq!(simulator.plant().position(), 45.0);

  for target in [40, 50, 50, 55, 30] {
    operator.publish(&topics().valve_control, &target.to_string()).await;
    control.step().await;
    simulator.step().await;
    assert_eq!(simulator.plant().position(), f64::from(target));
  }
  assert_eq!(control.actuator().position(), 20.0);
  assert_eq!(control.actuator().driver().last_angle(), Some(20));
}
