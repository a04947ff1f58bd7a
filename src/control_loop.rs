use tokio::sync::watch;

use crate::actuator::{BacklashActuator, Move, ServoDriver};
use crate::config::{ControlParameters, Timing, TopicSet};
use crate::error::PayloadError;
use crate::model::{format_position, parse_decimal, parse_valve_command, Message};
use crate::regulator::TemperatureRegulator;
use crate::session::MessageSession;
use crate::state::ControllerStatus;
use crate::transport::Transport;

/// Controller process: routes inbound commands and readings to the actuator
/// and republishes every actuator move.
pub struct ControlLoop<T, D> {
  session: MessageSession<T>,
  actuator: BacklashActuator<D>,
  regulator: TemperatureRegulator,
  params: ControlParameters,
  topics: TopicSet,
  timing: Timing,
  status: ControllerStatus,
  status_tx: watch::Sender<ControllerStatus>,
}

impl<T: Transport, D: ServoDriver> ControlLoop<T, D> {
  pub fn new(
    session: MessageSession<T>,
    driver: D,
    params: ControlParameters,
    topics: TopicSet,
    timing: Timing,
  ) -> Self {
    let actuator = BacklashActuator::new(driver, &params);
    let status = ControllerStatus::new(actuator.state(), params.target_temp);
    let (status_tx, _) = watch::channel(status.clone());
    ControlLoop {
      session,
      actuator,
      regulator: TemperatureRegulator::new(&params),
      params,
      topics,
      timing,
      status,
      status_tx,
    }
  }

  /// Connects, subscribes to the command and reading topics and parks the
  /// valve at the middle of its range.
  pub async fn start(&mut self) {
    if self.session.connect().await {
      log::info!("subscribing to {} and {}", self.topics.valve_control, self.topics.temperature);
    }
    let control_topic = self.topics.valve_control.clone();
    let reading_topic = self.topics.temperature.clone();
    self.session.subscribe(&control_topic).await;
    self.session.subscribe(&reading_topic).await;

    let midpoint = self.params.position_bounds.midpoint();
    self.move_valve(midpoint).await;
    log::info!("initial valve position: {}° (middle)", midpoint);
  }

  pub async fn run(&mut self) {
    loop {
      self.step().await;
    }
  }

  /// One iteration: poll once, then sleep for the poll interval. A transport
  /// failure runs one reconnect cycle instead of sleeping.
  pub async fn step(&mut self) {
    match self.session.poll().await {
      Ok(Some(message)) => self.handle_message(message).await,
      Ok(None) => {}
      Err(err) => {
        log::warn!("MQTT error: {}", err);
        self.publish_status();
        self.session.reconnect(self.timing.reconnect_backoff).await;
        self.publish_status();
        return;
      }
    }
    tokio::time::sleep(self.timing.poll_interval).await;
  }

  pub async fn handle_message(&mut self, message: Message) {
    if message.topic == self.topics.valve_control {
      match parse_valve_command(&message.payload, &self.params.position_bounds) {
        Ok(value) => {
          self.move_valve(value as f64).await;
          log::info!("servo moved to position: {}", value);
        }
        Err(err) => self.discard(&message.topic, err),
      }
    } else if message.topic == self.topics.temperature {
      match parse_decimal(&message.payload) {
        Ok(temperature) => {
          self.status.record_temperature(temperature);
          match self.regulator.on_temperature_reading(temperature, &mut self.actuator) {
            Some(outcome) => self.report_move(outcome).await,
            None => self.publish_status(),
          }
        }
        Err(err) => self.discard(&message.topic, err),
      }
    } else {
      log::debug!("ignoring message on topic {}", message.topic);
    }
  }

  async fn move_valve(&mut self, target: f64) {
    let outcome = self.actuator.move_to(target);
    self.report_move(outcome).await;
  }

  async fn report_move(&mut self, outcome: Move) {
    self.status.record_move(&outcome, self.actuator.state());
    let payload = format_position(outcome.position);
    if !self.session.publish(&self.topics.valve_position, &payload).await {
      log::warn!("valve position {} not published", payload);
    }
    self.publish_status();
  }

  fn discard(&mut self, topic: &str, err: PayloadError) {
    log::warn!("error processing message on {}: {}", topic, err);
    self.status.record_discard();
    self.publish_status();
  }

  fn publish_status(&mut self) {
    self.status.link = self.session.link();
    self.status_tx.send_replace(self.status.clone());
  }

  /// Receiver for status snapshots; updated after every change.
  pub fn status(&self) -> watch::Receiver<ControllerStatus> {
    self.status_tx.subscribe()
  }

  pub fn actuator(&self) -> &BacklashActuator<D> {
    &self.actuator
  }

  pub fn session(&self) -> &MessageSession<T> {
    &self.session
  }
}
