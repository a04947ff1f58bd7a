use rand::Rng;
use tokio::time::Instant;

use crate::config::{Timing, TopicSet};
use crate::model::{format_temperature, parse_decimal, Message};
use crate::plant::PlantModel;
use crate::session::MessageSession;
use crate::transport::Transport;

/// Simulator process: publishes the plant temperature once per publish
/// interval and feeds valve position reports into the plant in between.
pub struct Simulator<T, R> {
  session: MessageSession<T>,
  plant: PlantModel,
  topics: TopicSet,
  timing: Timing,
  rng: R,
  next_tick: Instant,
}

impl<T: Transport, R: Rng> Simulator<T, R> {
  pub fn new(session: MessageSession<T>, plant: PlantModel, topics: TopicSet, timing: Timing, rng: R) -> Self {
    Simulator {
      session,
      plant,
      topics,
      timing,
      rng,
      next_tick: Instant::now(),
    }
  }

  pub async fn start(&mut self) {
    let params = self.plant.params();
    log::info!("starting temperature simulator");
    log::info!("initial valve position: {}° (middle)", self.plant.position());
    log::info!("target temperature: {}°C", self.plant.target_temp());
    log::info!("hot water: {}°C, cold water: {}°C", params.hot_limit, params.cold_limit);
    log::info!("valve calibration: target at {}° valve position, {}°C per degree", params.valve_center, params.valve_scale);

    self.session.connect().await;
    let topic = self.topics.valve_position.clone();
    self.session.subscribe(&topic).await;
    self.next_tick = Instant::now();
  }

  pub async fn run(&mut self) {
    loop {
      self.step().await;
    }
  }

  /// Publishes a reading if the tick deadline has passed, then polls once.
  pub async fn step(&mut self) {
    let now = Instant::now();
    if now >= self.next_tick {
      self.publish_reading().await;
      self.next_tick += self.timing.publish_interval;
      if self.next_tick < now {
        self.next_tick = now + self.timing.publish_interval;
      }
    }

    match self.session.poll().await {
      Ok(Some(message)) => self.handle_message(message),
      Ok(None) => {}
      Err(err) => {
        log::warn!("MQTT error: {}", err);
        self.session.reconnect(self.timing.reconnect_backoff).await;
        return;
      }
    }
    tokio::time::sleep(self.timing.poll_interval).await;
  }

  async fn publish_reading(&mut self) {
    let temperature = self.plant.tick(&mut self.rng);
    let payload = format_temperature(temperature);
    if self.session.publish(&self.topics.temperature, &payload).await {
      log::info!("published temperature: {}°C (valve: {}°)", payload, self.plant.position());
    } else {
      log::warn!("temperature {}°C not published", payload);
    }
  }

  pub fn handle_message(&mut self, message: Message) {
    if message.topic != self.topics.valve_position {
      log::debug!("ignoring message on topic {}", message.topic);
      return;
    }
    match parse_decimal(&message.payload) {
      Ok(reported) => {
        self.plant.on_position_report(reported);
      }
      Err(err) => log::warn!("invalid valve position received: {}", err),
    }
  }

  pub fn plant(&self) -> &PlantModel {
    &self.plant
  }

  pub fn session(&self) -> &MessageSession<T> {
    &self.session
  }
}
