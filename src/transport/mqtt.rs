use std::collections::VecDeque;
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, MqttOptions, EventLoop, QoS, Event, Incoming};
use tokio::time::timeout;

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::model::Message;
use crate::transport::Transport;


pub struct MqttTransport {
  client: AsyncClient,
  event_loop: EventLoop,
  read_timeout: Duration,
  connect_timeout: Duration,
  pending: VecDeque<Message>,
  connected: bool,
}

impl MqttTransport {
  pub fn new(config: &MqttConfig) -> Self {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
      options.set_credentials(username.clone(), password.clone());
    }
    let (client, event_loop) = AsyncClient::new(options, config.capacity);
    MqttTransport {
      client,
      event_loop,
      read_timeout: config.read_timeout(),
      connect_timeout: config.connect_timeout(),
      pending: VecDeque::new(),
      connected: false,
    }
  }

  /// Polls the event loop once, keeping `connected` in step with what the
  /// broker link actually does.
  async fn next_event(&mut self, limit: Duration) -> Result<Option<Event>, TransportError> {
    match timeout(limit, self.event_loop.poll()).await {
      Err(_) => Ok(None),
      Ok(Err(err)) => {
        self.connected = false;
        Err(err.into())
      }
      Ok(Ok(event)) => {
        match &event {
          Event::Incoming(Incoming::ConnAck(_)) => self.connected = true,
          Event::Incoming(Incoming::Disconnect) => self.connected = false,
          _ => {}
        }
        Ok(Some(event))
      }
    }
  }
}

fn request_error(err: ClientError) -> TransportError {
  match err {
    ClientError::TryRequest(_) => TransportError::QueueFull,
    other => TransportError::Client(other),
  }
}

impl Transport for MqttTransport {
  /// Drives the event loop until the broker acknowledges the connection.
  /// Returns at once while the current connection is still up. The event
  /// loop reconnects on its own after an error, so calling this again after
  /// a failure opens a fresh connection.
  async fn connect(&mut self) -> Result<(), TransportError> {
    while !self.connected {
      match self.next_event(self.connect_timeout).await? {
        None => return Err(TransportError::Timeout("connection acknowledgement")),
        Some(Event::Incoming(Incoming::Publish(publish))) => {
          self.pending.push_back(Message::new(publish.topic, publish.payload));
        }
        Some(_) => {}
      }
    }
    Ok(())
  }

  async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
    self.client
      .try_publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
      .map_err(request_error)
  }

  async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
    self.client.try_subscribe(topic, QoS::AtLeastOnce).map_err(request_error)
  }

  async fn poll(&mut self) -> Result<Option<Message>, TransportError> {
    if let Some(message) = self.pending.pop_front() {
      return Ok(Some(message));
    }
    let event = match self.next_event(self.read_timeout).await? {
      Some(event) => event,
      None => return Ok(None),
    };
    match event {
      Event::Incoming(Incoming::Publish(publish)) => {
        log::debug!("received message on topic {}", publish.topic);
        Ok(Some(Message::new(publish.topic, publish.payload)))
      }
      Event::Incoming(Incoming::Disconnect) => {
        Err(TransportError::Broken("broker sent disconnect".to_string()))
      }
      _ => Ok(None),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::{LinkState, MessageSession};

  fn unreachable_broker() -> MqttConfig {
    MqttConfig {
      host: "127.0.0.1".to_string(),
      port: 1,
      client_id: "servo_controller_test".to_string(),
      username: None,
      password: None,
      capacity: 2,
      read_timeout_ms: 100,
      connect_timeout_secs: 2,
    }
  }

  #[tokio::test]
  async fn requests_are_queued_without_a_broker() {
    let mut transport = MqttTransport::new(&unreachable_broker());
    assert!(transport.subscribe("mixer/temperature").await.is_ok());
    assert!(transport.publish("mixer/valve/position", "45").await.is_ok());
    assert!(matches!(
      transport.publish("mixer/valve/position", "46").await,
      Err(TransportError::QueueFull)
    ));
  }

  #[tokio::test]
  async fn connect_returns_at_once_on_a_live_link() {
    let mut transport = MqttTransport::new(&unreachable_broker());
    transport.connected = true;
    assert!(transport.connect().await.is_ok());
  }

  #[tokio::test(start_paused = true)]
  async fn full_request_queue_keeps_the_session_connected() {
    let mut transport = MqttTransport::new(&unreachable_broker());
    transport.connected = true;
    let mut session = MessageSession::new(transport);
    assert!(session.connect().await);

    assert!(session.publish("mixer/valve/position", "45").await);
    assert!(session.publish("mixer/valve/position", "46").await);
    assert!(!session.publish("mixer/valve/position", "47").await);
    assert_eq!(session.link(), LinkState::Connected);

    assert!(session.reconnect(Duration::from_secs(5)).await);
    assert_eq!(session.link(), LinkState::Connected);
  }

  #[tokio::test]
  async fn connect_to_unreachable_broker_fails() {
    let mut transport = MqttTransport::new(&unreachable_broker());
    assert!(transport.connect().await.is_err());
  }
}
