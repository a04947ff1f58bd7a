use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::error::TransportError;
use crate::model::Message;
use crate::transport::Transport;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
  Disconnected,
  Connecting,
  Connected,
}

/// Broker session that remembers its subscriptions so they can be restored
/// after a reconnect.
///
/// `publish` and `subscribe` connect lazily and report failure through their
/// return value. `poll` hands transport errors back to the owning loop, which
/// is expected to call [`MessageSession::reconnect`].
pub struct MessageSession<T> {
  transport: T,
  link: LinkState,
  subscriptions: Vec<String>,
}

impl<T: Transport> MessageSession<T> {
  pub fn new(transport: T) -> Self {
    MessageSession {
      transport,
      link: LinkState::Disconnected,
      subscriptions: Vec::new(),
    }
  }

  pub async fn connect(&mut self) -> bool {
    self.link = LinkState::Connecting;
    match self.transport.connect().await {
      Ok(()) => {
        self.link = LinkState::Connected;
        log::info!("connected to broker");
        true
      }
      Err(err) => {
        self.link = LinkState::Disconnected;
        log::error!("failed to connect to broker: {}", err);
        false
      }
    }
  }

  async fn ensure_connected(&mut self) -> bool {
    self.link == LinkState::Connected || self.connect().await
  }

  pub async fn publish(&mut self, topic: &str, payload: &str) -> bool {
    if !self.ensure_connected().await {
      return false;
    }
    match self.transport.publish(topic, payload).await {
      Ok(()) => {
        log::debug!("published {} to {}", payload, topic);
        true
      }
      Err(err) => {
        self.mark_failed(&err);
        log::warn!("failed to publish to {}: {}", topic, err);
        false
      }
    }
  }

  /// Subscribes to `topic`. The topic is remembered even when the attempt
  /// fails, so the next reconnect restores it.
  pub async fn subscribe(&mut self, topic: &str) -> bool {
    if !self.subscriptions.iter().any(|known| known == topic) {
      self.subscriptions.push(topic.to_string());
    }
    self.send_subscribe(topic).await
  }

  async fn send_subscribe(&mut self, topic: &str) -> bool {
    if !self.ensure_connected().await {
      return false;
    }
    match self.transport.subscribe(topic).await {
      Ok(()) => {
        log::info!("subscribed to topic {}", topic);
        true
      }
      Err(err) => {
        self.mark_failed(&err);
        log::warn!("failed to subscribe to {}: {}", topic, err);
        false
      }
    }
  }

  /// A full request queue drops the request but leaves the link up.
  fn mark_failed(&mut self, err: &TransportError) {
    if !matches!(err, TransportError::QueueFull) {
      self.link = LinkState::Disconnected;
    }
  }

  pub async fn poll(&mut self) -> Result<Option<Message>, TransportError> {
    if self.link != LinkState::Connected {
      return Err(TransportError::NotConnected);
    }
    self.transport.poll().await.map_err(|err| {
      self.link = LinkState::Disconnected;
      err
    })
  }

  /// One reconnect cycle: wait `backoff`, connect, restore every remembered
  /// subscription. Returns whether the session came back fully. A failed
  /// cycle leaves the session disconnected so the next poll fails and the
  /// owner runs another cycle.
  pub async fn reconnect(&mut self, backoff: Duration) -> bool {
    self.link = LinkState::Disconnected;
    log::warn!("reconnecting in {:?}", backoff);
    tokio::time::sleep(backoff).await;
    if !self.connect().await {
      return false;
    }
    let topics = self.subscriptions.clone();
    let mut restored = true;
    for topic in &topics {
      restored &= self.send_subscribe(topic).await;
    }
    restored
  }

  pub fn link(&self) -> LinkState {
    self.link
  }

  pub fn is_connected(&self) -> bool {
    self.link == LinkState::Connected
  }

  pub fn subscriptions(&self) -> &[String] {
    &self.subscriptions
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transport::MemoryBus;
  use tokio::time::Instant;

  #[tokio::test]
  async fn publish_connects_lazily() {
    let bus = MemoryBus::new();
    let mut session = MessageSession::new(bus.transport());
    assert_eq!(session.link(), LinkState::Disconnected);
    assert!(session.publish("mixer/valve/position", "45").await);
    assert!(session.is_connected());
  }

  #[tokio::test]
  async fn failed_connect_returns_false() {
    let bus = MemoryBus::new();
    let transport = bus.transport();
    transport.faults().refuse_connects(1);
    let mut session = MessageSession::new(transport);
    assert!(!session.connect().await);
    assert_eq!(session.link(), LinkState::Disconnected);
    assert!(session.connect().await);
  }

  #[tokio::test]
  async fn failed_subscribe_is_still_remembered() {
    let bus = MemoryBus::new();
    let transport = bus.transport();
    transport.faults().refuse_connects(1);
    let mut session = MessageSession::new(transport);
    assert!(!session.subscribe("mixer/temperature").await);
    assert!(session.subscribe("mixer/temperature").await);
    assert_eq!(session.subscriptions(), ["mixer/temperature".to_string()]);
  }

  #[tokio::test(start_paused = true)]
  async fn subscribe_failure_on_a_live_link_disconnects() {
    let bus = MemoryBus::new();
    let mut session = MessageSession::new(bus.transport());
    assert!(session.connect().await);
    session.transport().faults().fail_subscribes(1);

    assert!(!session.subscribe("mixer/temperature").await);
    assert_eq!(session.link(), LinkState::Disconnected);
    assert_eq!(session.subscriptions(), ["mixer/temperature".to_string()]);

    let mut publisher = MessageSession::new(bus.transport());
    assert!(session.reconnect(Duration::from_secs(5)).await);
    assert!(publisher.publish("mixer/temperature", "38").await);
    let message = session.poll().await.unwrap().unwrap();
    assert_eq!(&message.payload[..], b"38");
  }

  #[tokio::test]
  async fn poll_on_disconnected_session_fails() {
    let bus = MemoryBus::new();
    let mut session = MessageSession::new(bus.transport());
    assert!(matches!(session.poll().await, Err(TransportError::NotConnected)));
  }

  #[tokio::test(start_paused = true)]
  async fn reconnect_waits_backoff_and_restores_subscriptions() {
    let bus = MemoryBus::new();
    let mut publisher = MessageSession::new(bus.transport());
    let mut session = MessageSession::new(bus.transport());
    let faults = session.transport().faults();
    session.subscribe("mixer/temperature").await;

    faults.fail_polls(1);
    assert!(session.poll().await.is_err());
    assert_eq!(session.link(), LinkState::Disconnected);

    let started = Instant::now();
    assert!(session.reconnect(Duration::from_secs(5)).await);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(6));
    assert!(session.is_connected());

    assert!(publisher.publish("mixer/temperature", "39.5").await);
    let message = session.poll().await.unwrap().unwrap();
    assert_eq!(&message.payload[..], b"39.5");
  }

  #[tokio::test(start_paused = true)]
  async fn reconnect_reports_refused_connection() {
    let bus = MemoryBus::new();
    let mut session = MessageSession::new(bus.transport());
    session.transport().faults().refuse_connects(1);
    assert!(!session.reconnect(Duration::from_secs(5)).await);
    assert_eq!(session.link(), LinkState::Disconnected);
    assert!(session.reconnect(Duration::from_secs(5)).await);
  }
}
