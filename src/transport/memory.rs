//! In-process broker for running the controller against the simulator
//! without a network. Topics match exactly; there are no wildcards.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::error::TransportError;
use crate::model::Message;
use crate::transport::Transport;

struct ClientSlot {
  subscriptions: HashSet<String>,
  online: bool,
  sender: UnboundedSender<Message>,
}

#[derive(Clone, Default)]
pub struct MemoryBus {
  clients: Arc<Mutex<Vec<ClientSlot>>>,
}

impl MemoryBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a new client on the bus. It starts offline.
  pub fn transport(&self) -> MemoryTransport {
    let (sender, inbox) = mpsc::unbounded_channel();
    let id = {
      let mut clients = self.lock();
      clients.push(ClientSlot {
        subscriptions: HashSet::new(),
        online: false,
        sender,
      });
      clients.len() - 1
    };
    MemoryTransport {
      bus: self.clone(),
      id,
      inbox,
      faults: FaultInjector::default(),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ClientSlot>> {
    self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn with_client<R>(&self, id: usize, f: impl FnOnce(&mut ClientSlot) -> R) -> R {
    let mut clients = self.lock();
    f(&mut clients[id])
  }

  fn route(&self, message: &Message) -> usize {
    let clients = self.lock();
    clients
      .iter()
      .filter(|client| client.online && client.subscriptions.contains(&message.topic))
      .filter(|client| client.sender.send(message.clone()).is_ok())
      .count()
  }
}

/// Injects failures into a [`MemoryTransport`] from outside the task that owns it.
#[derive(Clone, Default)]
pub struct FaultInjector {
  poll_failures: Arc<AtomicUsize>,
  connect_failures: Arc<AtomicUsize>,
  publish_failures: Arc<AtomicUsize>,
  subscribe_failures: Arc<AtomicUsize>,
}

impl FaultInjector {
  /// The next `count` polls fail and drop the connection, like a broker
  /// going away. Subscriptions are lost with it.
  pub fn fail_polls(&self, count: usize) {
    self.poll_failures.fetch_add(count, Ordering::SeqCst);
  }

  pub fn refuse_connects(&self, count: usize) {
    self.connect_failures.fetch_add(count, Ordering::SeqCst);
  }

  /// The next `count` publishes fail and drop the connection.
  pub fn fail_publishes(&self, count: usize) {
    self.publish_failures.fetch_add(count, Ordering::SeqCst);
  }

  /// The next `count` subscribes fail and drop the connection.
  pub fn fail_subscribes(&self, count: usize) {
    self.subscribe_failures.fetch_add(count, Ordering::SeqCst);
  }

  fn take(counter: &AtomicUsize) -> bool {
    counter
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
  }
}

pub struct MemoryTransport {
  bus: MemoryBus,
  id: usize,
  inbox: UnboundedReceiver<Message>,
  faults: FaultInjector,
}

impl MemoryTransport {
  pub fn faults(&self) -> FaultInjector {
    self.faults.clone()
  }

  pub fn is_online(&self) -> bool {
    self.bus.with_client(self.id, |client| client.online)
  }

  fn drop_connection(&self) {
    self.bus.with_client(self.id, |client| {
      client.online = false;
      client.subscriptions.clear();
    });
  }
}

impl Transport for MemoryTransport {
  async fn connect(&mut self) -> Result<(), TransportError> {
    if FaultInjector::take(&self.faults.connect_failures) {
      return Err(TransportError::Broken("connection refused".to_string()));
    }
    self.bus.with_client(self.id, |client| client.online = true);
    Ok(())
  }

  async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
    if !self.is_online() {
      return Err(TransportError::NotConnected);
    }
    if FaultInjector::take(&self.faults.publish_failures) {
      self.drop_connection();
      return Err(TransportError::Broken("publish failed".to_string()));
    }
    let delivered = self.bus.route(&Message::new(topic, payload.to_string()));
    log::trace!("{} delivered to {} subscribers", topic, delivered);
    Ok(())
  }

  async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
    if self.is_online() && FaultInjector::take(&self.faults.subscribe_failures) {
      self.drop_connection();
      return Err(TransportError::Broken("subscribe failed".to_string()));
    }
    self.bus.with_client(self.id, |client| {
      if !client.online {
        return Err(TransportError::NotConnected);
      }
      client.subscriptions.insert(topic.to_string());
      Ok(())
    })
  }

  async fn poll(&mut self) -> Result<Option<Message>, TransportError> {
    if !self.is_online() {
      return Err(TransportError::NotConnected);
    }
    if FaultInjector::take(&self.faults.poll_failures) {
      self.drop_connection();
      return Err(TransportError::Broken("connection reset".to_string()));
    }
    match self.inbox.try_recv() {
      Ok(message) => Ok(Some(message)),
      Err(TryRecvError::Empty) => Ok(None),
      Err(TryRecvError::Disconnected) => Err(TransportError::Broken("bus closed".to_string())),
    }
  }
}
