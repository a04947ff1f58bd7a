//! Broker transports underneath [`MessageSession`](crate::session::MessageSession).

pub mod memory;
pub mod mqtt;

pub use memory::{FaultInjector, MemoryBus, MemoryTransport};
pub use mqtt::MqttTransport;

use crate::error::TransportError;
use crate::model::Message;

/// Raw broker operations. Implementations report failures and never retry;
/// recovery belongs to the session owner.
#[allow(async_fn_in_trait)]
pub trait Transport {
  /// Establishes the broker connection.
  async fn connect(&mut self) -> Result<(), TransportError>;

  async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError>;

  async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

  /// Returns at most one inbound message. Must return within the transport's
  /// read timeout.
  async fn poll(&mut self) -> Result<Option<Message>, TransportError>;
}
