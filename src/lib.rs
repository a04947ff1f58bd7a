//! Mixing valve temperature control over MQTT.
//!
//! The controller ([`ControlLoop`]) turns temperature readings into valve
//! moves with backlash compensation; the simulator ([`Simulator`]) closes the
//! loop with a thermal model of the plant.

pub mod actuator;
pub mod config;
pub mod control_loop;
pub mod error;
pub mod model;
pub mod plant;
pub mod regulator;
pub mod server;
pub mod session;
pub mod simulator;
pub mod state;
pub mod transport;

pub use actuator::{BacklashActuator, LogServo, Move, ServoDriver};
pub use config::{Config, ControlParameters, MqttConfig, SimulatorParameters, Timing, TopicSet};
pub use control_loop::ControlLoop;
pub use error::{ConfigError, PayloadError, TransportError};
pub use plant::PlantModel;
pub use regulator::TemperatureRegulator;
pub use session::{LinkState, MessageSession};
pub use simulator::Simulator;
pub use state::ControllerStatus;
pub use transport::{MemoryBus, MemoryTransport, MqttTransport, Transport};
