use std::{env, error::Error};
use env_logger::Env;
use rand::{rngs::StdRng, SeedableRng};
use mixing_valve_controller::{Config, MessageSession, MqttTransport, PlantModel, Simulator, Timing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let env = Env::default()
    .filter_or("VALVE_LOG_LEVEL", "info")
    .write_style_or("VALVE_LOG_STYLE", "always");

    env_logger::init_from_env(env);

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::new(&config_path)?;

    // Same broker, separate client identity
    let mut mqtt = config.mqtt.clone();
    mqtt.client_id = config.simulator.client_id.clone();

    let plant = PlantModel::new(config.simulator.clone(), config.control.target_temp, config.control.backlash);
    let mut simulator = Simulator::new(
        MessageSession::new(MqttTransport::new(&mqtt)),
        plant,
        config.topics.clone(),
        Timing::default(),
        StdRng::from_entropy(),
    );

    simulator.start().await;
    simulator.run().await;
    Ok(())
}
