use std::{env, error::Error};
use env_logger::Env;
use mixing_valve_controller::{server, Config, ControlLoop, LogServo, MessageSession, MqttTransport, Timing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize the logger from the environment
    let env = Env::default()
    .filter_or("VALVE_LOG_LEVEL", "info")
    .write_style_or("VALVE_LOG_STYLE", "always");

    env_logger::init_from_env(env);

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::new(&config_path)?;
    log::debug!("{:?}", config);

    log::info!(
        "controller for {}:{}, target {}°C, max adjustment {}°, backlash {}°",
        config.mqtt.host,
        config.mqtt.port,
        config.control.target_temp,
        config.control.max_adjustment,
        config.control.backlash
    );

    let session = MessageSession::new(MqttTransport::new(&config.mqtt));
    let mut control = ControlLoop::new(
        session,
        LogServo::default(),
        config.control,
        config.topics.clone(),
        Timing::default(),
    );

    if let Some(bind) = config.status.bind {
        server::set_up_web_server(control.status(), bind);
    }

    control.start().await;
    control.run().await;
    Ok(())
}
