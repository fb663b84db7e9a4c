use crate::{
    command_executor::stage::create_stage,
    communication::run_communication_layer,
    config::{Config, Mode, create_default_config, init_config},
    controller::{controller_service::ControllerService, sequencer::MotionSequencer},
    models::MotionOutcome,
};

use anyhow::Context as _;
use std::path::PathBuf;

pub mod command_executor;
pub mod commands;
pub mod communication;
pub mod config;
pub mod controller;
pub mod logging;
pub mod models;

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

fn should_create_config() -> bool {
    env_flag("CREATE_CONFIG")
}

/// `ONE_SHOT=1` runs the default position sequence when the file asks for service mode.
fn apply_one_shot_override(config: &mut Config) {
    if env_flag("ONE_SHOT") && config.mode == Mode::Service {
        config.mode = Mode::one_shot();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init()?;

    if should_create_config() {
        create_default_config(None::<PathBuf>)?;
    }

    let (config_manager, mut config) = init_config().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run with CREATE_CONFIG=1 to create a default configuration file.");
        e
    })?;
    apply_one_shot_override(&mut config);

    tracing::info!(
        "Loaded configuration from {}",
        config_manager.path().display()
    );

    let endpoint = config.endpoint();
    let timeouts = config.channel_timeouts();
    let channel = tokio::task::spawn_blocking(move || machine_motion::connect(&endpoint, timeouts))
        .await
        .context("Connection task panicked")?
        .context("Failed to connect to MachineMotion controller")?;

    let (executor, stage) = create_stage(channel, config.motion.transport_policy);
    let executor = executor.spawn();

    let sequencer = MotionSequencer::new(stage, config.sequencer_config());
    tracing::debug!("Sequencer settings: {:?}", sequencer.config());

    let service =
        ControllerService::spawn(sequencer, config.motion.queue_depth).with_executor(executor);
    let handle = service.handle();
    let axis = config.motion.axis;

    match &config.mode {
        Mode::Service => {
            tokio::select! {
                result = run_communication_layer(&config.intake.socket_path, handle, axis) => {
                    if let Err(e) = result {
                        tracing::error!("Request intake stopped: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted while {:?}", service.state());
                }
            }
        }
        Mode::OneShot { positions } => {
            let outcomes = handle.run_sequence(axis, positions).await?;
            let completed = outcomes
                .iter()
                .filter(|o| **o == MotionOutcome::Completed)
                .count();
            tracing::info!("{} of {} moves completed", completed, outcomes.len());
        }
    }

    service.shutdown().await
}
