use machine_motion::{ControllerCommand, MachineMotion, Response, TransportError};
use serde::{Deserialize, Serialize};
use utilities::{
    command_executor::{CommandExecutor, DeviceHandler, ExecutorError},
    tcp_channel::TcpChannel,
};

use crate::command_executor::stage::{command_sender::StageCommandSender, commands::StageCommand};

pub mod command_sender;
pub mod commands;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("unexpected response from stage handler")]
    UnexpectedResponse,
}

/// What a failed exchange turns into.
///
/// `Coalesce` answers a timed out or failed exchange with an empty response,
/// which reads as "not ready" / "not busy". A connection closed by the
/// controller is always reported, since nothing sent afterwards can arrive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportPolicy {
    #[default]
    Coalesce,
    Strict,
}

pub struct StageHandler {
    channel: TcpChannel,
    machine_motion: MachineMotion,
    policy: TransportPolicy,
}

impl DeviceHandler for StageHandler {
    type Command = StageCommand;

    fn name(&self) -> &str {
        "MachineMotion"
    }
}

impl StageHandler {
    pub fn new(machine_motion: MachineMotion, channel: TcpChannel, policy: TransportPolicy) -> Self {
        Self {
            channel,
            machine_motion,
            policy,
        }
    }

    pub fn execute(&mut self, command: &ControllerCommand) -> Result<Response, TransportError> {
        let error = match self.machine_motion.execute(&mut self.channel, command) {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        tracing::error!("Socket error during command '{}': {}", command, error);

        if error.is_unrecoverable() {
            self.channel.close();
            return Err(error);
        }

        match self.policy {
            TransportPolicy::Coalesce => Ok(Response::parse(command, "")),
            TransportPolicy::Strict => Err(error),
        }
    }
}

pub fn create_stage(
    channel: TcpChannel,
    policy: TransportPolicy,
) -> (CommandExecutor<StageHandler>, StageCommandSender) {
    let handler = StageHandler::new(MachineMotion::new(), channel, policy);

    let executor = CommandExecutor::new(handler);
    let sender = StageCommandSender::new(executor.sender());

    (executor, sender)
}
