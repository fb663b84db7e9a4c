use machine_motion::{ControllerCommand, Response};
use utilities::command_executor::Command;

use crate::command_executor::stage::{StageError, StageHandler};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageCommand {
    IsReady,
    IsBusy,
    MoveAbsolute { axis: u32, position_mm: f64 },
}

impl From<StageCommand> for ControllerCommand {
    fn from(command: StageCommand) -> Self {
        match command {
            StageCommand::IsReady => ControllerCommand::IsReady,
            StageCommand::IsBusy => ControllerCommand::IsBusy,
            StageCommand::MoveAbsolute { axis, position_mm } => {
                ControllerCommand::MoveAbsolute { axis, position_mm }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResponse {
    Ready(bool),
    Busy(bool),
    Moved(Response),
}

impl Command for StageCommand {
    type Response = StageResponse;
    type Error = StageError;
    type Handler = StageHandler;

    fn execute(self, handler: &mut Self::Handler) -> Result<Self::Response, Self::Error> {
        let command = ControllerCommand::from(self);
        let response = handler.execute(&command)?;

        Ok(match self {
            StageCommand::IsReady => {
                StageResponse::Ready(matches!(response, Response::ReadyState(true)))
            }
            StageCommand::IsBusy => {
                StageResponse::Busy(matches!(response, Response::BusyState(true)))
            }
            StageCommand::MoveAbsolute { .. } => StageResponse::Moved(response),
        })
    }
}
