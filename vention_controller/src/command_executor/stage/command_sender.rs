use utilities::command_executor::CommandSender;

use crate::{
    command_executor::stage::{
        StageError,
        commands::{StageCommand, StageResponse},
    },
    controller::StageLink,
};

#[derive(Clone)]
pub struct StageCommandSender {
    sender: CommandSender<StageCommand>,
}

impl StageCommandSender {
    pub fn new(sender: CommandSender<StageCommand>) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl StageLink for StageCommandSender {
    async fn is_ready(&self) -> Result<bool, StageError> {
        match self.sender.send_command(StageCommand::IsReady).await? {
            StageResponse::Ready(ready) => Ok(ready),
            _ => Err(StageError::UnexpectedResponse),
        }
    }

    async fn is_busy(&self) -> Result<bool, StageError> {
        match self.sender.send_command(StageCommand::IsBusy).await? {
            StageResponse::Busy(busy) => Ok(busy),
            _ => Err(StageError::UnexpectedResponse),
        }
    }

    async fn move_absolute(&self, axis: u32, position_mm: f64) -> Result<(), StageError> {
        let response = self
            .sender
            .send_command(StageCommand::MoveAbsolute { axis, position_mm })
            .await?;

        match response {
            StageResponse::Moved(machine_motion::Response::Unrecognized(reply)) => {
                tracing::warn!("Move on axis {} was not acknowledged: '{}'", axis, reply);
                Ok(())
            }
            StageResponse::Moved(_) => Ok(()),
            _ => Err(StageError::UnexpectedResponse),
        }
    }
}
