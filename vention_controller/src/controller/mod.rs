use crate::command_executor::stage::StageError;

pub mod controller_service;
pub mod readiness;
pub mod sequencer;

/// The three operations the motion logic needs from a stage.
#[async_trait::async_trait]
pub trait StageLink: Send + Sync {
    async fn is_ready(&self) -> Result<bool, StageError>;
    async fn is_busy(&self) -> Result<bool, StageError>;
    async fn move_absolute(&self, axis: u32, position_mm: f64) -> Result<(), StageError>;
}
