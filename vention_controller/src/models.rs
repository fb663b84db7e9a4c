use std::fmt;

use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest {
    pub axis: u32,
    pub target_position_mm: f64,
}

impl MotionRequest {
    pub fn new(axis: u32, target_position_mm: f64) -> Self {
        Self {
            axis,
            target_position_mm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionOutcome {
    Completed,
    SkippedNotReady,
    TransportFailed(String),
}

impl fmt::Display for MotionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionOutcome::Completed => write!(f, "completed"),
            MotionOutcome::SkippedNotReady => write!(f, "skipped, controller not ready"),
            MotionOutcome::TransportFailed(reason) => write!(f, "transport failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    AwaitingReady,
    Moving,
    Completing,
    ShutDown,
}

#[derive(Debug)]
pub struct MotionEnvelope {
    pub request: MotionRequest,
    pub response: oneshot::Sender<MotionOutcome>,
}
