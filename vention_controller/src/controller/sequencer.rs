use std::time::Duration;

use tokio::sync::watch;
use tracing::Instrument as _;

use crate::{
    command_executor::stage::StageError,
    controller::{
        StageLink,
        readiness::{POLL_INTERVAL, ReadinessPoller},
    },
    models::{MotionOutcome, MotionRequest, SequencerState},
};

pub const READY_TIMEOUT: Duration = Duration::from_secs(10);
pub const SETTLE_DELAY: Duration = Duration::from_secs(10);
pub const ONE_SHOT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause between issuing a move and the first busy poll.
    pub settle_delay: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            ready_timeout: READY_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            settle_delay: SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("sequencer is {0:?}, not idle")]
    NotIdle(SequencerState),
}

/// Drives one motion request at a time through
/// ready check, move, settle and completion wait.
pub struct MotionSequencer<L> {
    poller: ReadinessPoller<L>,
    config: SequencerConfig,
    state: watch::Sender<SequencerState>,
}

impl<L: StageLink> MotionSequencer<L> {
    pub fn new(link: L, config: SequencerConfig) -> Self {
        let (state, _) = watch::channel(SequencerState::Idle);

        Self {
            poller: ReadinessPoller::new(link, config.poll_interval),
            config,
            state,
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn state(&self) -> SequencerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SequencerState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SequencerState) {
        let previous = self.state.send_replace(next);
        tracing::debug!("sequencer {:?} -> {:?}", previous, next);
    }

    /// Services `request` to a terminal outcome and returns to `Idle`.
    ///
    /// Link failures end the request with [`MotionOutcome::TransportFailed`]
    /// and are not retried.
    pub async fn run(&mut self, request: MotionRequest) -> Result<MotionOutcome, SequencerError> {
        let state = self.state();
        if state != SequencerState::Idle {
            return Err(SequencerError::NotIdle(state));
        }

        let span = tracing::info_span!(
            "motion",
            axis = request.axis,
            target = request.target_position_mm
        );

        let outcome = match self.sequence(&request).instrument(span).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "Motion of axis {} to {} mm failed: {}",
                    request.axis,
                    request.target_position_mm,
                    e
                );
                MotionOutcome::TransportFailed(e.to_string())
            }
        };

        self.transition(SequencerState::Idle);

        Ok(outcome)
    }

    async fn sequence(&self, request: &MotionRequest) -> Result<MotionOutcome, StageError> {
        tracing::info!(
            "Received target position: {:.2} mm",
            request.target_position_mm
        );

        self.transition(SequencerState::AwaitingReady);
        if !self.poller.wait_until_ready(self.config.ready_timeout).await? {
            tracing::warn!("Controller not ready. Skipping move.");
            return Ok(MotionOutcome::SkippedNotReady);
        }

        self.transition(SequencerState::Moving);
        self.poller
            .link()
            .move_absolute(request.axis, request.target_position_mm)
            .await?;
        tokio::time::sleep(self.config.settle_delay).await;

        self.transition(SequencerState::Completing);
        self.poller.wait_until_not_busy(request).await?;

        tracing::info!(
            "Axis {} motion to {} mm complete.",
            request.axis,
            request.target_position_mm
        );

        Ok(MotionOutcome::Completed)
    }

    /// Only an idle sequencer may shut down; afterwards every request is refused.
    pub fn shutdown(&mut self) -> Result<(), SequencerError> {
        match self.state() {
            SequencerState::Idle => {
                self.transition(SequencerState::ShutDown);
                Ok(())
            }
            state => Err(SequencerError::NotIdle(state)),
        }
    }
}
