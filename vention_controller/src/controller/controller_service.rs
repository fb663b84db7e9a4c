use anyhow::Context as _;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    controller::{StageLink, sequencer::MotionSequencer},
    models::{MotionEnvelope, MotionOutcome, MotionRequest, SequencerState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a motion is already in progress and the request queue is full")]
    QueueFull,
    #[error("controller service is shut down")]
    ShutDown,
}

async fn run_dispatcher<L: StageLink>(
    mut sequencer: MotionSequencer<L>,
    mut requests: mpsc::Receiver<MotionEnvelope>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            envelope = requests.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let MotionEnvelope { request, response } = envelope;

        match sequencer.run(request).await {
            Ok(outcome) => {
                let _ = response.send(outcome);
            }
            Err(e) => tracing::error!("Dropping motion request: {}", e),
        }
    }

    // Queued requests are dropped with the receiver; their submitters see ShutDown.
    requests.close();

    if let Err(e) = sequencer.shutdown() {
        tracing::error!("Sequencer did not shut down cleanly: {}", e);
    }
}

/// Serializes motion requests onto a single [`MotionSequencer`].
///
/// Requests wait in a bounded queue while a motion is in progress. Shutting
/// down lets the current motion reach its outcome before the sequencer, and
/// with it the stage connection, is released.
pub struct ControllerService {
    requests: mpsc::Sender<MotionEnvelope>,
    state: watch::Receiver<SequencerState>,
    shutdown: Option<oneshot::Sender<()>>,
    dispatcher: JoinHandle<()>,
    executor: Option<JoinHandle<()>>,
}

impl ControllerService {
    pub fn spawn<L: StageLink + 'static>(sequencer: MotionSequencer<L>, queue_depth: usize) -> Self {
        let (requests, requests_rx) = mpsc::channel(queue_depth.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let state = sequencer.subscribe();

        let dispatcher = tokio::spawn(run_dispatcher(sequencer, requests_rx, shutdown_rx));

        Self {
            requests,
            state,
            shutdown: Some(shutdown),
            dispatcher,
            executor: None,
        }
    }

    /// Ties the stage's command executor to the service so shutdown waits for it.
    pub fn with_executor(mut self, executor: JoinHandle<()>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn handle(&self) -> MotionHandle {
        MotionHandle {
            requests: self.requests.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> SequencerState {
        *self.state.borrow()
    }

    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        tracing::info!("Shutting down controller service");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        drop(self.requests);

        self.dispatcher
            .await
            .context("Motion dispatcher panicked")?;

        if let Some(executor) = self.executor.take() {
            executor.await.context("Stage command executor panicked")?;
        }

        tracing::info!("Controller connection closed");

        Ok(())
    }
}

/// Cloneable entry point for request sources.
#[derive(Clone)]
pub struct MotionHandle {
    requests: mpsc::Sender<MotionEnvelope>,
    state: watch::Receiver<SequencerState>,
}

impl MotionHandle {
    pub fn state(&self) -> SequencerState {
        *self.state.borrow()
    }

    /// Queues `request` without waiting; the receiver yields its outcome.
    pub fn try_submit(
        &self,
        request: MotionRequest,
    ) -> Result<oneshot::Receiver<MotionOutcome>, SubmitError> {
        let (response, outcome) = oneshot::channel();

        self.requests
            .try_send(MotionEnvelope { request, response })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SubmitError::ShutDown,
            })?;

        Ok(outcome)
    }

    pub async fn move_to(&self, request: MotionRequest) -> Result<MotionOutcome, SubmitError> {
        self.try_submit(request)?
            .await
            .map_err(|_| SubmitError::ShutDown)
    }

    /// Moves through `positions` in order, each one finished before the next.
    pub async fn run_sequence(
        &self,
        axis: u32,
        positions: &[f64],
    ) -> Result<Vec<MotionOutcome>, SubmitError> {
        let mut outcomes = Vec::with_capacity(positions.len());

        for &position in positions {
            let outcome = self.move_to(MotionRequest::new(axis, position)).await?;
            tracing::info!("Move of axis {} to {} mm: {}", axis, position, outcome);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
