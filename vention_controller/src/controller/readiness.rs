use std::time::Duration;

use utilities::poll::{PollSchedule, poll_until};

use crate::{command_executor::stage::StageError, controller::StageLink, models::MotionRequest};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls the stage's ready/busy flags at a fixed interval.
pub struct ReadinessPoller<L> {
    link: L,
    interval: Duration,
}

impl<L: StageLink> ReadinessPoller<L> {
    pub fn new(link: L, interval: Duration) -> Self {
        Self { link, interval }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Waits for a poll that sees the stage ready and not busy.
    ///
    /// Returns `false` once `timeout` passes without one. The busy query is
    /// only issued after the stage reported ready.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<bool, StageError> {
        let link = &self.link;
        let schedule = PollSchedule::bounded(self.interval, timeout);

        let outcome = poll_until(schedule, move |_| async move {
            Ok::<_, StageError>(link.is_ready().await? && !link.is_busy().await?)
        })
        .await?;

        if !outcome.is_satisfied() {
            tracing::warn!("Timeout waiting for controller to be ready.");
        }

        Ok(outcome.is_satisfied())
    }

    /// Waits, without a deadline, for the stage to stop reporting busy.
    pub async fn wait_until_not_busy(&self, request: &MotionRequest) -> Result<(), StageError> {
        let link = &self.link;
        let request = *request;
        let schedule = PollSchedule::unbounded(self.interval);

        let outcome = poll_until(schedule, move |_| async move {
            let busy = link.is_busy().await?;
            if busy {
                tracing::info!(
                    "Axis {} is moving to {} mm...",
                    request.axis,
                    request.target_position_mm
                );
            }
            Ok::<_, StageError>(!busy)
        })
        .await?;

        tracing::debug!("busy cleared after {} polls", outcome.attempts());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{Call, Reply, ScriptedLink};
    use tokio::time::Instant;

    fn poller(link: &ScriptedLink) -> ReadinessPoller<ScriptedLink> {
        ReadinessPoller::new(link.clone(), POLL_INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_poll() {
        let link = ScriptedLink::idle();

        assert!(poller(&link).wait_until_ready(Duration::from_secs(10)).await.unwrap());
        assert_eq!(link.calls(), vec![Call::IsReady, Call::IsBusy]);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_skips_busy_query_and_times_out() {
        let link = ScriptedLink::never_ready();
        let start = Instant::now();

        let ready = poller(&link)
            .wait_until_ready(Duration::from_secs(10))
            .await
            .unwrap();

        assert!(!ready);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        let calls = link.calls();
        assert_eq!(calls.len(), 20);
        assert!(calls.iter().all(|c| *c == Call::IsReady));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_three_times_then_ready() {
        use Reply::Value;
        let link = ScriptedLink::idle().with_busy(&[
            Value(true),
            Value(true),
            Value(true),
            Value(false),
        ]);
        let start = Instant::now();

        assert!(poller(&link).wait_until_ready(Duration::from_secs(10)).await.unwrap());

        let busy_times: Vec<Duration> = link
            .records()
            .into_iter()
            .filter(|r| r.call == Call::IsBusy)
            .map(|r| r.at - start)
            .collect();
        assert_eq!(
            busy_times,
            vec![
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_not_busy() {
        use Reply::Value;
        let link = ScriptedLink::idle().with_busy(&[Value(true), Value(true), Value(false)]);
        let start = Instant::now();

        poller(&link)
            .wait_until_not_busy(&MotionRequest::new(1, 100.0))
            .await
            .unwrap();

        assert_eq!(link.calls(), vec![Call::IsBusy; 3]);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_wait_has_no_deadline() {
        let link = ScriptedLink::idle().always_busy();

        let poller = poller(&link);
        let request = MotionRequest::new(1, 5.0);
        let wait = poller.wait_until_not_busy(&request);
        let result = tokio::time::timeout(Duration::from_secs(3600), wait).await;

        assert!(result.is_err());
        assert!(link.calls().len() >= 7200);
        assert!(link.calls().iter().all(|c| *c == Call::IsBusy));
    }

    #[tokio::test(start_paused = true)]
    async fn link_failure_is_returned() {
        let link = ScriptedLink::idle().with_ready(&[Reply::Value(false), Reply::Fail]);

        let result = poller(&link).wait_until_ready(Duration::from_secs(10)).await;

        assert!(matches!(result, Err(StageError::Transport(_))));
        assert_eq!(link.calls(), vec![Call::IsReady, Call::IsReady]);
    }
}
