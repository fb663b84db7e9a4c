use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Fixed-interval retry schedule, optionally bounded by a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl PollSchedule {
    pub fn bounded(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            deadline: Some(timeout),
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl PollOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { attempts } | PollOutcome::TimedOut { attempts } => *attempts,
        }
    }
}

/// Calls `probe` until it yields `true`, sleeping `interval` between attempts.
///
/// The first probe runs immediately. The deadline is checked before every
/// attempt, so a probe that is already running is never cut short. A probe
/// error ends the poll and is returned as is.
pub async fn poll_until<F, Fut, E>(schedule: PollSchedule, mut probe: F) -> Result<PollOutcome, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        if let Some(deadline) = schedule.deadline {
            if start.elapsed() >= deadline {
                return Ok(PollOutcome::TimedOut { attempts });
            }
        }

        attempts += 1;
        if probe(attempts).await? {
            return Ok(PollOutcome::Satisfied { attempts });
        }

        tokio::time::sleep(schedule.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const INTERVAL: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn satisfied_on_first_attempt_does_not_sleep() {
        let start = Instant::now();

        let outcome = poll_until(PollSchedule::unbounded(INTERVAL), |_| async {
            Ok::<_, Infallible>(true)
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Satisfied { attempts: 1 });
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_at_fixed_interval() {
        let start = Instant::now();
        let mut seen = Vec::new();

        let outcome = poll_until(PollSchedule::unbounded(INTERVAL), |attempt| {
            seen.push(start.elapsed());
            async move { Ok::<_, Infallible>(attempt == 4) }
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Satisfied { attempts: 4 });
        assert_eq!(
            seen,
            vec![
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_poll_times_out() {
        let schedule = PollSchedule::bounded(INTERVAL, Duration::from_secs(10));

        let outcome = poll_until(schedule, |_| async { Ok::<_, Infallible>(false) })
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 20 });
        assert!(!outcome.is_satisfied());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_never_probes() {
        let schedule = PollSchedule::bounded(INTERVAL, Duration::ZERO);

        let outcome = poll_until(schedule, |_| async { Ok::<_, Infallible>(true) })
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_ends_poll() {
        let outcome = poll_until(PollSchedule::unbounded(INTERVAL), |attempt| async move {
            if attempt == 3 { Err("link down") } else { Ok(false) }
        })
        .await;

        assert_eq!(outcome, Err("link down"));
    }
}
