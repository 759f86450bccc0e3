use crate::scheduler::JobError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handed to every job execution.
///
/// The token is a child of the scheduler's shutdown token and is also
/// cancelled when the execution runs past its deadline.
#[derive(Clone)]
pub struct JobContext {
    token: CancellationToken,
    deadline: Instant,
}

impl JobContext {
    #[must_use]
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + timeout,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Returns `Err(JobError::Cancelled)` once shutdown or the deadline hit.
    pub fn checkpoint(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), JobError> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(JobError::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(JobError::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}
