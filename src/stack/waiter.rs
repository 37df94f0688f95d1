//! Polling waiter for long-running stack lifecycle transitions.
//!
//! The wait is bounded only by the remote resource's own terminal states;
//! there is no default timeout. Callers that need a hard bound should request
//! asynchronous mode from the lifecycle manager and poll externally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{Result, StackError};
use crate::provider::{StackOps, StackStatus};

/// Seconds between status polls.
const POLL_INTERVAL_SECS: u64 = 5;

/// Seconds of silence after which a "still working" notice is emitted, so
/// automated callers do not mistake a long wait for a hang.
const FEEDBACK_INTERVAL_SECS: u64 = 30;

/// Cooperative cancellation signal checked between poll sleeps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Polls a stack's lifecycle status until a terminal predicate holds.
pub struct StackWaiter<'a> {
    /// Stack control plane.
    stacks: &'a dyn StackOps,
    /// Interval between polls.
    poll_interval: Duration,
    /// Interval between progress notices.
    feedback_interval: Duration,
}

impl<'a> StackWaiter<'a> {
    /// Creates a waiter with the default intervals.
    #[must_use]
    pub fn new(stacks: &'a dyn StackOps) -> Self {
        Self {
            stacks,
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            feedback_interval: Duration::from_secs(FEEDBACK_INTERVAL_SECS),
        }
    }

    /// Overrides the poll and feedback intervals.
    #[must_use]
    pub const fn with_intervals(mut self, poll: Duration, feedback: Duration) -> Self {
        self.poll_interval = poll;
        self.feedback_interval = feedback;
        self
    }

    /// The configured poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits until `predicate` accepts the stack's status.
    ///
    /// The predicate receives `None` once the stack no longer exists, which
    /// is the terminal condition for deletes. Returns the status that
    /// satisfied the predicate.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::Cancelled`] if the cancellation signal is raised
    /// between polls, or any error from the status endpoint.
    pub async fn wait_until<F>(
        &self,
        stack_name: &str,
        operation: &str,
        predicate: F,
        cancel: &CancelFlag,
    ) -> Result<Option<StackStatus>>
    where
        F: Fn(Option<&StackStatus>) -> bool + Send,
    {
        let started = Instant::now();
        let mut last_notice = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(StackError::Cancelled {
                    stack_name: stack_name.to_string(),
                }
                .into());
            }

            let status = self
                .stacks
                .describe_stack(stack_name)
                .await?
                .map(|d| d.status);

            if predicate(status.as_ref()) {
                return Ok(status);
            }

            if last_notice.elapsed() >= self.feedback_interval {
                info!(
                    "still waiting for {operation} on stack \"{stack_name}\" \
                     ({}s elapsed)...",
                    started.elapsed().as_secs()
                );
                last_notice = Instant::now();
            }

            if cancel.is_cancelled() {
                return Err(StackError::Cancelled {
                    stack_name: stack_name.to_string(),
                }
                .into());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagehandError;
    use crate::provider::memory::InMemoryStacks;
    use crate::provider::StackDescription;
    use std::collections::BTreeMap;

    fn stack(name: &str, status: StackStatus) -> StackDescription {
        StackDescription {
            stack_id: format!("arn:stack/{name}"),
            name: name.to_string(),
            status,
            parameters: vec![],
            tags: vec![],
            outputs: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_wait_returns_once_predicate_holds() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(stack("app-dev", StackStatus::CreateComplete));

        let waiter = StackWaiter::new(&stacks)
            .with_intervals(Duration::from_millis(1), Duration::from_secs(60));
        let status = waiter
            .wait_until(
                "app-dev",
                "create",
                |s| s.is_some_and(StackStatus::is_terminal),
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(status, Some(StackStatus::CreateComplete));
    }

    #[tokio::test]
    async fn test_wait_for_delete_accepts_missing_stack() {
        let stacks = InMemoryStacks::new();

        let waiter = StackWaiter::new(&stacks)
            .with_intervals(Duration::from_millis(1), Duration::from_secs(60));
        let status = waiter
            .wait_until("app-dev", "delete", |s| s.is_none(), &CancelFlag::new())
            .await
            .unwrap();

        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_wins_over_polling() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(stack("app-dev", StackStatus::CreateInProgress));

        let cancel = CancelFlag::new();
        cancel.cancel();

        let waiter = StackWaiter::new(&stacks)
            .with_intervals(Duration::from_millis(1), Duration::from_secs(60));
        let err = waiter
            .wait_until(
                "app-dev",
                "create",
                |s| s.is_some_and(StackStatus::is_terminal),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagehandError::Stack(StackError::Cancelled { .. })
        ));
    }
}
