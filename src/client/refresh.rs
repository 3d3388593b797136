//! Usage: Single-flight coordination for access-token refresh.
//!
//! State machine: `Idle -> Refreshing -> Idle`. The first caller that finds the coordinator idle
//! becomes the leader and runs the refresh; everyone arriving while it is in flight parks a
//! oneshot sender and receives the leader's outcome. Each coordinator is owned by one client, so
//! separate clients never share refresh state.

use crate::shared::mutex_ext::MutexExt;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(String),
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshStatus {
    #[default]
    Idle,
    Refreshing,
}

#[derive(Debug, Default)]
struct RefreshState {
    status: RefreshStatus,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RefreshStatus {
        self.state.lock_or_recover().status
    }

    pub fn waiter_count(&self) -> usize {
        self.state.lock_or_recover().waiters.len()
    }

    /// Runs `refresh` unless one is already in flight, in which case the in-flight outcome is
    /// awaited instead.
    pub async fn run<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        let waiter = {
            let mut state = self.state.lock_or_recover();
            match state.status {
                RefreshStatus::Refreshing => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push(tx);
                    Some(rx)
                }
                RefreshStatus::Idle => {
                    state.status = RefreshStatus::Refreshing;
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            tracing::debug!("refresh already in flight; waiting for its outcome");
            return rx.await.unwrap_or(RefreshOutcome::Failed);
        }

        let mut guard = SettleGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = refresh().await;
        guard.settle(outcome.clone());
        outcome
    }

    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock_or_recover();
            state.status = RefreshStatus::Idle;
            std::mem::take(&mut state.waiters)
        };
        tracing::debug!(
            waiters = waiters.len(),
            refreshed = matches!(outcome, RefreshOutcome::Refreshed(_)),
            "refresh settled"
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Resolves waiters with `Failed` if the leader's future is dropped mid-refresh.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(&mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(RefreshOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let coordinator = RefreshCoordinator::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let refresh = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            RefreshOutcome::Refreshed("new1".to_string())
        };

        let (a, b, c) = tokio::join!(
            coordinator.run(refresh),
            coordinator.run(refresh),
            coordinator.run(refresh)
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for outcome in [a, b, c] {
            assert_eq!(outcome, RefreshOutcome::Refreshed("new1".to_string()));
        }
        assert_eq!(coordinator.status(), RefreshStatus::Idle);
        assert_eq!(coordinator.waiter_count(), 0);
    }

    #[tokio::test]
    async fn failure_is_shared_and_next_call_starts_fresh() {
        let coordinator = RefreshCoordinator::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let (a, b) = tokio::join!(
            coordinator.run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                RefreshOutcome::Failed
            }),
            coordinator.run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                RefreshOutcome::Refreshed("unused".to_string())
            })
        );
        assert_eq!((a, b), (RefreshOutcome::Failed, RefreshOutcome::Failed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let next = coordinator
            .run(|| async { RefreshOutcome::Refreshed("t2".to_string()) })
            .await;
        assert_eq!(next, RefreshOutcome::Refreshed("t2".to_string()));
    }

    #[tokio::test]
    async fn dropped_leader_fails_waiters() {
        let coordinator = RefreshCoordinator::new();

        let (leader, waiter) = tokio::join!(
            tokio::time::timeout(
                Duration::from_millis(20),
                coordinator.run(|| std::future::pending::<RefreshOutcome>())
            ),
            coordinator.run(|| async { RefreshOutcome::Refreshed("unused".to_string()) })
        );

        assert!(leader.is_err());
        assert_eq!(waiter, RefreshOutcome::Failed);
        assert_eq!(coordinator.status(), RefreshStatus::Idle);
    }
}
