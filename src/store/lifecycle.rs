use tokio::sync::watch;
use uuid::Uuid;

use crate::error::StoreError;
use crate::scope::Scope;

/// Where a store run is in its life.
#[derive(Debug, Clone)]
pub enum LifecycleStatus {
    Running,
    /// Shutdown finished: stop hooks ran and `StoreStopped` was recorded.
    Stopped { error: Option<StoreError> },
}

/// Cancellable handle to one run of a store, returned by `Store::start`.
///
/// Clones refer to the same run and compare equal.
#[derive(Clone)]
pub struct StoreLifecycle {
    id: Uuid,
    scope: Scope,
    status: watch::Receiver<LifecycleStatus>,
}

impl StoreLifecycle {
    pub(crate) fn new(scope: Scope, status: watch::Receiver<LifecycleStatus>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// False as soon as the run is cancelled or its loop has ended, even if
    /// shutdown is still in progress.
    pub fn is_running(&self) -> bool {
        !self.scope.is_cancelled() && matches!(*self.status.borrow(), LifecycleStatus::Running)
    }

    /// Request shutdown. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status.borrow().clone()
    }

    /// Wait for shutdown to finish. Returns the error that terminated the
    /// loop, or `None` for a normal stop.
    pub async fn join(&self) -> Option<StoreError> {
        let mut status = self.status.clone();
        let result = status
            .wait_for(|s| matches!(s, LifecycleStatus::Stopped { .. }))
            .await;
        match result {
            Ok(guard) => match &*guard {
                LifecycleStatus::Stopped { error } => error.clone(),
                LifecycleStatus::Running => None,
            },
            // Worker vanished without reporting (runtime shut down).
            Err(_) => None,
        }
    }
}

impl PartialEq for StoreLifecycle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StoreLifecycle {}

impl std::fmt::Debug for StoreLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLifecycle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn join_returns_terminal_error() {
        let (tx, rx) = watch::channel(LifecycleStatus::Running);
        let lifecycle = StoreLifecycle::new(Scope::new(), rx);
        assert!(lifecycle.is_running());

        let waiter = tokio::spawn({
            let lifecycle = lifecycle.clone();
            async move { lifecycle.join().await }
        });

        tx.send_replace(LifecycleStatus::Stopped {
            error: Some(StoreError::custom("fatal")),
        });
        let error = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("join should finish")
            .expect("join task");
        assert_eq!(error.map(|e| e.to_string()).as_deref(), Some("fatal"));
        assert!(!lifecycle.is_running());
    }

    #[tokio::test]
    async fn cancel_marks_not_running() {
        let (_tx, rx) = watch::channel(LifecycleStatus::Running);
        let lifecycle = StoreLifecycle::new(Scope::new(), rx);
        let copy = lifecycle.clone();
        lifecycle.cancel();
        assert!(!copy.is_running());
        assert_eq!(copy, lifecycle);
    }

    #[tokio::test]
    async fn join_after_sender_dropped_is_none() {
        let (tx, rx) = watch::channel(LifecycleStatus::Running);
        let lifecycle = StoreLifecycle::new(Scope::new(), rx);
        drop(tx);
        assert!(lifecycle.join().await.is_none());
    }
}
