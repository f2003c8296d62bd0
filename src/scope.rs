//! Hierarchical cancellation scopes.
//!
//! A [`Scope`] is the parent context a store runs in (for example a UI
//! component's visible lifetime). Cancelling a scope cancels every scope
//! derived from it with [`Scope::child`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Cloneable cancellation handle. Clones share the same cancellation flag.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<ScopeInner>>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a scope that is cancelled together with this one.
    ///
    /// Cancelling the child does not affect the parent. A child of an
    /// already-cancelled scope starts out cancelled.
    pub fn child(&self) -> Scope {
        let child = Scope::new();
        let mut children = self.inner.children.lock();
        // Checked under the lock: cancel() flips the flag before draining.
        if self.is_cancelled() {
            drop(children);
            child.cancel();
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Cancel this scope and all of its descendants. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.notify.notify_waiters();

        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            Scope { inner: child }.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once this scope is cancelled.
    pub async fn cancelled(&self) {
        // Subscribe to Notify BEFORE checking the flag: otherwise cancel()
        // could fire between the check and the await and the wakeup is lost.
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
