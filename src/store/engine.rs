//! The processing loop behind a running store.

use std::panic::AssertUnwindSafe;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::actions::{ActionBus, Delivery};
use super::lifecycle::{LifecycleStatus, StoreLifecycle};
use super::Store;
use crate::error::StoreError;
use crate::event::{StoreEvent, StoreEventKind};
use crate::mvi::{Action, Intent, Reduction, State};
use crate::recovery::ExceptionHandlerResult;
use crate::scope::Scope;

/// Sole writer of the store's state for the duration of one run.
pub(super) struct Worker<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    store: Store<S, I, A>,
    run: Uuid,
    scope: Scope,
    bus: ActionBus<A>,
    status: watch::Sender<LifecycleStatus>,
    current: S,
}

impl<S, I, A> Worker<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    pub(super) fn new(
        store: Store<S, I, A>,
        run: Uuid,
        scope: Scope,
        bus: ActionBus<A>,
        status: watch::Sender<LifecycleStatus>,
    ) -> Self {
        let current = store.inner.initial_state.clone();
        Self {
            store,
            run,
            scope,
            bus,
            status,
            current,
        }
    }

    /// `previous` is the run this one replaces, if it may still be shutting down.
    pub(super) async fn run(
        mut self,
        previous: Option<StoreLifecycle>,
        mut intents: mpsc::UnboundedReceiver<I>,
    ) {
        let store = self.store.clone();
        if let Some(previous) = previous {
            previous.join().await;
            // The old loop may have committed after `start` reset the state.
            let initial = &store.inner.initial_state;
            store.inner.state.send_if_modified(|state| {
                if *state == *initial {
                    return false;
                }
                *state = initial.clone();
                true
            });
        }

        store.inner.pipeline.start(&store).await;
        self.record(StoreEventKind::StoreStarted {
            initial_state: self.current.clone(),
        })
        .await;

        let error = self.process_loop(&mut intents).await;
        self.shutdown(intents, error).await;
    }

    /// Returns the fatal error, if the loop ended because of one.
    async fn process_loop(&mut self, intents: &mut mpsc::UnboundedReceiver<I>) -> Option<StoreError> {
        let scope = self.scope.clone();
        loop {
            let intent = tokio::select! {
                biased;
                _ = scope.cancelled() => return None,
                next = intents.recv() => match next {
                    Some(intent) => intent,
                    None => return None,
                },
            };

            let outcome = tokio::select! {
                biased;
                _ = scope.cancelled() => return None,
                outcome = self.process(intent) => outcome,
            };

            if let Err(error) = outcome {
                return Some(error);
            }
        }
    }

    /// Process one submitted intent plus any recovery intents it leads to.
    async fn process(&mut self, intent: I) -> Result<(), StoreError> {
        let mut next = Some(intent);
        while let Some(intent) = next.take() {
            next = self.process_one(intent).await?;
        }
        Ok(())
    }

    /// Returns a recovery intent to run next, or the fatal error.
    async fn process_one(&mut self, intent: I) -> Result<Option<I>, StoreError> {
        let store = self.store.clone();
        let Some(intent) = store.inner.pipeline.intercept_intent(intent).await else {
            return Ok(None);
        };
        self.record(StoreEventKind::IntentReceived {
            intent: intent.clone(),
        })
        .await;

        match self.reduce(intent) {
            Ok(reduction) => {
                self.commit(reduction).await;
                Ok(None)
            }
            Err(error) => self.recover(error).await,
        }
    }

    fn reduce(&self, intent: I) -> Result<Reduction<S, A>, StoreError> {
        let reducer = &self.store.inner.reducer;
        match std::panic::catch_unwind(AssertUnwindSafe(|| reducer.reduce(&self.current, intent))) {
            Ok(Ok(reduction)) => Ok(reduction),
            Ok(Err(err)) => Err(StoreError::reduce(err)),
            Err(payload) => Err(StoreError::from_panic(payload)),
        }
    }

    async fn commit(&mut self, reduction: Reduction<S, A>) {
        let store = self.store.clone();
        let Reduction { state, action } = reduction;

        if state != self.current {
            let accepted = store.inner.pipeline.intercept_state(&self.current, state).await;
            if let Some(state) = accepted.filter(|s| *s != self.current) {
                let old = std::mem::replace(&mut self.current, state.clone());
                store.inner.state.send_replace(state.clone());
                self.record(StoreEventKind::StateChanged { old, new: state })
                    .await;
            }
        }

        if let Some(action) = action {
            self.send_action(action, false).await;
        }
    }

    async fn recover(&mut self, error: StoreError) -> Result<Option<I>, StoreError> {
        let store = self.store.clone();
        tracing::debug!(store = %store.inner.name, error = %error, "Reducer failed");

        match store.inner.pipeline.resolve_exception(&error, &store).await {
            ExceptionHandlerResult::Handled => {
                self.record(StoreEventKind::ExceptionCaught { error }).await;
                Ok(None)
            }
            ExceptionHandlerResult::DispatchIntent(intent) => {
                self.record(StoreEventKind::ExceptionCaught { error }).await;
                self.record(StoreEventKind::RecoveryIntentDispatched {
                    intent: intent.clone(),
                })
                .await;
                Ok(Some(intent))
            }
            ExceptionHandlerResult::SendAction(action) => {
                self.record(StoreEventKind::ExceptionCaught { error }).await;
                self.send_action(action, true).await;
                Ok(None)
            }
            ExceptionHandlerResult::Rethrow(error) => {
                self.record(StoreEventKind::ExceptionCaught {
                    error: error.clone(),
                })
                .await;
                tracing::error!(
                    store = %store.inner.name,
                    error = %error,
                    "Unrecovered error, stopping store"
                );
                Err(error)
            }
        }
    }

    async fn send_action(&self, action: A, recovery: bool) {
        let store = self.store.clone();
        let Some(action) = store.inner.pipeline.intercept_action(action).await else {
            return;
        };

        if recovery {
            self.record(StoreEventKind::RecoveryActionSent {
                action: action.clone(),
            })
            .await;
        }

        match self.bus.emit(action.clone()).await {
            Delivery::Delivered => {}
            Delivery::NoReceivers => {
                tracing::debug!(store = %store.inner.name, action = ?action, "No action observers");
            }
            Delivery::Full => {
                tracing::warn!(store = %store.inner.name, action = ?action, "Action channel full, action dropped");
            }
            Delivery::Closed => {
                tracing::warn!(store = %store.inner.name, action = ?action, "Action channel closed, action dropped");
            }
        }

        if !recovery {
            self.record(StoreEventKind::ActionSent { action }).await;
        }
    }

    async fn record(&self, kind: StoreEventKind<S, I, A>) {
        let event = StoreEvent::new(kind);
        self.store.inner.pipeline.dispatch_event(&event).await;
    }

    async fn shutdown(self, mut intents: mpsc::UnboundedReceiver<I>, error: Option<StoreError>) {
        // Refuse new submissions before the slow part of shutdown.
        self.scope.cancel();
        intents.close();

        let store = self.store.clone();
        store
            .inner
            .pipeline
            .stop(&self.current, error.as_ref())
            .await;
        self.record(StoreEventKind::StoreStopped {
            final_state: self.current.clone(),
            error: error.clone(),
        })
        .await;

        {
            let mut session = store.inner.session.lock();
            if session.as_ref().is_some_and(|s| s.lifecycle.id() == self.run) {
                *session = None;
            }
        }
        store.inner.actions.lock().release(self.run);

        let pending = std::iter::from_fn(|| intents.try_recv().ok()).count();
        if pending > 0 {
            tracing::warn!(store = %store.inner.name, pending, "Store stopped with unprocessed intents");
        }

        match &error {
            Some(err) => tracing::info!(store = %store.inner.name, run = %self.run, error = %err, "Store stopped"),
            None => tracing::info!(store = %store.inner.name, run = %self.run, "Store stopped"),
        }

        let Worker { bus, status, .. } = self;
        drop(bus);
        status.send_replace(LifecycleStatus::Stopped { error });
    }
}
