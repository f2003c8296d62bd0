//! Store plugins: ordered interceptors around every engine step.
//!
//! A plugin implements any subset of the [`StorePlugin`] hooks; every hook
//! has a pass-through default. Plugins run in the order they were added to
//! the store, and a failing hook is logged and skipped without disturbing the
//! other plugins or the value being processed.

pub mod logging;
pub mod metrics;
pub mod recording;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::{panic_message, StoreError};
use crate::event::StoreEvent;
use crate::mvi::{Action, Intent, State};
use crate::recovery::{ExceptionHandlerResult, Resolution};
use crate::store::Store;

pub use logging::LoggingPlugin;
pub use metrics::{MetricsPlugin, MetricsSnapshot};
pub use recording::RecordingPlugin;

/// Decision returned by the intent, state and action hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception<T> {
    /// Keep the value as it is.
    Proceed,
    /// Continue with a different value.
    Replace(T),
    /// Stop processing this value. Later plugins never see it.
    Drop,
}

/// A capability bundle that observes or intercepts store steps.
///
/// Hooks may suspend; the engine awaits each one before moving on. Errors
/// (and panics) are isolated per plugin and per hook.
#[async_trait]
pub trait StorePlugin<S, I, A>: Send + Sync
where
    S: State,
    I: Intent,
    A: Action,
{
    /// Name used in log records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called when the store starts, before `StoreStarted` is recorded.
    async fn on_start(&self, _store: &Store<S, I, A>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Inspect, replace or drop an intent before it reaches the reducer.
    async fn on_intent(&self, _intent: &I) -> anyhow::Result<Interception<I>> {
        Ok(Interception::Proceed)
    }

    /// Inspect, replace or veto a state transition before it is published.
    async fn on_state(&self, _old: &S, _new: &S) -> anyhow::Result<Interception<S>> {
        Ok(Interception::Proceed)
    }

    /// Inspect, replace or drop an action before it is emitted.
    async fn on_action(&self, _action: &A) -> anyhow::Result<Interception<A>> {
        Ok(Interception::Proceed)
    }

    /// Offered every reducer error. Return `Rethrow` to defer to the next plugin.
    async fn on_exception(
        &self,
        error: &StoreError,
        _store: &Store<S, I, A>,
    ) -> anyhow::Result<ExceptionHandlerResult<I, A>> {
        Ok(ExceptionHandlerResult::Rethrow(error.clone()))
    }

    /// Called once when the processing loop ends, with its terminating error.
    async fn on_stop(&self, _final_state: &S, _error: Option<&StoreError>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called for every event the engine records, after the step's specific hook.
    async fn on_event(&self, _event: &StoreEvent<S, I, A>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ordered list of plugins with per-hook failure isolation.
pub(crate) struct PluginPipeline<S, I, A> {
    store: String,
    plugins: Vec<Arc<dyn StorePlugin<S, I, A>>>,
}

impl<S, I, A> PluginPipeline<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    pub(crate) fn new(store: String, plugins: Vec<Arc<dyn StorePlugin<S, I, A>>>) -> Self {
        Self { store, plugins }
    }

    pub(crate) fn len(&self) -> usize {
        self.plugins.len()
    }

    pub(crate) async fn start(&self, store: &Store<S, I, A>) {
        for plugin in &self.plugins {
            self.guard(&**plugin, "on_start", plugin.on_start(store))
                .await;
        }
    }

    pub(crate) async fn intercept_intent(&self, intent: I) -> Option<I> {
        let mut current = intent;
        for plugin in &self.plugins {
            match self
                .guard(&**plugin, "on_intent", plugin.on_intent(&current))
                .await
            {
                Some(Interception::Proceed) | None => {}
                Some(Interception::Replace(next)) => current = next,
                Some(Interception::Drop) => {
                    tracing::debug!(
                        store = %self.store,
                        plugin = %plugin.name(),
                        intent = ?current,
                        "Intent dropped by plugin"
                    );
                    return None;
                }
            }
        }
        Some(current)
    }

    pub(crate) async fn intercept_state(&self, old: &S, new: S) -> Option<S> {
        let mut current = new;
        for plugin in &self.plugins {
            match self
                .guard(&**plugin, "on_state", plugin.on_state(old, &current))
                .await
            {
                Some(Interception::Proceed) | None => {}
                Some(Interception::Replace(next)) => current = next,
                Some(Interception::Drop) => {
                    tracing::debug!(
                        store = %self.store,
                        plugin = %plugin.name(),
                        "State transition vetoed by plugin"
                    );
                    return None;
                }
            }
        }
        Some(current)
    }

    pub(crate) async fn intercept_action(&self, action: A) -> Option<A> {
        let mut current = action;
        for plugin in &self.plugins {
            match self
                .guard(&**plugin, "on_action", plugin.on_action(&current))
                .await
            {
                Some(Interception::Proceed) | None => {}
                Some(Interception::Replace(next)) => current = next,
                Some(Interception::Drop) => {
                    tracing::debug!(
                        store = %self.store,
                        plugin = %plugin.name(),
                        action = ?current,
                        "Action dropped by plugin"
                    );
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Run the recovery protocol: the first non-`Rethrow` result wins.
    pub(crate) async fn resolve_exception(
        &self,
        error: &StoreError,
        store: &Store<S, I, A>,
    ) -> ExceptionHandlerResult<I, A> {
        let mut resolution = Resolution::new(error.clone());
        for plugin in &self.plugins {
            // A failing exception hook leaves the working result untouched.
            let Some(result) = self
                .guard(&**plugin, "on_exception", plugin.on_exception(error, store))
                .await
            else {
                continue;
            };
            if resolution.offer(result).is_break() {
                tracing::debug!(
                    store = %self.store,
                    plugin = %plugin.name(),
                    "Exception claimed by plugin"
                );
                break;
            }
        }
        resolution.finish()
    }

    pub(crate) async fn stop(&self, final_state: &S, error: Option<&StoreError>) {
        for plugin in &self.plugins {
            self.guard(&**plugin, "on_stop", plugin.on_stop(final_state, error))
                .await;
        }
    }

    pub(crate) async fn dispatch_event(&self, event: &StoreEvent<S, I, A>) {
        for plugin in &self.plugins {
            self.guard(&**plugin, "on_event", plugin.on_event(event))
                .await;
        }
    }

    /// Await one hook, turning errors and panics into a log record.
    async fn guard<T, F>(
        &self,
        plugin: &dyn StorePlugin<S, I, A>,
        hook: &'static str,
        fut: F,
    ) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                tracing::warn!(
                    store = %self.store,
                    plugin = %plugin.name(),
                    hook,
                    error = %format!("{err:#}"),
                    "Plugin hook failed"
                );
                None
            }
            Err(payload) => {
                tracing::warn!(
                    store = %self.store,
                    plugin = %plugin.name(),
                    hook,
                    panic = %panic_message(payload.as_ref()),
                    "Plugin hook panicked"
                );
                None
            }
        }
    }
}
