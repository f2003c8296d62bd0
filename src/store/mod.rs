//! The store engine.
//!
//! A [`Store`] owns the current state, a queue of pending intents and an
//! outbound action channel. One worker task, spawned by [`Store::start`],
//! takes intents off the queue one at a time, runs them through the plugin
//! pipeline and the reducer, and publishes the result.
//!
//! ```text
//! submit ──→ queue ──→ on_intent ──→ reduce ──→ on_state ──→ observe_state
//!                                       │
//!                                       ├──→ on_action ──→ observe_actions
//!                                       └──→ (error) ──→ on_exception ──→ recovery
//! ```

mod actions;
mod engine;
mod lifecycle;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ActionChannelConfig, StoreConfig};
use crate::mvi::{Action, Intent, Reducer, State};
use crate::plugin::{PluginPipeline, StorePlugin};
use crate::scope::Scope;

pub use actions::ActionReceiver;
pub use lifecycle::{LifecycleStatus, StoreLifecycle};

use actions::ActionBus;
use engine::Worker;

type BoxedReducer<S, I, A> = Box<dyn Reducer<State = S, Intent = I, Action = A>>;

/// Unidirectional-data-flow state container. Cheap to clone; clones share
/// the same engine.
///
/// Dropping the last handle cancels the running loop. Handles passed to
/// plugin hooks do not count, so a plugin that keeps one does not keep the
/// store running.
pub struct Store<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    inner: Arc<StoreInner<S, I, A>>,
    handle: Option<Arc<HandleGuard<S, I, A>>>,
}

struct StoreInner<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    name: String,
    initial_state: S,
    reducer: BoxedReducer<S, I, A>,
    pipeline: PluginPipeline<S, I, A>,
    action_config: ActionChannelConfig,
    /// Written only by the running worker (and reset by `start`).
    state: watch::Sender<S>,
    actions: Mutex<ActionSlot<A>>,
    session: Mutex<Option<Session<I>>>,
}

/// The action channel handed to observers, and the run that owns it.
///
/// An unowned bus exists only before the first start; it is claimed by that
/// run so early observers see its actions. Every later run gets a fresh bus,
/// and shutdown releases the bus only if its own run still owns it.
struct ActionSlot<A> {
    bus: Option<ActionBus<A>>,
    owner: Option<Uuid>,
}

impl<A: Action> ActionSlot<A> {
    fn claim(&mut self, run: Uuid, config: &ActionChannelConfig) -> ActionBus<A> {
        let bus = match (self.owner, self.bus.take()) {
            (None, Some(bus)) => bus,
            _ => ActionBus::new(config),
        };
        self.owner = Some(run);
        self.bus = Some(bus.clone());
        bus
    }

    fn release(&mut self, run: Uuid) {
        if self.owner == Some(run) {
            self.bus = None;
            self.owner = None;
        }
    }
}

/// Cancels the current run when the last user-facing handle is dropped.
struct HandleGuard<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    inner: Weak<StoreInner<S, I, A>>,
}

impl<S, I, A> Drop for HandleGuard<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if let Some(session) = inner.session.lock().as_ref() {
            if session.lifecycle.is_running() {
                tracing::debug!(store = %inner.name, "Last store handle dropped, stopping");
            }
            session.lifecycle.cancel();
        };
    }
}

/// The currently running loop: where intents go and how to stop it.
struct Session<I> {
    intents: mpsc::UnboundedSender<I>,
    lifecycle: StoreLifecycle,
}

impl<S, I, A> Clone for Store<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handle: self.handle.clone(),
        }
    }
}

impl<S, I, A> Store<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    pub fn builder<R>(initial_state: S, reducer: R) -> StoreBuilder<S, I, A>
    where
        R: Reducer<State = S, Intent = I, Action = A>,
    {
        StoreBuilder::new(initial_state, reducer)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// A handle that does not keep the store running.
    pub(crate) fn detached(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handle: None,
        }
    }

    /// Start the processing loop inside a child of `parent`.
    ///
    /// Idempotent: while a run is active the existing handle is returned and
    /// no second loop is spawned. Otherwise the state is reset to its initial
    /// value and a new run begins. If the previous run is still shutting
    /// down, the new run waits for it before processing anything.
    /// Must be called within a Tokio runtime.
    pub fn start(&self, parent: &Scope) -> StoreLifecycle {
        let mut session = self.inner.session.lock();
        let previous = match session.as_ref() {
            Some(existing) if existing.lifecycle.is_running() => {
                tracing::debug!(store = %self.inner.name, "Store already running");
                return existing.lifecycle.clone();
            }
            Some(existing) => Some(existing.lifecycle.clone()),
            None => None,
        };

        let scope = parent.child();
        let (status_tx, status_rx) = watch::channel(LifecycleStatus::Running);
        let lifecycle = StoreLifecycle::new(scope.clone(), status_rx);
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();

        let bus = self
            .inner
            .actions
            .lock()
            .claim(lifecycle.id(), &self.inner.action_config);

        self.inner
            .state
            .send_replace(self.inner.initial_state.clone());

        *session = Some(Session {
            intents: intent_tx,
            lifecycle: lifecycle.clone(),
        });
        drop(session);

        tracing::info!(
            store = %self.inner.name,
            run = %lifecycle.id(),
            plugins = self.inner.pipeline.len(),
            "Store starting"
        );

        let span = tracing::info_span!("store_run", store = %self.inner.name, run = %lifecycle.id());
        let worker = Worker::new(self.detached(), lifecycle.id(), scope, bus, status_tx);
        tokio::spawn(worker.run(previous, intent_rx).instrument(span));

        lifecycle
    }

    /// Queue an intent. Never blocks and never fails; an intent submitted to
    /// a store that is not running is dropped and logged.
    pub fn submit(&self, intent: I) {
        let session = self.inner.session.lock();
        let Some(active) = session.as_ref().filter(|s| s.lifecycle.is_running()) else {
            tracing::warn!(
                store = %self.inner.name,
                intent = ?intent,
                "Store not running, intent dropped"
            );
            return;
        };

        if let Err(rejected) = active.intents.send(intent) {
            tracing::warn!(
                store = %self.inner.name,
                intent = ?rejected.0,
                "Intent queue closed, intent dropped"
            );
        }
    }

    /// Cancel the running loop, if any. Safe to call when already stopped.
    pub fn stop(&self) {
        if let Some(session) = self.inner.session.lock().as_ref() {
            session.lifecycle.cancel();
        }
    }

    /// Current state plus every later change. A new observer sees the
    /// current value immediately, never older history.
    pub fn observe_state(&self) -> watch::Receiver<S> {
        self.inner.state.subscribe()
    }

    /// [`Store::observe_state`] as a stream that yields the current value first.
    pub fn state_stream(&self) -> WatchStream<S> {
        WatchStream::new(self.observe_state())
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> S {
        self.inner.state.borrow().clone()
    }

    /// Actions emitted from now on. While the store is stopped the returned
    /// receiver is already closed; subscribe again after the next `start`.
    pub fn observe_actions(&self) -> ActionReceiver<A> {
        self.inner
            .actions
            .lock()
            .bus
            .as_ref()
            .map(ActionBus::subscribe)
            .unwrap_or_else(ActionReceiver::closed)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle().is_some_and(|l| l.is_running())
    }

    /// Handle of the current (or most recent unreleased) run.
    pub fn lifecycle(&self) -> Option<StoreLifecycle> {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.lifecycle.clone())
    }
}

impl<S, I, A> std::fmt::Debug for Store<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    initial_state: S,
    reducer: BoxedReducer<S, I, A>,
    name: String,
    action_config: ActionChannelConfig,
    plugins: Vec<Arc<dyn StorePlugin<S, I, A>>>,
}

impl<S, I, A> StoreBuilder<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    pub fn new<R>(initial_state: S, reducer: R) -> Self
    where
        R: Reducer<State = S, Intent = I, Action = A>,
    {
        let defaults = StoreConfig::default();
        Self {
            initial_state,
            reducer: Box::new(reducer),
            name: defaults.name,
            action_config: defaults.actions,
            plugins: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn actions(mut self, config: ActionChannelConfig) -> Self {
        self.action_config = config;
        self
    }

    /// Apply the name and action channel settings of a loaded config.
    pub fn config(self, config: &StoreConfig) -> Self {
        self.name(config.name.clone()).actions(config.actions)
    }

    /// Append a plugin. Plugins run in the order they are added.
    pub fn plugin<P>(mut self, plugin: P) -> Self
    where
        P: StorePlugin<S, I, A> + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Append a shared plugin, keeping a handle for inspection.
    pub fn shared_plugin(mut self, plugin: Arc<dyn StorePlugin<S, I, A>>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn build(self) -> Store<S, I, A> {
        let (state, _) = watch::channel(self.initial_state.clone());
        let actions = ActionSlot {
            bus: Some(ActionBus::new(&self.action_config)),
            owner: None,
        };
        let inner = Arc::new(StoreInner {
            pipeline: PluginPipeline::new(self.name.clone(), self.plugins),
            name: self.name,
            initial_state: self.initial_state,
            reducer: self.reducer,
            action_config: self.action_config,
            state,
            actions: Mutex::new(actions),
            session: Mutex::new(None),
        });
        let handle = Arc::new(HandleGuard {
            inner: Arc::downgrade(&inner),
        });
        Store {
            inner,
            handle: Some(handle),
        }
    }
}
