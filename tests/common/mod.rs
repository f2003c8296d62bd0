//! Shared test fixtures: a counter store and helpers for inspecting events.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;
use std::time::Duration;

use mvi_store::{
    reducer_fn, RecordingPlugin, Reduction, Scope, Store, StoreBuilder, StoreEvent,
    StoreEventKind,
};

pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CounterIntent {
    Increment,
    Add(i64),
    Fail,
    Panic,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CounterAction {
    Milestone(i64),
    Recovered(String),
}

pub type CounterStore = Store<Counter, CounterIntent, CounterAction>;
pub type Recorder = RecordingPlugin<Counter, CounterIntent, CounterAction>;
pub type CounterEvent = StoreEvent<Counter, CounterIntent, CounterAction>;

/// Counts up; every nonzero multiple of 5 emits a milestone action.
pub fn reduce_counter(
    state: &Counter,
    intent: CounterIntent,
) -> anyhow::Result<Reduction<Counter, CounterAction>> {
    let count = match intent {
        CounterIntent::Increment => state.count + 1,
        CounterIntent::Add(n) => state.count + n,
        CounterIntent::Fail => anyhow::bail!("requested failure"),
        CounterIntent::Panic => panic!("kaboom"),
        CounterIntent::Reset => 0,
    };
    let next = Counter { count };
    if count != 0 && count != state.count && count % 5 == 0 {
        Ok(Reduction::with_action(next, CounterAction::Milestone(count)))
    } else {
        Ok(Reduction::state(next))
    }
}

pub fn counter_store() -> StoreBuilder<Counter, CounterIntent, CounterAction> {
    Store::builder(Counter::default(), reducer_fn(reduce_counter)).name("counter")
}

/// A recorder large enough that no test evicts from it.
pub fn recorder() -> Arc<Recorder> {
    Arc::new(RecordingPlugin::new(1_000))
}

pub fn event_names(recorder: &Recorder) -> Vec<&'static str> {
    recorder.events().iter().map(|e| e.name()).collect()
}

pub fn count_events(recorder: &Recorder, name: &str) -> usize {
    recorder.events().iter().filter(|e| e.name() == name).count()
}

/// Wait until the store's count equals `expected`.
pub async fn wait_for_count(store: &CounterStore, expected: i64) {
    let mut states = store.observe_state();
    tokio::time::timeout(WAIT, states.wait_for(|s| s.count == expected))
        .await
        .unwrap_or_else(|_| panic!("count never reached {expected}, now {:?}", store.state()))
        .expect("state channel closed");
}

/// Wait until `recorder` holds at least `n` events called `name`.
pub async fn wait_for_events(recorder: &Recorder, name: &str, n: usize) {
    let polled = tokio::time::timeout(WAIT, async {
        while count_events(recorder, name) < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        polled.is_ok(),
        "expected {n} '{name}' events, saw {:?}",
        event_names(recorder)
    );
}

/// Start `store` in a fresh root scope.
pub fn start(store: &CounterStore) -> (Scope, mvi_store::StoreLifecycle) {
    let scope = Scope::new();
    let lifecycle = store.start(&scope);
    (scope, lifecycle)
}

/// Stop `store` and wait for shutdown, returning the terminating error.
pub async fn stop_and_join(
    store: &CounterStore,
    lifecycle: &mvi_store::StoreLifecycle,
) -> Option<mvi_store::StoreError> {
    store.stop();
    tokio::time::timeout(WAIT, lifecycle.join())
        .await
        .expect("store did not stop in time")
}

pub fn stopped_error(event: &CounterEvent) -> Option<String> {
    match &event.kind {
        StoreEventKind::StoreStopped { error, .. } => error.as_ref().map(|e| e.to_string()),
        _ => None,
    }
}
