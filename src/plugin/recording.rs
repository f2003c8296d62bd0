//! Keeps the most recent store events for debugging and intent replay.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::RecordingConfig;
use crate::event::{StoreEvent, StoreEventKind};
use crate::mvi::{Action, Intent, State};
use crate::plugin::StorePlugin;
use crate::store::Store;

/// Bounded, insertion-ordered log of store events.
///
/// Once `capacity` events are held, each new event evicts the oldest.
pub struct RecordingPlugin<S, I, A> {
    capacity: usize,
    events: Mutex<VecDeque<StoreEvent<S, I, A>>>,
}

impl<S, I, A> RecordingPlugin<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Copy of the recorded events, oldest first.
    pub fn events(&self) -> Vec<StoreEvent<S, I, A>> {
        self.events.lock().iter().cloned().collect()
    }

    fn push(&self, event: StoreEvent<S, I, A>) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

impl<S, I, A> RecordingPlugin<S, I, A>
where
    S: State,
    I: Intent + PartialEq,
    A: Action,
{
    /// Intents the store received, oldest first.
    ///
    /// Intents the engine processed as exception recovery are left out:
    /// replaying the intent that failed reproduces the recovery by itself.
    /// A recovery intent is the next intent received after its dispatch,
    /// provided it equals the dispatched value. One that an intent hook
    /// replaced is kept.
    pub fn intents(&self) -> Vec<I> {
        let events = self.events.lock();
        let mut intents = Vec::new();
        let mut recovery: Option<&I> = None;
        for event in events.iter() {
            match &event.kind {
                StoreEventKind::RecoveryIntentDispatched { intent } => recovery = Some(intent),
                StoreEventKind::IntentReceived { intent } => {
                    if recovery.take() != Some(intent) {
                        intents.push(intent.clone());
                    }
                }
                StoreEventKind::StoreStarted { .. } | StoreEventKind::StoreStopped { .. } => {
                    recovery = None;
                }
                _ => {}
            }
        }
        intents
    }

    /// Re-submit every recorded intent to `store`, in order.
    ///
    /// Start `store` (which resets it to its initial state) first to
    /// reproduce the recorded trajectory. Returns the number submitted.
    pub fn replay(&self, store: &Store<S, I, A>) -> usize {
        let intents = self.intents();
        let count = intents.len();
        tracing::debug!(store = %store.name(), count, "Replaying recorded intents");
        for intent in intents {
            store.submit(intent);
        }
        count
    }
}

#[async_trait]
impl<S, I, A> StorePlugin<S, I, A> for RecordingPlugin<S, I, A>
where
    S: State,
    I: Intent,
    A: Action,
{
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_event(&self, event: &StoreEvent<S, I, A>) -> anyhow::Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    type Recorder = RecordingPlugin<u32, &'static str, ()>;

    fn intent(name: &'static str) -> StoreEvent<u32, &'static str, ()> {
        StoreEvent::new(StoreEventKind::IntentReceived { intent: name })
    }

    #[tokio::test]
    async fn trims_oldest_beyond_capacity() {
        let recorder = Recorder::new(2);
        for name in ["a", "b", "c"] {
            recorder.on_event(&intent(name)).await.expect("record");
        }
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.intents(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn intents_skip_recovery_dispatches() {
        let recorder = Recorder::new(10);
        let events = vec![
            intent("inc"),
            intent("explode"),
            StoreEvent::new(StoreEventKind::ExceptionCaught {
                error: StoreError::custom("boom"),
            }),
            StoreEvent::new(StoreEventKind::RecoveryIntentDispatched { intent: "reset" }),
            intent("reset"),
            intent("inc"),
        ];
        for event in &events {
            recorder.on_event(event).await.expect("record");
        }
        assert_eq!(recorder.intents(), vec!["inc", "explode", "inc"]);
    }

    async fn record_all(recorder: &Recorder, events: &[StoreEvent<u32, &'static str, ()>]) {
        for event in events {
            recorder.on_event(event).await.expect("record");
        }
    }

    fn dispatched(name: &'static str) -> StoreEvent<u32, &'static str, ()> {
        StoreEvent::new(StoreEventKind::RecoveryIntentDispatched { intent: name })
    }

    #[tokio::test]
    async fn recovery_cut_short_by_a_stop_does_not_swallow_the_next_run() {
        let recorder = Recorder::new(10);
        record_all(
            &recorder,
            &[
                StoreEvent::new(StoreEventKind::StoreStarted { initial_state: 0 }),
                intent("explode"),
                StoreEvent::new(StoreEventKind::ExceptionCaught {
                    error: StoreError::custom("boom"),
                }),
                dispatched("reset"),
                StoreEvent::new(StoreEventKind::StoreStopped {
                    final_state: 0,
                    error: None,
                }),
                StoreEvent::new(StoreEventKind::StoreStarted { initial_state: 0 }),
                intent("inc"),
            ],
        )
        .await;
        assert_eq!(recorder.intents(), vec!["explode", "inc"]);
    }

    #[tokio::test]
    async fn dropped_recovery_intent_keeps_the_next_submission() {
        let recorder = Recorder::new(10);
        record_all(
            &recorder,
            &[
                intent("explode"),
                StoreEvent::new(StoreEventKind::ExceptionCaught {
                    error: StoreError::custom("boom"),
                }),
                dispatched("reset"),
                intent("inc"),
                intent("inc"),
            ],
        )
        .await;
        assert_eq!(recorder.intents(), vec!["explode", "inc", "inc"]);
    }

    #[tokio::test]
    async fn clear_empties_the_log() {
        let recorder = Recorder::new(3);
        recorder.on_event(&intent("a")).await.expect("record");
        assert!(!recorder.is_empty());
        recorder.clear();
        assert!(recorder.is_empty());
        assert_eq!(recorder.capacity(), 3);
    }

    #[test]
    fn zero_capacity_keeps_one_event() {
        assert_eq!(Recorder::new(0).capacity(), 1);
    }
}
