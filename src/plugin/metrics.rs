use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::event::{StoreEvent, StoreEventKind};
use crate::mvi::{Action, Intent, State};
use crate::plugin::StorePlugin;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub starts: u64,
    pub stops: u64,
    pub intents: u64,
    pub state_changes: u64,
    pub actions: u64,
    pub exceptions: u64,
    pub recovery_intents: u64,
    pub recovery_actions: u64,
    /// Mean time from `IntentReceived` to the first outcome event, in ms.
    pub avg_latency_ms: f64,
    pub max_latency: Option<Duration>,
    pub last_error: Option<String>,
}

/// Counts store events and measures how long intents take to produce an
/// outcome (state change, action or exception).
#[derive(Default)]
pub struct MetricsPlugin {
    inner: RwLock<MetricsAccumulator>,
}

#[derive(Default)]
struct MetricsAccumulator {
    snapshot: MetricsSnapshot,
    pending_since: Option<SystemTime>,
    latency_total: Duration,
    latency_samples: u64,
}

impl MetricsAccumulator {
    fn update<S, I, A>(&mut self, event: &StoreEvent<S, I, A>) {
        let counters = &mut self.snapshot;
        match &event.kind {
            StoreEventKind::StoreStarted { .. } => counters.starts += 1,
            StoreEventKind::IntentReceived { .. } => {
                counters.intents += 1;
                self.pending_since = Some(event.timestamp);
                return;
            }
            StoreEventKind::StateChanged { .. } => counters.state_changes += 1,
            StoreEventKind::ActionSent { .. } => counters.actions += 1,
            StoreEventKind::ExceptionCaught { error } => {
                counters.exceptions += 1;
                counters.last_error = Some(error.to_string());
            }
            StoreEventKind::RecoveryIntentDispatched { .. } => counters.recovery_intents += 1,
            StoreEventKind::RecoveryActionSent { .. } => counters.recovery_actions += 1,
            StoreEventKind::StoreStopped { error, .. } => {
                counters.stops += 1;
                if let Some(error) = error {
                    counters.last_error = Some(error.to_string());
                }
                self.pending_since = None;
                return;
            }
        }

        if let Some(since) = self.pending_since.take() {
            let latency = event.timestamp.duration_since(since).unwrap_or_default();
            self.latency_total = self.latency_total.saturating_add(latency);
            self.latency_samples += 1;
            let max = self.snapshot.max_latency.get_or_insert(latency);
            if latency > *max {
                *max = latency;
            }
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.latency_samples == 0 {
            return 0.0;
        }
        self.latency_total.as_secs_f64() * 1000.0 / self.latency_samples as f64
    }
}

impl MetricsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read();
        let mut snapshot = inner.snapshot.clone();
        snapshot.avg_latency_ms = inner.avg_latency_ms();
        snapshot
    }

    pub fn reset(&self) {
        *self.inner.write() = MetricsAccumulator::default();
    }
}

#[async_trait]
impl<S, I, A> StorePlugin<S, I, A> for MetricsPlugin
where
    S: State,
    I: Intent,
    A: Action,
{
    fn name(&self) -> &str {
        "metrics"
    }

    async fn on_event(&self, event: &StoreEvent<S, I, A>) -> anyhow::Result<()> {
        self.inner.write().update(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    type Event = StoreEvent<u8, &'static str, &'static str>;

    fn at(kind: StoreEventKind<u8, &'static str, &'static str>, offset_ms: u64) -> Event {
        StoreEvent {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_millis(offset_ms),
            kind,
        }
    }

    #[tokio::test]
    async fn counts_each_kind() {
        let metrics = MetricsPlugin::new();
        let events = vec![
            at(StoreEventKind::StoreStarted { initial_state: 0 }, 0),
            at(StoreEventKind::IntentReceived { intent: "inc" }, 10),
            at(StoreEventKind::StateChanged { old: 0, new: 1 }, 14),
            at(StoreEventKind::ActionSent { action: "toast" }, 15),
            at(StoreEventKind::IntentReceived { intent: "boom" }, 20),
            at(
                StoreEventKind::ExceptionCaught {
                    error: StoreError::custom("boom"),
                },
                22,
            ),
            at(StoreEventKind::RecoveryActionSent { action: "sorry" }, 23),
            at(
                StoreEventKind::StoreStopped {
                    final_state: 1,
                    error: None,
                },
                30,
            ),
        ];
        for event in &events {
            metrics.on_event(event).await.expect("update");
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.starts, 1);
        assert_eq!(snapshot.stops, 1);
        assert_eq!(snapshot.intents, 2);
        assert_eq!(snapshot.state_changes, 1);
        assert_eq!(snapshot.actions, 1);
        assert_eq!(snapshot.exceptions, 1);
        assert_eq!(snapshot.recovery_actions, 1);
        assert_eq!(snapshot.recovery_intents, 0);
        assert_eq!(snapshot.last_error.as_deref(), Some("boom"));
        // Samples: 4ms (inc -> StateChanged) and 2ms (boom -> ExceptionCaught).
        assert_eq!(snapshot.max_latency, Some(Duration::from_millis(4)));
        assert!((snapshot.avg_latency_ms - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn intent_without_outcome_is_not_sampled() {
        let metrics = MetricsPlugin::new();
        metrics
            .on_event(&at(StoreEventKind::IntentReceived { intent: "noop" }, 0))
            .await
            .expect("update");
        metrics
            .on_event(&at(StoreEventKind::IntentReceived { intent: "inc" }, 50))
            .await
            .expect("update");
        metrics
            .on_event(&at(StoreEventKind::StateChanged { old: 0, new: 1 }, 51))
            .await
            .expect("update");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.max_latency, Some(Duration::from_millis(1)));

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
