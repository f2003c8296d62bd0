//! Event log entries emitted by the store engine.

use std::time::SystemTime;

use crate::error::StoreError;

/// A single entry in the store's event log.
#[derive(Debug, Clone)]
pub struct StoreEvent<S, I, A> {
    /// When the engine created this entry.
    pub timestamp: SystemTime,
    pub kind: StoreEventKind<S, I, A>,
}

/// Everything that can happen inside a store.
#[derive(Debug, Clone)]
pub enum StoreEventKind<S, I, A> {
    StoreStarted {
        initial_state: S,
    },
    IntentReceived {
        intent: I,
    },
    StateChanged {
        old: S,
        new: S,
    },
    ActionSent {
        action: A,
    },
    ExceptionCaught {
        error: StoreError,
    },
    RecoveryIntentDispatched {
        intent: I,
    },
    RecoveryActionSent {
        action: A,
    },
    /// Terminal entry. `error` is set when the loop died from an unrecovered error.
    StoreStopped {
        final_state: S,
        error: Option<StoreError>,
    },
}

impl<S, I, A> StoreEvent<S, I, A> {
    pub fn new(kind: StoreEventKind<S, I, A>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            kind,
        }
    }

    /// Short, stable name of the variant for logs and metrics.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl<S, I, A> StoreEventKind<S, I, A> {
    pub fn name(&self) -> &'static str {
        match self {
            StoreEventKind::StoreStarted { .. } => "store_started",
            StoreEventKind::IntentReceived { .. } => "intent_received",
            StoreEventKind::StateChanged { .. } => "state_changed",
            StoreEventKind::ActionSent { .. } => "action_sent",
            StoreEventKind::ExceptionCaught { .. } => "exception_caught",
            StoreEventKind::RecoveryIntentDispatched { .. } => "recovery_intent_dispatched",
            StoreEventKind::RecoveryActionSent { .. } => "recovery_action_sent",
            StoreEventKind::StoreStopped { .. } => "store_stopped",
        }
    }
}
