//! Writes every store event to `tracing`.
//!
//! Events are logged from inside the store's `store_run` span, which carries
//! the store name and run id, so one plugin can be shared between stores.

use async_trait::async_trait;

use crate::config::{LogLevel, LoggingConfig};
use crate::event::{StoreEvent, StoreEventKind};
use crate::mvi::{Action, Intent, State};
use crate::plugin::StorePlugin;

pub struct LoggingPlugin {
    level: LogLevel,
}

impl LoggingPlugin {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(config.level)
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }
}

impl Default for LoggingPlugin {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

/// One-line description of an event's payload.
fn describe<S, I, A>(kind: &StoreEventKind<S, I, A>) -> String
where
    S: State,
    I: Intent,
    A: Action,
{
    match kind {
        StoreEventKind::StoreStarted { initial_state } => format!("initial_state={initial_state:?}"),
        StoreEventKind::IntentReceived { intent } => format!("intent={intent:?}"),
        StoreEventKind::StateChanged { old, new } => format!("old={old:?} new={new:?}"),
        StoreEventKind::ActionSent { action } => format!("action={action:?}"),
        StoreEventKind::ExceptionCaught { error } => format!("error={error}"),
        StoreEventKind::RecoveryIntentDispatched { intent } => format!("intent={intent:?}"),
        StoreEventKind::RecoveryActionSent { action } => format!("action={action:?}"),
        StoreEventKind::StoreStopped {
            final_state,
            error: Some(error),
        } => format!("final_state={final_state:?} error={error}"),
        StoreEventKind::StoreStopped {
            final_state,
            error: None,
        } => format!("final_state={final_state:?}"),
    }
}

#[async_trait]
impl<S, I, A> StorePlugin<S, I, A> for LoggingPlugin
where
    S: State,
    I: Intent,
    A: Action,
{
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_event(&self, event: &StoreEvent<S, I, A>) -> anyhow::Result<()> {
        if self.level == LogLevel::Off {
            return Ok(());
        }

        let name = event.name();
        let detail = describe(&event.kind);

        match self.level {
            LogLevel::Off => {}
            LogLevel::Trace => tracing::trace!(event = name, "{detail}"),
            LogLevel::Debug => tracing::debug!(event = name, "{detail}"),
            LogLevel::Info => tracing::info!(event = name, "{detail}"),
            LogLevel::Warn => tracing::warn!(event = name, "{detail}"),
        }
        Ok(())
    }
}
