use serde::{Deserialize, Serialize};

/// Capacity used by broadcast action channels when none is configured.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Root configuration container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name used in log records (e.g., "counter", "checkout").
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default)]
    pub actions: ActionChannelConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How actions are delivered to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Single buffered channel; each action goes to exactly one observer.
    #[default]
    Queue,
    /// Every subscribed observer gets every action; slow observers lose the oldest.
    Broadcast,
}

/// What a full bounded queue does with a new action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overflow {
    /// Discard the new action and keep processing.
    #[default]
    Drop,
    /// Wait for room. A slow observer stalls the store.
    Block,
}

/// Action channel settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionChannelConfig {
    #[serde(default)]
    pub mode: ActionMode,
    /// Buffer size. `None` means unbounded for `queue` and
    /// [`DEFAULT_BROADCAST_CAPACITY`] for `broadcast`.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Only meaningful for a bounded `queue`.
    #[serde(default)]
    pub overflow: Overflow,
}

impl ActionChannelConfig {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize, overflow: Overflow) -> Self {
        Self {
            mode: ActionMode::Queue,
            capacity: Some(capacity),
            overflow,
        }
    }

    pub fn broadcast(capacity: usize) -> Self {
        Self {
            mode: ActionMode::Broadcast,
            capacity: Some(capacity),
            overflow: Overflow::Drop,
        }
    }
}

/// Event recording settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Number of most recent events kept (default: 100).
    #[serde(default = "default_recording_capacity")]
    pub capacity: usize,
}

/// Verbosity of the event logging plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
}

/// Event logging settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

fn default_store_name() -> String {
    "store".to_string()
}

fn default_recording_capacity() -> usize {
    100
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            actions: ActionChannelConfig::default(),
            recording: RecordingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_recording_capacity(),
        }
    }
}
