//! Store configuration: types, defaults and TOML loading.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{
    ActionChannelConfig, ActionMode, LogLevel, LoggingConfig, Overflow, RecordingConfig,
    StoreConfig, DEFAULT_BROADCAST_CAPACITY,
};
