//! Unidirectional-data-flow state engine.
//!
//! A [`Store`] accepts intents, runs them one at a time through a reducer,
//! publishes the resulting state and emits one-shot actions. Plugins can
//! intercept every step and take over reducer errors through the exception
//! recovery protocol.
//!
//! ```no_run
//! use mvi_store::{reducer_fn, Reduction, Scope, Store};
//!
//! # async fn demo() {
//! let reducer = reducer_fn(|count: &u32, step: u32| -> anyhow::Result<Reduction<u32, String>> {
//!     let next = count + step;
//!     if next % 5 == 0 {
//!         Ok(Reduction::with_action(next, format!("reached {next}")))
//!     } else {
//!         Ok(Reduction::state(next))
//!     }
//! });
//!
//! let store = Store::builder(0, reducer).name("counter").build();
//! let scope = Scope::new();
//! let lifecycle = store.start(&scope);
//! let mut actions = store.observe_actions();
//!
//! store.submit(5);
//! assert_eq!(actions.recv().await.as_deref(), Some("reached 5"));
//!
//! store.stop();
//! lifecycle.join().await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod mvi;
pub mod plugin;
pub mod recovery;
pub mod scope;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use event::{StoreEvent, StoreEventKind};
pub use mvi::{reducer_fn, Action, Intent, Reducer, Reduction, State};
pub use plugin::{Interception, LoggingPlugin, MetricsPlugin, RecordingPlugin, StorePlugin};
pub use recovery::ExceptionHandlerResult;
pub use scope::Scope;
pub use store::{ActionReceiver, LifecycleStatus, Store, StoreBuilder, StoreLifecycle};
