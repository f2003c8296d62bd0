//! Model-View-Intent (MVI) primitives consumed by the store engine.
//!
//! # Architecture
//!
//! ```text
//! Intent ──→ Reducer ──→ State ──→ observers
//!    ↑          │
//!    │          └──→ Action ──→ one-shot consumers
//!    └──────────────────────────────┘
//! ```
//!
//! - **State**: Immutable representation of the application's condition
//! - **Intent**: A requested state transition
//! - **Action**: A one-shot side effect, never part of durable state
//! - **Reducer**: Function that maps (state, intent) to a new state and an optional action

mod action;
mod intent;
mod reducer;
mod state;

pub use action::Action;
pub use intent::Intent;
pub use reducer::{reducer_fn, FnReducer, Reducer, Reduction};
pub use state::State;
