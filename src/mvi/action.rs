//! Base trait for one-shot side effects.

use std::fmt::Debug;

/// Marker trait for actions.
///
/// An action has no identity beyond its payload. It is emitted at most once
/// per reduction and is never replayed to late subscribers.
pub trait Action: Debug + Clone + Send + Sync + 'static {}

impl<T> Action for T where T: Debug + Clone + Send + Sync + 'static {}
