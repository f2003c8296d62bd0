//! Store state marker.

use std::fmt::Debug;

/// Anything a store can hold as its current value.
///
/// The engine compares the old and new value after every reduction and
/// publishes only real changes, hence `PartialEq`. Observers get clones.
pub trait State: Debug + Clone + PartialEq + Send + Sync + 'static {}

impl<T> State for T where T: Debug + Clone + PartialEq + Send + Sync + 'static {}
