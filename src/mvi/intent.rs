//! Intent marker.

use std::fmt::Debug;

/// A request for a state transition: a user command, a system event or a
/// recovery command dispatched by a plugin.
///
/// Each intent is consumed by exactly one reduction. `Clone` lets the event
/// log keep a copy.
pub trait Intent: Debug + Clone + Send + Sync + 'static {}

impl<T> Intent for T where T: Debug + Clone + Send + Sync + 'static {}
