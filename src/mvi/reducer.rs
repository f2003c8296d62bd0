//! Reducer trait for MVI architecture.

use std::fmt;
use std::marker::PhantomData;

use super::action::Action;
use super::intent::Intent;
use super::state::State;

/// Outcome of a successful reduction: the next state and an optional action.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction<S, A> {
    pub state: S,
    pub action: Option<A>,
}

impl<S, A> Reduction<S, A> {
    /// Transition to `state` without a side effect.
    pub fn state(state: S) -> Self {
        Self {
            state,
            action: None,
        }
    }

    /// Transition to `state` and emit `action`.
    pub fn with_action(state: S, action: A) -> Self {
        Self {
            state,
            action: Some(action),
        }
    }

    /// Keep the current state. The engine records no `StateChanged` for it.
    pub fn unchanged(state: &S) -> Self
    where
        S: Clone,
    {
        Self::state(state.clone())
    }
}

/// Reducer transforms state based on intents.
///
/// The reducer is the only place where state transitions happen.
/// It should be a pure function: (State, Intent) -> (State, Option<Action>).
/// Returning an error hands the failure to the store's exception recovery
/// plugins; it is the only application code the engine runs.
pub trait Reducer: Send + Sync + 'static {
    /// The state type this reducer operates on.
    type State: State;

    /// The intent type this reducer handles.
    type Intent: Intent;

    /// The side effect type this reducer may emit.
    type Action: Action;

    /// Process an intent and return the next state.
    fn reduce(
        &self,
        state: &Self::State,
        intent: Self::Intent,
    ) -> anyhow::Result<Reduction<Self::State, Self::Action>>;
}

/// A [`Reducer`] backed by a closure. Built with [`reducer_fn`].
pub struct FnReducer<F, S, I, A> {
    f: F,
    _types: PhantomData<fn(&S, I) -> A>,
}

/// Wrap a closure as a [`Reducer`].
pub fn reducer_fn<F, S, I, A>(f: F) -> FnReducer<F, S, I, A>
where
    F: Fn(&S, I) -> anyhow::Result<Reduction<S, A>> + Send + Sync + 'static,
{
    FnReducer {
        f,
        _types: PhantomData,
    }
}

impl<F, S, I, A> Reducer for FnReducer<F, S, I, A>
where
    F: Fn(&S, I) -> anyhow::Result<Reduction<S, A>> + Send + Sync + 'static,
    S: State,
    I: Intent,
    A: Action,
{
    type State = S;
    type Intent = I;
    type Action = A;

    fn reduce(&self, state: &S, intent: I) -> anyhow::Result<Reduction<S, A>> {
        (self.f)(state, intent)
    }
}

impl<F, S, I, A> fmt::Debug for FnReducer<F, S, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReducer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_reducer_forwards_state_and_intent() {
        let reducer = reducer_fn(|state: &i32, intent: i32| -> anyhow::Result<Reduction<i32, String>> {
            let next = state + intent;
            if next % 2 == 0 {
                Ok(Reduction::with_action(next, format!("even {next}")))
            } else {
                Ok(Reduction::state(next))
            }
        });

        let odd = reducer.reduce(&0, 3).expect("reduce");
        assert_eq!(odd, Reduction::state(3));

        let even = reducer.reduce(&3, 1).expect("reduce");
        assert_eq!(even.state, 4);
        assert_eq!(even.action.as_deref(), Some("even 4"));
    }

    #[test]
    fn closure_reducer_propagates_errors() {
        let reducer = reducer_fn(|_: &i32, _: ()| -> anyhow::Result<Reduction<i32, ()>> {
            anyhow::bail!("boom")
        });
        let err = reducer.reduce(&1, ()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn unchanged_clones_current_state() {
        let reduction: Reduction<Vec<u8>, ()> = Reduction::unchanged(&vec![1, 2]);
        assert_eq!(reduction.state, vec![1, 2]);
        assert!(reduction.action.is_none());
    }
}
