//! Exception recovery protocol.
//!
//! When the reducer fails, every plugin's exception hook is consulted in
//! order. The first hook that returns anything other than
//! [`ExceptionHandlerResult::Rethrow`] takes ownership of the error and no
//! later hook sees it. If every hook defers, the last rethrown error
//! terminates the store.

use std::ops::ControlFlow;

use crate::error::StoreError;

/// What an exception hook wants the engine to do with an error.
#[derive(Debug, Clone)]
pub enum ExceptionHandlerResult<I, A> {
    /// The error is dealt with; continue with the next intent.
    Handled,
    /// Feed a recovery intent back into the processing loop.
    DispatchIntent(I),
    /// Emit a side effect without touching state.
    SendAction(A),
    /// Defer to the next plugin. The error may be replaced or wrapped.
    Rethrow(StoreError),
}

impl<I, A> ExceptionHandlerResult<I, A> {
    pub fn is_rethrow(&self) -> bool {
        matches!(self, ExceptionHandlerResult::Rethrow(_))
    }
}

/// Working result of an in-progress resolution.
#[derive(Debug)]
pub(crate) struct Resolution<I, A> {
    working: ExceptionHandlerResult<I, A>,
}

impl<I, A> Resolution<I, A> {
    pub(crate) fn new(error: StoreError) -> Self {
        Self {
            working: ExceptionHandlerResult::Rethrow(error),
        }
    }

    /// Adopt a hook's result. Breaks once a hook has taken ownership.
    pub(crate) fn offer(&mut self, result: ExceptionHandlerResult<I, A>) -> ControlFlow<()> {
        let settled = !result.is_rethrow();
        self.working = result;
        if settled {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    pub(crate) fn finish(self) -> ExceptionHandlerResult<I, A> {
        self.working
    }
}
