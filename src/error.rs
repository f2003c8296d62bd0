//! Error types for the store engine.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while a store processes intents.
///
/// Cloneable so the same error can travel through the exception recovery
/// protocol, the event log and the lifecycle handle.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The reducer returned an error.
    #[error("reduce failed: {0}")]
    Reduce(Arc<anyhow::Error>),

    /// The reducer panicked.
    #[error("reducer panicked: {message}")]
    Panicked { message: String },

    /// An error raised by an exception hook in place of the original.
    #[error("{message}")]
    Custom { message: String },

    /// An error wrapped with extra context by an exception hook.
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn reduce(err: anyhow::Error) -> Self {
        StoreError::Reduce(Arc::new(err))
    }

    pub fn custom(message: impl Into<String>) -> Self {
        StoreError::Custom {
            message: message.into(),
        }
    }

    /// Wrap this error with context, keeping it as the source.
    pub fn context(self, context: impl Into<String>) -> Self {
        StoreError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        StoreError::Panicked {
            message: panic_message(payload.as_ref()),
        }
    }

    /// The innermost error, skipping any `Wrapped` layers.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }

    /// Try to view the underlying reducer error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self.root() {
            StoreError::Reduce(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
