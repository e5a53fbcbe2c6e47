use thiserror::Error;

use crate::WILDCARD;

/// The error type returned by user-supplied handlers and emit callbacks.
///
/// Anything that implements [`std::error::Error`] can be returned from a handler via `?`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The result type returned by user-supplied handlers and emit callbacks.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Errors that can occur when registering, emitting or dispatching events.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller tried to register a handler for the wildcard marker together with one or
    /// more concrete event types. A handler matches either everything or a concrete set.
    #[error("invalid wildcard combination: '{}' cannot be combined with {:?}", WILDCARD, .types)]
    InvalidWildcardCombination {
        /// The full set of types that was requested, including the wildcard marker.
        types: Vec<String>,
    },

    /// The caller tried to emit the wildcard marker directly. Wildcard handlers only ever
    /// fire as a side effect of emitting a concrete event type.
    #[error("invalid event type: '{event_type}' cannot be emitted directly")]
    InvalidEventType {
        /// The event type that was rejected.
        event_type: String,
    },

    /// A registered handler or an emit callback returned an error. Handlers after the
    /// failing one were not executed.
    #[error("event handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl Error {
    /// Converts an error returned by a handler into a crate error.
    ///
    /// If the handler merely forwarded one of our own errors (e.g. a nested `emit()` failed)
    /// we unwrap it instead of nesting it inside another layer.
    pub(crate) fn from_handler(error: HandlerError) -> Self {
        match error.downcast::<Self>() {
            Ok(ours) => *ours,
            Err(theirs) => Self::Handler(theirs),
        }
    }
}

/// A specialized `Result` type for emitter operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn handler_error_is_wrapped() {
        let error = Error::from_handler("boom".into());

        assert!(matches!(error, Error::Handler(ref inner) if inner.to_string() == "boom"));
    }

    #[test]
    fn forwarded_crate_error_is_not_double_wrapped() {
        let forwarded: HandlerError = Box::new(Error::InvalidEventType {
            event_type: WILDCARD.to_string(),
        });

        let error = Error::from_handler(forwarded);

        assert!(matches!(error, Error::InvalidEventType { ref event_type } if event_type == WILDCARD));
    }

    #[test]
    fn messages_mention_the_problem() {
        let wildcard = Error::InvalidWildcardCombination {
            types: vec![WILDCARD.to_string(), "asdf".to_string()],
        };
        assert!(wildcard.to_string().contains("wildcard"));

        let emit = Error::InvalidEventType {
            event_type: WILDCARD.to_string(),
        };
        assert!(emit.to_string().contains("invalid"));
    }
}
