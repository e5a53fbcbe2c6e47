use std::cell::Cell;
use std::fmt;

use crate::Emitter;

/// One occurrence of an event type raised by a subject.
///
/// A fresh `Event` is created for every type of every [`Emitter::emit()`] call. It is never
/// reused across types or across calls, so whatever one handler does to the flags of the
/// event only affects the rest of the dispatch of that single type.
///
/// The target and the type are fixed at construction. The only possible mutations are the
/// two one-way flags set by [`prevent_default()`][Self::prevent_default] and
/// [`stop_propagation()`][Self::stop_propagation]. Both can be set through a shared
/// reference, which is all that handlers receive.
pub struct Event<A> {
    target: Emitter<A>,
    event_type: String,

    default_prevented: Cell<bool>,
    cancel_bubble: Cell<bool>,
}

impl<A> Event<A> {
    /// Creates an event of type `event_type` raised by `target`.
    ///
    /// Events are normally created by [`Emitter::emit()`]. Creating one by hand is useful
    /// when driving a [`ListenerManager`][crate::ListenerManager] or an
    /// [`EventHandler`][crate::EventHandler] directly.
    #[must_use]
    pub fn new(target: Emitter<A>, event_type: impl Into<String>) -> Self {
        Self {
            target,
            event_type: event_type.into(),
            default_prevented: Cell::new(false),
            cancel_bubble: Cell::new(false),
        }
    }

    /// The subject that raised the event.
    ///
    /// When an event is relayed to watchers, this remains the subject that originally
    /// raised it, not the subject that relayed it.
    #[must_use]
    pub fn target(&self) -> &Emitter<A> {
        &self.target
    }

    /// The event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Suppresses the emit callback for this event type.
    ///
    /// Remaining handlers still run. Calling this more than once has no further effect.
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    /// Stops the remaining handlers from running for this event type.
    ///
    /// The emit callback is not affected. Calling this more than once has no further effect.
    pub fn stop_propagation(&self) {
        self.cancel_bubble.set(true);
    }

    /// Whether [`prevent_default()`][Self::prevent_default] has been called.
    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Whether [`stop_propagation()`][Self::stop_propagation] has been called.
    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.cancel_bubble.get()
    }
}

impl<A> fmt::Debug for Event<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("target", &self.target.name())
            .field("event_type", &self.event_type)
            .field("default_prevented", &self.default_prevented.get())
            .field("cancel_bubble", &self.cancel_bubble.get())
            .finish()
    }
}
