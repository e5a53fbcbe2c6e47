use std::fmt;
use std::rc::Rc;

use crate::{DeferredQueue, Emitter, Error, Event, Handler, HandlerResult};

type BoundFn<A> = dyn Fn(&Emitter<A>, &Event<A>, &[A]) -> HandlerResult;

pub(crate) enum DefaultHandler<A> {
    Noop,
    Unbound(Handler<A>),
    Bound(Box<BoundFn<A>>),
}

/// Creates instances of [`Emitter`].
///
/// All parameters are optional. Use `Emitter::builder()` to create a new instance of this
/// builder, or `Emitter::new()` if the defaults are fine.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
///
/// use emitter::{DeferredQueue, Emitter};
///
/// let queue = Rc::new(DeferredQueue::new());
///
/// let subject = Emitter::<u32>::builder()
///     .name("thermometer")
///     .bound_default_handler(|this, event, args| {
///         println!("{:?} got {} with {args:?}", this.name(), event.event_type());
///         Ok(())
///     })
///     .deferred(queue)
///     .build();
///
/// subject.when("reading", None).unwrap();
/// subject.emit_with("reading", [21]).unwrap();
/// ```
pub struct EmitterBuilder<A> {
    name: Option<String>,
    default_handler: DefaultHandler<A>,
    queue: Option<Rc<DeferredQueue<Error>>>,
}

impl<A> EmitterBuilder<A>
where
    A: Clone + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            name: None,
            default_handler: DefaultHandler::Noop,
            queue: None,
        }
    }

    /// Sets a name for the subject, used in diagnostics and available via
    /// [`Emitter::name()`].
    #[must_use]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the default handler of the subject.
    ///
    /// The default handler is used for registrations that do not name a handler and
    /// receives every event relayed to the subject by subjects it watches.
    ///
    /// The default is a handler that does nothing.
    #[must_use]
    pub fn default_handler(self, handler: Handler<A>) -> Self {
        Self {
            default_handler: DefaultHandler::Unbound(handler),
            ..self
        }
    }

    /// Sets a default handler that receives the subject it belongs to as its first argument.
    ///
    /// The subject is bound once, when the emitter is built, so the handler always sees the
    /// same subject no matter who invokes it. The binding is weak: the handler does not keep
    /// the subject alive and is not called after the subject has been dropped.
    #[must_use]
    pub fn bound_default_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&Emitter<A>, &Event<A>, &[A]) -> HandlerResult + 'static,
    {
        Self {
            default_handler: DefaultHandler::Bound(Box::new(handler)),
            ..self
        }
    }

    /// Routes all dispatch performed by `emit()` through `queue`.
    ///
    /// When a handler emits an event while another emit is being dispatched on the same
    /// queue, the nested emit is dispatched after the outer one has completed instead of in
    /// the middle of it. Share one queue between subjects to order their events relative to
    /// each other.
    ///
    /// By default, events are dispatched immediately.
    #[must_use]
    pub fn deferred(self, queue: Rc<DeferredQueue<Error>>) -> Self {
        Self {
            queue: Some(queue),
            ..self
        }
    }

    /// Builds the subject with its own empty set of listeners.
    #[must_use]
    pub fn build(self) -> Emitter<A> {
        Emitter::from_parts(self.name, self.default_handler, self.queue)
    }
}

impl<A> fmt::Debug for EmitterBuilder<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default_handler = match self.default_handler {
            DefaultHandler::Noop => "noop",
            DefaultHandler::Unbound(_) => "unbound",
            DefaultHandler::Bound(_) => "bound",
        };

        f.debug_struct("EmitterBuilder")
            .field("name", &self.name)
            .field("default_handler", &default_handler)
            .field("deferred", &self.queue.is_some())
            .finish()
    }
}
