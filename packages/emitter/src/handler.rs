use std::fmt;
use std::ptr;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::{Error, Event, EventTypes, HandlerResult, Result, TypeSet};

/// Bound and call arguments are concatenated into one of these per invocation.
pub(crate) type ArgList<A> = SmallVec<[A; 4]>;

type HandlerFn<A> = dyn Fn(&Event<A>, &[A]) -> HandlerResult;

/// A function that can be registered to handle events or passed as an emit callback.
///
/// The function receives the event followed by one slice holding the arguments bound at
/// registration time and then the arguments given to the `emit()` call, in that order.
/// There is no implicit receiver - a handler that needs state captures it.
///
/// Cloning a `Handler` is cheap and produces another reference to the same function.
/// Two handlers are equal if and only if they are clones of each other, which is how
/// [`Emitter::dispel()`][crate::Emitter::dispel] identifies the handler to remove.
///
/// # Example
///
/// ```
/// use emitter::{Emitter, Handler};
///
/// let greet = Handler::new(|event, args: &[String]| {
///     println!("{} says {args:?}", event.event_type());
///     Ok(())
/// });
///
/// let subject = Emitter::new();
/// subject.when("hello", greet.clone()).unwrap();
/// subject.emit_with("hello", ["world".to_string()]).unwrap();
///
/// subject.dispel("hello", greet);
/// assert!(subject.listeners().is_empty());
/// ```
pub struct Handler<A> {
    func: Rc<HandlerFn<A>>,
}

impl<A> Handler<A> {
    /// Wraps a function as a handler.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Event<A>, &[A]) -> HandlerResult + 'static,
    {
        Self {
            func: Rc::new(func),
        }
    }

    /// A handler that does nothing.
    ///
    /// Every call creates a new handler with its own identity.
    #[must_use]
    pub fn noop() -> Self
    where
        A: 'static,
    {
        Self::new(|_, _| Ok(()))
    }

    /// Calls the function.
    ///
    /// # Errors
    ///
    /// Returns whatever error the function returned.
    pub fn call(&self, event: &Event<A>, args: &[A]) -> HandlerResult {
        (self.func)(event, args)
    }

    /// Whether two handlers refer to the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        // Only the data pointer identifies the allocation; vtable pointers may differ
        // between codegen units for the same function.
        ptr::addr_eq(Rc::as_ptr(&self.func), Rc::as_ptr(&other.func))
    }
}

impl<A> Clone for Handler<A> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<A> PartialEq for Handler<A> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<A> Eq for Handler<A> {}

impl<A> fmt::Debug for Handler<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&Rc::as_ptr(&self.func).cast::<()>())
            .finish()
    }
}

/// Selects which registered handlers a removal applies to.
///
/// Used with [`Emitter::dispel()`][crate::Emitter::dispel]. Conversions exist from
/// [`Handler`] (remove only that function) and from `bool`, where `true` means
/// [`HandlerFilter::Wild`] and `false` means [`HandlerFilter::Any`].
#[derive(Debug)]
#[non_exhaustive]
pub enum HandlerFilter<A> {
    /// Remove handlers regardless of their function. Wildcard handlers are kept.
    Any,

    /// Remove only handlers with this exact function. Wildcard handlers are kept.
    Handler(Handler<A>),

    /// Remove handlers regardless of their function, wildcard handlers included.
    Wild,
}

impl<A> HandlerFilter<A> {
    pub(crate) fn handler(&self) -> Option<&Handler<A>> {
        match self {
            Self::Handler(handler) => Some(handler),
            Self::Any | Self::Wild => None,
        }
    }

    pub(crate) fn is_wild(&self) -> bool {
        matches!(self, Self::Wild)
    }
}

impl<A> From<Handler<A>> for HandlerFilter<A> {
    fn from(value: Handler<A>) -> Self {
        Self::Handler(value)
    }
}

impl<A> From<&Handler<A>> for HandlerFilter<A> {
    fn from(value: &Handler<A>) -> Self {
        Self::Handler(value.clone())
    }
}

impl<A> From<bool> for HandlerFilter<A> {
    fn from(value: bool) -> Self {
        if value { Self::Wild } else { Self::Any }
    }
}

impl<A> From<Option<Handler<A>>> for HandlerFilter<A> {
    fn from(value: Option<Handler<A>>) -> Self {
        value.map_or(Self::Any, Self::Handler)
    }
}

/// One registration: the types it matches, the function to call, the arguments bound to it
/// and whether it is removed after its first invocation.
///
/// Event handlers are owned by a [`ListenerManager`][crate::ListenerManager]; use
/// [`Emitter::when()`][crate::Emitter::when] and friends to create them.
pub struct EventHandler<A> {
    types: TypeSet,
    handler: Handler<A>,
    args: SmallVec<[A; 2]>,
    once: bool,
}

impl<A> EventHandler<A> {
    /// Creates a registration for `types`.
    ///
    /// No types at all means the wildcard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`] if `types` mixes the wildcard marker
    /// with concrete types.
    pub fn new(
        types: impl Into<EventTypes>,
        handler: Handler<A>,
        args: impl IntoIterator<Item = A>,
        once: bool,
    ) -> Result<Self> {
        Ok(Self::with_type_set(TypeSet::new(types)?, handler, args, once))
    }

    pub(crate) fn with_type_set(
        types: TypeSet,
        handler: Handler<A>,
        args: impl IntoIterator<Item = A>,
        once: bool,
    ) -> Self {
        Self {
            types,
            handler,
            args: args.into_iter().collect(),
            once,
        }
    }

    /// The types this handler matches.
    #[must_use]
    pub fn types(&self) -> &TypeSet {
        &self.types
    }

    /// The function this handler calls.
    #[must_use]
    pub fn handler(&self) -> &Handler<A> {
        &self.handler
    }

    /// The arguments bound at registration time.
    #[must_use]
    pub fn args(&self) -> &[A] {
        &self.args
    }

    /// Whether the handler is removed after its first invocation.
    #[must_use]
    pub fn is_once(&self) -> bool {
        self.once
    }

    /// Whether this handler fires for `event_type`.
    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        self.types.matches(event_type)
    }

    /// Calls the handler function for `event` if this handler matches its type.
    ///
    /// The function receives the bound arguments followed by `extra_args`. Returns whether
    /// the function was called. Each call is independent of any previous call.
    ///
    /// # Errors
    ///
    /// Returns the error of the handler function, converted via [`Error::Handler`] unless
    /// it was already one of our own errors.
    pub fn invoke(&self, event: &Event<A>, extra_args: &[A]) -> Result<bool>
    where
        A: Clone,
    {
        if !self.matches(event.event_type()) {
            return Ok(false);
        }

        let args: ArgList<A> = self.args.iter().chain(extra_args).cloned().collect();

        self.handler
            .call(event, &args)
            .map_err(Error::from_handler)?;

        Ok(true)
    }
}

impl<A> fmt::Debug for EventHandler<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("types", &self.types)
            .field("handler", &self.handler)
            .field("args", &self.args.len())
            .field("once", &self.once)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::{Emitter, WILDCARD};

    #[test]
    fn wildcard_with_other_types_is_rejected() {
        let result = EventHandler::<u32>::new([WILDCARD, "asdf"], Handler::noop(), [], false);

        let error = result.unwrap_err();
        assert!(matches!(error, Error::InvalidWildcardCombination { .. }));
        assert!(error.to_string().contains("wildcard"));
    }

    #[test]
    fn every_invocation_is_independent() {
        let called = Rc::new(Cell::new(0));
        let target = Emitter::<u32>::new();
        let event = Event::new(target.clone(), "asdf");

        let handler = EventHandler::new(
            "asdf",
            Handler::new({
                let called = Rc::clone(&called);
                move |e: &Event<u32>, args: &[u32]| {
                    assert!(e.target().ptr_eq(&target));
                    assert!(args.is_empty());
                    called.set(called.get() + 1);
                    Ok(())
                }
            }),
            [],
            false,
        )
        .unwrap();

        for _ in 0..10 {
            assert!(handler.invoke(&event, &[]).unwrap());
        }

        assert_eq!(called.get(), 10);
    }

    #[test]
    fn non_matching_type_is_silently_skipped() {
        let called = Rc::new(Cell::new(false));
        let event = Event::new(Emitter::<u32>::new(), "asdf");

        let handler = EventHandler::new(
            "jkl;",
            Handler::new({
                let called = Rc::clone(&called);
                move |_, _: &[u32]| {
                    called.set(true);
                    Ok(())
                }
            }),
            [],
            false,
        )
        .unwrap();

        assert!(!handler.invoke(&event, &[]).unwrap());
        assert!(!called.get());
    }

    #[test]
    fn bound_args_come_before_call_args() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let event = Event::new(Emitter::<u32>::new(), "asdf");

        let handler = EventHandler::new(
            "asdf",
            Handler::new({
                let seen = Rc::clone(&seen);
                move |_, args: &[u32]| {
                    seen.borrow_mut().extend_from_slice(args);
                    Ok(())
                }
            }),
            [1, 2],
            false,
        )
        .unwrap();

        handler.invoke(&event, &[3, 4]).unwrap();

        assert_eq!(*seen.borrow(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn wildcard_handler_matches_any_type() {
        let handler = EventHandler::<u32>::new(WILDCARD, Handler::noop(), [], false).unwrap();

        assert!(handler.matches("gnarly"));
        assert!(handler.matches("rad"));
        assert!(handler.types().is_wildcard());
    }

    #[test]
    fn handler_error_is_returned() {
        let event = Event::new(Emitter::<u32>::new(), "asdf");
        let handler =
            EventHandler::<u32>::new("asdf", Handler::new(|_, _| Err("nope".into())), [], false)
                .unwrap();

        let error = handler.invoke(&event, &[]).unwrap_err();

        assert!(matches!(error, Error::Handler(_)));
    }

    #[test]
    fn handler_identity_follows_clones() {
        let a = Handler::<u32>::noop();
        let b = Handler::<u32>::noop();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn filter_conversions() {
        let handler = Handler::<u32>::noop();

        assert!(HandlerFilter::<u32>::from(true).is_wild());
        assert!(!HandlerFilter::<u32>::from(false).is_wild());
        assert!(HandlerFilter::<u32>::from(false).handler().is_none());
        assert_eq!(
            HandlerFilter::from(handler.clone()).handler(),
            Some(&handler)
        );
    }
}
