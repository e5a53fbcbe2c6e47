use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::builder::DefaultHandler;
use crate::watch::Watch;
use crate::{
    DeferredQueue, EmitterBuilder, Error, Event, EventHandler, EventTypes, Handler,
    HandlerFilter, ListenerManager, Result, WILDCARD,
};

/// Capability of a type to act as a subject: something with its own listeners that can be
/// watched by other subjects.
///
/// [`Emitter`] is the building block that provides this capability. Any type can gain it by
/// owning an emitter and exposing it here, which makes it usable wherever subjects are
/// accepted, for example in [`Emitter::watch()`].
///
/// # Example
///
/// ```
/// use emitter::{Emits, Emitter};
///
/// struct Thermostat {
///     events: Emitter<i32>,
/// }
///
/// impl Emits<i32> for Thermostat {
///     fn emitter(&self) -> &Emitter<i32> {
///         &self.events
///     }
/// }
///
/// let thermostat = Thermostat {
///     events: Emitter::new(),
/// };
///
/// let display = Emitter::new();
/// display.watch([&thermostat]);
/// assert!(display.is_watching(&thermostat));
/// ```
pub trait Emits<A> {
    /// The emitter that holds the listeners of this subject.
    fn emitter(&self) -> &Emitter<A>;
}

/// A subject that registers, emits and relays events.
///
/// Handlers are registered with [`when()`][Self::when] (persistent) and
/// [`once()`][Self::once] (removed after the first invocation), removed with
/// [`dispel()`][Self::dispel] and triggered with the `emit*()` family of methods. A subject
/// can also [`watch()`][Self::watch] other subjects, receiving everything they emit.
///
/// Each subject has a default handler, configured via [`EmitterBuilder`]. It is used for
/// registrations that do not name a handler and receives all events relayed from watched
/// subjects.
///
/// `Emitter` is a handle: clones refer to the same subject. It is single-threaded.
///
/// # Dispatch
///
/// Emitting a list of types dispatches each type in turn, each with its own fresh
/// [`Event`]:
///
/// 1. Every handler registered for the type or for the [`WILDCARD`] runs in registration
///    order, until one of them calls [`Event::stop_propagation()`].
/// 2. Unless a handler called [`Event::prevent_default()`], the emit callback (if any) runs.
///
/// Handlers receive the arguments bound at registration followed by the arguments given to
/// the emit call. The callback receives only the latter.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use emitter::{Emitter, Handler};
///
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let subject = Emitter::<&'static str>::new();
///
/// subject
///     .when_with(
///         "greet",
///         ["hello"],
///         Handler::new({
///             let log = Rc::clone(&log);
///             move |event, args| {
///                 log.borrow_mut().push(format!("{} {args:?}", event.event_type()));
///                 Ok(())
///             }
///         }),
///     )
///     .unwrap()
///     .emit_with("greet", ["world"])
///     .unwrap();
///
/// assert_eq!(*log.borrow(), vec![r#"greet ["hello", "world"]"#]);
/// ```
pub struct Emitter<A> {
    pub(crate) inner: Rc<Inner<A>>,
}

pub(crate) struct Inner<A> {
    pub(crate) name: Option<String>,
    pub(crate) listeners: ListenerManager<A>,
    pub(crate) default_handler: Handler<A>,
    pub(crate) queue: Option<Rc<DeferredQueue<Error>>>,

    /// The subjects we are watching and the relay handler we installed on each.
    pub(crate) watching: RefCell<Vec<Watch<A>>>,

    /// Addresses of the events currently being relayed into this subject.
    pub(crate) relaying: RefCell<Vec<usize>>,
}

impl<A> Emitter<A> {
    /// The name given to the subject when it was built, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The handlers registered on this subject.
    #[must_use]
    pub fn listeners(&self) -> &ListenerManager<A> {
        &self.inner.listeners
    }

    /// The default handler of this subject.
    ///
    /// This is the very handler that registrations without an explicit handler use.
    #[must_use]
    pub fn default_handler(&self) -> &Handler<A> {
        &self.inner.default_handler
    }

    /// Whether two handles refer to the same subject.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A> Emitter<A>
where
    A: Clone + 'static,
{
    /// Creates a subject with no name, a default handler that does nothing and immediate
    /// dispatch.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a subject with a custom configuration.
    #[must_use]
    pub fn builder() -> EmitterBuilder<A> {
        EmitterBuilder::new()
    }

    pub(crate) fn from_parts(
        name: Option<String>,
        default_handler: DefaultHandler<A>,
        queue: Option<Rc<DeferredQueue<Error>>>,
    ) -> Self {
        let inner = Rc::new_cyclic(|this: &Weak<Inner<A>>| {
            let default_handler = match default_handler {
                DefaultHandler::Noop => Handler::noop(),
                DefaultHandler::Unbound(handler) => handler,
                DefaultHandler::Bound(func) => {
                    let this = Weak::clone(this);

                    Handler::new(move |event, args| {
                        let Some(inner) = this.upgrade() else {
                            return Ok(());
                        };

                        func(&Self { inner }, event, args)
                    })
                }
            };

            Inner {
                name,
                listeners: ListenerManager::new(),
                default_handler,
                queue,
                watching: RefCell::new(Vec::new()),
                relaying: RefCell::new(Vec::new()),
            }
        });

        Self { inner }
    }

    /// Registers a handler for `types` that stays registered until dispelled.
    ///
    /// Without types the handler is registered for the [`WILDCARD`]. Without a handler the
    /// [default handler][Self::default_handler] is registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`] if `types` mixes the wildcard marker
    /// with concrete types. Nothing is registered.
    pub fn when(
        &self,
        types: impl Into<EventTypes>,
        handler: impl Into<Option<Handler<A>>>,
    ) -> Result<&Self> {
        self.register(types.into(), [], handler.into(), false)
    }

    /// Like [`when()`][Self::when] but binds `args` to the handler. They are passed to every
    /// invocation ahead of the arguments of the emit call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`] if `types` mixes the wildcard marker
    /// with concrete types. Nothing is registered.
    pub fn when_with(
        &self,
        types: impl Into<EventTypes>,
        args: impl IntoIterator<Item = A>,
        handler: impl Into<Option<Handler<A>>>,
    ) -> Result<&Self> {
        self.register(types.into(), args, handler.into(), false)
    }

    /// Registers a handler for `types` that is removed after its first invocation.
    ///
    /// The handler is removed as a whole: after it has run for one of its types it no
    /// longer runs for any of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`] if `types` mixes the wildcard marker
    /// with concrete types. Nothing is registered.
    pub fn once(
        &self,
        types: impl Into<EventTypes>,
        handler: impl Into<Option<Handler<A>>>,
    ) -> Result<&Self> {
        self.register(types.into(), [], handler.into(), true)
    }

    /// Like [`once()`][Self::once] but binds `args` to the handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`] if `types` mixes the wildcard marker
    /// with concrete types. Nothing is registered.
    pub fn once_with(
        &self,
        types: impl Into<EventTypes>,
        args: impl IntoIterator<Item = A>,
        handler: impl Into<Option<Handler<A>>>,
    ) -> Result<&Self> {
        self.register(types.into(), args, handler.into(), true)
    }

    fn register(
        &self,
        types: EventTypes,
        args: impl IntoIterator<Item = A>,
        handler: Option<Handler<A>>,
        once: bool,
    ) -> Result<&Self> {
        let handler = handler.unwrap_or_else(|| self.inner.default_handler.clone());
        let event_handler = EventHandler::new(types, handler, args, once)?;

        debug!(
            subject = self.name(),
            types = ?event_handler.types(),
            once,
            "registered handler"
        );

        self.inner.listeners.push(event_handler);

        Ok(self)
    }

    /// Emits each of `types` in turn without arguments.
    ///
    /// # Errors
    ///
    /// See [`emit_with_callback()`][Self::emit_with_callback].
    pub fn emit(&self, types: impl Into<EventTypes>) -> Result<&Self> {
        self.emit_core(types.into(), Rc::from([]), None)
    }

    /// Emits each of `types` in turn, passing `args` to every handler.
    ///
    /// # Errors
    ///
    /// See [`emit_with_callback()`][Self::emit_with_callback].
    pub fn emit_with(
        &self,
        types: impl Into<EventTypes>,
        args: impl IntoIterator<Item = A>,
    ) -> Result<&Self> {
        self.emit_core(types.into(), args.into_iter().collect(), None)
    }

    /// Emits each of `types` in turn, passing `args` to every handler, and calls `callback`
    /// after the handlers of each type unless one of them prevented the default.
    ///
    /// The callback receives the event and `args` (without any bound arguments). It is
    /// called even if no handler matched the type.
    ///
    /// If this subject dispatches through a [`DeferredQueue`] and the queue is already
    /// being drained (i.e. this is a nested emit from inside a handler), dispatch happens
    /// after the current dispatch completes and this method returns before any handler runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEventType`] if `types` contains the [`WILDCARD`]. Nothing is
    /// dispatched in that case.
    ///
    /// Returns the first error of a handler or of the callback. Nothing else is dispatched
    /// for this call after a failure.
    pub fn emit_with_callback(
        &self,
        types: impl Into<EventTypes>,
        args: impl IntoIterator<Item = A>,
        callback: Handler<A>,
    ) -> Result<&Self> {
        self.emit_core(types.into(), args.into_iter().collect(), Some(callback))
    }

    fn emit_core(
        &self,
        types: EventTypes,
        args: Rc<[A]>,
        callback: Option<Handler<A>>,
    ) -> Result<&Self> {
        if types.contains_wildcard() {
            return Err(Error::InvalidEventType {
                event_type: WILDCARD.to_string(),
            });
        }

        let Some(queue) = &self.inner.queue else {
            for event_type in types.iter() {
                self.dispatch(event_type, &args, callback.as_ref())?;
            }

            return Ok(self);
        };

        for event_type in types.iter() {
            let this = self.clone();
            let event_type = event_type.to_string();
            let args = Rc::clone(&args);
            let callback = callback.clone();

            queue.enqueue(move || this.dispatch(&event_type, &args, callback.as_ref()));
        }

        queue.flush()?;

        Ok(self)
    }

    fn dispatch(&self, event_type: &str, args: &[A], callback: Option<&Handler<A>>) -> Result<()> {
        let event = Event::new(self.clone(), event_type);

        let invoked = self.inner.listeners.invoke(&event, args)?;

        trace!(subject = self.name(), event_type, invoked, "dispatched event");

        if event.is_default_prevented() {
            trace!(subject = self.name(), event_type, "default prevented");
            return Ok(());
        }

        if let Some(callback) = callback {
            callback.call(&event, args).map_err(Error::from_handler)?;
        }

        Ok(())
    }

    /// Removes the matching handlers of this subject.
    ///
    /// A handler is removed if it is registered for any of `types` (or `types` is empty or
    /// the [`WILDCARD`]) and it passes `filter`. Handlers registered for the wildcard are
    /// only removed with [`HandlerFilter::Wild`], which is also what `true` converts to.
    ///
    /// # Example
    ///
    /// ```
    /// use emitter::{Emitter, EventTypes, WILDCARD};
    ///
    /// let subject = Emitter::<()>::new();
    /// subject.when("gnarly", None).unwrap();
    /// subject.when(WILDCARD, None).unwrap();
    ///
    /// // Everything except wildcard handlers.
    /// subject.dispel(EventTypes::none(), false);
    /// assert_eq!(subject.listeners().len(), 1);
    ///
    /// // Everything.
    /// subject.dispel(EventTypes::none(), true);
    /// assert!(subject.listeners().is_empty());
    /// ```
    pub fn dispel(
        &self,
        types: impl Into<EventTypes>,
        filter: impl Into<HandlerFilter<A>>,
    ) -> &Self {
        let types = types.into();
        let filter = filter.into();

        let removed = self
            .inner
            .listeners
            .remove(&types, filter.handler(), filter.is_wild());

        debug!(
            subject = self.name(),
            types = ?types,
            wild = filter.is_wild(),
            removed,
            "dispelled handlers"
        );

        self
    }
}

impl<A> Emits<A> for Emitter<A> {
    fn emitter(&self) -> &Self {
        self
    }
}

impl<A> Clone for Emitter<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> Default for Emitter<A>
where
    A: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Emitter<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("name", &self.inner.name)
            .field("listeners", &self.inner.listeners.len())
            .field("watching", &self.inner.watching.borrow().len())
            .field("deferred", &self.inner.queue.is_some())
            .finish()
    }
}
