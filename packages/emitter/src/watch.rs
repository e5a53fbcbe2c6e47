use std::ptr;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::emitter::Inner;
use crate::{
    Emits, Emitter, Event, EventHandler, EventTypes, Handler, HandlerResult, TypeSet, WILDCARD,
};

/// A subject being watched and the relay handler installed on it.
pub(crate) struct Watch<A> {
    subject: Weak<Inner<A>>,
    relay: Handler<A>,
}

impl<A> Watch<A> {
    fn is_for(&self, subject: &Rc<Inner<A>>) -> bool {
        ptr::eq(self.subject.as_ptr(), Rc::as_ptr(subject))
    }

    /// Removes the relay from the subject, if the subject still exists.
    fn detach(&self) {
        if let Some(subject) = self.subject.upgrade() {
            subject
                .listeners
                .remove(&EventTypes::from(WILDCARD), Some(&self.relay), true);
        }
    }
}

impl<A> Emitter<A>
where
    A: Clone + 'static,
{
    /// Starts receiving everything that `subjects` emit.
    ///
    /// For every event a watched subject dispatches, this subject runs its own matching
    /// handlers with the same event and the same arguments, then its default handler unless
    /// one of them stopped propagation. Because the event is shared, flags set here are
    /// visible to the rest of the dispatch on the watched subject, including its emit
    /// callback. Watching is transitive: whoever watches this subject also sees events that
    /// are relayed into it.
    ///
    /// Watching a subject that is already watched has no effect, as has a subject watching
    /// itself. An event is never relayed back into the subject that emitted it, nor into a
    /// subject that is already relaying it, so subjects watching each other do not loop.
    ///
    /// The watched subjects do not keep this subject alive. When this subject is dropped,
    /// its relays are removed from all subjects it was watching.
    ///
    /// # Example
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// use emitter::{Emitter, Handler};
    ///
    /// let relayed = Rc::new(Cell::new(0));
    ///
    /// let hub = Emitter::<()>::builder()
    ///     .default_handler(Handler::new({
    ///         let relayed = Rc::clone(&relayed);
    ///         move |_, _| {
    ///             relayed.set(relayed.get() + 1);
    ///             Ok(())
    ///         }
    ///     }))
    ///     .build();
    ///
    /// let sensors = vec![Emitter::new(), Emitter::new()];
    /// hub.watch(&sensors);
    ///
    /// sensors[0].emit("reading").unwrap();
    /// sensors[1].emit(["reading", "alarm"]).unwrap();
    /// assert_eq!(relayed.get(), 3);
    ///
    /// hub.unwatch(&sensors);
    /// sensors[0].emit("reading").unwrap();
    /// assert_eq!(relayed.get(), 3);
    /// ```
    pub fn watch<'a, S>(&self, subjects: impl IntoIterator<Item = &'a S>) -> &Self
    where
        S: Emits<A> + ?Sized + 'a,
    {
        for subject in subjects {
            self.watch_one(subject.emitter());
        }

        self
    }

    fn watch_one(&self, subject: &Self) {
        if self.ptr_eq(subject) {
            debug!(subject = self.name(), "ignoring request to watch self");
            return;
        }

        if self.is_watching(subject) {
            trace!(
                watcher = self.name(),
                subject = subject.name(),
                "already watching"
            );
            return;
        }

        let relay = self.relay_handler();

        subject.inner.listeners.push(EventHandler::with_type_set(
            TypeSet::Wildcard,
            relay.clone(),
            [],
            false,
        ));

        self.inner.watching.borrow_mut().push(Watch {
            subject: Rc::downgrade(&subject.inner),
            relay,
        });

        debug!(
            watcher = self.name(),
            subject = subject.name(),
            "watching subject"
        );
    }

    /// Stops receiving the events of `subjects`.
    ///
    /// Subjects that are not being watched are ignored.
    pub fn unwatch<'a, S>(&self, subjects: impl IntoIterator<Item = &'a S>) -> &Self
    where
        S: Emits<A> + ?Sized + 'a,
    {
        for subject in subjects {
            self.unwatch_one(subject.emitter());
        }

        self
    }

    fn unwatch_one(&self, subject: &Self) {
        let position = self
            .inner
            .watching
            .borrow()
            .iter()
            .position(|watch| watch.is_for(&subject.inner));

        let Some(position) = position else {
            return;
        };

        let watch = self.inner.watching.borrow_mut().remove(position);
        watch.detach();

        debug!(
            watcher = self.name(),
            subject = subject.name(),
            "stopped watching subject"
        );
    }

    /// Whether this subject is currently watching `subject`.
    #[must_use]
    pub fn is_watching<S>(&self, subject: &S) -> bool
    where
        S: Emits<A> + ?Sized,
    {
        let subject = &subject.emitter().inner;

        self.inner
            .watching
            .borrow()
            .iter()
            .any(|watch| watch.is_for(subject))
    }

    fn relay_handler(&self) -> Handler<A> {
        let watcher = Rc::downgrade(&self.inner);

        Handler::new(move |event, args| {
            let Some(inner) = watcher.upgrade() else {
                return Ok(());
            };

            Self { inner }.relay(event, args)
        })
    }

    fn relay(&self, event: &Event<A>, args: &[A]) -> HandlerResult {
        // The source has already dispatched the event to its own handlers.
        if event.target().ptr_eq(self) {
            trace!(
                watcher = self.name(),
                event_type = event.event_type(),
                "event came back to its source"
            );
            return Ok(());
        }

        let key = ptr::from_ref(event).addr();

        if self.inner.relaying.borrow().contains(&key) {
            trace!(
                watcher = self.name(),
                event_type = event.event_type(),
                "event is already being relayed here"
            );
            return Ok(());
        }

        self.inner.relaying.borrow_mut().push(key);

        let _in_flight = scopeguard::guard(&self.inner.relaying, |relaying| {
            relaying.borrow_mut().retain(|k| *k != key);
        });

        trace!(
            watcher = self.name(),
            source = event.target().name(),
            event_type = event.event_type(),
            "relaying event"
        );

        self.inner.listeners.invoke(event, args)?;

        if event.is_propagation_stopped() {
            return Ok(());
        }

        self.inner.default_handler.call(event, args)
    }
}

impl<A> Drop for Inner<A> {
    fn drop(&mut self) {
        for watch in self.watching.get_mut().drain(..) {
            watch.detach();
        }
    }
}
