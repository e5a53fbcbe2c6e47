use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::{Event, EventHandler, EventTypes, Handler, Result, WILDCARD};

/// The ordered collection of handlers registered on one subject.
///
/// Handlers run in registration order. Nothing is de-duplicated: registering the same
/// function for the same types twice makes it run twice.
///
/// All operations take `&self` and no internal borrow is held while a handler runs, so
/// handlers are free to add or remove handlers on the same manager while it is invoking
/// them. Such changes only take effect for the next invocation.
///
/// Every [`Emitter`][crate::Emitter] owns a private manager, reachable through
/// [`Emitter::listeners()`][crate::Emitter::listeners].
pub struct ListenerManager<A> {
    handlers: RefCell<Vec<Rc<EventHandler<A>>>>,
}

impl<A> ListenerManager<A> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// The number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    /// The handler at `index` in registration order, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Rc<EventHandler<A>>> {
        self.handlers.borrow().get(index).cloned()
    }

    /// The currently registered handlers, in registration order.
    ///
    /// Later changes to the manager are not reflected in the returned list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Rc<EventHandler<A>>> {
        self.handlers.borrow().clone()
    }

    /// Registers `handler` for `types` with the given bound arguments.
    ///
    /// No types at all means the wildcard. If `once` is set, the handler is removed after it
    /// has been invoked for the first time, whichever of its types that was for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`][crate::Error::InvalidWildcardCombination]
    /// if `types` mixes the wildcard marker with concrete types. Nothing is registered.
    pub fn add(
        &self,
        types: impl Into<EventTypes>,
        handler: Handler<A>,
        args: impl IntoIterator<Item = A>,
        once: bool,
    ) -> Result<&Self> {
        let event_handler = EventHandler::new(types, handler, args, once)?;
        self.push(event_handler);

        Ok(self)
    }

    pub(crate) fn push(&self, event_handler: EventHandler<A>) {
        self.handlers.borrow_mut().push(Rc::new(event_handler));
    }

    /// Invokes every handler that matches the type of `event`, in registration order.
    ///
    /// The handlers to consider are fixed when the call starts: handlers registered while
    /// this call is running do not run, and handlers removed while it is running still run.
    /// Invocation stops as soon as a handler has stopped propagation on the event.
    ///
    /// Once-handlers are removed right after they have been invoked, before the next
    /// handler runs.
    ///
    /// Returns the number of handlers that were invoked.
    ///
    /// # Errors
    ///
    /// Returns the first handler error. Handlers after the failing one do not run.
    /// Once-handlers that already ran stay removed.
    pub fn invoke(&self, event: &Event<A>, args: &[A]) -> Result<usize>
    where
        A: Clone,
    {
        let snapshot = self.snapshot();
        let mut invoked: usize = 0;

        for event_handler in snapshot {
            if event.is_propagation_stopped() {
                trace!(
                    event_type = event.event_type(),
                    invoked, "propagation stopped"
                );
                break;
            }

            if !event_handler.invoke(event, args)? {
                continue;
            }

            invoked = invoked.saturating_add(1);

            if event_handler.is_once() {
                self.remove_exact(&event_handler);
            }
        }

        Ok(invoked)
    }

    /// Removes every handler that passes both the type filter and the function filter.
    ///
    /// * The type filter passes everything if `types` is empty or contains the wildcard
    ///   marker. Otherwise it passes handlers registered for any of the given types.
    /// * The function filter passes everything if `handler` is `None`, otherwise only
    ///   handlers with that exact function.
    ///
    /// Handlers registered for the wildcard are only removed if `wild` is set, whatever
    /// the other filters say.
    ///
    /// Returns the number of handlers removed.
    pub fn remove(&self, types: &EventTypes, handler: Option<&Handler<A>>, wild: bool) -> usize {
        let any_type = types.is_empty() || types.iter().any(|t| t == WILDCARD);

        let removed = self.extract(|candidate| {
            let type_matches = any_type || candidate.types().overlaps(types);
            let handler_matches = handler.is_none_or(|h| h.ptr_eq(candidate.handler()));
            let protected = candidate.types().is_wildcard() && !wild;

            type_matches && handler_matches && !protected
        });

        removed.len()
    }

    fn remove_exact(&self, event_handler: &Rc<EventHandler<A>>) {
        self.extract(|candidate| Rc::ptr_eq(candidate, event_handler));
    }

    /// Takes every handler for which `predicate` holds out of the manager.
    ///
    /// The removed handlers are returned to be dropped by the caller after the borrow has
    /// ended. Dropping a handler may drop the last handle to a subject, whose cleanup calls
    /// back into this manager.
    fn extract(
        &self,
        predicate: impl Fn(&Rc<EventHandler<A>>) -> bool,
    ) -> Vec<Rc<EventHandler<A>>> {
        let mut handlers = self.handlers.borrow_mut();

        let (removed, kept): (Vec<_>, Vec<_>) = mem::take(&mut *handlers)
            .into_iter()
            .partition(&predicate);

        *handlers = kept;

        removed
    }
}

impl<A> Default for ListenerManager<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ListenerManager<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.borrow().iter()).finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Weak;

    use mockall::automock;
    use mockall::predicate::eq;

    use super::*;
    use crate::{Emitter, Error};

    #[automock]
    trait Recorder {
        fn record(&self, event_type: String, args: Vec<u32>);
    }

    fn recording(recorder: &Rc<MockRecorder>) -> Handler<u32> {
        let recorder = Rc::clone(recorder);
        Handler::new(move |event: &Event<u32>, args: &[u32]| {
            recorder.record(event.event_type().to_string(), args.to_vec());
            Ok(())
        })
    }

    fn counting(counter: &Rc<Cell<usize>>) -> Handler<u32> {
        let counter = Rc::clone(counter);
        Handler::new(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        })
    }

    fn event(event_type: &str) -> Event<u32> {
        Event::new(Emitter::new(), event_type)
    }

    #[test]
    fn add_appends_in_order() {
        let listeners = ListenerManager::<u32>::new();
        let test = Handler::noop();

        listeners
            .add("gnarly", test.clone(), [], false)
            .unwrap()
            .add(["gnarly", "rad"], test.clone(), [], false)
            .unwrap();

        assert_eq!(listeners.len(), 2);

        let first = listeners.get(0).unwrap();
        assert_eq!(first.types().iter().collect::<Vec<_>>(), vec!["gnarly"]);
        assert_eq!(first.handler(), &test);

        let second = listeners.get(1).unwrap();
        assert_eq!(second.types().iter().collect::<Vec<_>>(), vec!["gnarly", "rad"]);

        assert_eq!(listeners.remove(&"gnarly".into(), None, false), 2);
        assert!(listeners.is_empty());
    }

    #[test]
    fn add_rejects_mixed_wildcard() {
        let listeners = ListenerManager::<u32>::new();

        let result = listeners.add([WILDCARD, "asdf"], Handler::noop(), [], false);

        assert!(matches!(result, Err(Error::InvalidWildcardCombination { .. })));
        assert!(listeners.is_empty());
    }

    #[test]
    fn invoke_passes_call_args() {
        let mut recorder = MockRecorder::new();
        recorder
            .expect_record()
            .with(eq("rad".to_string()), eq(vec![1, 0]))
            .times(1)
            .return_const(());
        let recorder = Rc::new(recorder);

        let listeners = ListenerManager::new();
        listeners.add("rad", recording(&recorder), [], false).unwrap();

        let invoked = listeners.invoke(&event("rad"), &[1, 0]).unwrap();

        assert_eq!(invoked, 1);
    }

    #[test]
    fn invoke_only_runs_matching_and_wildcard_handlers() {
        let called = Rc::new(Cell::new(0));
        let listeners = ListenerManager::new();

        listeners.add("abc", counting(&called), [], false).unwrap();
        listeners.add("def", counting(&called), [], false).unwrap();
        listeners.add(WILDCARD, counting(&called), [], false).unwrap();

        let invoked = listeners.invoke(&event("abc"), &[]).unwrap();

        assert_eq!(invoked, 2);
        assert_eq!(called.get(), 2);
    }

    #[test]
    fn once_handler_is_removed_for_all_types() {
        let called = Rc::new(Cell::new(0));
        let listeners = ListenerManager::new();
        listeners
            .add(["gnarly", "rad"], counting(&called), [], true)
            .unwrap();

        listeners.invoke(&event("gnarly"), &[]).unwrap();
        listeners.invoke(&event("rad"), &[]).unwrap();

        assert_eq!(called.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn handlers_added_during_invoke_wait_for_next_invoke() {
        let called = Rc::new(Cell::new(0));
        let listeners = Rc::new(ListenerManager::<u32>::new());

        listeners
            .add(
                "gnarly",
                Handler::new({
                    let listeners = Rc::downgrade(&listeners);
                    let called = Rc::clone(&called);
                    move |_, _| {
                        let listeners = listeners.upgrade().unwrap();
                        listeners.add("gnarly", counting(&called), [], false)?;
                        Ok(())
                    }
                }),
                [],
                true,
            )
            .unwrap();

        assert_eq!(listeners.invoke(&event("gnarly"), &[]).unwrap(), 1);
        assert_eq!(called.get(), 0);
        assert_eq!(listeners.len(), 1);

        assert_eq!(listeners.invoke(&event("gnarly"), &[]).unwrap(), 1);
        assert_eq!(called.get(), 1);
    }

    #[test]
    fn handler_may_remove_itself_during_invoke() {
        let called = Rc::new(Cell::new(0));
        let listeners = Rc::new(ListenerManager::<u32>::new());

        let self_removing = Handler::new({
            let listeners = Rc::downgrade(&listeners);
            move |event: &Event<u32>, _: &[u32]| {
                // Removes every "rad" handler, including the one after us.
                listeners
                    .upgrade()
                    .unwrap()
                    .remove(&event.event_type().into(), None, false);
                Ok(())
            }
        });

        listeners.add("rad", self_removing, [], false).unwrap();
        listeners.add("rad", counting(&called), [], false).unwrap();

        assert_eq!(listeners.invoke(&event("rad"), &[]).unwrap(), 2);
        assert_eq!(called.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn stop_propagation_skips_remaining_handlers() {
        let called = Rc::new(Cell::new(0));
        let listeners = ListenerManager::new();

        listeners
            .add(
                "gnarly",
                Handler::new(|event: &Event<u32>, _: &[u32]| {
                    event.stop_propagation();
                    Ok(())
                }),
                [],
                false,
            )
            .unwrap();
        listeners.add("gnarly", counting(&called), [], false).unwrap();

        assert_eq!(listeners.invoke(&event("gnarly"), &[]).unwrap(), 1);
        assert_eq!(called.get(), 0);
    }

    #[test]
    fn failing_handler_stops_invoke_but_keeps_consumed_once_handlers_removed() {
        let called = Rc::new(Cell::new(0));
        let listeners = ListenerManager::new();

        listeners.add("x", counting(&called), [], true).unwrap();
        listeners
            .add("x", Handler::new(|_, _| Err("boom".into())), [], false)
            .unwrap();
        listeners.add("x", counting(&called), [], false).unwrap();

        let error = listeners.invoke(&event("x"), &[]).unwrap_err();

        assert!(matches!(error, Error::Handler(ref inner) if inner.to_string() == "boom"));
        assert_eq!(called.get(), 1);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn remove_matches_type_and_function() {
        let listeners = ListenerManager::<u32>::new();
        let test = Handler::noop();
        let test2 = Handler::noop();

        listeners.add("gnarly", test.clone(), [], false).unwrap();
        listeners.add("gnarly", test2.clone(), [], false).unwrap();
        listeners.add("rad", test.clone(), [], false).unwrap();
        listeners.add("rad", test2.clone(), [], false).unwrap();
        listeners.add("gnarly", test.clone(), [], false).unwrap();

        assert_eq!(listeners.remove(&"gnarly".into(), Some(&test), false), 2);
        assert_eq!(listeners.remove(&"rad".into(), Some(&test), false), 1);
        assert_eq!(listeners.len(), 2);

        assert_eq!(listeners.remove(&"gnarly".into(), Some(&test2), false), 1);
        assert_eq!(listeners.remove(&"rad".into(), Some(&test2), false), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn remove_with_array_filter_uses_any_overlap() {
        let listeners = ListenerManager::<u32>::new();

        listeners.add(["gnarly", "rad"], Handler::noop(), [], false).unwrap();
        listeners.add("other", Handler::noop(), [], false).unwrap();

        assert_eq!(listeners.remove(&["rad", "unknown"].into(), None, false), 1);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn wildcard_filter_removes_concrete_handlers_with_same_function() {
        let called = Rc::new(Cell::new(0));
        let handle = counting(&called);
        let listeners = ListenerManager::new();

        listeners.add("asdf", handle.clone(), [], false).unwrap();
        listeners.remove(&WILDCARD.into(), Some(&handle), false);
        listeners.invoke(&event("asdf"), &[]).unwrap();
        assert!(listeners.is_empty());
        assert_eq!(called.get(), 0);

        listeners.add("asdf", handle, [], false).unwrap();
        listeners.remove(&WILDCARD.into(), None, false);
        listeners.invoke(&event("asdf"), &[]).unwrap();
        assert!(listeners.is_empty());
        assert_eq!(called.get(), 0);
    }

    #[test]
    fn wildcard_handlers_need_wild_to_be_removed() {
        let called = Rc::new(Cell::new(0));
        let handle = counting(&called);
        let listeners = ListenerManager::new();

        listeners.add(WILDCARD, handle.clone(), [], false).unwrap();
        listeners.invoke(&event("asdf"), &[]).unwrap();
        assert_eq!(called.get(), 1);

        assert_eq!(listeners.remove(&WILDCARD.into(), Some(&handle), false), 0);
        assert_eq!(listeners.remove(&EventTypes::none(), None, false), 0);
        listeners.invoke(&event("asdf"), &[]).unwrap();
        assert_eq!(called.get(), 2);

        assert_eq!(listeners.remove(&WILDCARD.into(), Some(&handle), true), 1);
        listeners.invoke(&event("asdf"), &[]).unwrap();
        assert_eq!(called.get(), 2);
    }

    #[test]
    fn dropping_removed_handler_may_call_back_into_manager() {
        struct RemoveOnDrop(Weak<ListenerManager<u32>>);

        impl Drop for RemoveOnDrop {
            fn drop(&mut self) {
                if let Some(listeners) = self.0.upgrade() {
                    listeners.remove(&WILDCARD.into(), None, true);
                }
            }
        }

        let listeners = Rc::new(ListenerManager::<u32>::new());
        listeners.add(WILDCARD, Handler::noop(), [], false).unwrap();

        let on_drop = RemoveOnDrop(Rc::downgrade(&listeners));
        listeners
            .add(
                "x",
                Handler::new(move |_, _| {
                    let _owned = &on_drop;
                    Ok(())
                }),
                [],
                false,
            )
            .unwrap();

        assert_eq!(listeners.remove(&"x".into(), None, false), 1);

        // The wildcard handler was removed from inside the drop.
        assert!(listeners.is_empty());
    }

    #[test]
    fn concrete_filter_does_not_reach_wildcard_handlers() {
        let listeners = ListenerManager::<u32>::new();
        listeners.add(WILDCARD, Handler::noop(), [], false).unwrap();

        assert_eq!(listeners.remove(&"asdf".into(), None, true), 0);
        assert_eq!(listeners.len(), 1);
    }
}
