use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;

use tracing::trace;

type Task<E> = Box<dyn FnOnce() -> Result<(), E>>;

/// A synchronous first-in-first-out queue of deferred calls.
///
/// Tasks are added with [`enqueue()`][Self::enqueue] and executed by
/// [`flush()`][Self::flush], which keeps going until the queue is empty - including tasks
/// that were enqueued by the tasks it is running. A `flush()` call made while another one is
/// already draining the same queue returns immediately, leaving the work to the outer call.
///
/// This makes nested work run in the order it was requested instead of recursively:
/// a task that enqueues more work and flushes sees that work run after itself and after
/// everything that was queued before it.
///
/// If a task fails, every task still in the queue is discarded and the error is returned
/// from the outermost `flush()`. The same happens if a task panics, in which case the panic
/// continues unwinding to the caller.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use emitter::DeferredQueue;
///
/// let queue = Rc::new(DeferredQueue::<()>::new());
/// let order = Rc::new(RefCell::new(Vec::new()));
///
/// queue.enqueue({
///     let queue = Rc::clone(&queue);
///     let order = Rc::clone(&order);
///     move || {
///         queue.enqueue({
///             let order = Rc::clone(&order);
///             move || {
///                 order.borrow_mut().push("nested");
///                 Ok(())
///             }
///         });
///
///         // We are already draining, so this returns immediately.
///         queue.flush()?;
///
///         order.borrow_mut().push("outer");
///         Ok(())
///     }
/// });
///
/// queue.flush().unwrap();
///
/// assert_eq!(*order.borrow(), vec!["outer", "nested"]);
/// assert!(queue.is_empty());
/// ```
pub struct DeferredQueue<E> {
    tasks: RefCell<VecDeque<Task<E>>>,
    draining: Cell<bool>,
}

impl<E> DeferredQueue<E> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }

    /// Appends a task to the end of the queue. Does not execute anything.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// The number of tasks waiting to be executed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether no tasks are waiting to be executed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Whether a [`flush()`][Self::flush] call is currently executing tasks.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    /// Executes queued tasks in order until the queue is empty.
    ///
    /// Does nothing if the queue is already being drained by an outer call.
    ///
    /// # Errors
    ///
    /// Returns the error of the first task that fails. All tasks still in the queue at that
    /// point are discarded without being executed.
    pub fn flush(&self) -> Result<(), E> {
        if self.draining.get() {
            trace!(pending = self.len(), "queue already draining");
            return Ok(());
        }

        self.draining.set(true);

        // Runs on success, on error and on panic alike. On success the queue is already
        // empty, so only the draining flag changes.
        let _reset = scopeguard::guard(self, |queue| {
            // Tasks may own values whose drop enqueues more work, so they must not be
            // dropped while the queue is borrowed.
            let discarded = mem::take(&mut *queue.tasks.borrow_mut());

            if !discarded.is_empty() {
                trace!(discarded = discarded.len(), "discarding queued tasks");
            }

            drop(discarded);
            queue.draining.set(false);
        });

        let mut executed: usize = 0;

        loop {
            // The borrow must end before the task runs, as the task may enqueue more work.
            let next = self.tasks.borrow_mut().pop_front();

            let Some(task) = next else {
                break;
            };

            task()?;
            executed = executed.saturating_add(1);
        }

        trace!(executed, "queue drained");

        Ok(())
    }
}

impl<E> Default for DeferredQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for DeferredQueue<E> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("tasks", &self.len())
            .field("draining", &self.draining.get())
            .finish()
    }
}
