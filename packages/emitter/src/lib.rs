#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! # emitter
//!
//! Synchronous, single-threaded event subjects.
//!
//! An [`Emitter`] holds an ordered list of handlers, each registered for a set of named event
//! types or for the [`WILDCARD`]. Emitting a type runs every matching handler in
//! registration order, on the calling thread, before `emit()` returns.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use emitter::{Emitter, Handler, WILDCARD};
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let record = Handler::new({
//!     let seen = Rc::clone(&seen);
//!     move |event, args: &[u32]| {
//!         seen.borrow_mut().push((event.event_type().to_string(), args.to_vec()));
//!         Ok(())
//!     }
//! });
//!
//! let subject = Emitter::new();
//!
//! subject
//!     .when(["opened", "closed"], record.clone())
//!     .unwrap()
//!     .once(WILDCARD, record.clone())
//!     .unwrap();
//!
//! subject.emit_with("opened", [1]).unwrap();
//! subject.emit_with("closed", [2]).unwrap();
//!
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![
//!         ("opened".to_string(), vec![1]),
//!         ("opened".to_string(), vec![1]),
//!         ("closed".to_string(), vec![2]),
//!     ]
//! );
//! ```
//!
//! # Handlers
//!
//! A [`Handler`] wraps a function that receives the [`Event`] and the arguments of the
//! invocation: whatever was bound at registration via [`Emitter::when_with()`] or
//! [`Emitter::once_with()`], followed by whatever was passed to the emit call. Handlers are
//! compared by identity, so keep a clone around if you want to [`Emitter::dispel()`] one
//! specific handler later.
//!
//! Handlers can influence the rest of the dispatch through the event:
//!
//! * [`Event::stop_propagation()`] skips the remaining handlers for this event.
//! * [`Event::prevent_default()`] skips the callback passed to
//!   [`Emitter::emit_with_callback()`].
//!
//! Handlers may register, remove and emit on any subject, including the one that is
//! currently dispatching. Changes to the set of handlers apply to the next dispatch.
//!
//! # Watching
//!
//! A subject can [`watch()`][Emitter::watch] other subjects. It then receives every event
//! they dispatch, which runs its own matching handlers and its default handler. Custom types
//! become watchable by implementing [`Emits`].
//!
//! # Deferred dispatch
//!
//! By default, an `emit()` from inside a handler is dispatched immediately, in the middle of
//! the dispatch that is already in progress. Configuring a [`DeferredQueue`] via
//! [`EmitterBuilder::deferred()`] instead queues nested emits until the outer one has
//! completed, so all events are dispatched in the order they were emitted.
//!
//! # Errors
//!
//! Handlers return [`HandlerResult`]. The first failure aborts the dispatch and is returned
//! from the `emit()` call as an [`Error`].
//!
//! # Logging
//!
//! Registration, removal and watching are logged via `tracing` at debug level; dispatch is
//! logged at trace level. Install a `tracing` subscriber to see the output.

mod builder;
mod emitter;
mod error;
mod event;
mod handler;
mod listeners;
mod queue;
mod types;
mod watch;

pub use builder::*;
pub use emitter::*;
pub use error::*;
pub use event::*;
pub use handler::*;
pub use listeners::*;
pub use queue::*;
pub use types::*;
