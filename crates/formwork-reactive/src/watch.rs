#![forbid(unsafe_code)]

//! Tracked callables with change handlers.
//!
//! A [`Watcher`] wraps a function. Every call runs the function inside an
//! execution frame and resubscribes to exactly what that call read. When a
//! dependency changes inside an action, the watcher is scheduled like a
//! reaction and its handlers run during the drain. Handlers are not called
//! with the function's result; they typically call the watcher again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::{Atom, Listener};
use crate::runtime::{Runtime, ScheduledJob};
use crate::tracking::{Dependencies, ResetOnDrop};

trait Subscription {
    fn unsubscribe(&self);
    fn is_subscribed(&self) -> bool;
}

struct WatcherInner<A, R> {
    runtime: Runtime,
    f: Box<dyn Fn(A) -> R>,
    dependencies: Dependencies,
    listener: Listener,
    pending: Cell<bool>,
    subscribed: Cell<bool>,
    handlers: RefCell<Vec<Box<dyn FnMut()>>>,
}

impl<A: 'static, R: 'static> WatcherInner<A, R> {
    fn schedule(self: &Rc<Self>) {
        if self.pending.get() || !self.subscribed.get() {
            return;
        }
        let job: Rc<dyn ScheduledJob> = self.clone();
        if self.runtime.schedule(job) {
            self.pending.set(true);
        }
    }
}

impl<A, R> ScheduledJob for WatcherInner<A, R> {
    fn run_scheduled(&self) {
        let _clear_pending = ResetOnDrop::new(&self.pending, false);
        if !self.subscribed.get() {
            return;
        }
        let Ok(mut handlers) = self.handlers.try_borrow_mut() else {
            tracing::warn!(target: "formwork::scheduler", "watcher handlers re-entered; skipped");
            return;
        };
        tracing::trace!(
            target: "formwork::scheduler",
            handlers = handlers.len(),
            "running watcher handlers"
        );
        for handler in handlers.iter_mut() {
            handler();
        }
        drop(handlers);
        self.runtime.bump(|stats| stats.reaction_runs += 1);
    }

    fn cancel_pending(&self) {
        self.pending.set(false);
    }
}

impl<A, R> Subscription for WatcherInner<A, R> {
    fn unsubscribe(&self) {
        self.subscribed.set(false);
        self.dependencies.clear(&self.listener);
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed.get()
    }
}

impl<A, R> Drop for WatcherInner<A, R> {
    fn drop(&mut self) {
        self.dependencies.clear(&self.listener);
    }
}

/// A tracked callable.
///
/// Cloning a `Watcher` creates a new handle to the **same** subscription.
/// The subscription lives until [`unsubscribe`](Self::unsubscribe) or until
/// the last handle is dropped.
pub struct Watcher<A, R> {
    inner: Rc<WatcherInner<A, R>>,
}

impl<A, R> Clone for Watcher<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A, R> fmt::Debug for Watcher<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("subscribed", &self.inner.subscribed.get())
            .field("pending", &self.inner.pending.get())
            .field("handlers", &self.inner.handlers.borrow().len())
            .field("dependencies", &self.inner.dependencies.len())
            .finish()
    }
}

impl<A: 'static, R: 'static> Watcher<A, R> {
    /// Wrap `f`. No handlers are attached and nothing is tracked until the
    /// first call.
    pub fn new(runtime: &Runtime, f: impl Fn(A) -> R + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<WatcherInner<A, R>>| {
            let weak = weak.clone();
            let listener = Listener::new(move || {
                if let Some(strong) = weak.upgrade() {
                    strong.schedule();
                }
            });
            WatcherInner {
                runtime: runtime.clone(),
                f: Box::new(f),
                dependencies: Dependencies::default(),
                listener,
                pending: Cell::new(false),
                subscribed: Cell::new(true),
                handlers: RefCell::new(Vec::new()),
            }
        });
        Self { inner }
    }

    /// Call the wrapped function and subscribe to what it read, replacing
    /// the previous subscription. After `unsubscribe` the call still runs
    /// but subscribes to nothing.
    pub fn call(&self, args: A) -> R {
        let inner = &*self.inner;
        let (result, observed) = inner.runtime.track(|| (inner.f)(args));
        if inner.subscribed.get() {
            inner.dependencies.rewire(observed, &inner.listener);
        }
        result
    }

    /// Run `handler` whenever a dependency of the latest call changes.
    pub fn add_handler(&self, handler: impl FnMut() + 'static) {
        self.inner.handlers.borrow_mut().push(Box::new(handler));
    }

    /// Detach from every dependency and stop running handlers.
    pub fn unsubscribe(&self) {
        Subscription::unsubscribe(&*self.inner);
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.get()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get()
    }

    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.len()
    }

    #[must_use]
    pub fn depends_on(&self, atom: &Atom) -> bool {
        self.inner.dependencies.contains(atom.id())
    }

    /// A type-erased handle that can only unsubscribe. It does not keep the
    /// watcher alive.
    #[must_use]
    pub fn handle(&self) -> WatchHandle {
        let weak = Rc::downgrade(&self.inner);
        let inner: Weak<dyn Subscription> = weak;
        WatchHandle { inner }
    }
}

/// Unsubscribe-only view of a [`Watcher`].
#[derive(Clone)]
pub struct WatchHandle {
    inner: Weak<dyn Subscription>,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl WatchHandle {
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe();
        }
    }

    /// `false` once unsubscribed or once the watcher is gone.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.is_subscribed())
    }
}
