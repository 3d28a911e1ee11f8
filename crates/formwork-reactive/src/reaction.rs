#![forbid(unsafe_code)]

//! Tracked side effects.
//!
//! A [`Reaction`] runs an effect inside an execution frame and subscribes to
//! every atom the effect read. When one of those atoms notifies while an
//! action is open (or a drain is running), the reaction enqueues itself on
//! the runtime; it re-runs when the outermost action closes.
//!
//! # Disposal
//!
//! [`Reaction::dispose`] detaches from all dependencies immediately. A run
//! that was already enqueued in the current drain is skipped rather than
//! executed. Dropping the `Reaction` handle disposes it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::{Atom, Listener};
use crate::runtime::{Runtime, ScheduledJob};
use crate::tracking::{Dependencies, ResetOnDrop};

struct ReactionInner {
    runtime: Runtime,
    effect: RefCell<Box<dyn FnMut()>>,
    dependencies: Dependencies,
    listener: Listener,
    pending: Cell<bool>,
    disposed: Cell<bool>,
    runs: Cell<u64>,
}

impl ReactionInner {
    fn schedule(self: &Rc<Self>) {
        if self.pending.get() || self.disposed.get() {
            return;
        }
        let job: Rc<dyn ScheduledJob> = self.clone();
        if self.runtime.schedule(job) {
            self.pending.set(true);
        }
    }

    fn run(&self) {
        let _clear_pending = ResetOnDrop::new(&self.pending, false);
        if self.disposed.get() {
            tracing::trace!(target: "formwork::scheduler", "skipping disposed reaction");
            return;
        }
        let Ok(mut effect) = self.effect.try_borrow_mut() else {
            tracing::warn!(target: "formwork::scheduler", "reaction re-entered its own run; skipped");
            return;
        };
        let ((), observed) = self.runtime.track(|| (*effect)());
        drop(effect);
        if self.disposed.get() {
            // Disposed by its own effect; stay detached.
            return;
        }
        self.dependencies.rewire(observed, &self.listener);
        self.runs.set(self.runs.get() + 1);
        self.runtime.bump(|stats| stats.reaction_runs += 1);
    }

    fn dispose(&self) {
        self.disposed.set(true);
        self.dependencies.clear(&self.listener);
    }
}

impl ScheduledJob for ReactionInner {
    fn run_scheduled(&self) {
        self.run();
    }

    fn cancel_pending(&self) {
        self.pending.set(false);
    }
}

impl Drop for ReactionInner {
    fn drop(&mut self) {
        self.dependencies.clear(&self.listener);
    }
}

/// A subscribed side-effecting computation.
///
/// Not cloneable: the handle owns the subscription.
#[must_use = "dropping a Reaction disposes it"]
pub struct Reaction {
    inner: Rc<ReactionInner>,
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("pending", &self.inner.pending.get())
            .field("disposed", &self.inner.disposed.get())
            .field("runs", &self.inner.runs.get())
            .field("dependencies", &self.inner.dependencies.len())
            .finish()
    }
}

impl Reaction {
    /// Create a reaction without running it. It has no dependencies until
    /// the first [`run`](Self::run).
    pub fn new(runtime: &Runtime, effect: impl FnMut() + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ReactionInner>| {
            let weak = weak.clone();
            let listener = Listener::new(move || {
                if let Some(strong) = weak.upgrade() {
                    strong.schedule();
                }
            });
            ReactionInner {
                runtime: runtime.clone(),
                effect: RefCell::new(Box::new(effect)),
                dependencies: Dependencies::default(),
                listener,
                pending: Cell::new(false),
                disposed: Cell::new(false),
                runs: Cell::new(0),
            }
        });
        Self { inner }
    }

    /// Run the effect now and rewire dependencies.
    ///
    /// Does nothing once disposed, or while the reaction is already queued:
    /// the queued run does the work when the drain reaches it.
    pub fn run(&self) {
        let inner = &*self.inner;
        if inner.pending.get() {
            tracing::trace!(target: "formwork::scheduler", "reaction already queued; manual run skipped");
            return;
        }
        // Held for the whole run so writes made by the effect cannot queue it.
        inner.pending.set(true);
        inner.run();
    }

    /// Detach from every dependency and skip any run already enqueued.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Whether the reaction is waiting in the runtime's queue.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get()
    }

    /// Completed runs so far.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }

    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.len()
    }

    #[must_use]
    pub fn depends_on(&self, atom: &Atom) -> bool {
        self.inner.dependencies.contains(atom.id())
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}
