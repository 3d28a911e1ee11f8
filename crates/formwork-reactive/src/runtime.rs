#![forbid(unsafe_code)]

//! Execution-context stack and batch scheduler.
//!
//! # Design
//!
//! A [`Runtime`] is a cheap, cloneable handle to one reactive universe. It
//! owns three pieces of state:
//!
//! - the **frame stack**: one frame per running derivation, recording the
//!   atoms read during that run (innermost frame wins);
//! - the **batch counter**: incremented by [`Runtime::run_in_action`] on
//!   entry and decremented on exit;
//! - the **pending queue**: reactions scheduled while a batch is open or a
//!   drain is running.
//!
//! When the batch counter returns to zero the queue is drained generation by
//! generation: the whole queue is taken, cleared, and every job in it runs in
//! FIFO order. Jobs scheduled while a generation runs form the next one.
//!
//! # Failure Modes
//!
//! - **Action panics**: the panic is logged, the batch is closed (including
//!   the drain if this was the outermost action), then the panic resumes.
//! - **Reaction panics**: the drain stops and the panic propagates. Jobs of
//!   that generation that had not run yet are unqueued with their pending
//!   flag cleared, so the next change schedules them normally.
//! - **Runaway drain**: after `max_drain_generations` generations the rest of
//!   the queue is discarded, an `error` event is emitted and
//!   [`RuntimeStats::runaways`] is incremented.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::array::ReactiveArray;
use crate::atom::Atom;
use crate::computed::Computed;
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::object::ReactiveObject;
use crate::reaction::Reaction;
use crate::tracking::{Observed, ResetOnDrop};
use crate::value::Value;
use crate::watch::Watcher;

/// Work that can sit in the pending queue.
pub(crate) trait ScheduledJob {
    /// Run the job as part of a drain generation.
    fn run_scheduled(&self);

    /// Clear the job's pending flag without running it.
    fn cancel_pending(&self);
}

/// Counters describing what a runtime has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Outermost and nested actions entered.
    pub actions: u64,
    /// Drains started (one per outermost action close).
    pub drains: u64,
    /// Drain generations executed.
    pub generations: u64,
    /// Reaction and watcher runs executed.
    pub reaction_runs: u64,
    /// Drains aborted at the generation cap.
    pub runaways: u64,
}

struct RuntimeInner {
    config: RuntimeConfig,
    frames: RefCell<Vec<Observed>>,
    batch_depth: Cell<usize>,
    draining: Cell<bool>,
    pending: RefCell<Vec<Rc<dyn ScheduledJob>>>,
    stats: Cell<RuntimeStats>,
}

/// Handle to one reactive universe.
///
/// Cloning a `Runtime` creates a new handle to the **same** universe.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("frames", &self.inner.frames.borrow().len())
            .field("batch_depth", &self.inner.batch_depth.get())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                frames: RefCell::new(Vec::new()),
                batch_depth: Cell::new(0),
                draining: Cell::new(false),
                pending: RefCell::new(Vec::new()),
                stats: Cell::new(RuntimeStats::default()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        self.inner.stats.get()
    }

    /// Current action nesting depth.
    #[must_use]
    pub fn batch_depth(&self) -> usize {
        self.inner.batch_depth.get()
    }

    /// Whether a derivation is currently recording reads.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        !self.inner.frames.borrow().is_empty()
    }

    /// Number of jobs waiting for the next drain generation.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Whether two handles refer to the same runtime.
    #[must_use]
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -----------------------------------------------------------------------
    // Cell constructors
    // -----------------------------------------------------------------------

    /// Create a [`Value`] cell.
    pub fn value<T: 'static>(&self, value: T) -> Value<T> {
        Value::new(self, value)
    }

    /// Create a [`Computed`] cell.
    pub fn computed<T: 'static>(&self, compute: impl Fn() -> T + 'static) -> Computed<T> {
        Computed::new(self, compute)
    }

    /// Create a [`ReactiveObject`] whose entries each become a value cell.
    pub fn object<V, K, I>(&self, entries: I) -> ReactiveObject<V>
    where
        V: Clone + PartialEq + 'static,
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        ReactiveObject::new(self, entries)
    }

    /// Create a [`ReactiveArray`].
    pub fn array<T>(&self, initial: impl IntoIterator<Item = T>) -> ReactiveArray<T>
    where
        T: Clone + PartialEq + 'static,
    {
        ReactiveArray::new(self, initial)
    }

    /// Create a [`Reaction`] and run it once immediately, subscribing it to
    /// everything the first run reads.
    pub fn autorun(&self, effect: impl FnMut() + 'static) -> Reaction {
        let reaction = Reaction::new(self, effect);
        reaction.run();
        reaction
    }

    /// Wrap `f` as a tracked callable whose dependency changes run
    /// `on_change`.
    pub fn watch<A, R>(
        &self,
        f: impl Fn(A) -> R + 'static,
        on_change: impl FnMut() + 'static,
    ) -> Watcher<A, R>
    where
        A: 'static,
        R: 'static,
    {
        let watcher = Watcher::new(self, f);
        watcher.add_handler(on_change);
        watcher
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    pub(crate) fn report_observed(&self, atom: &Atom) {
        if let Some(frame) = self.inner.frames.borrow_mut().last_mut() {
            frame.entry(atom.id()).or_insert_with(|| atom.clone());
        }
    }

    /// Run `f` inside a fresh execution frame and return what it read.
    ///
    /// The frame is popped even if `f` panics.
    pub(crate) fn track<R>(&self, f: impl FnOnce() -> R) -> (R, Observed) {
        self.inner.frames.borrow_mut().push(Observed::new());
        let guard = FrameGuard {
            runtime: &self.inner,
            armed: true,
        };
        let result = f();
        (result, guard.finish())
    }

    /// Run `f` without recording any reads into the enclosing derivation.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.track(f).0
    }

    // -----------------------------------------------------------------------
    // Batching
    // -----------------------------------------------------------------------

    /// Run `f` as an action.
    ///
    /// Reactions affected by changes made inside `f` are deferred until the
    /// outermost action closes, then drained. A runaway drain is logged and
    /// counted; use [`try_run_in_action`](Self::try_run_in_action) to receive
    /// it as an error.
    pub fn run_in_action<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.try_run_in_action(f) {
            Ok(result) => result,
            Err((result, _)) => result,
        }
    }

    /// Like [`run_in_action`](Self::run_in_action), but a runaway drain at the
    /// close of this action is returned as `Err` alongside `f`'s result.
    pub fn try_run_in_action<R>(
        &self,
        f: impl FnOnce() -> R,
    ) -> Result<R, (R, ReactiveError)> {
        self.start_batch();
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        if outcome.is_err() {
            tracing::error!(
                target: "formwork::action",
                depth = self.batch_depth(),
                "action panicked; closing batch before unwinding"
            );
        }
        let closed = self.end_batch();
        match (outcome, closed) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(result), Err(err)) => Err((result, err)),
            (Err(payload), _) => panic::resume_unwind(payload),
        }
    }

    /// Wrap `f` so that every call runs inside [`run_in_action`](Self::run_in_action).
    pub fn action<A, R>(&self, f: impl Fn(A) -> R + 'static) -> impl Fn(A) -> R + 'static
    where
        A: 'static,
        R: 'static,
    {
        let runtime = self.clone();
        move |args| runtime.run_in_action(|| f(args))
    }

    fn start_batch(&self) {
        let depth = self.inner.batch_depth.get() + 1;
        self.inner.batch_depth.set(depth);
        self.bump(|stats| stats.actions += 1);
        if self.inner.config.log_actions {
            tracing::debug!(target: "formwork::action", depth, "action started");
        }
    }

    fn end_batch(&self) -> Result<(), ReactiveError> {
        let depth = self.inner.batch_depth.get().saturating_sub(1);
        self.inner.batch_depth.set(depth);
        if self.inner.config.log_actions {
            tracing::debug!(target: "formwork::action", depth, "action ended");
        }
        if depth == 0 && !self.inner.draining.get() {
            self.drain().map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Enqueue a job. Returns `false` (and enqueues nothing) when neither a
    /// batch nor a drain is open.
    pub(crate) fn schedule(&self, job: Rc<dyn ScheduledJob>) -> bool {
        if self.inner.batch_depth.get() == 0 && !self.inner.draining.get() {
            return false;
        }
        self.inner.pending.borrow_mut().push(job);
        true
    }

    /// Drain the pending queue. Returns the number of generations run.
    fn drain(&self) -> Result<usize, ReactiveError> {
        let inner = &*self.inner;
        inner.draining.set(true);
        let _reset = ResetOnDrop::new(&inner.draining, false);
        self.bump(|stats| stats.drains += 1);

        let cap = inner.config.max_drain_generations;
        let mut generations = 0usize;
        loop {
            let batch = inner.pending.take();
            if batch.is_empty() {
                return Ok(generations);
            }
            if generations >= cap {
                let discarded = batch.len();
                for job in &batch {
                    job.cancel_pending();
                }
                self.bump(|stats| stats.runaways += 1);
                tracing::error!(
                    target: "formwork::scheduler",
                    generations,
                    discarded,
                    "reaction drain exceeded generation cap"
                );
                return Err(ReactiveError::RunawayDrain {
                    generations,
                    discarded,
                });
            }
            generations += 1;
            self.bump(|stats| stats.generations += 1);
            tracing::trace!(
                target: "formwork::scheduler",
                generation = generations,
                size = batch.len(),
                "draining generation"
            );
            let mut remaining = UnrunJobs(batch.into_iter());
            while let Some(job) = remaining.0.next() {
                job.run_scheduled();
            }
        }
    }

    pub(crate) fn bump(&self, f: impl FnOnce(&mut RuntimeStats)) {
        let mut stats = self.inner.stats.get();
        f(&mut stats);
        self.inner.stats.set(stats);
    }
}

/// The rest of a generation. Jobs still in it when it drops (a job
/// panicked) have their pending flag cleared so they can be scheduled again.
struct UnrunJobs(std::vec::IntoIter<Rc<dyn ScheduledJob>>);

impl Drop for UnrunJobs {
    fn drop(&mut self) {
        for job in self.0.by_ref() {
            job.cancel_pending();
        }
    }
}

struct FrameGuard<'a> {
    runtime: &'a RuntimeInner,
    armed: bool,
}

impl FrameGuard<'_> {
    fn finish(mut self) -> Observed {
        self.armed = false;
        self.runtime.frames.borrow_mut().pop().unwrap_or_default()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.runtime.frames.borrow_mut().pop();
        }
    }
}
