#![forbid(unsafe_code)]

//! Lazy computed values with dynamically tracked dependencies.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a derivation and its cached result in shared,
//! reference-counted storage. Every run of the derivation happens inside a
//! fresh execution frame; the atoms read during that run become the
//! computed's dependency set, replacing the previous set in full. When any
//! dependency notifies, the cached value is marked dirty and the computed
//! notifies its own listeners. The next call to [`get()`](Computed::get)
//! recomputes.
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the current state of all
//!    dependencies.
//! 2. The derivation runs at most once per dependency change cycle.
//! 3. Dependencies read only under a condition are dropped as soon as a run
//!    no longer reads them.
//! 4. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Derivation panics**: the panic reaches the caller of `get()`. The
//!   frame is popped, the previous dependency set is kept and the dirty flag
//!   stays set, so the next `get()` retries.
//! - **Cycle**: reading a computed from inside its own derivation panics.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::atom::{Atom, Listener};
use crate::runtime::Runtime;
use crate::tracking::{Dependencies, ResetOnDrop};
use crate::value::Value;

/// Shared interior for [`Computed<T>`].
struct ComputedInner<T> {
    /// Notified when this computed becomes dirty.
    atom: Atom,
    /// The derivation.
    compute: Box<dyn Fn() -> T>,
    /// Cached result (None only before the first successful computation).
    cached: RefCell<Option<T>>,
    /// Whether the cached value is stale.
    dirty: Cell<bool>,
    /// Set while the derivation is running.
    computing: Cell<bool>,
    /// Monotonically increasing version, bumped on each recomputation.
    version: Cell<u64>,
    /// Atoms read during the most recent run.
    dependencies: Dependencies,
    /// Invalidation listener attached to every dependency.
    listener: Listener,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.dependencies.clear(&self.listener);
    }
}

/// A lazily-evaluated, memoized value derived from whatever cells its
/// derivation reads.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &*self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .field("dependencies", &self.inner.dependencies.len())
            .finish()
    }
}

impl<T: 'static> Computed<T> {
    /// Create a computed value. The derivation does not run until the first
    /// read.
    pub fn new(runtime: &Runtime, compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let listener = Listener::new(move || {
                if let Some(strong) = weak.upgrade() {
                    strong.dirty.set(true);
                    strong.atom.notify();
                }
            });
            ComputedInner {
                atom: Atom::new(runtime),
                compute: Box::new(compute),
                cached: RefCell::new(None),
                dirty: Cell::new(true), // Dirty initially; computes on first get().
                computing: Cell::new(false),
                version: Cell::new(0),
                dependencies: Dependencies::default(),
                listener,
            }
        });
        Self { inner }
    }

    /// Create a computed value derived from a single value cell.
    pub fn from_value<S: 'static>(source: &Value<S>, map: impl Fn(&S) -> T + 'static) -> Self {
        let source = source.clone();
        let runtime = source.atom().runtime().clone();
        Self::new(&runtime, move || source.with(|v| map(v)))
    }

    /// Access the current value by reference, recording the read and
    /// recomputing first if dirty.
    ///
    /// # Panics
    ///
    /// Panics if called from inside this computed's own derivation, or if
    /// the derivation panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.report_observed();
        self.refresh();
        let cached = self.inner.cached.borrow();
        f(cached
            .as_ref()
            .expect("cached is always Some after refresh"))
    }

    fn refresh(&self) {
        let inner = &*self.inner;
        if !inner.dirty.get() && inner.cached.borrow().is_some() {
            return;
        }
        assert!(
            !inner.computing.get(),
            "cycle detected: computed value read during its own derivation"
        );
        inner.computing.set(true);
        let _reset = ResetOnDrop::new(&inner.computing, false);

        let runtime = inner.atom.runtime().clone();
        let (value, observed) = runtime.track(|| (inner.compute)());
        *inner.cached.borrow_mut() = Some(value);
        inner.dependencies.rewire(observed, &inner.listener);
        inner.dirty.set(false);
        inner.version.set(inner.version.get() + 1);
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force invalidation of the cached value and notify dependents. The
    /// next `get()` will recompute.
    pub fn invalidate(&self) {
        self.inner.dirty.set(true);
        self.inner.atom.notify();
    }

    /// Current version number. Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of atoms read by the most recent run.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.len()
    }

    /// Whether the most recent run read `atom`.
    #[must_use]
    pub fn depends_on(&self, atom: &Atom) -> bool {
        self.inner.dependencies.contains(atom.id())
    }

    /// The atom dependents subscribe to.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        &self.inner.atom
    }

    /// Whether two handles refer to the same computed cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, recomputing if any dependency has changed.
    ///
    /// Returns a clone of the cached value.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Derive another computed value from this one.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Computed<U> {
        let source = self.clone();
        let runtime = self.inner.atom.runtime().clone();
        Computed::new(&runtime, move || f(source.get()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
