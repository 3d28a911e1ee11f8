#![forbid(unsafe_code)]

//! The base unit of observability.
//!
//! An [`Atom`] has no value of its own. It carries an identity and an ordered
//! set of [`Listener`]s, and it knows which [`Runtime`] it belongs to so that
//! reads can be reported to the innermost execution frame.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::runtime::Runtime;

static NEXT_ATOM_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an [`Atom`], unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(u64);

impl AtomId {
    fn next() -> Self {
        Self(NEXT_ATOM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Identity of a [`Listener`]. Two clones of a listener share the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A change callback that can be attached to any number of atoms.
///
/// Attach and detach are keyed by the listener's id, so attaching the same
/// listener twice is a no-op.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    callback: Rc<dyn Fn()>,
}

impl Listener {
    /// Wrap a callback in a new listener identity.
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self {
            id: ListenerId::next(),
            callback: Rc::new(callback),
        }
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn call(&self) {
        (self.callback)();
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

struct AtomInner {
    id: AtomId,
    runtime: Runtime,
    listeners: RefCell<IndexMap<ListenerId, Listener>>,
}

/// An observable identity with a set of change listeners.
///
/// Cloning an `Atom` creates a new handle to the **same** atom.
#[derive(Clone)]
pub struct Atom {
    inner: Rc<AtomInner>,
}

impl Atom {
    /// Create a fresh atom owned by `runtime`.
    #[must_use]
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Rc::new(AtomInner {
                id: AtomId::next(),
                runtime: runtime.clone(),
                listeners: RefCell::new(IndexMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> AtomId {
        self.inner.id
    }

    /// The runtime this atom reports reads to.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Attach a listener. Returns `false` if it was already attached.
    pub fn attach(&self, listener: &Listener) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        if listeners.contains_key(&listener.id) {
            return false;
        }
        listeners.insert(listener.id, listener.clone());
        true
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn detach(&self, listener: &Listener) -> bool {
        self.inner
            .listeners
            .borrow_mut()
            .shift_remove(&listener.id)
            .is_some()
    }

    #[must_use]
    pub fn is_attached(&self, listener: &Listener) -> bool {
        self.inner.listeners.borrow().contains_key(&listener.id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Record this atom as read by the innermost active execution frame.
    ///
    /// Outside any frame this does nothing.
    pub fn report_observed(&self) {
        self.inner.runtime.report_observed(self);
    }

    /// Invoke every attached listener in attachment order.
    ///
    /// The listener set is snapshotted first, so listeners may attach or
    /// detach (on this or other atoms) while being notified.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = self.inner.listeners.borrow().values().cloned().collect();
        for listener in snapshot {
            listener.call();
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
