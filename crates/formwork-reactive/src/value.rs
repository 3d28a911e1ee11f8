#![forbid(unsafe_code)]

//! Mutable observable cells.
//!
//! # Invariants
//!
//! 1. [`Value::set`] with a value equal to the current one does nothing.
//! 2. A changing `set` notifies listeners synchronously, before returning.
//!    Batching only defers reaction *runs*, never notification.
//! 3. Reads inside a derivation are recorded in the innermost frame; reads
//!    elsewhere are untracked.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::atom::Atom;
use crate::runtime::Runtime;

struct ValueInner<T> {
    atom: Atom,
    value: RefCell<T>,
}

/// A single mutable value with edge-triggered change notification.
///
/// Cloning a `Value` creates a new handle to the **same** cell.
pub struct Value<T> {
    inner: Rc<ValueInner<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("value", &*self.inner.value.borrow())
            .field("atom", &self.inner.atom)
            .finish()
    }
}

impl<T: 'static> Value<T> {
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(ValueInner {
                atom: Atom::new(runtime),
                value: RefCell::new(value),
            }),
        }
    }

    /// Access the current value by reference, recording the read.
    ///
    /// # Panics
    ///
    /// Panics if the closure writes to this same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.report_observed();
        f(&self.inner.value.borrow())
    }

    /// Access the current value by reference without recording the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Mutate the value in place. Always notifies.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.inner.atom.notify();
    }

    /// The atom backing this cell.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        &self.inner.atom
    }

    /// Whether two handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Value<T> {
    /// Current value, recording the read.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Current value, without recording the read.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Value<T> {
    /// Store `value` and notify listeners, unless it equals the current
    /// value.
    pub fn set(&self, value: T) {
        self.replace_if_changed(value);
    }

    /// Like [`set`](Self::set), reporting whether the value changed.
    pub(crate) fn replace_if_changed(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.inner.atom.notify();
        true
    }
}
