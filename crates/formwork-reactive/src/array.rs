#![forbid(unsafe_code)]

//! Indexed containers with per-index tracking.
//!
//! A [`ReactiveArray`] keeps one value cell per position plus a whole-array
//! atom. Indexed reads subscribe to the position's cell; length reads,
//! iteration and out-of-range reads subscribe to the whole array. Every
//! mutation notifies the whole-array atom.
//!
//! Cells are positional: structural operations (`insert`, `remove`, ...)
//! rewrite the values at each affected position rather than moving cells
//! around, so a reader of index 2 always sees whatever is at index 2 now.
//! Positions removed by shrinking are notified before their cells are
//! dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::atom::Atom;
use crate::error::{ReactiveError, Result};
use crate::runtime::Runtime;
use crate::value::Value;

struct ArrayInner<T> {
    runtime: Runtime,
    whole: Atom,
    items: RefCell<Vec<Value<T>>>,
}

/// An ordered sequence of reactive cells.
///
/// Cloning a `ReactiveArray` creates a new handle to the **same** sequence.
pub struct ReactiveArray<T> {
    inner: Rc<ArrayInner<T>>,
}

impl<T> Clone for ReactiveArray<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + Clone + 'static> fmt::Debug for ReactiveArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.items.borrow().iter().map(Value::get_untracked))
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ReactiveArray<T> {
    pub fn new(runtime: &Runtime, initial: impl IntoIterator<Item = T>) -> Self {
        let items = initial
            .into_iter()
            .map(|value| Value::new(runtime, value))
            .collect();
        Self {
            inner: Rc::new(ArrayInner {
                runtime: runtime.clone(),
                whole: Atom::new(runtime),
                items: RefCell::new(items),
            }),
        }
    }

    /// Value at `index`, tracked per index. Out-of-range reads return
    /// `None` and track the whole array.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        let cell = self.inner.items.borrow().get(index).cloned();
        match cell {
            Some(cell) => Some(cell.get()),
            None => {
                self.inner.whole.report_observed();
                None
            }
        }
    }

    /// Assign `value` at `index`. `index == len` appends.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::IndexOutOfBounds`] if `index > len`.
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        let len = self.len_untracked();
        if index > len {
            return Err(ReactiveError::IndexOutOfBounds { index, len });
        }
        if index == len {
            self.push(value);
            return Ok(());
        }
        let cell = self.inner.items.borrow()[index].clone();
        if cell.replace_if_changed(value) {
            self.inner.whole.notify();
        }
        Ok(())
    }

    /// Length, tracked at whole-array granularity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.whole.report_observed();
        self.len_untracked()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: T) {
        let cell = Value::new(&self.inner.runtime, value);
        self.inner.items.borrow_mut().push(cell);
        self.inner.whole.notify();
    }

    pub fn pop(&self) -> Option<T> {
        let mut values = self.snapshot();
        let last = values.pop()?;
        self.rewrite(values);
        Some(last)
    }

    /// Insert `value` at `index`, shifting later values right.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::IndexOutOfBounds`] if `index > len`.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        let mut values = self.snapshot();
        if index > values.len() {
            return Err(ReactiveError::IndexOutOfBounds {
                index,
                len: values.len(),
            });
        }
        values.insert(index, value);
        self.rewrite(values);
        Ok(())
    }

    /// Remove and return the value at `index`, shifting later values left.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::IndexOutOfBounds`] if `index >= len`.
    pub fn remove(&self, index: usize) -> Result<T> {
        let mut values = self.snapshot();
        if index >= values.len() {
            return Err(ReactiveError::IndexOutOfBounds {
                index,
                len: values.len(),
            });
        }
        let removed = values.remove(index);
        self.rewrite(values);
        Ok(removed)
    }

    /// Shorten to `len` values. Longer lengths are ignored.
    pub fn truncate(&self, len: usize) {
        let mut values = self.snapshot();
        if len >= values.len() {
            return;
        }
        values.truncate(len);
        self.rewrite(values);
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    /// All values, tracked at whole-array granularity.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.whole.report_observed();
        self.snapshot()
    }

    pub fn map<U>(&self, f: impl FnMut(T) -> U) -> Vec<U> {
        self.to_vec().into_iter().map(f).collect()
    }

    pub fn for_each(&self, f: impl FnMut(T)) {
        self.to_vec().into_iter().for_each(f);
    }

    /// The whole-array atom.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        &self.inner.whole
    }

    fn len_untracked(&self) -> usize {
        self.inner.items.borrow().len()
    }

    fn snapshot(&self) -> Vec<T> {
        self.inner
            .items
            .borrow()
            .iter()
            .map(Value::get_untracked)
            .collect()
    }

    /// Make the array hold exactly `next`, position by position, then
    /// notify the whole array if anything changed.
    fn rewrite(&self, next: Vec<T>) {
        let cells = self.inner.items.borrow().clone();
        let shared = cells.len().min(next.len());
        let mut changed = cells.len() != next.len();
        let mut next = next.into_iter();

        for cell in &cells[..shared] {
            if let Some(value) = next.next() {
                changed |= cell.replace_if_changed(value);
            }
        }

        let added: Vec<Value<T>> = next
            .map(|value| Value::new(&self.inner.runtime, value))
            .collect();
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            let at = shared.min(items.len());
            let removed = items.split_off(at);
            items.extend(added);
            removed
        };
        for cell in &removed {
            cell.atom().notify();
        }

        if changed {
            self.inner.whole.notify();
        }
    }
}
