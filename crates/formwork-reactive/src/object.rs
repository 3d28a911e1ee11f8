#![forbid(unsafe_code)]

//! Keyed containers with per-key tracking.
//!
//! A [`ReactiveObject`] maps string keys to [`Slot`]s. Each slot is its own
//! cell, so a derivation that reads `name` is unaffected by writes to `age`.
//! Shape queries (`contains_key`, `keys`, `len`) are untracked: adding a key
//! notifies nobody, but derivations that read the key afterwards subscribe to
//! it as usual.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::computed::Computed;
use crate::error::{ReactiveError, Result};
use crate::runtime::Runtime;
use crate::value::Value;

/// The cell behind one key.
pub enum Slot<V> {
    Value(Value<V>),
    Computed(Computed<V>),
}

impl<V> Clone for Slot<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Computed(computed) => Self::Computed(computed.clone()),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computed(computed) => f.debug_tuple("Computed").field(computed).finish(),
        }
    }
}

impl<V: Clone + 'static> Slot<V> {
    /// Current value, recording the read.
    #[must_use]
    pub fn get(&self) -> V {
        match self {
            Self::Value(value) => value.get(),
            Self::Computed(computed) => computed.get(),
        }
    }

    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

/// A string-keyed table of reactive cells.
///
/// Cloning a `ReactiveObject` creates a new handle to the **same** table.
pub struct ReactiveObject<V> {
    runtime: Runtime,
    slots: Rc<RefCell<IndexMap<String, Slot<V>>>>,
}

impl<V> Clone for ReactiveObject<V> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ReactiveObject<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slots.borrow().iter()).finish()
    }
}

impl<V: Clone + PartialEq + 'static> ReactiveObject<V> {
    /// Build an object where every entry becomes a fresh value cell.
    pub fn new<K, I>(runtime: &Runtime, entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let slots = entries
            .into_iter()
            .map(|(key, value)| (key.into(), Slot::Value(Value::new(runtime, value))))
            .collect();
        Self {
            runtime: runtime.clone(),
            slots: Rc::new(RefCell::new(slots)),
        }
    }

    /// Wire an existing value cell under `key`.
    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: Value<V>) -> Self {
        self.insert_slot(key, Slot::Value(value));
        self
    }

    /// Wire a computed cell under `key`. The key becomes read-only.
    #[must_use]
    pub fn with_computed(self, key: impl Into<String>, computed: Computed<V>) -> Self {
        self.insert_slot(key, Slot::Computed(computed));
        self
    }

    /// Insert or replace the slot under `key`. Returns the previous slot.
    ///
    /// Replacing a slot does not notify readers of the old cell.
    pub fn insert_slot(&self, key: impl Into<String>, slot: Slot<V>) -> Option<Slot<V>> {
        self.slots.borrow_mut().insert(key.into(), slot)
    }

    /// Current value under `key`, recording the read. Absent keys return
    /// `None` and record nothing.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        // Clone the slot out so a derivation reading it can touch this table.
        let slot = self.slot(key)?;
        Some(slot.get())
    }

    /// Assign `value` under `key`.
    ///
    /// Value-backed keys behave like [`Value::set`]; new keys get a fresh
    /// value cell.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::ComputedWrite`] if `key` is backed by a computed.
    pub fn set(&self, key: &str, value: V) -> Result<()> {
        match self.slot(key) {
            Some(Slot::Value(cell)) => {
                cell.set(value);
                Ok(())
            }
            Some(Slot::Computed(_)) => Err(ReactiveError::computed_write(key)),
            None => {
                self.insert_slot(key, Slot::Value(Value::new(&self.runtime, value)));
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.borrow().contains_key(key)
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.slots.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// The cell under `key`, untracked.
    #[must_use]
    pub fn slot(&self, key: &str) -> Option<Slot<V>> {
        self.slots.borrow().get(key).cloned()
    }

    /// Snapshot of every slot in insertion order.
    #[must_use]
    pub fn slots(&self) -> Vec<(String, Slot<V>)> {
        self.slots
            .borrow()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect()
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Union of `self` and `other` as a new table; `other` wins on conflicts.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        merge(self, other)
    }
}

/// A new object holding the union of both tables' keys. Cells are shared,
/// not copied, and `b` takes precedence.
#[must_use]
pub fn merge<V: Clone + PartialEq + 'static>(
    a: &ReactiveObject<V>,
    b: &ReactiveObject<V>,
) -> ReactiveObject<V> {
    let mut slots = a.slots.borrow().clone();
    for (key, slot) in b.slots.borrow().iter() {
        slots.insert(key.clone(), slot.clone());
    }
    ReactiveObject {
        runtime: a.runtime.clone(),
        slots: Rc::new(RefCell::new(slots)),
    }
}
