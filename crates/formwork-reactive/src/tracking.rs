#![forbid(unsafe_code)]

//! Dependency sets shared by computed cells, reactions and watchers.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;

use crate::atom::{Atom, AtomId, Listener};

/// Atoms read during one derivation run, in first-read order.
pub(crate) type Observed = IndexMap<AtomId, Atom>;

/// The atoms a derivation is currently subscribed to.
#[derive(Default)]
pub(crate) struct Dependencies {
    atoms: RefCell<Observed>,
}

impl Dependencies {
    /// Replace the dependency set with `next`, detaching `listener` from
    /// atoms that were dropped and attaching it to atoms that were added.
    pub(crate) fn rewire(&self, next: Observed, listener: &Listener) {
        let previous = self.atoms.replace(next);
        let current = self.atoms.borrow();
        for (id, atom) in &previous {
            if !current.contains_key(id) {
                atom.detach(listener);
            }
        }
        for (id, atom) in current.iter() {
            if !previous.contains_key(id) {
                atom.attach(listener);
            }
        }
    }

    /// Detach from every dependency and forget them.
    pub(crate) fn clear(&self, listener: &Listener) {
        let previous = self.atoms.take();
        for atom in previous.values() {
            atom.detach(listener);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.atoms.borrow().len()
    }

    pub(crate) fn contains(&self, id: AtomId) -> bool {
        self.atoms.borrow().contains_key(&id)
    }
}

/// Resets a flag when dropped, including during unwinding.
pub(crate) struct ResetOnDrop<'a> {
    flag: &'a Cell<bool>,
    value: bool,
}

impl<'a> ResetOnDrop<'a> {
    pub(crate) fn new(flag: &'a Cell<bool>, value: bool) -> Self {
        Self { flag, value }
    }
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.flag.set(self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    #[test]
    fn rewire_applies_symmetric_difference() {
        let rt = Runtime::new();
        let (a, b, c) = (Atom::new(&rt), Atom::new(&rt), Atom::new(&rt));
        let listener = Listener::new(|| {});
        let deps = Dependencies::default();

        let first: Observed = [(a.id(), a.clone()), (b.id(), b.clone())].into_iter().collect();
        deps.rewire(first, &listener);
        assert!(a.is_attached(&listener));
        assert!(b.is_attached(&listener));

        let second: Observed = [(b.id(), b.clone()), (c.id(), c.clone())].into_iter().collect();
        deps.rewire(second, &listener);
        assert!(!a.is_attached(&listener));
        assert!(b.is_attached(&listener));
        assert!(c.is_attached(&listener));
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(c.id()));

        deps.clear(&listener);
        assert_eq!(deps.len(), 0);
        assert_eq!(b.listener_count() + c.listener_count(), 0);
    }
}
