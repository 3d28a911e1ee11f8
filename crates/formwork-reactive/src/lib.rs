#![forbid(unsafe_code)]

//! Reactive state for formwork.
//!
//! This crate provides dependency-tracking primitives:
//!
//! - [`Atom`]: the minimal observable unit. Holds listeners, no value.
//! - [`Value`]: a mutable cell with equality-gated change notification.
//! - [`Computed`]: a lazily-evaluated, memoized derivation whose dependency
//!   set is discovered on every run.
//! - [`ReactiveObject`] / [`ReactiveArray`]: keyed and indexed containers
//!   with per-slot tracking granularity.
//! - [`Reaction`] / [`Watcher`]: side-effecting subscriptions coalesced by
//!   the [`Runtime`] batch scheduler.
//!
//! # Architecture
//!
//! Every cell is created from a [`Runtime`]. The runtime owns the
//! execution-frame stack (which records the atoms a derivation reads), the
//! batch counter, and the pending-reaction queue. Independent runtimes never
//! interact, which keeps tests isolated.
//!
//! All handles use `Rc` for single-threaded shared ownership. Atoms hold
//! their listeners strongly; listeners hold only `Weak` references to the
//! derivation they belong to, so the dependency graph never keeps a
//! derivation alive.
//!
//! # Invariants
//!
//! 1. Setting a value equal to the current value is a no-op (no
//!    notification).
//! 2. Listeners are notified in attachment order.
//! 3. A derivation's subscriptions mirror exactly the atoms read during its
//!    most recent run.
//! 4. `Computed::get()` never returns a stale value.
//! 5. Reactions only re-run for changes made inside an action; within one
//!    drain, a reaction scheduled in generation N runs in generation N+1 or
//!    later.

pub mod array;
pub mod atom;
pub mod computed;
pub mod config;
pub mod error;
pub mod object;
pub mod reaction;
pub mod runtime;
pub mod value;
pub mod watch;

mod tracking;

pub use array::ReactiveArray;
pub use atom::{Atom, AtomId, Listener, ListenerId};
pub use computed::Computed;
pub use config::{DEFAULT_MAX_DRAIN_GENERATIONS, RuntimeConfig};
pub use error::{ReactiveError, Result};
pub use object::{ReactiveObject, Slot, merge};
pub use reaction::Reaction;
pub use runtime::{Runtime, RuntimeStats};
pub use value::Value;
pub use watch::{WatchHandle, Watcher};
