#![forbid(unsafe_code)]

//! Core: state container contract, listener registries, and nested
//! subscription trees for Cascade.
//!
//! # Role in Cascade
//! `cascade-core` owns the notification engine. A single shared state
//! container fans out change notifications through a tree of
//! [`SubscriptionNode`]s so that an ancestor consumer always finishes
//! reacting to a change before any of its descendants hears about it.
//!
//! # Primary responsibilities
//! - **StateContainer**: the consumed `get_state` / `dispatch` / `subscribe`
//!   contract, plus the identity-comparable [`StoreHandle`] and [`Dispatch`].
//! - **ListenerRegistry**: ordered, snapshot-on-notify listener list that is
//!   safe to mutate from inside its own notification pass.
//! - **SubscriptionNode**: one node per observing consumer, attached either to
//!   its parent node or directly to the container.
//! - **BatchStrategy**: host-supplied scope wrapped around every notify pass.
//!
//! # Architecture
//!
//! Everything here is single-threaded: shared handles are `Rc<RefCell<..>>`
//! and upstream callbacks hold `Weak` references so that a dropped node never
//! keeps its parent alive.
//!
//! # Invariants
//!
//! 1. A notify pass iterates the listener snapshot taken when it started.
//! 2. Listeners fire in registration order.
//! 3. A node is attached to exactly one upstream source, chosen at
//!    construction.
//! 4. A cleared registry stays cleared.

pub mod batch;
pub mod registry;
pub mod store;
pub mod subscription;

pub use batch::{BatchStrategy, ImmediateBatch};
pub use registry::{ListenerRegistry, Unsubscribe};
pub use store::{Dispatch, Listener, StateContainer, StoreHandle};
pub use subscription::{SubscriptionNode, WeakSubscriptionNode};
