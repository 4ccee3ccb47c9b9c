#![forbid(unsafe_code)]

//! Nested subscription nodes enforcing parent-before-child notification.
//!
//! # Design
//!
//! A [`SubscriptionNode`] attaches its change handler to exactly one
//! upstream: the parent node's child registry when a parent was given at
//! construction, otherwise the state container itself. Its own children
//! register on the node's local [`ListenerRegistry`].
//!
//! When upstream fires, the node runs the owner-supplied handler and nothing
//! else. The owner decides when to call
//! [`notify_nested_subs`](SubscriptionNode::notify_nested_subs), typically
//! after it has recomputed and committed its own view. That indirection is
//! what orders the tree: children never hear about a change before their
//! parent has finished with it.
//!
//! # Invariants
//!
//! 1. The upstream choice (parent or store) never changes after construction.
//! 2. `try_subscribe` and `try_unsubscribe` are idempotent.
//! 3. A detached node has no child registry; `notify_nested_subs` is a no-op.
//! 4. Detaching clears the child registry, so stale child handles are inert.
//!
//! # Failure Modes
//!
//! - **Parent dropped before attach**: the parent is held weakly. If it is
//!   gone by the time `try_subscribe` runs, the node stays detached and a
//!   debug event is emitted.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::batch::BatchStrategy;
use crate::registry::{ListenerRegistry, Unsubscribe};
use crate::store::{Listener, StoreHandle};

enum Upstream<S, A> {
    Store,
    Parent(Weak<RefCell<NodeInner<S, A>>>),
}

impl<S, A> Clone for Upstream<S, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Store => Self::Store,
            Self::Parent(weak) => Self::Parent(Weak::clone(weak)),
        }
    }
}

struct NodeInner<S, A> {
    store: StoreHandle<S, A>,
    upstream: Upstream<S, A>,
    unsubscribe: Option<Unsubscribe>,
    listeners: Option<ListenerRegistry>,
    on_state_change: Option<Listener>,
    batch: Rc<dyn BatchStrategy>,
}

/// A node in the subscription tree.
///
/// Cloning creates a new handle to the **same** node.
pub struct SubscriptionNode<S, A> {
    inner: Rc<RefCell<NodeInner<S, A>>>,
}

impl<S, A> Clone for SubscriptionNode<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`SubscriptionNode`].
///
/// Handlers installed on a node capture this instead of the node itself so
/// that the node does not keep itself alive.
pub struct WeakSubscriptionNode<S, A> {
    inner: Weak<RefCell<NodeInner<S, A>>>,
}

impl<S, A> Clone for WeakSubscriptionNode<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, A> WeakSubscriptionNode<S, A> {
    /// The node, if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<SubscriptionNode<S, A>> {
        self.inner.upgrade().map(|inner| SubscriptionNode { inner })
    }
}

impl<S, A> fmt::Debug for SubscriptionNode<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SubscriptionNode")
            .field("root", &matches!(inner.upstream, Upstream::Store))
            .field("subscribed", &inner.unsubscribe.is_some())
            .field(
                "nested",
                &inner.listeners.as_ref().map_or(0, ListenerRegistry::len),
            )
            .finish()
    }
}

impl<S: 'static, A: 'static> SubscriptionNode<S, A> {
    /// Create a detached node.
    ///
    /// With `parent`, the node will attach to the parent's child registry;
    /// without, it attaches directly to `store`.
    #[must_use]
    pub fn new(
        store: StoreHandle<S, A>,
        parent: Option<&SubscriptionNode<S, A>>,
        batch: Rc<dyn BatchStrategy>,
    ) -> Self {
        let upstream = match parent {
            Some(parent) => Upstream::Parent(Rc::downgrade(&parent.inner)),
            None => Upstream::Store,
        };
        Self {
            inner: Rc::new(RefCell::new(NodeInner {
                store,
                upstream,
                unsubscribe: None,
                listeners: None,
                on_state_change: None,
                batch,
            })),
        }
    }

    /// Install the handler run once per upstream change.
    ///
    /// Replaces any previous handler. The handler may be installed before or
    /// after attaching.
    pub fn set_on_state_change(&self, handler: Listener) {
        self.inner.borrow_mut().on_state_change = Some(handler);
    }

    /// Attach upstream if not attached yet, and allocate a fresh child
    /// registry.
    pub fn try_subscribe(&self) {
        let upstream = {
            let inner = self.inner.borrow();
            if inner.unsubscribe.is_some() {
                return;
            }
            inner.upstream.clone()
        };

        let handler = self.change_handler();
        let unsubscribe = match upstream {
            Upstream::Store => {
                let store = self.inner.borrow().store.clone();
                store.subscribe(handler)
            }
            Upstream::Parent(weak) => {
                let Some(parent) = weak.upgrade() else {
                    debug!("parent subscription dropped before attach");
                    return;
                };
                SubscriptionNode { inner: parent }.add_nested_sub(handler)
            }
        };

        let mut inner = self.inner.borrow_mut();
        let registry = ListenerRegistry::new(Rc::clone(&inner.batch));
        inner.unsubscribe = Some(unsubscribe);
        inner.listeners = Some(registry);
        debug!(
            root = matches!(inner.upstream, Upstream::Store),
            "subscription attached"
        );
    }

    /// Register a child listener, attaching this node first if needed.
    pub fn add_nested_sub(&self, listener: Listener) -> Unsubscribe {
        self.try_subscribe();
        let registry = self.inner.borrow().listeners.clone();
        match registry {
            Some(registry) => registry.subscribe(listener),
            None => Unsubscribe::noop(),
        }
    }

    /// Notify every child listener registered on this node.
    pub fn notify_nested_subs(&self) {
        let registry = self.inner.borrow().listeners.clone();
        if let Some(registry) = registry {
            registry.notify();
        }
    }

    /// Detach from upstream and clear the child registry, if attached.
    pub fn try_unsubscribe(&self) {
        let (unsubscribe, registry) = {
            let mut inner = self.inner.borrow_mut();
            (inner.unsubscribe.take(), inner.listeners.take())
        };
        let Some(mut unsubscribe) = unsubscribe else {
            return;
        };
        unsubscribe.unsubscribe();
        if let Some(registry) = registry {
            registry.clear();
        }
        debug!("subscription detached");
    }

    /// True iff currently attached upstream.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.borrow().unsubscribe.is_some()
    }

    /// True when this node attaches directly to the store.
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self.inner.borrow().upstream, Upstream::Store)
    }

    /// The container this node observes.
    #[must_use]
    pub fn store(&self) -> StoreHandle<S, A> {
        self.inner.borrow().store.clone()
    }

    /// The batching strategy shared with this node's child registry.
    #[must_use]
    pub fn batch(&self) -> Rc<dyn BatchStrategy> {
        Rc::clone(&self.inner.borrow().batch)
    }

    /// The parent node, if one was given and is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<SubscriptionNode<S, A>> {
        match &self.inner.borrow().upstream {
            Upstream::Parent(weak) => weak.upgrade().map(|inner| SubscriptionNode { inner }),
            Upstream::Store => None,
        }
    }

    /// Number of child listeners currently registered.
    #[must_use]
    pub fn nested_count(&self) -> usize {
        self.inner
            .borrow()
            .listeners
            .as_ref()
            .map_or(0, ListenerRegistry::len)
    }

    /// True when both handles refer to the same node.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A non-owning handle to this node.
    #[must_use]
    pub fn downgrade(&self) -> WeakSubscriptionNode<S, A> {
        WeakSubscriptionNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// The listener registered upstream: runs the current handler, if any.
    fn change_handler(&self) -> Listener {
        let weak = Rc::downgrade(&self.inner);
        Rc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let handler = inner.borrow().on_state_change.clone();
            if let Some(handler) = handler {
                handler();
            }
        })
    }
}
