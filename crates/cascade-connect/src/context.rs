#![forbid(unsafe_code)]

//! The value handed down the consumer tree.

use std::fmt;
use std::rc::Rc;

use cascade_core::{BatchStrategy, ImmediateBatch, StoreHandle, SubscriptionNode};

/// Store, nearest ancestor subscription, and batching strategy visible to a
/// consumer.
///
/// Passed explicitly at mount. A connected consumer that reads its store from
/// this context hands its descendants a copy with `subscription` replaced by
/// its own node (see `ConnectedInstance::child_context`).
pub struct ConnectContext<S, A> {
    /// The shared container.
    pub store: StoreHandle<S, A>,
    /// Node descendants attach to; `None` means attach to the store.
    pub subscription: Option<SubscriptionNode<S, A>>,
    /// Scope wrapped around every notify pass.
    pub batch: Rc<dyn BatchStrategy>,
}

impl<S, A> Clone for ConnectContext<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            subscription: self.subscription.clone(),
            batch: Rc::clone(&self.batch),
        }
    }
}

impl<S, A> fmt::Debug for ConnectContext<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectContext")
            .field("store", &self.store)
            .field("has_subscription", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: 'static, A: 'static> ConnectContext<S, A> {
    /// Context with no subscription and immediate batching.
    #[must_use]
    pub fn new(store: StoreHandle<S, A>) -> Self {
        Self {
            store,
            subscription: None,
            batch: ImmediateBatch::shared(),
        }
    }

    /// Replace the subscription node.
    #[must_use]
    pub fn with_subscription(mut self, subscription: Option<SubscriptionNode<S, A>>) -> Self {
        self.subscription = subscription;
        self
    }

    /// Replace the batching strategy.
    #[must_use]
    pub fn with_batch(mut self, batch: Rc<dyn BatchStrategy>) -> Self {
        self.batch = batch;
        self
    }

    /// True when both contexts name the same store and subscription node.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        self.store.same(&other.store)
            && match (&self.subscription, &other.subscription) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => true,
                _ => false,
            }
    }
}

pub(crate) fn same_context<S: 'static, A: 'static>(
    a: Option<&ConnectContext<S, A>>,
    b: Option<&ConnectContext<S, A>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same(b),
        (None, None) => true,
        _ => false,
    }
}
