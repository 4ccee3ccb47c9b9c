#![forbid(unsafe_code)]

//! Root of a consumer tree.

use std::rc::Rc;

use cascade_core::{BatchStrategy, StoreHandle, SubscriptionNode};
use tracing::debug;

use crate::context::ConnectContext;

/// Owns the root [`SubscriptionNode`] of a tree.
///
/// The root listens to the container and relays every change straight to its
/// children. Top-level consumers mount with [`context`](Self::context) and
/// attach under the root.
pub struct Provider<S, A> {
    root: SubscriptionNode<S, A>,
    context: ConnectContext<S, A>,
    initial_state: Rc<S>,
}

impl<S: 'static, A: 'static> Provider<S, A> {
    /// Build the root node for `store`. Nothing is attached yet.
    #[must_use]
    pub fn new(store: StoreHandle<S, A>, batch: Rc<dyn BatchStrategy>) -> Self {
        let root = SubscriptionNode::new(store.clone(), None, Rc::clone(&batch));
        let weak = root.downgrade();
        root.set_on_state_change(Rc::new(move || {
            if let Some(root) = weak.upgrade() {
                root.notify_nested_subs();
            }
        }));
        let initial_state = store.get_state();
        let context = ConnectContext {
            store,
            subscription: Some(root.clone()),
            batch,
        };
        Self {
            root,
            context,
            initial_state,
        }
    }

    /// Attach the root to the container.
    ///
    /// If the state moved on since construction, children are notified once
    /// so that nobody keeps a stale view.
    pub fn attach(&self) {
        self.root.try_subscribe();
        if !Rc::ptr_eq(&self.initial_state, &self.context.store.get_state()) {
            debug!("state changed before provider attached; notifying");
            self.root.notify_nested_subs();
        }
    }

    /// Detach the root; every descendant stops hearing the container.
    pub fn detach(&self) {
        self.root.try_unsubscribe();
    }

    /// Context for top-level consumers.
    #[must_use]
    pub fn context(&self) -> ConnectContext<S, A> {
        self.context.clone()
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &SubscriptionNode<S, A> {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Counter;
    use cascade_core::ImmediateBatch;
    use std::cell::Cell;

    #[test]
    fn root_relays_to_children() {
        let (counter, store) = Counter::shared(0);
        let provider = Provider::new(store, ImmediateBatch::shared());
        provider.attach();

        let heard = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&heard);
        let mut handle = provider
            .root()
            .add_nested_sub(Rc::new(move || h.set(h.get() + 1)));

        counter.increment();
        assert_eq!(heard.get(), 1);
        handle.unsubscribe();
        counter.increment();
        assert_eq!(heard.get(), 1);
    }

    #[test]
    fn attach_catches_up_on_missed_change() {
        let (counter, store) = Counter::shared(0);
        let provider = Provider::new(store, ImmediateBatch::shared());
        let heard = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&heard);
        // Registering a child attaches the root, so detach it again to model
        // a change that lands before the provider is attached.
        let _handle = provider
            .root()
            .add_nested_sub(Rc::new(move || h.set(h.get() + 1)));
        provider.detach();

        counter.increment();
        assert_eq!(heard.get(), 0);
        let h = Rc::clone(&heard);
        let _handle = provider
            .root()
            .add_nested_sub(Rc::new(move || h.set(h.get() + 1)));
        provider.attach();
        assert_eq!(heard.get(), 1);
    }

    #[test]
    fn detach_silences_tree() {
        let (counter, store) = Counter::shared(0);
        let provider = Provider::new(store, ImmediateBatch::shared());
        provider.attach();
        provider.detach();
        assert!(!provider.root().is_subscribed());
        counter.increment();
        assert!(provider.context().subscription.is_some());
    }
}
