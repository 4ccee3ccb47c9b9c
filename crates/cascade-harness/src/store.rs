#![forbid(unsafe_code)]

//! Reducer-driven in-memory state container.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use cascade_core::{
    BatchStrategy, Listener, ListenerRegistry, StateContainer, StoreHandle, Unsubscribe,
};
use tracing::{trace, warn};

type Reducer<S, A> = dyn Fn(&Rc<S>, A) -> Rc<S>;

/// A [`StateContainer`] whose state evolves through a reducer.
///
/// The reducer receives the current snapshot and returns the next one;
/// returning the same `Rc` means "unchanged". Listeners are notified after
/// every dispatch either way.
pub struct MemoryStore<S, A> {
    state: RefCell<Rc<S>>,
    reducer: Box<Reducer<S, A>>,
    registry: ListenerRegistry,
    dispatching: Cell<bool>,
    dispatches: Cell<usize>,
}

impl<S, A> fmt::Debug for MemoryStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("listeners", &self.registry.len())
            .field("dispatches", &self.dispatches.get())
            .finish_non_exhaustive()
    }
}

impl<S: 'static, A: 'static> MemoryStore<S, A> {
    /// A store starting at `initial`.
    pub fn new(
        initial: S,
        reducer: impl Fn(&Rc<S>, A) -> Rc<S> + 'static,
        batch: Rc<dyn BatchStrategy>,
    ) -> Self {
        Self {
            state: RefCell::new(Rc::new(initial)),
            reducer: Box::new(reducer),
            registry: ListenerRegistry::new(batch),
            dispatching: Cell::new(false),
            dispatches: Cell::new(0),
        }
    }

    /// Build a store and a handle to it.
    pub fn shared(
        initial: S,
        reducer: impl Fn(&Rc<S>, A) -> Rc<S> + 'static,
        batch: Rc<dyn BatchStrategy>,
    ) -> (Rc<Self>, StoreHandle<S, A>) {
        let store = Rc::new(Self::new(initial, reducer, batch));
        let handle = StoreHandle::from(Rc::clone(&store));
        (store, handle)
    }

    /// Number of completed dispatches.
    #[must_use]
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.get()
    }

    /// Number of listeners registered directly on the store.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }
}

impl<S: 'static, A: 'static> StateContainer for MemoryStore<S, A> {
    type State = S;
    type Action = A;

    fn get_state(&self) -> Rc<S> {
        Rc::clone(&self.state.borrow())
    }

    fn dispatch(&self, action: A) {
        if self.dispatching.replace(true) {
            warn!("dispatch from inside a reducer ignored");
            return;
        }
        let current = self.get_state();
        let next = (self.reducer)(&current, action);
        let changed = !Rc::ptr_eq(&current, &next);
        *self.state.borrow_mut() = next;
        self.dispatching.set(false);
        self.dispatches.set(self.dispatches.get() + 1);
        trace!(changed, "dispatched");
        self.registry.notify();
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.registry.subscribe(listener)
    }
}
