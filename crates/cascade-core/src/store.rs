#![forbid(unsafe_code)]

//! The consumed state container contract.
//!
//! Cascade never implements a container. It only reads state, forwards
//! actions, and registers a listener. State is handed out as `Rc<State>` so
//! that pointer identity can stand in for "did anything change": consumers
//! compare snapshots with [`Rc::ptr_eq`] rather than deep equality.

use std::fmt;
use std::rc::Rc;

use crate::registry::Unsubscribe;

/// A zero-argument change callback.
pub type Listener = Rc<dyn Fn()>;

/// A shared, mutable source of truth.
///
/// # Contract
///
/// - `get_state` is synchronous and returns the latest snapshot. A container
///   that did not change must keep returning the same `Rc`.
/// - `subscribe` registers `listener` to be called after every dispatch and
///   returns a one-shot handle that removes it.
pub trait StateContainer {
    /// Snapshot type.
    type State: 'static;
    /// Action type accepted by `dispatch`.
    type Action: 'static;

    /// Current state snapshot.
    fn get_state(&self) -> Rc<Self::State>;

    /// Forward an action to the container.
    fn dispatch(&self, action: Self::Action);

    /// Register a change listener.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// Identity-comparable handle to a type-erased [`StateContainer`].
///
/// Cloning shares the same container. Two handles are [`same`](Self::same)
/// when they point at the same allocation, which is how consumers detect that
/// their upstream store was swapped.
pub struct StoreHandle<S, A> {
    inner: Rc<dyn StateContainer<State = S, Action = A>>,
}

impl<S, A> Clone for StoreHandle<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, A> fmt::Debug for StoreHandle<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("ptr", &Rc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

impl<S: 'static, A: 'static, C> From<Rc<C>> for StoreHandle<S, A>
where
    C: StateContainer<State = S, Action = A> + 'static,
{
    fn from(container: Rc<C>) -> Self {
        Self { inner: container }
    }
}

impl<S: 'static, A: 'static> StoreHandle<S, A> {
    /// Wrap a container that is not shared elsewhere.
    pub fn new(container: impl StateContainer<State = S, Action = A> + 'static) -> Self {
        Self {
            inner: Rc::new(container),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn get_state(&self) -> Rc<S> {
        self.inner.get_state()
    }

    /// Forward an action to the container.
    pub fn dispatch(&self, action: A) {
        self.inner.dispatch(action);
    }

    /// Register a change listener directly on the container.
    pub fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.inner.subscribe(listener)
    }

    /// A [`Dispatch`] bound to this container.
    ///
    /// Each call creates a new handle; callers that rely on dispatch identity
    /// must keep the first one.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatch<A> {
        let store = self.clone();
        Dispatch::new(move |action| store.dispatch(action))
    }

    /// True when both handles refer to the same container.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.inner), Rc::as_ptr(&other.inner))
    }
}

/// Cloneable, identity-comparable dispatch function.
pub struct Dispatch<A> {
    func: Rc<dyn Fn(A)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").finish_non_exhaustive()
    }
}

impl<A> Dispatch<A> {
    /// Wrap a dispatch function.
    pub fn new(func: impl Fn(A) + 'static) -> Self {
        Self {
            func: Rc::new(func),
        }
    }

    /// Send an action.
    pub fn dispatch(&self, action: A) {
        (self.func)(action);
    }

    /// True when both handles wrap the same function.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.func), Rc::as_ptr(&other.func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Fixed {
        state: Rc<u32>,
        log: RefCell<Vec<&'static str>>,
    }

    impl StateContainer for Fixed {
        type State = u32;
        type Action = &'static str;

        fn get_state(&self) -> Rc<u32> {
            Rc::clone(&self.state)
        }

        fn dispatch(&self, action: &'static str) {
            self.log.borrow_mut().push(action);
        }

        fn subscribe(&self, _listener: Listener) -> Unsubscribe {
            Unsubscribe::noop()
        }
    }

    fn fixed() -> Rc<Fixed> {
        Rc::new(Fixed {
            state: Rc::new(7),
            log: RefCell::new(Vec::new()),
        })
    }

    #[test]
    fn handles_from_same_rc_are_same() {
        let container = fixed();
        let a: StoreHandle<u32, &'static str> = StoreHandle::from(Rc::clone(&container));
        let b: StoreHandle<u32, &'static str> = StoreHandle::from(container);
        assert!(a.same(&b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn distinct_containers_are_not_same() {
        let a: StoreHandle<u32, &'static str> = StoreHandle::from(fixed());
        let b: StoreHandle<u32, &'static str> = StoreHandle::from(fixed());
        assert!(!a.same(&b));
    }

    #[test]
    fn dispatcher_forwards_actions() {
        let container = fixed();
        let handle: StoreHandle<u32, &'static str> = StoreHandle::from(Rc::clone(&container));
        let dispatch = handle.dispatcher();
        dispatch.dispatch("inc");
        dispatch.clone().dispatch("dec");
        assert_eq!(*container.log.borrow(), vec!["inc", "dec"]);
        assert_eq!(*handle.get_state(), 7);
    }

    #[test]
    fn dispatch_identity() {
        let a = Dispatch::new(|_: u8| {});
        let b = Dispatch::new(|_: u8| {});
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
    }
}
