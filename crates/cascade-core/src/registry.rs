#![forbid(unsafe_code)]

//! Ordered listener registry with snapshot-on-notify semantics.
//!
//! # Design
//!
//! The live listener list is a persistent `Rc<Vec<Entry>>`. A notify pass
//! clones the `Rc` (an O(1) snapshot) and iterates it with no borrow held, so
//! listeners may freely subscribe or unsubscribe while the pass runs. Any such
//! mutation goes through [`Rc::make_mut`], which copies the list only while a
//! snapshot is still alive. Removal is by entry id, so a handle can never
//! remove a different listener that happens to sit at the same index.
//!
//! # Invariants
//!
//! 1. A pass invokes exactly the listeners present when it began, in
//!    registration order.
//! 2. A listener added during a pass first fires on the next pass.
//! 3. A listener removed during a pass still fires in that pass if it was in
//!    the snapshot.
//! 4. After [`clear`](ListenerRegistry::clear) the registry is inert forever:
//!    `subscribe` returns a no-op handle and `notify` does nothing.
//!
//! # Failure Modes
//!
//! - **Handle outlives registry**: the handle holds a `Weak`; calling it after
//!   the registry was dropped is a no-op.
//! - **Handle called twice**: the second call is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::batch::BatchStrategy;
use crate::store::Listener;

#[derive(Clone)]
struct Entry {
    id: u64,
    listener: Listener,
}

enum Listeners {
    Active(Rc<Vec<Entry>>),
    Cleared,
}

struct RegistryInner {
    listeners: Listeners,
    next_id: u64,
}

impl RegistryInner {
    fn remove(&mut self, id: u64) {
        if let Listeners::Active(list) = &mut self.listeners
            && let Some(pos) = list.iter().position(|entry| entry.id == id)
        {
            Rc::make_mut(list).remove(pos);
        }
    }
}

/// Mutation-safe ordered collection of zero-argument listeners.
///
/// Cloning creates a new handle to the **same** registry.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<RegistryInner>>,
    batch: Rc<dyn BatchStrategy>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut s = f.debug_struct("ListenerRegistry");
        match &inner.listeners {
            Listeners::Active(list) => s.field("listeners", &list.len()),
            Listeners::Cleared => s.field("cleared", &true),
        };
        s.finish()
    }
}

impl ListenerRegistry {
    /// Create an empty registry whose notify passes run inside `batch`.
    #[must_use]
    pub fn new(batch: Rc<dyn BatchStrategy>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                listeners: Listeners::Active(Rc::new(Vec::new())),
                next_id: 0,
            })),
            batch,
        }
    }

    /// Append `listener` and return a one-shot handle that removes it.
    ///
    /// On a cleared registry the listener is dropped and the handle is a
    /// no-op.
    pub fn subscribe(&self, listener: Listener) -> Unsubscribe {
        let id = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Listeners::Active(list) = &mut inner.listeners else {
                return Unsubscribe::noop();
            };
            let id = inner.next_id;
            inner.next_id += 1;
            Rc::make_mut(list).push(Entry { id, listener });
            id
        };

        let weak: Weak<RefCell<RegistryInner>> = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().remove(id);
            }
        })
    }

    /// Invoke every listener present right now, in registration order, inside
    /// one batching scope.
    pub fn notify(&self) {
        let snapshot = match &self.inner.borrow().listeners {
            Listeners::Active(list) => Rc::clone(list),
            Listeners::Cleared => return,
        };
        if snapshot.is_empty() {
            return;
        }

        trace!(listeners = snapshot.len(), "notify pass");
        self.batch.batch(&mut || {
            for entry in snapshot.iter() {
                (entry.listener)();
            }
        });
    }

    /// Drop every listener and make the registry permanently inert.
    pub fn clear(&self) {
        // Move the list out before dropping it: listener destructors may call
        // back into this registry.
        let old = std::mem::replace(&mut self.inner.borrow_mut().listeners, Listeners::Cleared);
        drop(old);
    }

    /// True once [`clear`](Self::clear) has run.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        matches!(self.inner.borrow().listeners, Listeners::Cleared)
    }

    /// The current listener sequence (empty when cleared).
    #[must_use]
    pub fn listeners(&self) -> Vec<Listener> {
        match &self.inner.borrow().listeners {
            Listeners::Active(list) => list.iter().map(|e| Rc::clone(&e.listener)).collect(),
            Listeners::Cleared => Vec::new(),
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.inner.borrow().listeners {
            Listeners::Active(list) => list.len(),
            Listeners::Cleared => 0,
        }
    }

    /// True when no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One-shot handle that removes a listener.
///
/// Nothing happens on drop: a listener stays registered until the handle is
/// invoked or its registry is cleared.
#[must_use = "dropping the handle leaves the listener registered"]
pub struct Unsubscribe {
    action: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("spent", &self.action.is_none())
            .finish()
    }
}

impl Unsubscribe {
    /// Wrap a removal action.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A handle that does nothing.
    pub fn noop() -> Self {
        Self { action: None }
    }

    /// Run the removal action. Subsequent calls are no-ops.
    pub fn unsubscribe(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }

    /// True once the handle has been used (or was a no-op from the start).
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.action.is_none()
    }
}
