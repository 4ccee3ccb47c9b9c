#![forbid(unsafe_code)]

//! Minimal doubles for unit tests. End-to-end tests use `cascade-harness`.

use std::cell::RefCell;
use std::rc::Rc;

use cascade_core::{
    ImmediateBatch, Listener, ListenerRegistry, StateContainer, StoreHandle, Unsubscribe,
};

use crate::component::{RenderHost, RenderTarget};
use crate::error::ConnectError;

pub(crate) enum Bump {
    Increment,
    Touch,
}

pub(crate) struct Counter {
    state: RefCell<Rc<u32>>,
    registry: ListenerRegistry,
}

impl Counter {
    pub(crate) fn shared(initial: u32) -> (Rc<Self>, StoreHandle<u32, Bump>) {
        let counter = Rc::new(Self {
            state: RefCell::new(Rc::new(initial)),
            registry: ListenerRegistry::new(ImmediateBatch::shared()),
        });
        let store = StoreHandle::from(Rc::clone(&counter));
        (counter, store)
    }

    pub(crate) fn increment(&self) {
        self.dispatch(Bump::Increment);
    }

    /// New snapshot, same value.
    pub(crate) fn touch(&self) {
        self.dispatch(Bump::Touch);
    }
}

impl StateContainer for Counter {
    type State = u32;
    type Action = Bump;

    fn get_state(&self) -> Rc<u32> {
        Rc::clone(&self.state.borrow())
    }

    fn dispatch(&self, action: Bump) {
        let current = *self.get_state();
        let next = match action {
            Bump::Increment => current + 1,
            Bump::Touch => current,
        };
        *self.state.borrow_mut() = Rc::new(next);
        self.registry.notify();
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.registry.subscribe(listener)
    }
}

/// Renders synchronously and records what happened.
#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) renders: RefCell<Vec<String>>,
    pub(crate) errors: RefCell<Vec<ConnectError>>,
}

impl RenderHost for RecordingHost {
    fn request_render(&self, target: Rc<dyn RenderTarget>) {
        self.renders
            .borrow_mut()
            .push(target.display_name().to_owned());
        if let Err(err) = target.rerender() {
            self.errors.borrow_mut().push(err);
        }
    }
}
