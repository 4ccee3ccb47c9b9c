#![forbid(unsafe_code)]

//! Cascade public facade.
//!
//! Consumers subscribe to one shared state container through a tree of
//! subscription nodes. A consumer recomputes its derived props when the
//! container changes, and its descendants only hear about the change once
//! the host has committed the consumer's re-render.
//!
//! This crate re-exports the stable surface of the workspace crates. Enable
//! the `harness` feature for the in-memory store and scripted host.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use cascade::{
//!     ConnectOptions, FnComponent, ImmediateBatch, Listener, ListenerRegistry, Mapper, Merge,
//!     PropsShape, Provider, RenderHost, RenderTarget, StateContainer, StoreHandle, Unsubscribe,
//!     WrapperProps, connect,
//! };
//!
//! struct Counter {
//!     value: RefCell<Rc<u32>>,
//!     listeners: ListenerRegistry,
//! }
//!
//! impl StateContainer for Counter {
//!     type State = u32;
//!     type Action = u32;
//!
//!     fn get_state(&self) -> Rc<u32> {
//!         Rc::clone(&self.value.borrow())
//!     }
//!
//!     fn dispatch(&self, by: u32) {
//!         let next = Rc::new(*self.get_state() + by);
//!         *self.value.borrow_mut() = next;
//!         self.listeners.notify();
//!     }
//!
//!     fn subscribe(&self, listener: Listener) -> Unsubscribe {
//!         self.listeners.subscribe(listener)
//!     }
//! }
//!
//! struct RenderNow;
//!
//! impl RenderHost for RenderNow {
//!     fn request_render(&self, target: Rc<dyn RenderTarget>) {
//!         let _ = target.rerender();
//!     }
//! }
//!
//! #[derive(Clone, PartialEq)]
//! struct Count(u32);
//! impl PropsShape for Count {}
//!
//! let store = StoreHandle::new(Counter {
//!     value: RefCell::new(Rc::new(0)),
//!     listeners: ListenerRegistry::new(ImmediateBatch::shared()),
//! });
//! let provider = Provider::new(store.clone(), ImmediateBatch::shared());
//! provider.attach();
//!
//! let label = connect(
//!     Mapper::unary(|n: &u32| Count(*n)),
//!     Mapper::constant(()),
//!     Merge::state_props(),
//!     ConnectOptions::default(),
//! )
//! .wrap(FnComponent::new("Label", |c: &Rc<Count>, _| format!("count: {}", c.0)))?;
//! let instance = label.mount(
//!     WrapperProps::new(()),
//!     Some(&provider.context()),
//!     Rc::new(RenderNow),
//! )?;
//!
//! store.dispatch(2);
//! assert_eq!(*instance.last_output().unwrap(), "count: 2");
//! # Ok::<(), cascade::ConnectError>(())
//! ```

pub use cascade_core::{
    BatchStrategy, Dispatch, ImmediateBatch, Listener, ListenerRegistry, StateContainer,
    StoreHandle, SubscriptionNode, Unsubscribe, WeakSubscriptionNode,
};

pub use cascade_select::{
    MapResult, Mapper, Merge, PropsSelector, PropsShape, SelectError, SelectorFactory,
    SelectorOptions, SelectorPipeline, StageError, StageKind, selector_factory,
};

pub use cascade_connect::{
    Component, Connect, ConnectContext, ConnectError, ConnectOptions, Connected,
    ConnectedInstance, DisplayNameFn, FnComponent, ForwardedRef, InstanceState, Provider,
    RenderHost, RenderTarget, WrapperProps, connect, connect_dispatch,
};

#[cfg(feature = "harness")]
pub use cascade_harness::{MemoryStore, RenderFailure, RenderMode, ScriptedHost};
