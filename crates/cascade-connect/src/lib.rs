#![forbid(unsafe_code)]

//! Connect presentational components to a shared state container.
//!
//! # Role in Cascade
//! `cascade-connect` is the orchestration layer. It binds a
//! [`SelectorFactory`](cascade_select::SelectorFactory) and a
//! [`SubscriptionNode`](cascade_core::SubscriptionNode) to each mounted
//! consumer, decides when a consumer must re-render, and defers notifying a
//! consumer's descendants until the host has committed that re-render.
//!
//! # Pieces
//! - [`Provider`]: owns the root node and the root [`ConnectContext`].
//! - [`connect`] / [`connect_dispatch`]: bind mappers; [`Connect::wrap`] binds
//!   a [`Component`].
//! - [`Connected::mount`]: build a [`ConnectedInstance`] under a context.
//! - [`RenderHost`]: the host's re-render scheduler.
//!
//! # Example
//!
//! ```ignore
//! let provider = Provider::new(store, batch);
//! provider.attach();
//! let counter = connect(map_state, map_dispatch, merge, ConnectOptions::default())
//!     .wrap(FnComponent::new("Counter", render_counter))?;
//! let instance = counter.mount(WrapperProps::new(()), Some(&provider.context()), host)?;
//! ```

pub mod component;
pub mod connect;
pub mod context;
pub mod error;
pub mod instance;
pub mod options;
pub mod provider;

#[cfg(test)]
pub(crate) mod test_support;

pub use component::{Component, FnComponent, ForwardedRef, RenderHost, RenderTarget};
pub use connect::{Connect, Connected, WrapperProps, connect, connect_dispatch};
pub use context::ConnectContext;
pub use error::ConnectError;
pub use instance::{ConnectedInstance, InstanceState};
pub use options::{ConnectOptions, DisplayNameFn};
pub use provider::Provider;
