#![forbid(unsafe_code)]

//! Selector pipeline: derive a consumer's props from state, dispatch and
//! own props.
//!
//! # Role in Cascade
//! Each connected consumer owns one selector built by a [`SelectorFactory`].
//! The selector turns `(state, own_props)` into an `Rc` of derived props and
//! keeps returning the *same* `Rc` until something relevant changes, so the
//! consumer can skip rendering by pointer comparison alone.
//!
//! # Stages
//! - [`Mapper`] for state and for dispatch, each wrapped in a [`Stage`] that
//!   detects factory mappers on first call.
//! - [`Merge`] combining both results with own props.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use cascade_core::Dispatch;
//! use cascade_select::{Mapper, Merge, PropsShape, SelectorOptions, SelectorPipeline};
//!
//! #[derive(Clone, PartialEq)]
//! struct Count(u32);
//! impl PropsShape for Count {}
//!
//! let mut selector: SelectorPipeline<u32, (), (), Count, (), Count> = SelectorPipeline::new(
//!     Mapper::unary(|state: &u32| Count(*state)),
//!     Mapper::constant(()),
//!     Merge::state_props(),
//!     Dispatch::new(|_: ()| {}),
//!     &SelectorOptions::named("Connect(Counter)"),
//! );
//! let state = Rc::new(3);
//! let own = Rc::new(());
//! let first = selector.compute(&state, &own).unwrap();
//! let again = selector.compute(&state, &own).unwrap();
//! assert!(Rc::ptr_eq(&first, &again));
//! ```

pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod shape;
pub mod stage;

pub use error::{SelectError, StageError, StageKind};
pub use mapper::{MapResult, Mapper, Merge};
pub use pipeline::{
    PropsSelector, SelectorFactory, SelectorOptions, SelectorPipeline, selector_factory,
};
pub use shape::PropsShape;
pub use stage::{Stage, StageLabel};
