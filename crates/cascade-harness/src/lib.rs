#![forbid(unsafe_code)]

//! Test doubles for driving Cascade trees end to end.
//!
//! - [`MemoryStore`]: a reducer-driven [`StateContainer`](cascade_core::StateContainer).
//! - [`ScriptedHost`]: a [`RenderHost`](cascade_connect::RenderHost) and
//!   [`BatchStrategy`](cascade_core::BatchStrategy) that records every
//!   request, render and failure, with immediate or deferred scheduling.

pub mod host;
pub mod store;

pub use host::{RenderFailure, RenderMode, ScriptedHost};
pub use store::MemoryStore;
