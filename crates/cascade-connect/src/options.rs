#![forbid(unsafe_code)]

//! Options accepted by [`connect`](crate::connect()).

use std::fmt;
use std::rc::Rc;

use crate::context::ConnectContext;

/// Maps the wrapped component's name to the consumer's display name.
pub type DisplayNameFn = Rc<dyn Fn(&str) -> String>;

/// Configuration for a connected consumer.
///
/// Every field has a default; use the `with_*` builders to override.
pub struct ConnectOptions<S, A> {
    /// Subscribe to container changes. `None` derives it from whether a state
    /// mapper was supplied.
    pub handles_state_changes: Option<bool>,
    /// Memoize selection and rendering (default `true`).
    pub pure: bool,
    /// Accept a `forwarded_ref` wrapper prop and pass it to the component.
    pub forward_ref: bool,
    /// Context to use instead of the ambient one given at mount.
    pub context: Option<ConnectContext<S, A>>,
    /// Display name builder (default `Connect(Name)`).
    pub display_name_fn: DisplayNameFn,
    /// Entry point name used in error messages.
    pub method_name: &'static str,
}

impl<S, A> Clone for ConnectOptions<S, A> {
    fn clone(&self) -> Self {
        Self {
            handles_state_changes: self.handles_state_changes,
            pure: self.pure,
            forward_ref: self.forward_ref,
            context: self.context.clone(),
            display_name_fn: Rc::clone(&self.display_name_fn),
            method_name: self.method_name,
        }
    }
}

impl<S, A> fmt::Debug for ConnectOptions<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("handles_state_changes", &self.handles_state_changes)
            .field("pure", &self.pure)
            .field("forward_ref", &self.forward_ref)
            .field("has_context", &self.context.is_some())
            .field("method_name", &self.method_name)
            .finish_non_exhaustive()
    }
}

impl<S, A> Default for ConnectOptions<S, A> {
    fn default() -> Self {
        Self {
            handles_state_changes: None,
            pure: true,
            forward_ref: false,
            context: None,
            display_name_fn: Rc::new(|name: &str| format!("Connect({name})")),
            method_name: "connect",
        }
    }
}

impl<S, A> ConnectOptions<S, A> {
    /// Force subscribing (or not) to container changes.
    #[must_use]
    pub fn with_handles_state_changes(mut self, handles: bool) -> Self {
        self.handles_state_changes = Some(handles);
        self
    }

    /// Set pure mode.
    #[must_use]
    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Enable or disable ref forwarding.
    #[must_use]
    pub fn with_forward_ref(mut self, forward_ref: bool) -> Self {
        self.forward_ref = forward_ref;
        self
    }

    /// Use `context` instead of the ambient one.
    #[must_use]
    pub fn with_context(mut self, context: ConnectContext<S, A>) -> Self {
        self.context = Some(context);
        self
    }

    /// Customize the display name.
    #[must_use]
    pub fn with_display_name_fn(mut self, f: impl Fn(&str) -> String + 'static) -> Self {
        self.display_name_fn = Rc::new(f);
        self
    }

    /// Set the entry point name used in errors.
    #[must_use]
    pub fn with_method_name(mut self, method_name: &'static str) -> Self {
        self.method_name = method_name;
        self
    }
}
