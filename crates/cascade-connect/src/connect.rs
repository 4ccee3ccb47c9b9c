#![forbid(unsafe_code)]

//! `connect(...)` and the wrapped component it produces.

use std::fmt;
use std::rc::Rc;

use cascade_core::{Dispatch, StoreHandle};
use cascade_select::{
    Mapper, Merge, PropsShape, SelectorFactory, SelectorOptions, selector_factory,
};
use tracing::debug;

use crate::component::{Component, ForwardedRef, RenderHost};
use crate::context::ConnectContext;
use crate::error::ConnectError;
use crate::instance::ConnectedInstance;
use crate::options::ConnectOptions;

/// Props handed to a connected consumer by its parent.
///
/// `own` is forwarded to the mappers. `store`, `context` and `forwarded_ref`
/// are reserved: they steer the wrapper and never reach the mappers.
pub struct WrapperProps<P, S, A> {
    /// The consumer's own props.
    pub own: Rc<P>,
    /// Store override; takes precedence over every context.
    pub store: Option<StoreHandle<S, A>>,
    /// Context override; takes precedence over options and ambient context.
    pub context: Option<ConnectContext<S, A>>,
    /// Ref passed to the wrapped component (requires `forward_ref`).
    pub forwarded_ref: Option<ForwardedRef>,
}

impl<P, S, A> Clone for WrapperProps<P, S, A> {
    fn clone(&self) -> Self {
        Self {
            own: Rc::clone(&self.own),
            store: self.store.clone(),
            context: self.context.clone(),
            forwarded_ref: self.forwarded_ref.clone(),
        }
    }
}

impl<P: fmt::Debug, S, A> fmt::Debug for WrapperProps<P, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperProps")
            .field("own", &self.own)
            .field("store", &self.store)
            .field("has_context", &self.context.is_some())
            .field("has_forwarded_ref", &self.forwarded_ref.is_some())
            .finish()
    }
}

impl<P, S, A> WrapperProps<P, S, A> {
    /// Own props only.
    pub fn new(own: P) -> Self {
        Self::shared(Rc::new(own))
    }

    /// Own props already behind an `Rc`; its identity is preserved.
    pub fn shared(own: Rc<P>) -> Self {
        Self {
            own,
            store: None,
            context: None,
            forwarded_ref: None,
        }
    }

    /// Read the store from props instead of context.
    #[must_use]
    pub fn with_store(mut self, store: StoreHandle<S, A>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the context.
    #[must_use]
    pub fn with_context(mut self, context: ConnectContext<S, A>) -> Self {
        self.context = Some(context);
        self
    }

    /// Forward a ref to the wrapped component.
    #[must_use]
    pub fn with_forwarded_ref(mut self, forwarded_ref: ForwardedRef) -> Self {
        self.forwarded_ref = Some(forwarded_ref);
        self
    }
}

/// Options resolved once per wrapped component.
pub(crate) struct ConnectConfig<S, A> {
    pub(crate) display_name: Rc<str>,
    pub(crate) handles_state_changes: bool,
    pub(crate) pure: bool,
    pub(crate) forward_ref: bool,
    pub(crate) context: Option<ConnectContext<S, A>>,
    pub(crate) selector_options: SelectorOptions,
}

/// Result of [`connect`]: wraps components.
pub struct Connect<S, A, P, M> {
    factory: SelectorFactory<S, A, P, M>,
    options: ConnectOptions<S, A>,
    handles_state_changes: bool,
}

impl<S, A, P, M> Clone for Connect<S, A, P, M> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            options: self.options.clone(),
            handles_state_changes: self.handles_state_changes,
        }
    }
}

impl<S, A, P, M> fmt::Debug for Connect<S, A, P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connect")
            .field("options", &self.options)
            .field("handles_state_changes", &self.handles_state_changes)
            .finish_non_exhaustive()
    }
}

/// Bind a state mapper, a dispatch mapper and a merge function.
///
/// The consumer subscribes to container changes unless
/// `options.handles_state_changes` says otherwise.
pub fn connect<S, A, P, SP, DP, M>(
    map_state: Mapper<S, P, SP>,
    map_dispatch: Mapper<Dispatch<A>, P, DP>,
    merge: Merge<SP, DP, P, M>,
    options: ConnectOptions<S, A>,
) -> Connect<S, A, P, M>
where
    S: 'static,
    A: 'static,
    P: 'static,
    SP: PartialEq + PropsShape + 'static,
    DP: PartialEq + PropsShape + 'static,
    M: PartialEq + 'static,
{
    let handles_state_changes = options.handles_state_changes.unwrap_or(true);
    Connect {
        factory: selector_factory(map_state, map_dispatch, merge),
        options,
        handles_state_changes,
    }
}

/// Like [`connect`] without a state mapper.
///
/// State props are always `()`, and the consumer does not subscribe to
/// container changes unless `options.handles_state_changes` forces it.
pub fn connect_dispatch<S, A, P, DP, M>(
    map_dispatch: Mapper<Dispatch<A>, P, DP>,
    merge: Merge<(), DP, P, M>,
    options: ConnectOptions<S, A>,
) -> Connect<S, A, P, M>
where
    S: 'static,
    A: 'static,
    P: 'static,
    DP: PartialEq + PropsShape + 'static,
    M: PartialEq + 'static,
{
    let handles_state_changes = options.handles_state_changes.unwrap_or(false);
    Connect {
        factory: selector_factory(Mapper::constant(()), map_dispatch, merge),
        options,
        handles_state_changes,
    }
}

impl<S: 'static, A: 'static, P: 'static, M: 'static> Connect<S, A, P, M> {
    /// Wrap `component` into a connected component.
    ///
    /// Fails with [`ConnectError::InvalidComponent`] when the component has
    /// no name.
    pub fn wrap<C>(&self, component: C) -> Result<Connected<S, A, P, M, C>, ConnectError>
    where
        C: Component<Props = M>,
    {
        let name = component.name();
        if name.is_empty() {
            return Err(ConnectError::InvalidComponent {
                method_name: self.options.method_name,
            });
        }
        let display_name: Rc<str> = Rc::from((self.options.display_name_fn)(name));
        debug!(%display_name, "component wrapped");
        let config = ConnectConfig {
            display_name: Rc::clone(&display_name),
            handles_state_changes: self.handles_state_changes,
            pure: self.options.pure,
            forward_ref: self.options.forward_ref,
            context: self.options.context.clone(),
            selector_options: SelectorOptions::named(&*display_name).with_pure(self.options.pure),
        };
        Ok(Connected {
            component: Rc::new(component),
            factory: self.factory.clone(),
            config: Rc::new(config),
        })
    }
}

/// A component bound to a selector; mount it to get an instance.
pub struct Connected<S, A, P, M, C> {
    component: Rc<C>,
    factory: SelectorFactory<S, A, P, M>,
    config: Rc<ConnectConfig<S, A>>,
}

impl<S, A, P, M, C> Clone for Connected<S, A, P, M, C> {
    fn clone(&self) -> Self {
        Self {
            component: Rc::clone(&self.component),
            factory: self.factory.clone(),
            config: Rc::clone(&self.config),
        }
    }
}

impl<S, A, P, M, C> fmt::Debug for Connected<S, A, P, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("display_name", &self.config.display_name)
            .finish_non_exhaustive()
    }
}

impl<S, A, P, M, C> Connected<S, A, P, M, C>
where
    S: 'static,
    A: 'static,
    P: PartialEq + 'static,
    M: 'static,
    C: Component<Props = M> + 'static,
    C::Output: 'static,
{
    /// `Connect(Name)` unless customized.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    /// The wrapped component.
    #[must_use]
    pub fn component(&self) -> &C {
        &self.component
    }

    /// Mount an instance: resolve its store, compute and render its initial
    /// props, then commit (which attaches it to the subscription tree).
    ///
    /// `ambient` is the context the parent provides, usually a
    /// [`Provider`](crate::Provider) context or an ancestor's
    /// [`child_context`](ConnectedInstance::child_context).
    pub fn mount(
        &self,
        props: WrapperProps<P, S, A>,
        ambient: Option<&ConnectContext<S, A>>,
        host: Rc<dyn RenderHost>,
    ) -> Result<ConnectedInstance<S, A, P, M, C>, ConnectError> {
        ConnectedInstance::mount(
            Rc::clone(&self.component),
            self.factory.clone(),
            Rc::clone(&self.config),
            props,
            ambient,
            host,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::FnComponent;

    fn connector() -> Connect<u32, (), (), u32> {
        connect(
            Mapper::unary(|s: &u32| Count(*s)),
            Mapper::constant(()),
            Merge::new(|sp: &Count, _: &(), _: &()| sp.0),
            ConnectOptions::default(),
        )
    }

    #[derive(Clone, PartialEq)]
    struct Count(u32);
    impl PropsShape for Count {}

    #[test]
    fn display_name_wraps_component_name() {
        let connected = connector()
            .wrap(FnComponent::new("Counter", |p: &Rc<u32>, _| **p))
            .unwrap();
        assert_eq!(connected.display_name(), "Connect(Counter)");
    }

    #[test]
    fn unnamed_component_is_rejected() {
        let err = connector()
            .wrap(FnComponent::new("", |p: &Rc<u32>, _| **p))
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectError::InvalidComponent {
                method_name: "connect"
            }
        ));
    }

    #[test]
    fn handles_state_changes_defaults() {
        assert!(connector().handles_state_changes);
        let dispatch_only: Connect<u32, (), (), ()> = connect_dispatch(
            Mapper::constant(()),
            Merge::state_props(),
            ConnectOptions::default(),
        );
        assert!(!dispatch_only.handles_state_changes);
        let forced: Connect<u32, (), (), ()> = connect_dispatch(
            Mapper::constant(()),
            Merge::state_props(),
            ConnectOptions::default().with_handles_state_changes(true),
        );
        assert!(forced.handles_state_changes);
    }
}
