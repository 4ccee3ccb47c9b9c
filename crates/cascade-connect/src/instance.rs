#![forbid(unsafe_code)]

//! One mounted connected consumer.
//!
//! # Lifecycle
//!
//! `Unattached → Attached → TornDown`. Mounting renders once and commits;
//! the first commit attaches the instance's [`SubscriptionNode`] and runs a
//! catch-up check against the latest state.
//!
//! # Update flow
//!
//! 1. Upstream fires; the node runs `check_for_updates`.
//! 2. The selector recomputes with the latest state and the last committed
//!    own props.
//! 3. Same `Rc` as before: nothing to render, so descendants are notified
//!    right away. New props (or an error): latch them and ask the host for a
//!    render.
//! 4. The host renders and commits. The commit notifies descendants.
//!
//! Step 4 is what makes ancestors finish before descendants start.
//!
//! # Failure Modes
//!
//! - **Selector error during a check**: latched and returned by the next
//!   render. A later successful check clears it.
//! - **Unmount with a latched error**: returned by `unmount` so it is not
//!   lost.
//! - **Stale notification**: a handler from a torn-down attachment checks
//!   its flag and returns without touching the instance.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use cascade_core::{ImmediateBatch, StoreHandle, SubscriptionNode};
use cascade_select::{PropsSelector, SelectError, SelectorFactory};
use tracing::{debug, debug_span, trace};

use crate::component::{Component, ForwardedRef, RenderHost, RenderTarget, same_ref};
use crate::connect::{ConnectConfig, WrapperProps};
use crate::context::{ConnectContext, same_context};
use crate::error::ConnectError;

/// Where an instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Built, not yet committed.
    Unattached,
    /// Committed and (if it handles state changes) subscribed.
    Attached,
    /// Unmounted. Terminal.
    TornDown,
}

type SharedSelector<S, P, M> = Rc<RefCell<Box<dyn PropsSelector<S, P, M>>>>;

struct Source<S, A> {
    store: StoreHandle<S, A>,
    store_from_props: bool,
    context: Option<ConnectContext<S, A>>,
}

struct Binding<S, A, P, M> {
    source: Source<S, A>,
    selector: SharedSelector<S, P, M>,
    node: Option<SubscriptionNode<S, A>>,
}

#[derive(Default)]
struct AttachmentFlags {
    did_unsubscribe: Cell<bool>,
    last_thrown: RefCell<Option<SelectError>>,
}

struct Attachment<S, A> {
    node: SubscriptionNode<S, A>,
    flags: Rc<AttachmentFlags>,
}

impl<S: 'static, A: 'static> Attachment<S, A> {
    fn detach(self) -> Option<SelectError> {
        self.flags.did_unsubscribe.set(true);
        self.node.try_unsubscribe();
        self.flags.last_thrown.borrow_mut().take()
    }
}

struct Rendered<M, O> {
    props: Rc<M>,
    forwarded_ref: Option<ForwardedRef>,
    output: Rc<O>,
}

struct Core<S, A, P, M, O> {
    lifecycle: InstanceState,
    own_props: Rc<P>,
    committed_own_props: Rc<P>,
    forwarded_ref: Option<ForwardedRef>,
    props_store: Option<StoreHandle<S, A>>,
    props_context: Option<ConnectContext<S, A>>,
    ambient: Option<ConnectContext<S, A>>,
    binding: Binding<S, A, P, M>,
    needs_attach: bool,
    attachment: Option<Attachment<S, A>>,
    last_child_props: Option<Rc<M>>,
    from_store_update: Option<Rc<M>>,
    latched: Option<SelectError>,
    pending: Option<Rc<M>>,
    rendered: Option<Rendered<M, O>>,
}

struct Inner<S, A, P, M, C: Component<Props = M>> {
    this: Weak<Self>,
    component: Rc<C>,
    factory: SelectorFactory<S, A, P, M>,
    config: Rc<ConnectConfig<S, A>>,
    host: Rc<dyn RenderHost>,
    core: RefCell<Core<S, A, P, M, C::Output>>,
}

fn resolve_source<S: 'static, A: 'static>(
    props_store: Option<&StoreHandle<S, A>>,
    props_context: Option<&ConnectContext<S, A>>,
    config: &ConnectConfig<S, A>,
    ambient: Option<&ConnectContext<S, A>>,
) -> Result<Source<S, A>, ConnectError> {
    let context = props_context
        .or(config.context.as_ref())
        .or(ambient)
        .cloned();
    match (props_store, context) {
        (Some(store), context) => Ok(Source {
            store: store.clone(),
            store_from_props: true,
            context,
        }),
        (None, Some(context)) => Ok(Source {
            store: context.store.clone(),
            store_from_props: false,
            context: Some(context),
        }),
        (None, None) => Err(ConnectError::MissingStore {
            display_name: Rc::clone(&config.display_name),
        }),
    }
}

/// A store from props attaches straight to that store; otherwise the node
/// hangs off the context's subscription.
fn build_node<S: 'static, A: 'static>(
    config: &ConnectConfig<S, A>,
    source: &Source<S, A>,
) -> Option<SubscriptionNode<S, A>> {
    if !config.handles_state_changes {
        return None;
    }
    let parent = if source.store_from_props {
        None
    } else {
        source.context.as_ref().and_then(|c| c.subscription.as_ref())
    };
    let batch = source
        .context
        .as_ref()
        .map_or_else(ImmediateBatch::shared, |c| Rc::clone(&c.batch));
    Some(SubscriptionNode::new(source.store.clone(), parent, batch))
}

fn check_reserved<S, A, P>(
    config: &ConnectConfig<S, A>,
    props: &WrapperProps<P, S, A>,
) -> Result<(), ConnectError> {
    if props.forwarded_ref.is_some() && !config.forward_ref {
        return Err(ConnectError::ReservedProp {
            display_name: Rc::clone(&config.display_name),
            prop: "forwarded_ref",
        });
    }
    Ok(())
}

impl<S, A, P, M, C> Inner<S, A, P, M, C>
where
    S: 'static,
    A: 'static,
    P: PartialEq + 'static,
    M: 'static,
    C: Component<Props = M> + 'static,
    C::Output: 'static,
{
    fn unmounted(&self) -> ConnectError {
        ConnectError::Unmounted {
            display_name: Rc::clone(&self.config.display_name),
        }
    }

    fn schedule(&self) {
        if let Some(target) = self.this.upgrade() {
            self.host.request_render(target);
        }
    }

    fn render(&self) -> Result<Rc<C::Output>, ConnectError> {
        let (selector, store, own, from_update, forwarded_ref) = {
            let core = self.core.borrow();
            if core.lifecycle == InstanceState::TornDown {
                return Err(self.unmounted());
            }
            if let Some(err) = &core.latched {
                return Err(ConnectError::Select(err.clone()));
            }
            // Props from a store update are only valid for the own props
            // they were computed with.
            let from_update = core
                .from_store_update
                .clone()
                .filter(|_| Rc::ptr_eq(&core.own_props, &core.committed_own_props));
            (
                Rc::clone(&core.binding.selector),
                core.binding.source.store.clone(),
                Rc::clone(&core.own_props),
                from_update,
                core.forwarded_ref.clone(),
            )
        };

        let props = match from_update {
            Some(props) => props,
            None => {
                let state = store.get_state();
                let computed = selector.borrow_mut().select(&state, &own);
                computed?
            }
        };

        let reused = {
            let core = self.core.borrow();
            let memo = core.rendered.as_ref().filter(|r| {
                self.config.pure
                    && Rc::ptr_eq(&r.props, &props)
                    && same_ref(r.forwarded_ref.as_ref(), forwarded_ref.as_ref())
            });
            memo.map(|r| Rc::clone(&r.output))
        };
        let output = match reused {
            Some(output) => {
                trace!(display_name = %self.config.display_name, "render output reused");
                output
            }
            None => {
                let output = Rc::new(self.component.render(&props, forwarded_ref.as_ref()));
                self.core.borrow_mut().rendered = Some(Rendered {
                    props: Rc::clone(&props),
                    forwarded_ref,
                    output: Rc::clone(&output),
                });
                output
            }
        };
        self.core.borrow_mut().pending = Some(props);
        Ok(output)
    }

    fn commit(&self) -> Result<(), ConnectError> {
        let (notify, attach) = {
            let mut guard = self.core.borrow_mut();
            let core = &mut *guard;
            if core.lifecycle == InstanceState::TornDown {
                return Err(self.unmounted());
            }
            core.committed_own_props = Rc::clone(&core.own_props);
            if let Some(props) = core.pending.take() {
                core.last_child_props = Some(props);
            }
            let notify = if core.from_store_update.take().is_some() {
                core.binding.node.clone()
            } else {
                None
            };
            (notify, core.needs_attach)
        };
        if let Some(node) = notify {
            node.notify_nested_subs();
        }
        if attach { self.attach() } else { Ok(()) }
    }

    fn attach(&self) -> Result<(), ConnectError> {
        let (previous, node) = {
            let mut guard = self.core.borrow_mut();
            let core = &mut *guard;
            core.lifecycle = InstanceState::Attached;
            core.needs_attach = false;
            (core.attachment.take(), core.binding.node.clone())
        };
        let teardown_error = previous.and_then(|old| {
            debug!(display_name = %self.config.display_name, "resubscribing");
            old.detach()
        });

        if let Some(node) = node {
            let flags = Rc::new(AttachmentFlags::default());
            let weak = Weak::clone(&self.this);
            let handler_flags = Rc::clone(&flags);
            node.set_on_state_change(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.check_for_updates(&handler_flags);
                }
            }));
            self.core.borrow_mut().attachment = Some(Attachment {
                node: node.clone(),
                flags: Rc::clone(&flags),
            });
            node.try_subscribe();
            debug!(display_name = %self.config.display_name, "attached");
            // The state may have moved since the render that led here.
            self.check_for_updates(&flags);
        }

        match teardown_error {
            Some(err) => Err(ConnectError::Select(err)),
            None => Ok(()),
        }
    }

    fn check_for_updates(&self, flags: &AttachmentFlags) {
        if flags.did_unsubscribe.get() {
            return;
        }
        let span = debug_span!("check_for_updates", display_name = %self.config.display_name);
        let _guard = span.enter();

        let (store, selector, own, node) = {
            let core = self.core.borrow();
            (
                core.binding.source.store.clone(),
                Rc::clone(&core.binding.selector),
                Rc::clone(&core.committed_own_props),
                core.binding.node.clone(),
            )
        };
        let latest = store.get_state();
        let result = selector.borrow_mut().select(&latest, &own);

        let changed = {
            let mut guard = self.core.borrow_mut();
            let core = &mut *guard;
            match result {
                Ok(props) => {
                    *flags.last_thrown.borrow_mut() = None;
                    let unchanged = core
                        .last_child_props
                        .as_ref()
                        .is_some_and(|last| Rc::ptr_eq(last, &props));
                    if !unchanged {
                        core.last_child_props = Some(Rc::clone(&props));
                        core.from_store_update = Some(props);
                        core.latched = None;
                    }
                    !unchanged
                }
                Err(err) => {
                    debug!(error = %err, "selector failed; error latched");
                    *flags.last_thrown.borrow_mut() = Some(err.clone());
                    core.last_child_props = None;
                    core.from_store_update = None;
                    core.latched = Some(err);
                    true
                }
            }
        };

        if changed {
            debug!("derived props changed; render requested");
            self.schedule();
        } else {
            trace!("derived props unchanged");
            if let Some(node) = node {
                node.notify_nested_subs();
            }
        }
    }

    /// Swap the subscription source when the resolved store, its origin, or
    /// the context changed. Returns whether anything changed.
    fn rebind(&self, core: &mut Core<S, A, P, M, C::Output>, source: Source<S, A>) -> bool {
        let current = &core.binding.source;
        let store_changed = !source.store.same(&current.store);
        if !store_changed
            && source.store_from_props == current.store_from_props
            && same_context(source.context.as_ref(), current.context.as_ref())
        {
            return false;
        }

        let selector = if store_changed {
            // Anything latched came from the old store's selector.
            core.from_store_update = None;
            core.latched = None;
            Rc::new(RefCell::new(self.factory.create(
                source.store.dispatcher(),
                &self.config.selector_options,
            )))
        } else {
            Rc::clone(&core.binding.selector)
        };
        let node = build_node(&self.config, &source);
        debug!(
            display_name = %self.config.display_name,
            store_changed,
            "subscription source changed; resubscribing on next commit"
        );
        core.binding = Binding {
            source,
            selector,
            node,
        };
        core.needs_attach = true;
        true
    }

    fn set_props(&self, props: WrapperProps<P, S, A>) -> Result<(), ConnectError> {
        check_reserved(&self.config, &props)?;
        let ambient = {
            let core = self.core.borrow();
            if core.lifecycle == InstanceState::TornDown {
                return Err(self.unmounted());
            }
            core.ambient.clone()
        };
        let source = resolve_source(
            props.store.as_ref(),
            props.context.as_ref(),
            &self.config,
            ambient.as_ref(),
        )?;

        let render = {
            let mut guard = self.core.borrow_mut();
            let core = &mut *guard;
            let mut changed = false;
            let equal_props = self.config.pure && *core.own_props == *props.own;
            if !Rc::ptr_eq(&core.own_props, &props.own) && !equal_props {
                core.own_props = props.own;
                changed = true;
            }
            if !same_ref(core.forwarded_ref.as_ref(), props.forwarded_ref.as_ref()) {
                core.forwarded_ref = props.forwarded_ref;
                changed = true;
            }
            core.props_store = props.store;
            core.props_context = props.context;
            changed |= self.rebind(core, source);
            changed || !self.config.pure
        };
        if render {
            self.schedule();
        }
        Ok(())
    }

    fn set_ambient_context(
        &self,
        ambient: Option<ConnectContext<S, A>>,
    ) -> Result<(), ConnectError> {
        let render = {
            let mut guard = self.core.borrow_mut();
            let core = &mut *guard;
            if core.lifecycle == InstanceState::TornDown {
                return Err(self.unmounted());
            }
            let source = resolve_source(
                core.props_store.as_ref(),
                core.props_context.as_ref(),
                &self.config,
                ambient.as_ref(),
            )?;
            core.ambient = ambient;
            self.rebind(core, source)
        };
        if render {
            self.schedule();
        }
        Ok(())
    }

    fn unmount(&self) -> Result<(), ConnectError> {
        let (attachment, node) = {
            let mut guard = self.core.borrow_mut();
            let core = &mut *guard;
            if core.lifecycle == InstanceState::TornDown {
                return Ok(());
            }
            core.lifecycle = InstanceState::TornDown;
            core.pending = None;
            (core.attachment.take(), core.binding.node.clone())
        };
        let error = attachment.and_then(Attachment::detach);
        if let Some(node) = node {
            node.try_unsubscribe();
        }
        debug!(
            display_name = %self.config.display_name,
            surfaced_error = error.is_some(),
            "unmounted"
        );
        match error {
            Some(err) => Err(ConnectError::Select(err)),
            None => Ok(()),
        }
    }
}

impl<S, A, P, M, C> RenderTarget for Inner<S, A, P, M, C>
where
    S: 'static,
    A: 'static,
    P: PartialEq + 'static,
    M: 'static,
    C: Component<Props = M> + 'static,
    C::Output: 'static,
{
    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn rerender(&self) -> Result<(), ConnectError> {
        if self.core.borrow().lifecycle == InstanceState::TornDown {
            trace!(display_name = %self.config.display_name, "stale render request ignored");
            return Ok(());
        }
        self.render()?;
        self.commit()
    }
}

/// A mounted connected consumer.
///
/// Cloning yields another handle to the same instance.
pub struct ConnectedInstance<S, A, P, M, C: Component<Props = M>> {
    inner: Rc<Inner<S, A, P, M, C>>,
}

impl<S, A, P, M, C: Component<Props = M>> Clone for ConnectedInstance<S, A, P, M, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, A, P, M, C: Component<Props = M>> fmt::Debug for ConnectedInstance<S, A, P, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.borrow();
        f.debug_struct("ConnectedInstance")
            .field("display_name", &self.inner.config.display_name)
            .field("state", &core.lifecycle)
            .field("latched_error", &core.latched.is_some())
            .finish_non_exhaustive()
    }
}

impl<S, A, P, M, C> ConnectedInstance<S, A, P, M, C>
where
    S: 'static,
    A: 'static,
    P: PartialEq + 'static,
    M: 'static,
    C: Component<Props = M> + 'static,
    C::Output: 'static,
{
    pub(crate) fn mount(
        component: Rc<C>,
        factory: SelectorFactory<S, A, P, M>,
        config: Rc<ConnectConfig<S, A>>,
        props: WrapperProps<P, S, A>,
        ambient: Option<&ConnectContext<S, A>>,
        host: Rc<dyn RenderHost>,
    ) -> Result<Self, ConnectError> {
        check_reserved(&config, &props)?;
        let source = resolve_source(
            props.store.as_ref(),
            props.context.as_ref(),
            &config,
            ambient,
        )?;
        let selector: SharedSelector<S, P, M> = Rc::new(RefCell::new(
            factory.create(source.store.dispatcher(), &config.selector_options),
        ));
        let node = build_node(&config, &source);
        let core = Core {
            lifecycle: InstanceState::Unattached,
            own_props: Rc::clone(&props.own),
            committed_own_props: props.own,
            forwarded_ref: props.forwarded_ref,
            props_store: props.store,
            props_context: props.context,
            ambient: ambient.cloned(),
            binding: Binding {
                source,
                selector,
                node,
            },
            needs_attach: true,
            attachment: None,
            last_child_props: None,
            from_store_update: None,
            latched: None,
            pending: None,
            rendered: None,
        };
        let inner = Rc::new_cyclic(|this| Inner {
            this: Weak::clone(this),
            component,
            factory,
            config,
            host,
            core: RefCell::new(core),
        });
        debug!(display_name = %inner.config.display_name, "mounting");
        inner.render()?;
        inner.commit()?;
        Ok(Self { inner })
    }

    /// Compute derived props (reusing those from a store update when own
    /// props are unchanged) and render the wrapped component.
    ///
    /// Returns the latched error if the last check failed.
    pub fn render(&self) -> Result<Rc<C::Output>, ConnectError> {
        self.inner.render()
    }

    /// Record what was rendered, notify descendants if the render came from
    /// a store update, and (re)attach if needed.
    ///
    /// Returns an error latched by a previous attachment that is being torn
    /// down for resubscription.
    pub fn commit(&self) -> Result<(), ConnectError> {
        self.inner.commit()
    }

    /// [`render`](Self::render) followed by [`commit`](Self::commit).
    pub fn rerender(&self) -> Result<(), ConnectError> {
        RenderTarget::rerender(&*self.inner)
    }

    /// Replace the wrapper props; asks the host for a render if anything
    /// relevant changed. In pure mode, own props equal to the current ones
    /// are ignored.
    pub fn set_props(&self, props: WrapperProps<P, S, A>) -> Result<(), ConnectError> {
        self.inner.set_props(props)
    }

    /// Replace only the own props.
    pub fn set_own_props(&self, own: P) -> Result<(), ConnectError> {
        let props = {
            let core = self.inner.core.borrow();
            WrapperProps {
                own: Rc::new(own),
                store: core.props_store.clone(),
                context: core.props_context.clone(),
                forwarded_ref: core.forwarded_ref.clone(),
            }
        };
        self.inner.set_props(props)
    }

    /// Replace the context supplied by the parent.
    pub fn set_ambient_context(
        &self,
        ambient: Option<ConnectContext<S, A>>,
    ) -> Result<(), ConnectError> {
        self.inner.set_ambient_context(ambient)
    }

    /// Context to hand to descendants.
    ///
    /// A store taken from props is private to this instance: descendants get
    /// the context this instance itself saw. Otherwise they get that context
    /// with this instance's node as their parent subscription.
    #[must_use]
    pub fn child_context(&self) -> Option<ConnectContext<S, A>> {
        let core = self.inner.core.borrow();
        let source = &core.binding.source;
        if source.store_from_props {
            return source.context.clone();
        }
        source
            .context
            .clone()
            .map(|ctx| ctx.with_subscription(core.binding.node.clone()))
    }

    /// Tear down. Returns an error latched by the last check, if any.
    pub fn unmount(&self) -> Result<(), ConnectError> {
        self.inner.unmount()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> InstanceState {
        self.inner.core.borrow().lifecycle
    }

    /// Derived props from the last commit or check.
    #[must_use]
    pub fn derived_props(&self) -> Option<Rc<M>> {
        self.inner.core.borrow().last_child_props.clone()
    }

    /// Output of the last component render.
    #[must_use]
    pub fn last_output(&self) -> Option<Rc<C::Output>> {
        self.inner
            .core
            .borrow()
            .rendered
            .as_ref()
            .map(|r| Rc::clone(&r.output))
    }

    /// Current own props.
    #[must_use]
    pub fn own_props(&self) -> Rc<P> {
        Rc::clone(&self.inner.core.borrow().own_props)
    }

    /// The node this instance attaches through, if it handles state changes.
    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionNode<S, A>> {
        self.inner.core.borrow().binding.node.clone()
    }

    /// The resolved store.
    #[must_use]
    pub fn store(&self) -> StoreHandle<S, A> {
        self.inner.core.borrow().binding.source.store.clone()
    }

    /// Display name of the connected component.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.inner.config.display_name
    }

    /// This instance as a host render target.
    #[must_use]
    pub fn as_target(&self) -> Rc<dyn RenderTarget> {
        let inner: Rc<Inner<S, A, P, M, C>> = Rc::clone(&self.inner);
        inner
    }
}
