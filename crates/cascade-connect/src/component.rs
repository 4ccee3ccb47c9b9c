#![forbid(unsafe_code)]

//! Seams to the host: the wrapped component and the render scheduler.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::ConnectError;

/// Opaque handle forwarded to the wrapped component untouched.
pub type ForwardedRef = Rc<dyn Any>;

pub(crate) fn same_ref(a: Option<&ForwardedRef>, b: Option<&ForwardedRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

/// A presentational component: derived props in, output out.
pub trait Component {
    /// Props the component renders from.
    type Props;
    /// Whatever rendering produces.
    type Output;

    /// Name used to build the consumer's display name. Must not be empty.
    fn name(&self) -> &str;

    /// Render `props`.
    fn render(&self, props: &Rc<Self::Props>, forwarded_ref: Option<&ForwardedRef>)
    -> Self::Output;
}

type RenderFn<P, O> = dyn Fn(&Rc<P>, Option<&ForwardedRef>) -> O;

/// A [`Component`] backed by a closure.
pub struct FnComponent<P, O> {
    name: String,
    render: Rc<RenderFn<P, O>>,
}

impl<P, O> Clone for FnComponent<P, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            render: Rc::clone(&self.render),
        }
    }
}

impl<P, O> fmt::Debug for FnComponent<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<P, O> FnComponent<P, O> {
    /// Name a render closure.
    pub fn new(
        name: impl Into<String>,
        render: impl Fn(&Rc<P>, Option<&ForwardedRef>) -> O + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }
}

impl<P, O> Component for FnComponent<P, O> {
    type Props = P;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, props: &Rc<P>, forwarded_ref: Option<&ForwardedRef>) -> O {
        (self.render)(props, forwarded_ref)
    }
}

/// Something the host can re-render.
pub trait RenderTarget {
    /// Display name, for logs.
    fn display_name(&self) -> &str;

    /// Render and commit. A latched selector error is returned here.
    fn rerender(&self) -> Result<(), ConnectError>;
}

/// The host's re-render scheduler.
///
/// A request means "render and commit `target` soon". The host may run it
/// synchronously or queue it; either way, descendants of `target` are only
/// notified once its commit happens.
pub trait RenderHost {
    /// Schedule `target` for a render.
    fn request_render(&self, target: Rc<dyn RenderTarget>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_component_renders_through_closure() {
        let component = FnComponent::new("Label", |props: &Rc<u32>, r: Option<&ForwardedRef>| {
            format!("{props}:{}", r.is_some())
        });
        assert_eq!(component.name(), "Label");
        assert_eq!(component.render(&Rc::new(3), None), "3:false");
    }

    #[test]
    fn refs_compare_by_identity() {
        let a: ForwardedRef = Rc::new(1u8);
        let b: ForwardedRef = Rc::new(1u8);
        assert!(same_ref(Some(&a), Some(&Rc::clone(&a))));
        assert!(!same_ref(Some(&a), Some(&b)));
        assert!(same_ref(None, None));
        assert!(!same_ref(Some(&a), None));
    }
}
