#![forbid(unsafe_code)]

//! The three-stage derived-props selector.
//!
//! # Design
//!
//! [`SelectorPipeline`] combines a state mapper, a dispatch mapper and a merge
//! function into one function `(state, own_props) -> Rc<derived>`. Inputs are
//! compared by pointer identity ([`Rc::ptr_eq`]); the returned `Rc` is the
//! identity downstream consumers use to skip re-rendering.
//!
//! # Pure mode
//!
//! | change since last call | state mapper | dispatch mapper | merge |
//! |------------------------|--------------|-----------------|-------|
//! | nothing | - | - | - (same `Rc`) |
//! | state only | always | - | if state props changed (`PartialEq`) |
//! | own props only | if it depends on own props | if it depends on own props | always |
//! | both | always | if it depends on own props | always |
//!
//! A merged value equal to the previous one keeps the previous `Rc`.
//!
//! # Impure mode
//!
//! Every call runs all three stages and returns a fresh `Rc`.
//!
//! # Failure Modes
//!
//! - **Stage error**: returned as [`SelectError`]. Memoized inputs are left
//!   untouched, so the next call retries against the last good snapshot.
//! - **Re-entrant select**: a mapper that drives its own consumer's selector
//!   panics on the `RefCell` owning the pipeline. That is a cycle in the
//!   consumer graph, not a recoverable condition.

use std::rc::Rc;

use cascade_core::Dispatch;

use crate::error::{SelectError, StageKind};
use crate::mapper::{Mapper, Merge};
use crate::shape::PropsShape;
use crate::stage::{Stage, StageLabel};

/// Static options for a selector pipeline.
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// Consumer display name used in diagnostics.
    pub display_name: String,
    /// Memoize per input change (default `true`).
    pub pure: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            display_name: "Component".to_owned(),
            pure: true,
        }
    }
}

impl SelectorOptions {
    /// Options with the given display name and defaults elsewhere.
    #[must_use]
    pub fn named(display_name: impl Into<String>) -> Self {
        Self::default().with_display_name(display_name)
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set pure mode.
    #[must_use]
    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }
}

/// Object-safe view of a selector: what a consumer instance owns.
pub trait PropsSelector<S, P, M> {
    /// Compute derived props for `state` and `own_props`.
    fn select(&mut self, state: &Rc<S>, own_props: &Rc<P>) -> Result<Rc<M>, SelectError>;
}

struct Memo<S, P, SP, DP, M> {
    state: Rc<S>,
    own_props: Rc<P>,
    state_props: SP,
    dispatch_props: DP,
    merged: Rc<M>,
}

/// Memoized `(state, own_props) -> derived props` function.
pub struct SelectorPipeline<S, A, P, SP, DP, M> {
    map_state: Stage<S, P, SP>,
    map_dispatch: Stage<Dispatch<A>, P, DP>,
    merge: Merge<SP, DP, P, M>,
    dispatch: Dispatch<A>,
    pure: bool,
    state_label: StageLabel,
    dispatch_label: StageLabel,
    merge_label: StageLabel,
    memo: Option<Memo<S, P, SP, DP, M>>,
}

impl<S, A, P, SP, DP, M> SelectorPipeline<S, A, P, SP, DP, M>
where
    S: 'static,
    A: 'static,
    P: 'static,
    SP: PartialEq + PropsShape + 'static,
    DP: PartialEq + PropsShape + 'static,
    M: PartialEq + 'static,
{
    /// Build a pipeline bound to one container's `dispatch`.
    #[must_use]
    pub fn new(
        map_state: Mapper<S, P, SP>,
        map_dispatch: Mapper<Dispatch<A>, P, DP>,
        merge: Merge<SP, DP, P, M>,
        dispatch: Dispatch<A>,
        options: &SelectorOptions,
    ) -> Self {
        let display_name: Rc<str> = Rc::from(options.display_name.as_str());
        let label = |kind| StageLabel {
            kind,
            display_name: Rc::clone(&display_name),
        };
        Self {
            map_state: Stage::new(map_state),
            map_dispatch: Stage::new(map_dispatch),
            merge,
            dispatch,
            pure: options.pure,
            state_label: label(StageKind::MapState),
            dispatch_label: label(StageKind::MapDispatch),
            merge_label: label(StageKind::Merge),
            memo: None,
        }
    }

    /// Compute derived props.
    ///
    /// In pure mode, returns the previous `Rc` when neither `state` nor
    /// `own_props` changed identity since the last successful call.
    pub fn compute(&mut self, state: &Rc<S>, own_props: &Rc<P>) -> Result<Rc<M>, SelectError> {
        if !self.pure {
            let memo = self.run_all(state, own_props)?;
            let merged = Rc::clone(&memo.merged);
            self.memo = Some(memo);
            return Ok(merged);
        }

        let Some(mut memo) = self.memo.take() else {
            let memo = self.run_all(state, own_props)?;
            let merged = Rc::clone(&memo.merged);
            self.memo = Some(memo);
            return Ok(merged);
        };
        let result = self.advance(&mut memo, state, own_props);
        self.memo = Some(memo);
        result
    }

    /// The dispatch handle this pipeline was bound to.
    #[must_use]
    pub fn dispatch(&self) -> &Dispatch<A> {
        &self.dispatch
    }

    /// Resolved own-props dependency of the state and dispatch stages.
    #[must_use]
    pub fn depends_on_own_props(&self) -> (bool, bool) {
        (
            self.map_state.depends_on_own_props(),
            self.map_dispatch.depends_on_own_props(),
        )
    }

    fn run_all(
        &mut self,
        state: &Rc<S>,
        own_props: &Rc<P>,
    ) -> Result<Memo<S, P, SP, DP, M>, SelectError> {
        let state_props = self.map_state.call(state, own_props, &self.state_label)?;
        let dispatch_props = self
            .map_dispatch
            .call(&self.dispatch, own_props, &self.dispatch_label)?;
        let merged = self
            .merge
            .call(&state_props, &dispatch_props, own_props)
            .map_err(|e| self.merge_label.error(e))?;
        Ok(Memo {
            state: Rc::clone(state),
            own_props: Rc::clone(own_props),
            state_props,
            dispatch_props,
            merged: Rc::new(merged),
        })
    }

    fn advance(
        &mut self,
        memo: &mut Memo<S, P, SP, DP, M>,
        state: &Rc<S>,
        own_props: &Rc<P>,
    ) -> Result<Rc<M>, SelectError> {
        let props_changed = !Rc::ptr_eq(own_props, &memo.own_props);
        let state_changed = !Rc::ptr_eq(state, &memo.state);
        if !props_changed && !state_changed {
            return Ok(Rc::clone(&memo.merged));
        }

        let next_state_props =
            if state_changed || (props_changed && self.map_state.depends_on_own_props()) {
                Some(self.map_state.call(state, own_props, &self.state_label)?)
            } else {
                None
            };
        let next_dispatch_props = if props_changed && self.map_dispatch.depends_on_own_props() {
            Some(
                self.map_dispatch
                    .call(&self.dispatch, own_props, &self.dispatch_label)?,
            )
        } else {
            None
        };

        let state_props_changed = next_state_props
            .as_ref()
            .is_some_and(|next| *next != memo.state_props);
        let merged = if props_changed || state_props_changed {
            let sp = next_state_props.as_ref().unwrap_or(&memo.state_props);
            let dp = next_dispatch_props.as_ref().unwrap_or(&memo.dispatch_props);
            Some(
                self.merge
                    .call(sp, dp, own_props)
                    .map_err(|e| self.merge_label.error(e))?,
            )
        } else {
            None
        };

        memo.state = Rc::clone(state);
        memo.own_props = Rc::clone(own_props);
        if let Some(sp) = next_state_props {
            memo.state_props = sp;
        }
        if let Some(dp) = next_dispatch_props {
            memo.dispatch_props = dp;
        }
        if let Some(merged) = merged
            && merged != *memo.merged
        {
            memo.merged = Rc::new(merged);
        }
        Ok(Rc::clone(&memo.merged))
    }
}

impl<S, A, P, SP, DP, M> PropsSelector<S, P, M> for SelectorPipeline<S, A, P, SP, DP, M>
where
    S: 'static,
    A: 'static,
    P: 'static,
    SP: PartialEq + PropsShape + 'static,
    DP: PartialEq + PropsShape + 'static,
    M: PartialEq + 'static,
{
    fn select(&mut self, state: &Rc<S>, own_props: &Rc<P>) -> Result<Rc<M>, SelectError> {
        self.compute(state, own_props)
    }
}

type BuildFn<S, A, P, M> = dyn Fn(Dispatch<A>, &SelectorOptions) -> Box<dyn PropsSelector<S, P, M>>;

/// Builds one fresh selector per consumer instance (and per store).
///
/// Each build resolves its stages independently, so factory mappers run once
/// per instance.
pub struct SelectorFactory<S, A, P, M> {
    build: Rc<BuildFn<S, A, P, M>>,
}

impl<S, A, P, M> Clone for SelectorFactory<S, A, P, M> {
    fn clone(&self) -> Self {
        Self {
            build: Rc::clone(&self.build),
        }
    }
}

impl<S, A, P, M> std::fmt::Debug for SelectorFactory<S, A, P, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorFactory").finish_non_exhaustive()
    }
}

impl<S: 'static, A: 'static, P: 'static, M: 'static> SelectorFactory<S, A, P, M> {
    /// Build a selector bound to `dispatch`.
    #[must_use]
    pub fn create(
        &self,
        dispatch: Dispatch<A>,
        options: &SelectorOptions,
    ) -> Box<dyn PropsSelector<S, P, M>> {
        (self.build)(dispatch, options)
    }
}

/// Factory for [`SelectorPipeline`]s over the given stages.
#[must_use]
pub fn selector_factory<S, A, P, SP, DP, M>(
    map_state: Mapper<S, P, SP>,
    map_dispatch: Mapper<Dispatch<A>, P, DP>,
    merge: Merge<SP, DP, P, M>,
) -> SelectorFactory<S, A, P, M>
where
    S: 'static,
    A: 'static,
    P: 'static,
    SP: PartialEq + PropsShape + 'static,
    DP: PartialEq + PropsShape + 'static,
    M: PartialEq + 'static,
{
    let build = move |dispatch: Dispatch<A>,
                      options: &SelectorOptions|
          -> Box<dyn PropsSelector<S, P, M>> {
        Box::new(SelectorPipeline::new(
            map_state.clone(),
            map_dispatch.clone(),
            merge.clone(),
            dispatch,
            options,
        ))
    };
    SelectorFactory {
        build: Rc::new(build),
    }
}
