#![forbid(unsafe_code)]

//! User-supplied mapping functions.
//!
//! A [`Mapper`] turns an input (the state snapshot, or the dispatch handle)
//! plus optional own props into props. Rust closures carry no runtime arity,
//! so each constructor records the arity the function was declared with; the
//! arity drives the own-props dependency default:
//!
//! | constructor | arity | depends on own props |
//! |-------------|-------|----------------------|
//! | [`Mapper::unary`] / [`Mapper::try_unary`] | 1 | no |
//! | [`Mapper::binary`] / [`Mapper::try_binary`] | 2 | yes |
//! | [`Mapper::variadic`] | 0 | yes |
//! | [`Mapper::constant`] | - | no (forced) |
//!
//! [`Mapper::depends_on_own_props`] overrides the default and always wins.
//!
//! A mapper may also be a *factory*: on its first call it returns another
//! mapper ([`MapResult::Mapper`]) that replaces it for the rest of the
//! consumer's life. See [`Stage`](crate::Stage).

use std::fmt;
use std::rc::Rc;

use crate::error::StageError;

/// What a mapper produced.
pub enum MapResult<I, P, O> {
    /// Finished props.
    Props(O),
    /// A replacement mapper (factory form).
    Mapper(Mapper<I, P, O>),
}

type MapFn<I, P, O> = dyn Fn(&I, Option<&P>) -> Result<MapResult<I, P, O>, StageError>;

/// A mapping stage: `(input, own_props?) -> props`.
///
/// Own props are passed as `Some` only when the stage depends on them.
pub struct Mapper<I, P, O> {
    func: Rc<MapFn<I, P, O>>,
    arity: usize,
    depends_on_own_props: Option<bool>,
}

impl<I, P, O> Clone for Mapper<I, P, O> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
            arity: self.arity,
            depends_on_own_props: self.depends_on_own_props,
        }
    }
}

impl<I, P, O> fmt::Debug for Mapper<I, P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("arity", &self.arity)
            .field("depends_on_own_props", &self.depends_on_own_props)
            .finish()
    }
}

impl<I: 'static, P: 'static, O: 'static> Mapper<I, P, O> {
    /// Fully general constructor: explicit arity, fallible, may return a
    /// replacement mapper.
    pub fn with_arity(
        arity: usize,
        func: impl Fn(&I, Option<&P>) -> Result<MapResult<I, P, O>, StageError> + 'static,
    ) -> Self {
        Self {
            func: Rc::new(func),
            arity,
            depends_on_own_props: None,
        }
    }

    /// `input -> props`.
    pub fn unary(func: impl Fn(&I) -> O + 'static) -> Self {
        Self::with_arity(1, move |input, _| Ok(MapResult::Props(func(input))))
    }

    /// Fallible `input -> props`.
    pub fn try_unary<E>(func: impl Fn(&I) -> Result<O, E> + 'static) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::with_arity(1, move |input, _| {
            func(input).map(MapResult::Props).map_err(StageError::new)
        })
    }

    /// `(input, own_props) -> props`.
    pub fn binary(func: impl Fn(&I, Option<&P>) -> O + 'static) -> Self {
        Self::with_arity(2, move |input, props| Ok(MapResult::Props(func(input, props))))
    }

    /// Fallible `(input, own_props) -> props`.
    pub fn try_binary<E>(func: impl Fn(&I, Option<&P>) -> Result<O, E> + 'static) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::with_arity(2, move |input, props| {
            func(input, props)
                .map(MapResult::Props)
                .map_err(StageError::new)
        })
    }

    /// A mapper whose arity is not declared; treated as depending on own
    /// props.
    pub fn variadic(func: impl Fn(&I, Option<&P>) -> O + 'static) -> Self {
        Self::with_arity(0, move |input, props| Ok(MapResult::Props(func(input, props))))
    }

    /// Factory taking only the input: its first call builds the real mapper.
    pub fn factory_unary(build: impl Fn(&I) -> Mapper<I, P, O> + 'static) -> Self {
        Self::with_arity(1, move |input, _| Ok(MapResult::Mapper(build(input))))
    }

    /// Factory taking input and own props: its first call builds the real
    /// mapper.
    pub fn factory(build: impl Fn(&I, Option<&P>) -> Mapper<I, P, O> + 'static) -> Self {
        Self::with_arity(2, move |input, props| {
            Ok(MapResult::Mapper(build(input, props)))
        })
    }

    /// Always yields a clone of `value`; never depends on own props.
    pub fn constant(value: O) -> Self
    where
        O: Clone,
    {
        Self::with_arity(1, move |_, _| Ok(MapResult::Props(value.clone())))
            .depends_on_own_props(false)
    }

    /// Override the arity-derived own-props dependency.
    #[must_use]
    pub fn depends_on_own_props(mut self, depends: bool) -> Self {
        self.depends_on_own_props = Some(depends);
        self
    }

    /// Declared arity (0 means variadic).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Resolve the own-props dependency: the override if present, otherwise
    /// `arity != 1`.
    #[must_use]
    pub fn resolve_depends_on_own_props(&self) -> bool {
        self.depends_on_own_props.unwrap_or(self.arity != 1)
    }

    pub(crate) fn invoke(
        &self,
        input: &I,
        own_props: Option<&P>,
    ) -> Result<MapResult<I, P, O>, StageError> {
        (self.func)(input, own_props)
    }
}

type MergeFn<SP, DP, P, M> = dyn Fn(&SP, &DP, &P) -> Result<M, StageError>;

/// The merge stage: `(state_props, dispatch_props, own_props) -> derived`.
pub struct Merge<SP, DP, P, M> {
    func: Rc<MergeFn<SP, DP, P, M>>,
}

impl<SP, DP, P, M> Clone for Merge<SP, DP, P, M> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<SP, DP, P, M> fmt::Debug for Merge<SP, DP, P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Merge").finish_non_exhaustive()
    }
}

impl<SP: 'static, DP: 'static, P: 'static, M: 'static> Merge<SP, DP, P, M> {
    /// Infallible merge.
    pub fn new(func: impl Fn(&SP, &DP, &P) -> M + 'static) -> Self {
        Self {
            func: Rc::new(move |sp, dp, p| Ok(func(sp, dp, p))),
        }
    }

    /// Fallible merge.
    pub fn try_new<E>(func: impl Fn(&SP, &DP, &P) -> Result<M, E> + 'static) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            func: Rc::new(move |sp, dp, p| func(sp, dp, p).map_err(StageError::new)),
        }
    }

    pub(crate) fn call(&self, sp: &SP, dp: &DP, own_props: &P) -> Result<M, StageError> {
        (self.func)(sp, dp, own_props)
    }
}

impl<SP: Clone + 'static, DP: 'static, P: 'static> Merge<SP, DP, P, SP> {
    /// Pass the state props through unchanged.
    #[must_use]
    pub fn state_props() -> Self {
        Self::new(|sp: &SP, _: &DP, _: &P| sp.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props_of(result: MapResult<u32, u32, u32>) -> Option<u32> {
        match result {
            MapResult::Props(p) => Some(p),
            MapResult::Mapper(_) => None,
        }
    }

    #[test]
    fn arity_drives_dependency() {
        assert!(!Mapper::<u32, u32, u32>::unary(|s| *s).resolve_depends_on_own_props());
        assert!(Mapper::<u32, u32, u32>::binary(|s, _| *s).resolve_depends_on_own_props());
        assert!(Mapper::<u32, u32, u32>::variadic(|s, _| *s).resolve_depends_on_own_props());
        assert!(
            Mapper::<u32, u32, u32>::with_arity(3, |s, _| Ok(MapResult::Props(*s)))
                .resolve_depends_on_own_props()
        );
    }

    #[test]
    fn override_wins() {
        let unary = Mapper::<u32, u32, u32>::unary(|s| *s).depends_on_own_props(true);
        assert!(unary.resolve_depends_on_own_props());
        let binary = Mapper::<u32, u32, u32>::binary(|s, _| *s).depends_on_own_props(false);
        assert!(!binary.resolve_depends_on_own_props());
    }

    #[test]
    fn constant_ignores_input() {
        let m = Mapper::<u32, u32, u32>::constant(9);
        assert!(!m.resolve_depends_on_own_props());
        assert_eq!(props_of(m.invoke(&1, None).ok().unwrap()), Some(9));
    }

    #[test]
    fn try_unary_wraps_errors() {
        let m = Mapper::<u32, u32, u32>::try_unary(|s| {
            if *s == 0 {
                Err(std::fmt::Error)
            } else {
                Ok(*s)
            }
        });
        assert!(m.invoke(&0, None).is_err());
        assert_eq!(props_of(m.invoke(&3, None).ok().unwrap()), Some(3));
    }

    #[test]
    fn merge_state_props_passthrough() {
        let merge = Merge::<u32, (), (), u32>::state_props();
        assert_eq!(merge.call(&5, &(), &()).unwrap(), 5);
    }
}
