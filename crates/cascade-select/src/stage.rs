#![forbid(unsafe_code)]

//! Lazy factory detection for mapping stages.
//!
//! A [`Stage`] starts as [`Stage::FactoryPending`]. Its first call resolves
//! it to [`Stage::Direct`]:
//!
//! 1. Resolve the pending mapper's own-props dependency, commit the mapper as
//!    the real stage, and invoke it.
//! 2. If it returned props, done.
//! 3. If it returned another mapper, that mapper replaces it as the real
//!    stage before being invoked; its dependency is resolved from *it*.
//!
//! Resolution is committed before each invocation, so it happens exactly
//! once even when the first call fails: the factory never runs again, and a
//! plain mapper that failed its first call is never promoted to a factory.
//!
//! While pending, the stage reports that it depends on own props, so the
//! first invocation always sees them.

use std::fmt;
use std::rc::Rc;

use crate::error::{NestedFactory, SelectError, StageError, StageKind};
use crate::mapper::{MapResult, Mapper};
use crate::shape::{PropsShape, verify_plain};

/// Diagnostic identity of a stage.
#[derive(Debug, Clone)]
pub struct StageLabel {
    /// Which stage this is.
    pub kind: StageKind,
    /// Display name of the owning consumer.
    pub display_name: Rc<str>,
}

impl StageLabel {
    /// Attach this label to a stage error.
    #[must_use]
    pub fn error(&self, source: StageError) -> SelectError {
        SelectError {
            stage: self.kind,
            display_name: Rc::clone(&self.display_name),
            source,
        }
    }
}

/// A mapping stage, resolved on first call.
pub enum Stage<I, P, O> {
    /// Not yet called; the mapper may turn out to be a factory.
    FactoryPending(Mapper<I, P, O>),
    /// The real mapper and its resolved own-props dependency.
    Direct {
        /// The mapper invoked on every call.
        mapper: Mapper<I, P, O>,
        /// Whether own props are passed and trigger re-invocation.
        depends_on_own_props: bool,
    },
}

impl<I, P, O> fmt::Debug for Stage<I, P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FactoryPending(mapper) => f.debug_tuple("FactoryPending").field(mapper).finish(),
            Self::Direct {
                mapper,
                depends_on_own_props,
            } => f
                .debug_struct("Direct")
                .field("mapper", mapper)
                .field("depends_on_own_props", depends_on_own_props)
                .finish(),
        }
    }
}

impl<I: 'static, P: 'static, O: PropsShape + 'static> Stage<I, P, O> {
    /// A fresh, unresolved stage.
    #[must_use]
    pub fn new(mapper: Mapper<I, P, O>) -> Self {
        Self::FactoryPending(mapper)
    }

    /// True once the first call has resolved the stage.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }

    /// Whether own props feed this stage. Pending stages report `true`.
    #[must_use]
    pub fn depends_on_own_props(&self) -> bool {
        match self {
            Self::FactoryPending(_) => true,
            Self::Direct {
                depends_on_own_props,
                ..
            } => *depends_on_own_props,
        }
    }

    /// Run the stage, resolving it first if needed.
    pub fn call(&mut self, input: &I, own_props: &P, label: &StageLabel) -> Result<O, SelectError> {
        let pending = match self {
            Self::Direct {
                mapper,
                depends_on_own_props,
            } => {
                return invoke_props(mapper, input, depends_on_own_props.then_some(own_props))
                    .map_err(|e| label.error(e));
            }
            Self::FactoryPending(mapper) => mapper.clone(),
        };

        let depends = pending.resolve_depends_on_own_props();
        *self = Self::Direct {
            mapper: pending.clone(),
            depends_on_own_props: depends,
        };
        let props = match pending
            .invoke(input, depends.then_some(own_props))
            .map_err(|e| label.error(e))?
        {
            MapResult::Props(props) => props,
            MapResult::Mapper(real) => {
                let depends = real.resolve_depends_on_own_props();
                *self = Self::Direct {
                    mapper: real.clone(),
                    depends_on_own_props: depends,
                };
                invoke_props(&real, input, depends.then_some(own_props))
                    .map_err(|e| label.error(e))?
            }
        };
        verify_plain(&props, &label.display_name, label.kind.method_name());
        Ok(props)
    }
}

fn invoke_props<I: 'static, P: 'static, O: 'static>(
    mapper: &Mapper<I, P, O>,
    input: &I,
    own_props: Option<&P>,
) -> Result<O, StageError> {
    match mapper.invoke(input, own_props)? {
        MapResult::Props(props) => Ok(props),
        MapResult::Mapper(_) => Err(StageError::new(NestedFactory)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    struct Out(u32);
    impl PropsShape for Out {}

    fn label() -> StageLabel {
        StageLabel {
            kind: StageKind::MapState,
            display_name: Rc::from("Connect(Test)"),
        }
    }

    #[test]
    fn plain_mapper_resolves_to_itself() {
        let mut stage = Stage::new(Mapper::<u32, u32, Out>::unary(|s| Out(*s * 2)));
        assert!(!stage.is_resolved());
        assert!(stage.depends_on_own_props(), "pending stages see own props");

        assert_eq!(stage.call(&4, &0, &label()).unwrap(), Out(8));
        assert!(stage.is_resolved());
        assert!(!stage.depends_on_own_props());
    }

    #[test]
    fn factory_runs_once_then_delegates() {
        let factory_runs = Rc::new(Cell::new(0u32));
        let runs = Rc::clone(&factory_runs);
        let mut stage = Stage::new(Mapper::<u32, u32, Out>::factory_unary(move |initial| {
            runs.set(runs.get() + 1);
            let offset = *initial;
            Mapper::binary(move |s: &u32, p: Option<&u32>| {
                Out(*s + offset + p.copied().unwrap_or(0))
            })
        }));

        assert_eq!(stage.call(&10, &1, &label()).unwrap(), Out(21));
        assert_eq!(stage.call(&5, &2, &label()).unwrap(), Out(17));
        assert_eq!(stage.call(&0, &0, &label()).unwrap(), Out(10));
        assert_eq!(factory_runs.get(), 1);
        assert!(stage.depends_on_own_props(), "dependency taken from the real mapper");
    }

    #[test]
    fn factory_dependency_comes_from_returned_mapper() {
        let mut stage = Stage::new(Mapper::<u32, u32, Out>::factory(|_, _| {
            Mapper::unary(|s: &u32| Out(*s))
        }));
        stage.call(&3, &0, &label()).unwrap();
        assert!(!stage.depends_on_own_props());
    }

    #[test]
    fn own_props_withheld_when_not_depended_on() {
        let saw_props = Rc::new(Cell::new(false));
        let saw = Rc::clone(&saw_props);
        let mapper = Mapper::<u32, u32, Out>::binary(move |s, p| {
            saw.set(p.is_some());
            Out(*s)
        })
        .depends_on_own_props(false);
        let mut stage = Stage::new(mapper);

        stage.call(&1, &99, &label()).unwrap();
        assert!(!saw_props.get());
        stage.call(&1, &99, &label()).unwrap();
        assert!(!saw_props.get());
    }

    #[test]
    fn failed_first_call_still_resolves() {
        let calls = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&calls);
        let mut stage = Stage::new(Mapper::<u32, u32, Out>::with_arity(1, move |_, _| {
            c.set(c.get() + 1);
            if c.get() == 1 {
                Err(StageError::msg("not yet"))
            } else {
                Ok(MapResult::Mapper(Mapper::unary(|s: &u32| Out(*s))))
            }
        }));

        let err = stage.call(&1, &0, &label()).unwrap_err();
        assert_eq!(err.stage, StageKind::MapState);
        assert!(stage.is_resolved());
        assert!(!stage.depends_on_own_props());

        let err = stage.call(&1, &0, &label()).unwrap_err();
        assert!(
            err.source.downcast_ref::<NestedFactory>().is_some(),
            "a mapper that failed its first call is not promoted to a factory"
        );
    }

    #[test]
    fn factory_not_rerun_when_real_mapper_fails_first() {
        let factory_runs = Rc::new(Cell::new(0u32));
        let runs = Rc::clone(&factory_runs);
        let mut stage = Stage::new(Mapper::<u32, u32, Out>::factory_unary(move |_| {
            runs.set(runs.get() + 1);
            Mapper::try_unary(|s: &u32| {
                if *s == 0 {
                    Err(StageError::msg("empty"))
                } else {
                    Ok(Out(*s))
                }
            })
        }));

        assert!(stage.call(&0, &0, &label()).is_err());
        assert!(stage.is_resolved());
        assert_eq!(stage.call(&1, &0, &label()).unwrap(), Out(1));
        assert_eq!(stage.call(&2, &0, &label()).unwrap(), Out(2));
        assert_eq!(factory_runs.get(), 1);
    }

    #[test]
    fn factory_returned_after_resolution_is_an_error() {
        let calls = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&calls);
        let mut stage = Stage::new(Mapper::<u32, u32, Out>::with_arity(1, move |s, _| {
            c.set(c.get() + 1);
            if c.get() == 1 {
                Ok(MapResult::Props(Out(*s)))
            } else {
                Ok(MapResult::Mapper(Mapper::unary(|s: &u32| Out(*s))))
            }
        }));

        stage.call(&1, &0, &label()).unwrap();
        let err = stage.call(&2, &0, &label()).unwrap_err();
        assert!(err.source.downcast_ref::<NestedFactory>().is_some());
    }
}
