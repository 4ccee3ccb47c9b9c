#![forbid(unsafe_code)]

//! Errors raised by selector stages.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

/// Which of the three stages failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// The state → props mapper.
    MapState,
    /// The dispatch → props mapper.
    MapDispatch,
    /// The merge function.
    Merge,
}

impl StageKind {
    /// Name used in diagnostics.
    #[must_use]
    pub const fn method_name(self) -> &'static str {
        match self {
            Self::MapState => "map_state_to_props",
            Self::MapDispatch => "map_dispatch_to_props",
            Self::Merge => "merge_props",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// A user error raised inside a stage.
///
/// Cheap to clone. Clones share the underlying error, so a latched error can
/// later be matched against the original with [`same`](Self::same).
#[derive(Clone)]
pub struct StageError {
    inner: Rc<dyn Error + 'static>,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

impl StageError {
    /// Wrap any error.
    pub fn new(err: impl Error + 'static) -> Self {
        Self {
            inner: Rc::new(err),
        }
    }

    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// The wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn Error + 'static) {
        &*self.inner
    }

    /// Downcast the wrapped error.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// True when both handles share the same underlying error.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.inner), Rc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StageError").field(&self.inner).finish()
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl Error for StageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }
}

/// A stage failed while computing derived props.
#[derive(Debug, Clone)]
pub struct SelectError {
    /// The failing stage.
    pub stage: StageKind,
    /// Display name of the consumer whose selector failed.
    pub display_name: Rc<str>,
    /// The error raised by the stage.
    pub source: StageError,
}

impl SelectError {
    /// True when both errors carry the same underlying stage error.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        self.stage == other.stage && self.source.same(&other.source)
    }
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed in {}: {}",
            self.stage, self.display_name, self.source
        )
    }
}

impl Error for SelectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Raised when an already-resolved stage returns another mapper.
#[derive(Debug)]
pub(crate) struct NestedFactory;

impl fmt::Display for NestedFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mapper returned another mapper after factory resolution")
    }
}

impl Error for NestedFactory {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn clones_are_same() {
        let err = StageError::new(Boom);
        assert!(err.same(&err.clone()));
        assert!(!err.same(&StageError::new(Boom)));
        assert!(err.downcast_ref::<Boom>().is_some());
    }

    #[test]
    fn select_error_display_names_stage() {
        let err = SelectError {
            stage: StageKind::MapState,
            display_name: Rc::from("Connect(Counter)"),
            source: StageError::msg("bad state"),
        };
        assert_eq!(
            err.to_string(),
            "map_state_to_props failed in Connect(Counter): bad state"
        );
        assert!(Error::source(&err).is_some());
    }
}
