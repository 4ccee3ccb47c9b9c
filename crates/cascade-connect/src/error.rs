#![forbid(unsafe_code)]

//! Errors surfaced by connected consumers.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use cascade_select::SelectError;

/// Failure while wrapping, mounting, rendering or tearing down a consumer.
#[derive(Debug, Clone)]
pub enum ConnectError {
    /// Neither the wrapper props nor any context supplied a store.
    MissingStore {
        /// Display name of the consumer.
        display_name: Rc<str>,
    },
    /// The component passed to `wrap` has no name.
    InvalidComponent {
        /// Name of the entry point that received it.
        method_name: &'static str,
    },
    /// A reserved wrapper prop was supplied while its option is disabled.
    ReservedProp {
        /// Display name of the consumer.
        display_name: Rc<str>,
        /// The reserved prop.
        prop: &'static str,
    },
    /// The instance was already unmounted.
    Unmounted {
        /// Display name of the consumer.
        display_name: Rc<str>,
    },
    /// A selector stage failed.
    Select(SelectError),
}

impl ConnectError {
    /// The selector error, if this is one.
    #[must_use]
    pub fn as_select(&self) -> Option<&SelectError> {
        match self {
            Self::Select(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStore { display_name } => write!(
                f,
                "could not find \"store\" for \"{display_name}\": either mount it under a \
                 Provider context or pass a store in its wrapper props"
            ),
            Self::InvalidComponent { method_name } => write!(
                f,
                "the component passed to the function returned by {method_name} must have a name"
            ),
            Self::ReservedProp { display_name, prop } => write!(
                f,
                "\"{prop}\" was passed to {display_name}, which was connected without forward_ref"
            ),
            Self::Unmounted { display_name } => write!(f, "{display_name} is already unmounted"),
            Self::Select(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl Error for ConnectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Select(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SelectError> for ConnectError {
    fn from(err: SelectError) -> Self {
        Self::Select(err)
    }
}
