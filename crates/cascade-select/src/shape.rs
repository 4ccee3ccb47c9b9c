#![forbid(unsafe_code)]

//! Debug-build shape validation for mapper results.
//!
//! Derived props must be a flat key → value mapping. Struct props satisfy
//! that by construction; implement [`PropsShape`] with the default method to
//! opt in. Map types, `()` and `Rc`/`Box` wrappers are covered here. Scalars,
//! strings and sequences report themselves as not plain, as does `None`.
//!
//! The check only runs with `debug_assertions` and only ever warns.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Shape information for values produced by a mapper.
pub trait PropsShape {
    /// True when the value is a flat key → value mapping.
    fn is_plain(&self) -> bool {
        true
    }
}

impl PropsShape for () {}

impl<K, V, H> PropsShape for HashMap<K, V, H> {}

impl<K, V> PropsShape for BTreeMap<K, V> {}

impl<T: PropsShape + ?Sized> PropsShape for Rc<T> {
    fn is_plain(&self) -> bool {
        (**self).is_plain()
    }
}

impl<T: PropsShape + ?Sized> PropsShape for Box<T> {
    fn is_plain(&self) -> bool {
        (**self).is_plain()
    }
}

impl<T: PropsShape> PropsShape for Option<T> {
    fn is_plain(&self) -> bool {
        self.as_ref().is_some_and(PropsShape::is_plain)
    }
}

impl<T> PropsShape for Vec<T> {
    fn is_plain(&self) -> bool {
        false
    }
}

macro_rules! not_plain {
    ($($ty:ty),* $(,)?) => {
        $(impl PropsShape for $ty {
            fn is_plain(&self) -> bool {
                false
            }
        })*
    };
}

not_plain!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
    &'static str,
);

/// Warn when `value` is not a plain mapping. Compiled out of release builds.
#[cfg(debug_assertions)]
pub(crate) fn verify_plain<T: PropsShape>(value: &T, display_name: &str, method_name: &str) {
    if !value.is_plain() {
        tracing::warn!(
            display_name,
            method_name,
            received = std::any::type_name::<T>(),
            "{method_name}() in {display_name} must return a plain mapping"
        );
    }
}

#[cfg(not(debug_assertions))]
#[inline]
pub(crate) fn verify_plain<T: PropsShape>(_value: &T, _display_name: &str, _method_name: &str) {}
