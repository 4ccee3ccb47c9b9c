#![forbid(unsafe_code)]

//! Batching scope wrapped around notification passes.
//!
//! Every [`ListenerRegistry::notify`](crate::ListenerRegistry::notify) pass
//! runs inside [`BatchStrategy::batch`]. The host decides what a scope means:
//! the default [`ImmediateBatch`] just runs the work, while a host that
//! coalesces re-render requests can defer them until the outermost scope
//! exits.
//!
//! The strategy is injected at construction. There is no process-wide hook.

use std::rc::Rc;

/// A unit-of-work executor supplied by the host environment.
///
/// Implementations must run `work` exactly once before returning.
pub trait BatchStrategy {
    /// Execute `work` inside one batching scope.
    fn batch(&self, work: &mut dyn FnMut());
}

/// Runs the work immediately, with no coalescing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateBatch;

impl ImmediateBatch {
    /// Shared handle to the immediate strategy.
    #[must_use]
    pub fn shared() -> Rc<dyn BatchStrategy> {
        Rc::new(Self)
    }
}

impl BatchStrategy for ImmediateBatch {
    fn batch(&self, work: &mut dyn FnMut()) {
        work();
    }
}

impl<B: BatchStrategy + ?Sized> BatchStrategy for Rc<B> {
    fn batch(&self, work: &mut dyn FnMut()) {
        (**self).batch(work);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn immediate_runs_work_once() {
        let runs = Cell::new(0u32);
        ImmediateBatch.batch(&mut || runs.set(runs.get() + 1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn rc_forwards_to_inner() {
        struct Counting(Cell<u32>);
        impl BatchStrategy for Counting {
            fn batch(&self, work: &mut dyn FnMut()) {
                self.0.set(self.0.get() + 1);
                work();
            }
        }

        let strategy = Rc::new(Counting(Cell::new(0)));
        let ran = Cell::new(false);
        strategy.batch(&mut || ran.set(true));
        assert!(ran.get());
        assert_eq!(strategy.0.get(), 1);
    }
}
