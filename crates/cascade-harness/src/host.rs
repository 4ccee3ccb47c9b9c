#![forbid(unsafe_code)]

//! A render host whose scheduling is scripted by the test.
//!
//! # Modes
//!
//! - [`RenderMode::Immediate`]: a request renders right away, unless it
//!   arrives inside a batch scope. Requests made inside a scope are queued
//!   and flushed when the outermost scope exits.
//! - [`RenderMode::Deferred`]: requests only queue; the test decides when to
//!   [`flush`](ScriptedHost::flush).
//!
//! A target already waiting in the queue is not queued twice. Requests made
//! while a flush is running are picked up by that same flush, so the render
//! log reads in the order commits actually happened.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use cascade_connect::{ConnectError, RenderHost, RenderTarget};
use cascade_core::BatchStrategy;
use tracing::trace;

/// When requested renders run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Render on request, or at the end of the enclosing batch.
    #[default]
    Immediate,
    /// Render only on [`ScriptedHost::flush`].
    Deferred,
}

/// A failed render, as seen by the host.
#[derive(Debug, Clone)]
pub struct RenderFailure {
    /// Display name of the target.
    pub display_name: String,
    /// What the render returned.
    pub error: ConnectError,
}

/// Scripted [`RenderHost`] and [`BatchStrategy`].
#[derive(Default)]
pub struct ScriptedHost {
    mode: Cell<RenderMode>,
    depth: Cell<usize>,
    flushing: Cell<bool>,
    queue: RefCell<VecDeque<Rc<dyn RenderTarget>>>,
    requests: RefCell<Vec<String>>,
    renders: RefCell<Vec<String>>,
    failures: RefCell<Vec<RenderFailure>>,
}

impl fmt::Debug for ScriptedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedHost")
            .field("mode", &self.mode.get())
            .field("depth", &self.depth.get())
            .field("queued", &self.queue.borrow().len())
            .field("renders", &self.renders.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedHost {
    /// A shared host in `mode`.
    #[must_use]
    pub fn new(mode: RenderMode) -> Rc<Self> {
        let host = Self::default();
        host.mode.set(mode);
        Rc::new(host)
    }

    /// This host as a render scheduler.
    #[must_use]
    pub fn as_host(self: &Rc<Self>) -> Rc<dyn RenderHost> {
        let host: Rc<Self> = Rc::clone(self);
        host
    }

    /// This host as a batching strategy.
    #[must_use]
    pub fn as_batch(self: &Rc<Self>) -> Rc<dyn BatchStrategy> {
        let host: Rc<Self> = Rc::clone(self);
        host
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> RenderMode {
        self.mode.get()
    }

    /// Switch modes. Switching to immediate outside a batch flushes.
    pub fn set_mode(&self, mode: RenderMode) {
        self.mode.set(mode);
        if mode == RenderMode::Immediate && self.depth.get() == 0 {
            self.flush();
        }
    }

    /// Render every queued target, including those queued while flushing.
    /// Returns how many renders ran.
    pub fn flush(&self) -> usize {
        if self.flushing.replace(true) {
            return 0;
        }
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(target) = next else {
                break;
            };
            let display_name = target.display_name().to_owned();
            trace!(%display_name, "rendering");
            self.renders.borrow_mut().push(display_name.clone());
            if let Err(error) = target.rerender() {
                self.failures.borrow_mut().push(RenderFailure {
                    display_name,
                    error,
                });
            }
            ran += 1;
        }
        self.flushing.set(false);
        ran
    }

    /// Targets waiting for a flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Display names in request order (duplicates included).
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Display names in render order.
    #[must_use]
    pub fn renders(&self) -> Vec<String> {
        self.renders.borrow().clone()
    }

    /// Drain recorded render failures.
    pub fn take_failures(&self) -> Vec<RenderFailure> {
        std::mem::take(&mut *self.failures.borrow_mut())
    }

    /// Forget recorded requests and renders.
    pub fn clear_log(&self) {
        self.requests.borrow_mut().clear();
        self.renders.borrow_mut().clear();
    }

    fn is_queued(&self, target: &Rc<dyn RenderTarget>) -> bool {
        self.queue
            .borrow()
            .iter()
            .any(|queued| std::ptr::addr_eq(Rc::as_ptr(queued), Rc::as_ptr(target)))
    }
}

impl RenderHost for ScriptedHost {
    fn request_render(&self, target: Rc<dyn RenderTarget>) {
        self.requests
            .borrow_mut()
            .push(target.display_name().to_owned());
        if self.is_queued(&target) {
            trace!(display_name = target.display_name(), "render request coalesced");
        } else {
            self.queue.borrow_mut().push_back(target);
        }
        if self.mode.get() == RenderMode::Immediate && self.depth.get() == 0 {
            self.flush();
        }
    }
}

impl BatchStrategy for ScriptedHost {
    fn batch(&self, work: &mut dyn FnMut()) {
        self.depth.set(self.depth.get() + 1);
        work();
        let depth = self.depth.get() - 1;
        self.depth.set(depth);
        if depth == 0 && self.mode.get() == RenderMode::Immediate {
            self.flush();
        }
    }
}
