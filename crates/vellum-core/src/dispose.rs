//! Two-state lifecycle primitives shared by every handle wrapper.
//!
//! A handle is created [`Active`](LifecycleState::Active) and moves to
//! [`Disposed`](LifecycleState::Disposed) exactly once. Explicit disposal
//! is the primary path and is idempotent. Dropping an undisposed handle is
//! the safety net: it reclaims engine resources that would otherwise leak,
//! but nothing may rely on *when* it happens. Both paths consult the same
//! state flag, so whichever runs first wins and the other is a no-op.
//!
//! Two building blocks are provided:
//!
//! - [`Lifecycle`] is the bare state flag, embedded by richer objects
//!   (documents, pages, render contexts) that implement their own ordered
//!   teardown and their own `Drop`.
//! - [`DisposableHandle`] pairs the flag with a teardown closure and an
//!   optional drop-time safety net. It is usable standalone and as the base
//!   of the borrowed views.

use std::cell::{Cell, RefCell};
use std::fmt;

use tracing::{debug, warn};

use crate::error::{DisposedError, Result};

/// The two lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Operations are permitted.
    Active,
    /// Teardown has run (or is running); every operation fails.
    Disposed,
}

/// Explicit, idempotent disposal.
///
/// Implemented by every public handle type. Calling [`dispose`](Self::dispose)
/// more than once is never an error and never frees anything twice.
pub trait Disposable {
    /// Release the engine resources behind this handle.
    fn dispose(&self) -> Result<()>;

    /// Whether [`dispose`](Self::dispose) (or the safety net) has run.
    fn is_disposed(&self) -> bool;
}

/// A single-threaded Active → Disposed flag.
pub struct Lifecycle {
    kind: &'static str,
    state: Cell<LifecycleState>,
}

impl Lifecycle {
    /// A new, active lifecycle for a handle of the given kind.
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Cell::new(LifecycleState::Active),
        }
    }

    /// The handle kind used in error messages.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Whether the handle has left the active state.
    pub fn is_disposed(&self) -> bool {
        self.state.get() == LifecycleState::Disposed
    }

    /// Guard called at the top of every operation.
    pub fn ensure_active(&self) -> std::result::Result<(), DisposedError> {
        match self.state.get() {
            LifecycleState::Active => Ok(()),
            LifecycleState::Disposed => Err(DisposedError { kind: self.kind }),
        }
    }

    /// Flip to disposed.
    ///
    /// Returns `true` only for the call that performed the transition, so the
    /// caller that receives `true` owns teardown.
    pub fn begin_dispose(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.state.set(LifecycleState::Disposed);
        true
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("kind", &self.kind)
            .field("state", &self.state.get())
            .finish()
    }
}

type Teardown = Box<dyn FnOnce()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SafetyNet {
    Unregistered,
    Armed,
    Inert,
}

/// A lifecycle flag plus a teardown closure and an optional safety net.
///
/// Teardown runs at most once: on the first [`dispose`](Self::dispose), or,
/// if the handle is dropped while still active and a safety net was
/// registered, from `Drop`. Without a registered safety net an undisposed
/// drop logs a warning and skips teardown.
pub struct DisposableHandle {
    lifecycle: Lifecycle,
    teardown: RefCell<Option<Teardown>>,
    safety_net: Cell<SafetyNet>,
}

impl DisposableHandle {
    /// A handle whose disposal runs `teardown`.
    pub fn new(kind: &'static str, teardown: impl FnOnce() + 'static) -> Self {
        Self {
            lifecycle: Lifecycle::new(kind),
            teardown: RefCell::new(Some(Box::new(teardown))),
            safety_net: Cell::new(SafetyNet::Unregistered),
        }
    }

    /// A handle with nothing to tear down; only the state flag is tracked.
    pub fn without_teardown(kind: &'static str) -> Self {
        Self {
            lifecycle: Lifecycle::new(kind),
            teardown: RefCell::new(None),
            safety_net: Cell::new(SafetyNet::Unregistered),
        }
    }

    /// Builder-style [`register_safety_net`](Self::register_safety_net).
    pub fn with_safety_net(self) -> Self {
        self.register_safety_net();
        self
    }

    /// Arm the drop-time fallback. No-op once disposed.
    pub fn register_safety_net(&self) {
        if !self.lifecycle.is_disposed() {
            self.safety_net.set(SafetyNet::Armed);
        }
    }

    /// Whether an armed safety net would run if this handle were dropped now.
    pub fn has_armed_safety_net(&self) -> bool {
        self.safety_net.get() == SafetyNet::Armed
    }

    /// Run teardown if still active.
    ///
    /// The state flips before teardown runs, so a re-entrant call from inside
    /// the teardown closure is a no-op. Returns `true` if this call performed
    /// the teardown.
    pub fn dispose(&self) -> bool {
        if !self.lifecycle.begin_dispose() {
            return false;
        }
        if self.safety_net.get() == SafetyNet::Armed {
            self.safety_net.set(SafetyNet::Inert);
        }
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
        debug!(kind = self.lifecycle.kind(), "disposed");
        true
    }

    /// Guard called at the top of every operation.
    pub fn ensure_active(&self) -> std::result::Result<(), DisposedError> {
        self.lifecycle.ensure_active()
    }

    /// Whether teardown has run.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// The handle kind used in error messages.
    pub fn kind(&self) -> &'static str {
        self.lifecycle.kind()
    }
}

impl Drop for DisposableHandle {
    fn drop(&mut self) {
        if self.lifecycle.is_disposed() {
            return;
        }
        match self.safety_net.get() {
            SafetyNet::Armed => {
                self.lifecycle.begin_dispose();
                self.safety_net.set(SafetyNet::Inert);
                if let Some(teardown) = self.teardown.get_mut().take() {
                    teardown();
                }
                debug!(
                    kind = self.lifecycle.kind(),
                    "safety net reclaimed undisposed handle"
                );
            }
            SafetyNet::Unregistered | SafetyNet::Inert => {
                warn!(
                    kind = self.lifecycle.kind(),
                    "handle dropped without dispose and without a safety net"
                );
            }
        }
    }
}

impl fmt::Debug for DisposableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableHandle")
            .field("kind", &self.lifecycle.kind())
            .field("state", &self.lifecycle.state())
            .field("safety_net", &self.safety_net.get())
            .finish()
    }
}
