//! Shared inspection handle for a [`FakeEngine`](crate::FakeEngine).
//!
//! The engine itself is moved into a `Library`, so tests keep a
//! [`FakeProbe`] to observe what the layer did to it: call order, handles
//! still open, engine-side mallocs still live, and protocol violations
//! (closing a document with pages open, freeing a buffer the engine still
//! reads, freeing twice). Faults are injected through the probe too.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

/// Pseudo entry name for the engine allocator, usable with
/// [`FakeProbe::fail_next`].
pub const MALLOC: &str = "malloc";

/// Kinds of engine-side objects tracked by the probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Document,
    Page,
    TextPage,
    Search,
    Bitmap,
    Form,
    Annotation,
    PageObject,
    Font,
    Bookmark,
    Dest,
    /// An incremental render open on a page.
    ProgressiveRender,
}

/// One recorded engine call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// Entry-point name.
    pub entry: &'static str,
    /// Primary handle argument, or `0`.
    pub handle: u32,
}

#[derive(Default)]
struct ProbeState {
    calls: Vec<Call>,
    open: IndexMap<ObjectKind, usize>,
    live_mallocs: usize,
    live_malloc_bytes: usize,
    violations: Vec<String>,
    faults: Vec<&'static str>,
    initialized: bool,
    destroyed: bool,
    unlogged: bool,
}

/// Cloneable view of a fake engine's state.
#[derive(Clone, Default)]
pub struct FakeProbe {
    state: Rc<RefCell<ProbeState>>,
}

impl FakeProbe {
    // ── Inspection ──────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Number of calls to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.entry == entry)
            .count()
    }

    /// Handles passed to `entry`, in call order.
    pub fn handles_passed_to(&self, entry: &str) -> Vec<u32> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.entry == entry)
            .map(|c| c.handle)
            .collect()
    }

    /// Position in the call log of the first `entry` call on `handle`.
    pub fn position(&self, entry: &str, handle: u32) -> Option<usize> {
        self.state
            .borrow()
            .calls
            .iter()
            .position(|c| c.entry == entry && c.handle == handle)
    }

    /// Position of the first call to `entry` on any handle.
    pub fn first(&self, entry: &str) -> Option<usize> {
        self.state.borrow().calls.iter().position(|c| c.entry == entry)
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Objects of `kind` currently open engine-side.
    pub fn open(&self, kind: ObjectKind) -> usize {
        self.state.borrow().open.get(&kind).copied().unwrap_or(0)
    }

    /// Total objects open across all kinds.
    pub fn open_total(&self) -> usize {
        self.state.borrow().open.values().sum()
    }

    /// Engine mallocs not yet freed.
    pub fn live_mallocs(&self) -> usize {
        self.state.borrow().live_mallocs
    }

    /// Bytes in engine mallocs not yet freed.
    pub fn live_malloc_bytes(&self) -> usize {
        self.state.borrow().live_malloc_bytes
    }

    /// Protocol violations observed so far.
    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    /// Panic listing every violation, if any.
    pub fn assert_no_violations(&self) {
        let violations = self.violations();
        assert!(
            violations.is_empty(),
            "engine protocol violations:\n  {}",
            violations.join("\n  ")
        );
    }

    /// Panic unless nothing is open, nothing is allocated, and nothing was
    /// violated.
    pub fn assert_released(&self) {
        self.assert_no_violations();
        let state = self.state.borrow();
        let open: Vec<_> = state.open.iter().filter(|(_, n)| **n > 0).collect();
        assert!(open.is_empty(), "engine objects still open: {open:?}");
        assert_eq!(state.live_mallocs, 0, "engine mallocs still live");
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    // ── Fault injection ─────────────────────────────────────────

    /// Make the next call to `entry` return its failure sentinel.
    /// Use [`MALLOC`] to fail the next allocation.
    pub fn fail_next(&self, entry: &'static str) {
        self.state.borrow_mut().faults.push(entry);
    }

    /// Stop keeping the call log. Open-object and malloc accounting
    /// continue. For long-running benchmarks.
    pub fn disable_call_log(&self) {
        let mut state = self.state.borrow_mut();
        state.unlogged = true;
        state.calls.clear();
    }

    // ── Engine-side recording ───────────────────────────────────

    pub(crate) fn record(&self, entry: &'static str, handle: u32) {
        let mut state = self.state.borrow_mut();
        if !state.unlogged {
            state.calls.push(Call { entry, handle });
        }
    }

    pub(crate) fn take_fault(&self, entry: &str) -> bool {
        let mut state = self.state.borrow_mut();
        match state.faults.iter().position(|f| *f == entry) {
            Some(i) => {
                state.faults.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn opened(&self, kind: ObjectKind) {
        *self.state.borrow_mut().open.entry(kind).or_insert(0) += 1;
    }

    pub(crate) fn closed(&self, kind: ObjectKind) {
        let mut state = self.state.borrow_mut();
        let count = state.open.entry(kind).or_insert(0);
        *count = count.saturating_sub(1);
    }

    pub(crate) fn violation(&self, message: String) {
        tracing::warn!(%message, "fake engine protocol violation");
        self.state.borrow_mut().violations.push(message);
    }

    pub(crate) fn malloced(&self, bytes: usize) {
        let mut state = self.state.borrow_mut();
        state.live_mallocs += 1;
        state.live_malloc_bytes += bytes;
    }

    pub(crate) fn freed(&self, bytes: usize) {
        let mut state = self.state.borrow_mut();
        state.live_mallocs = state.live_mallocs.saturating_sub(1);
        state.live_malloc_bytes = state.live_malloc_bytes.saturating_sub(bytes);
    }

    pub(crate) fn set_initialized(&self) {
        self.state.borrow_mut().initialized = true;
    }

    pub(crate) fn set_destroyed(&self) {
        self.state.borrow_mut().destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_call_log_drops_calls() {
        let probe = FakeProbe::default();
        probe.record("FPDF_InitLibrary", 0);
        probe.disable_call_log();
        probe.record("FPDF_LoadPage", 7);
        assert!(probe.calls().is_empty());
        assert_eq!(probe.count("FPDF_LoadPage"), 0);
    }
}
