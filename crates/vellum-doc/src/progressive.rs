//! Incremental rendering as a caller-driven state machine.
//!
//! ```text
//!   start ──► Continuing ──continue_render()──► Continuing
//!     │                         │
//!     │                         ├──► Done    (terminal, result() valid)
//!     │                         └──► Failed  (terminal)
//!     └──► Done  (engine finished in the first step)
//! ```
//!
//! Nothing runs between calls. A caller on an event loop yields between
//! [`ProgressiveRender::continue_render`] calls; a caller that wants to
//! cancel simply stops and disposes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};
use vellum_core::{Disposable, Error, Lifecycle, Result};
use vellum_engine::{entry, RenderStatus};

use crate::borrow::PageBorrow;
use crate::page::PageCore;
use crate::render::{validate_dimensions, RenderOptions, RenderTarget, RenderedBitmap};

/// Where an incremental render stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgressStatus {
    /// More steps are needed.
    Continuing,
    /// The bitmap is complete.
    Done,
    /// The engine gave up. Terminal.
    Failed,
}

impl ProgressStatus {
    /// Whether no further step can be taken.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Continuing)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Continuing => "continuing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One incremental render of one page.
///
/// Owns its bitmap buffer and borrows the page. [`dispose`](Disposable::dispose)
/// is valid in every state: it discards the engine's render state, destroys
/// the bitmap, frees the buffer, and returns the borrow. Dropping an
/// undisposed render does the same.
pub struct ProgressiveRender {
    borrow: PageBorrow,
    target: RefCell<Option<RenderTarget>>,
    status: Cell<ProgressStatus>,
    steps: Cell<u32>,
    life: Lifecycle,
}

impl ProgressiveRender {
    pub(crate) fn start(page: &Rc<PageCore>, options: &RenderOptions) -> Result<Self> {
        page.ensure_active()?;
        let size = validate_dimensions(options.width, options.height, &page.runtime().config().render)?;
        let borrow = PageBorrow::new(page)?;
        let target = RenderTarget::create(page.shared_runtime(), size, options.background)?;
        page.begin_render()?;

        let rt = page.runtime();
        let bitmap = target.bitmap_raw();
        let raw = rt.call(|e| {
            e.render_page_bitmap_start(
                bitmap,
                page.handle().raw(),
                0,
                0,
                size.width as i32,
                size.height as i32,
                options.rotation.raw(),
                options.flags,
            )
        });
        let status = match RenderStatus::from_raw(raw) {
            RenderStatus::ToBeContinued => ProgressStatus::Continuing,
            RenderStatus::Done => ProgressStatus::Done,
            RenderStatus::Ready | RenderStatus::Failed | RenderStatus::Unknown(_) => {
                let err = rt.failure(entry::RENDER_PAGE_BITMAP_START);
                page.end_render();
                debug!(page = %page.handle(), %err, "incremental render refused");
                return Err(err);
            }
        };
        debug!(
            page = %page.handle(),
            width = size.width,
            height = size.height,
            %status,
            "incremental render started"
        );
        Ok(Self {
            borrow,
            target: RefCell::new(Some(target)),
            status: Cell::new(status),
            steps: Cell::new(0),
            life: Lifecycle::new("progressive render"),
        })
    }

    /// Current state.
    pub fn status(&self) -> ProgressStatus {
        self.status.get()
    }

    /// Number of [`continue_render`](Self::continue_render) calls made.
    pub fn steps(&self) -> u32 {
        self.steps.get()
    }

    /// Run one engine step.
    ///
    /// Only valid while [`Continuing`](ProgressStatus::Continuing); any
    /// other state fails with [`Error::InvalidState`].
    pub fn continue_render(&self) -> Result<ProgressStatus> {
        self.life.ensure_active()?;
        let current = self.status.get();
        if current != ProgressStatus::Continuing {
            return Err(Error::InvalidState {
                operation: "continue_render",
                state: current.name(),
            });
        }
        let page = self.borrow.page()?;
        let raw = page
            .runtime()
            .call(|e| e.render_page_continue(page.handle().raw()));
        let step = self.steps.get() + 1;
        self.steps.set(step);
        let next = match RenderStatus::from_raw(raw) {
            RenderStatus::ToBeContinued => ProgressStatus::Continuing,
            RenderStatus::Done => ProgressStatus::Done,
            RenderStatus::Ready | RenderStatus::Failed | RenderStatus::Unknown(_) => ProgressStatus::Failed,
        };
        self.status.set(next);
        if next.is_terminal() {
            debug!(page = %page.handle(), steps = step, status = %next, "incremental render finished");
        } else {
            trace!(page = %page.handle(), step, "incremental render step");
        }
        Ok(next)
    }

    /// Step until a terminal state and return it.
    pub fn run_to_completion(&self) -> Result<ProgressStatus> {
        while self.status.get() == ProgressStatus::Continuing {
            self.continue_render()?;
        }
        Ok(self.status.get())
    }

    /// The finished bitmap, RGBA.
    ///
    /// Only valid once [`Done`](ProgressStatus::Done); any other state
    /// fails with [`Error::InvalidState`].
    pub fn result(&self) -> Result<RenderedBitmap> {
        self.life.ensure_active()?;
        let current = self.status.get();
        if current != ProgressStatus::Done {
            return Err(Error::InvalidState {
                operation: "result",
                state: current.name(),
            });
        }
        match self.target.borrow().as_ref() {
            Some(target) => target.pixels(),
            None => Err(Error::disposed("progressive render")),
        }
    }

    fn teardown(&self) {
        if let Ok(page) = self.borrow.page() {
            page.end_render();
        }
        let target = self.target.borrow_mut().take();
        drop(target);
        self.borrow.release();
        trace!(status = %self.status.get(), steps = self.steps.get(), "incremental render disposed");
    }
}

impl Disposable for ProgressiveRender {
    fn dispose(&self) -> Result<()> {
        if self.life.begin_dispose() {
            self.teardown();
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }
}

impl Drop for ProgressiveRender {
    fn drop(&mut self) {
        if self.life.begin_dispose() {
            debug!(status = %self.status.get(), "safety net disposing incremental render");
            self.teardown();
        }
    }
}

impl fmt::Debug for ProgressiveRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.target.borrow().as_ref().map(RenderTarget::size);
        f.debug_struct("ProgressiveRender")
            .field("status", &self.status.get())
            .field("steps", &self.steps.get())
            .field("size", &size)
            .field("state", &self.life.state())
            .finish()
    }
}
