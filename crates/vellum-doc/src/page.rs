//! Pages and their borrow count.
//!
//! A page is exclusively owned by its document but may be borrowed by any
//! number of dependent views (annotations, page objects, fonts, incremental
//! renders). Native release runs once the page is disposed *and* its
//! borrow count is zero, whichever of the two happens last:
//!
//! ```text
//!   dispose() ──► borrows == 0 ? ──yes──► release native
//!                        │
//!                        no ──► deferred ──► last release() ──► release native
//! ```
//!
//! Native release discards any open incremental render, closes annotation
//! handles still open on the page and the lazily created text index,
//! detaches the page from the form environment, closes the page handle, and
//! only then deregisters the page from its document.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};
use vellum_core::{
    AnnotationHandle, Disposable, DisposedError, Error, FormHandle, Lifecycle, PageHandle, Result,
    Rotation, TextPageHandle,
};
use vellum_engine::entry;

use crate::annotation::Annotation;
use crate::borrow::PageBorrow;
use crate::document::DocLink;
use crate::library::Runtime;
use crate::page_object::PageObject;
use crate::progressive::ProgressiveRender;
use crate::render::{self, RenderOptions, RenderedBitmap};
use crate::text::{self, SearchOptions, TextMatch};

pub(crate) struct PageCore {
    rt: Rc<Runtime>,
    doc: DocLink,
    id: u64,
    index: usize,
    handle: PageHandle,
    form: Option<FormHandle>,
    text: Cell<Option<TextPageHandle>>,
    annotations: RefCell<SmallVec<[AnnotationHandle; 4]>>,
    borrows: Cell<usize>,
    lifecycle: Lifecycle,
    native_released: Cell<bool>,
    rendering: Cell<bool>,
}

impl PageCore {
    pub(crate) fn new(
        rt: Rc<Runtime>,
        doc: DocLink,
        id: u64,
        index: usize,
        handle: PageHandle,
        form: Option<FormHandle>,
    ) -> Self {
        Self {
            rt,
            doc,
            id,
            index,
            handle,
            form,
            text: Cell::new(None),
            annotations: RefCell::new(SmallVec::new()),
            borrows: Cell::new(0),
            lifecycle: Lifecycle::new("page"),
            native_released: Cell::new(false),
            rendering: Cell::new(false),
        }
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub(crate) fn shared_runtime(&self) -> Rc<Runtime> {
        Rc::clone(&self.rt)
    }

    pub(crate) fn handle(&self) -> PageHandle {
        self.handle
    }

    pub(crate) fn borrow_count(&self) -> usize {
        self.borrows.get()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Engine resources are still held. Borrowers check only this; a page
    /// disposed with borrows outstanding is still live for them.
    pub(crate) fn ensure_live(&self) -> std::result::Result<(), DisposedError> {
        if self.native_released.get() {
            return Err(DisposedError { kind: "page" });
        }
        Ok(())
    }

    /// Not disposed and still live.
    pub(crate) fn ensure_active(&self) -> std::result::Result<(), DisposedError> {
        self.lifecycle.ensure_active()?;
        self.ensure_live()
    }

    pub(crate) fn retain(&self) -> Result<()> {
        self.ensure_active()?;
        let count = self.borrows.get() + 1;
        self.borrows.set(count);
        trace!(page = %self.handle, borrows = count, "page retained");
        Ok(())
    }

    /// Retain on behalf of an existing borrower. Unlike [`retain`](Self::retain)
    /// this is allowed on a disposed page whose release is still deferred.
    pub(crate) fn retain_shared(&self) -> Result<()> {
        self.ensure_live()?;
        if self.borrows.get() == 0 {
            self.lifecycle.ensure_active()?;
        }
        let count = self.borrows.get() + 1;
        self.borrows.set(count);
        trace!(page = %self.handle, borrows = count, "page retained by borrower");
        Ok(())
    }

    pub(crate) fn release(&self) -> Result<()> {
        let count = self.borrows.get();
        if count == 0 {
            return Err(Error::BorrowUnderflow {
                page_index: self.index,
            });
        }
        self.borrows.set(count - 1);
        trace!(page = %self.handle, borrows = count - 1, "page released");
        if count == 1 && self.lifecycle.is_disposed() && !self.native_released.get() {
            debug!(page = %self.handle, index = self.index, "deferred page release");
            self.release_native();
        }
        Ok(())
    }

    pub(crate) fn dispose(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let borrows = self.borrows.get();
        if borrows > 0 {
            debug!(page = %self.handle, index = self.index, borrows, "page release deferred");
            return;
        }
        self.release_native();
    }

    /// Release regardless of borrows. Used by document teardown.
    pub(crate) fn force_release(&self) {
        self.lifecycle.begin_dispose();
        let borrows = self.borrows.get();
        if borrows > 0 && !self.native_released.get() {
            warn!(page = %self.handle, index = self.index, borrows, "releasing borrowed page");
        }
        self.release_native();
    }

    fn release_native(&self) {
        if self.native_released.replace(true) {
            return;
        }
        let page = self.handle.raw();
        let text = self.text.take();
        let annotations = self.annotations.take();
        let rendering = self.rendering.replace(false);
        if !annotations.is_empty() {
            warn!(page = %self.handle, open = annotations.len(), "closing annotations left open");
        }
        self.rt.call(|e| {
            if rendering {
                e.render_page_close(page);
            }
            for annot in &annotations {
                e.page_close_annot(annot.raw());
            }
            if let Some(text) = text {
                e.text_close_page(text.raw());
            }
            if let Some(form) = self.form {
                e.form_on_before_close_page(page, form.raw());
            }
            e.close_page(page);
        });
        if let Some(doc) = self.doc.upgrade() {
            doc.forget_page(self.id);
        }
        debug!(page = %self.handle, index = self.index, "page closed");
    }

    /// Claim the page's single incremental-render slot.
    pub(crate) fn begin_render(&self) -> Result<()> {
        self.ensure_active()?;
        if self.rendering.get() {
            return Err(Error::InvalidState {
                operation: "start_render",
                state: "an incremental render is open on the page",
            });
        }
        self.rendering.set(true);
        Ok(())
    }

    /// Record an annotation handle so native release can close it.
    pub(crate) fn track_annotation(&self, annot: AnnotationHandle) {
        self.annotations.borrow_mut().push(annot);
    }

    /// Close a tracked annotation handle. Handles already closed by native
    /// release are left alone.
    pub(crate) fn close_annotation(&self, annot: AnnotationHandle) {
        let tracked = {
            let mut open = self.annotations.borrow_mut();
            match open.iter().position(|&h| h == annot) {
                Some(at) => {
                    open.swap_remove(at);
                    true
                }
                None => false,
            }
        };
        if tracked {
            self.rt.call(|e| e.page_close_annot(annot.raw()));
        }
    }

    /// One-shot renders may not interleave with an open incremental render.
    pub(crate) fn ensure_not_rendering(&self) -> Result<()> {
        if self.rendering.get() {
            return Err(Error::InvalidState {
                operation: "render",
                state: "an incremental render is open on the page",
            });
        }
        Ok(())
    }

    /// Discard engine-side render state, if any is still open.
    pub(crate) fn end_render(&self) {
        if self.rendering.replace(false) && !self.native_released.get() {
            self.rt.call(|e| e.render_page_close(self.handle.raw()));
        }
    }

    /// The text index, created on first use.
    pub(crate) fn text_page(&self) -> Result<TextPageHandle> {
        self.ensure_live()?;
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let raw = self.rt.call(|e| e.text_load_page(self.handle.raw()));
        let text = TextPageHandle::from_raw(raw).ok_or_else(|| self.rt.failure(entry::TEXT_LOAD_PAGE))?;
        self.text.set(Some(text));
        trace!(page = %self.handle, text = %text, "text index loaded");
        Ok(text)
    }
}

/// One loaded page.
///
/// Dropping an undisposed page disposes it, so the deferred-release rules
/// apply to both paths.
pub struct Page {
    core: Rc<PageCore>,
}

impl Page {
    pub(crate) fn from_core(core: Rc<PageCore>) -> Self {
        Self { core }
    }

    fn active(&self) -> Result<&PageCore> {
        self.core.ensure_active()?;
        Ok(&self.core)
    }

    /// Zero-based index within the document.
    pub fn index(&self) -> usize {
        self.core.index
    }

    /// The engine handle.
    pub fn handle(&self) -> PageHandle {
        self.core.handle
    }

    /// Width in points.
    pub fn width(&self) -> Result<f32> {
        let page = self.active()?;
        Ok(page.rt.call(|e| e.get_page_width(page.handle.raw())))
    }

    /// Height in points.
    pub fn height(&self) -> Result<f32> {
        let page = self.active()?;
        Ok(page.rt.call(|e| e.get_page_height(page.handle.raw())))
    }

    /// Intrinsic rotation.
    pub fn rotation(&self) -> Result<Rotation> {
        let page = self.active()?;
        let raw = page.rt.call(|e| e.get_page_rotation(page.handle.raw()));
        Rotation::from_raw(raw).ok_or_else(|| page.rt.failure(entry::GET_PAGE_ROTATION))
    }

    /// Outstanding borrows.
    pub fn borrow_count(&self) -> usize {
        self.core.borrows.get()
    }

    /// Whether the page's engine resources have been released.
    pub fn is_released(&self) -> bool {
        self.core.native_released.get()
    }

    /// Take a borrow. Fails once the page is disposed.
    ///
    /// Prefer the views ([`annotation`](Self::annotation),
    /// [`object`](Self::object), [`start_render`](Self::start_render)),
    /// which pair the borrow with its release automatically.
    pub fn retain(&self) -> Result<()> {
        self.core.retain()
    }

    /// Return a borrow taken with [`retain`](Self::retain).
    ///
    /// Valid after disposal: the last release of a disposed page performs
    /// its native release. Releasing more often than retained fails with
    /// [`Error::BorrowUnderflow`].
    pub fn release(&self) -> Result<()> {
        self.core.release()
    }

    // ── Text ────────────────────────────────────────────────────

    /// Characters in the text index.
    pub fn char_count(&self) -> Result<usize> {
        let page = self.active()?;
        text::char_count(page)
    }

    /// All text on the page.
    pub fn text(&self) -> Result<String> {
        let page = self.active()?;
        text::extract(page)
    }

    /// Every match of `query`, in page order.
    pub fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<TextMatch>> {
        let page = self.active()?;
        text::search(page, query, options)
    }

    // ── Borrowed views ──────────────────────────────────────────

    /// Number of annotations.
    pub fn annotation_count(&self) -> Result<usize> {
        let page = self.active()?;
        let count = page.rt.call(|e| e.page_get_annot_count(page.handle.raw()));
        usize::try_from(count).map_err(|_| page.rt.failure(entry::PAGE_GET_ANNOT_COUNT))
    }

    /// Open annotation `index`. The annotation borrows this page.
    pub fn annotation(&self, index: usize) -> Result<Annotation> {
        let count = self.annotation_count()?;
        if index >= count {
            return Err(Error::InvalidArgument {
                reason: format!("annotation index {index} out of range for {count} annotations"),
            });
        }
        Annotation::open(PageBorrow::new(&self.core)?, index)
    }

    /// Number of content objects.
    pub fn object_count(&self) -> Result<usize> {
        let page = self.active()?;
        let count = page.rt.call(|e| e.page_count_objects(page.handle.raw()));
        usize::try_from(count).map_err(|_| page.rt.failure(entry::PAGE_COUNT_OBJECTS))
    }

    /// Content object `index`. The object borrows this page.
    pub fn object(&self, index: usize) -> Result<PageObject> {
        let count = self.object_count()?;
        if index >= count {
            return Err(Error::InvalidArgument {
                reason: format!("object index {index} out of range for {count} objects"),
            });
        }
        PageObject::open(PageBorrow::new(&self.core)?, index)
    }

    // ── Rendering ───────────────────────────────────────────────

    /// Render in one call.
    pub fn render(&self, options: &RenderOptions) -> Result<RenderedBitmap> {
        let page = self.active()?;
        render::render_page(page, options)
    }

    /// Begin an incremental render. The render borrows this page until it
    /// is disposed.
    pub fn start_render(&self, options: &RenderOptions) -> Result<ProgressiveRender> {
        ProgressiveRender::start(&self.core, options)
    }
}

impl Disposable for Page {
    /// Dispose the page. If it is still borrowed, native release waits for
    /// the last borrow to be returned. Idempotent.
    fn dispose(&self) -> Result<()> {
        self.core.dispose();
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if !self.core.is_disposed() {
            trace!(page = %self.core.handle, "dropping undisposed page");
            self.core.dispose();
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.core.index)
            .field("handle", &self.core.handle)
            .field("borrows", &self.core.borrows.get())
            .field("state", &self.core.lifecycle.state())
            .field("native_released", &self.core.native_released.get())
            .finish()
    }
}
