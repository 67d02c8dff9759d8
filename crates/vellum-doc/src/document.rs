//! Documents: the root of the ownership graph.
//!
//! A [`Document`] owns three engine resources, torn down in this order:
//!
//! 1. every tracked page, released natively;
//! 2. the form environment, if one was created, then its info struct;
//! 3. the document handle, then the arena buffer holding the source bytes.
//!
//! Each step runs whatever happened in the previous one, so the source
//! buffer is always freed.
//!
//! Pages are tracked from [`get_page`](Document::get_page) until their
//! native release, not merely until their own disposal. A page disposed
//! while still borrowed therefore stays visible to the document, and
//! [`dispose`](Document::dispose) refuses to run underneath it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, warn};
use vellum_core::{Disposable, DocumentHandle, Error, Lifecycle, PageHandle, Result};
use vellum_engine::entry;

use crate::bookmark::{self, Bookmark};
use crate::form::FormEnvironment;
use crate::library::{EngineAllocation, Runtime};
use crate::marshal;
use crate::page::{Page, PageCore};

/// Info-dictionary keys read by [`Document::metadata_all`].
pub const STANDARD_METADATA_TAGS: [&str; 8] = [
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "Producer",
    "CreationDate",
    "ModDate",
];

pub(crate) struct DocCore {
    pub(crate) rt: Rc<Runtime>,
    pub(crate) handle: DocumentHandle,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) pages: RefCell<IndexMap<u64, Rc<PageCore>>>,
    pub(crate) next_page_id: Cell<u64>,
    pub(crate) form: RefCell<Option<FormEnvironment>>,
    pub(crate) data: RefCell<Option<EngineAllocation>>,
}

impl DocCore {
    /// Drop `id` from the tracked set. Called by a page once its native
    /// resources are gone.
    pub(crate) fn forget_page(&self, id: u64) {
        match self.pages.try_borrow_mut() {
            Ok(mut pages) => {
                pages.shift_remove(&id);
            }
            Err(_) => warn!(document = %self.handle, page_id = id, "page table busy; page not deregistered"),
        }
    }

    fn teardown(&self) {
        if !self.lifecycle.begin_dispose() {
            return;
        }
        let pages: SmallVec<[Rc<PageCore>; 8]> =
            self.pages.borrow_mut().drain(..).map(|(_, page)| page).collect();
        for page in &pages {
            page.force_release();
        }
        let form = self.form.borrow_mut().take();
        if let Some(form) = form {
            form.close(&self.rt);
        }
        self.rt.call(|e| e.close_document(self.handle.raw()));
        let data = self.data.borrow_mut().take();
        match data {
            Some(data) => data.free(),
            None => warn!(document = %self.handle, "source buffer already gone at close"),
        }
        debug!(document = %self.handle, pages = pages.len(), "document closed");
    }

    fn outstanding_borrows(&self) -> (usize, usize) {
        self.pages
            .borrow()
            .values()
            .map(|page| page.borrow_count())
            .filter(|&n| n > 0)
            .fold((0, 0), |(pages, borrows), n| (pages + 1, borrows + n))
    }
}

/// An open document.
///
/// Dropping an undisposed document is the safety net: it behaves like
/// [`force_dispose`](Self::force_dispose).
pub struct Document {
    core: Rc<DocCore>,
}

impl Document {
    pub(crate) fn from_core(core: Rc<DocCore>) -> Self {
        Self { core }
    }

    fn active_runtime(&self) -> Result<&Runtime> {
        self.core.lifecycle.ensure_active()?;
        Ok(&self.core.rt)
    }

    /// The engine handle.
    pub fn handle(&self) -> DocumentHandle {
        self.core.handle
    }

    /// Number of pages.
    pub fn page_count(&self) -> Result<usize> {
        let rt = self.active_runtime()?;
        let count = rt.call(|e| e.get_page_count(self.core.handle.raw()));
        usize::try_from(count).map_err(|_| rt.failure(entry::GET_PAGE_COUNT))
    }

    /// Load page `index`.
    ///
    /// Every call loads a fresh engine page and returns a new, independent
    /// [`Page`]; pages are not cached.
    pub fn get_page(&self, index: usize) -> Result<Page> {
        let count = self.page_count()?;
        if index >= count {
            return Err(Error::PageIndexOutOfRange { index, count });
        }
        let rt = &self.core.rt;
        let doc = self.core.handle.raw();
        let raw = rt.call(|e| e.load_page(doc, index as i32));
        let handle = PageHandle::from_raw(raw).ok_or_else(|| Error::PageLoadFailed {
            index,
            code: rt.last_error(),
        })?;
        let form = self.core.form.borrow().as_ref().map(FormEnvironment::handle);
        if let Some(form) = form {
            rt.call(|e| e.form_on_after_load_page(handle.raw(), form.raw()));
        }

        let id = self.core.next_page_id.get();
        self.core.next_page_id.set(id + 1);
        let core = Rc::new(PageCore::new(
            Rc::clone(rt),
            Rc::downgrade(&self.core),
            id,
            index,
            handle,
            form,
        ));
        self.core.pages.borrow_mut().insert(id, Rc::clone(&core));
        debug!(document = %self.core.handle, page = %handle, index, "page loaded");
        Ok(Page::from_core(core))
    }

    /// One info-dictionary entry, or `None` if it is absent or empty.
    pub fn metadata(&self, tag: &str) -> Result<Option<String>> {
        let rt = self.active_runtime()?;
        let tag = rt.arena().scoped_bytes(&marshal::c_string(tag)?)?;
        let doc = self.core.handle.raw();
        marshal::read_wide(rt, |e, buffer, len| {
            e.get_meta_text(doc, tag.offset(), buffer, len)
        })
    }

    /// Every [`STANDARD_METADATA_TAGS`] entry that is present.
    pub fn metadata_all(&self) -> Result<Vec<(&'static str, String)>> {
        let mut entries = Vec::new();
        for tag in STANDARD_METADATA_TAGS {
            if let Some(value) = self.metadata(tag)? {
                entries.push((tag, value));
            }
        }
        Ok(entries)
    }

    /// The label of page `index`, if it has one.
    pub fn page_label(&self, index: usize) -> Result<Option<String>> {
        let count = self.page_count()?;
        if index >= count {
            return Err(Error::PageIndexOutOfRange { index, count });
        }
        let doc = self.core.handle.raw();
        marshal::read_wide(&self.core.rt, |e, buffer, len| {
            e.get_page_label(doc, index as i32, buffer, len)
        })
    }

    /// File version in the engine's encoding (17 for PDF 1.7).
    pub fn file_version(&self) -> Result<Option<i32>> {
        let rt = self.active_runtime()?;
        let out = rt.arena().scoped(4)?;
        let ok = rt.call(|e| e.get_file_version(self.core.handle.raw(), out.offset()));
        if !ok {
            return Ok(None);
        }
        Ok(Some(out.read_i32(0)?))
    }

    /// Permission bits.
    pub fn permissions(&self) -> Result<u32> {
        let rt = self.active_runtime()?;
        Ok(rt.call(|e| e.get_doc_permissions(self.core.handle.raw())))
    }

    /// The outline tree.
    ///
    /// Fails with [`Error::DepthLimitExceeded`] if it nests deeper than
    /// [`LibraryConfig::max_tree_depth`](crate::LibraryConfig::max_tree_depth).
    pub fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        let rt = self.active_runtime()?;
        bookmark::read_outline(rt, self.core.handle, rt.config().max_tree_depth)
    }

    /// Whether a form environment is attached.
    pub fn has_form(&self) -> bool {
        self.core.form.borrow().is_some()
    }

    /// Pages loaded and not yet natively released.
    pub fn tracked_page_count(&self) -> usize {
        self.core.pages.borrow().len()
    }

    /// Tracked pages with at least one outstanding borrow.
    pub fn borrowed_page_count(&self) -> usize {
        self.core.outstanding_borrows().0
    }

    /// Release every page unconditionally, then the form environment, the
    /// document handle, and the source buffer.
    ///
    /// Borrowers of a page released this way keep their borrow but report
    /// [`DisposedError`](vellum_core::DisposedError) on every further call.
    pub fn force_dispose(&self) {
        self.core.teardown();
    }
}

impl Disposable for Document {
    /// Close the document.
    ///
    /// Fails with [`Error::OutstandingBorrows`], leaving the document open,
    /// if any tracked page is still borrowed. Use
    /// [`force_dispose`](Document::force_dispose) to close regardless.
    fn dispose(&self) -> Result<()> {
        if self.core.lifecycle.is_disposed() {
            return Ok(());
        }
        let (pages, borrows) = self.core.outstanding_borrows();
        if borrows > 0 {
            debug!(document = %self.core.handle, pages, borrows, "dispose refused");
            return Err(Error::OutstandingBorrows { pages, borrows });
        }
        self.core.teardown();
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.core.lifecycle.is_disposed()
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if !self.core.lifecycle.is_disposed() {
            debug!(document = %self.core.handle, "safety net closing undisposed document");
            self.core.teardown();
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("handle", &self.core.handle)
            .field("state", &self.core.lifecycle.state())
            .field("tracked_pages", &self.core.pages.borrow().len())
            .finish()
    }
}

/// Weak link from a page back to its document.
pub(crate) type DocLink = Weak<DocCore>;
