//! A counted, non-owning hold on a page.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::warn;
use vellum_core::{DisposedError, Result};

use crate::page::PageCore;

/// Retains its page on creation and releases it exactly once, on
/// [`release`](Self::release) or drop.
///
/// A borrow keeps the page's bookkeeping alive, not its engine resources:
/// if the document force-releases the page, [`page`](Self::page) starts
/// failing with [`DisposedError`].
pub(crate) struct PageBorrow {
    page: Rc<PageCore>,
    released: Cell<bool>,
}

impl PageBorrow {
    pub(crate) fn new(page: &Rc<PageCore>) -> Result<Self> {
        page.retain()?;
        Ok(Self {
            page: Rc::clone(page),
            released: Cell::new(false),
        })
    }

    /// A second, independent borrow of the same page.
    pub(crate) fn share(&self) -> Result<Self> {
        self.page()?;
        self.page.retain_shared()?;
        Ok(Self {
            page: Rc::clone(&self.page),
            released: Cell::new(false),
        })
    }

    /// The borrowed page, if its engine resources are still held.
    pub(crate) fn page(&self) -> std::result::Result<&PageCore, DisposedError> {
        if self.released.get() {
            return Err(DisposedError { kind: "page borrow" });
        }
        self.page.ensure_live()?;
        Ok(&self.page)
    }

    /// Return the borrow. Returns `false` if it was already returned.
    pub(crate) fn release(&self) -> bool {
        if self.released.replace(true) {
            return false;
        }
        if let Err(err) = self.page.release() {
            warn!(page = %self.page.handle(), %err, "page borrow release failed");
        }
        true
    }
}

impl Drop for PageBorrow {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PageBorrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBorrow")
            .field("page", &self.page.handle())
            .field("released", &self.released.get())
            .finish()
    }
}
