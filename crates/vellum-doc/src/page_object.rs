//! Content objects on a page.

use std::fmt;
use std::rc::Rc;

use vellum_core::{Disposable, DisposableHandle, PageObjectHandle, Rect, Result};
use vellum_engine::{entry, PageObjectType};

use crate::borrow::PageBorrow;
use crate::font::Font;
use crate::library::Runtime;

/// One content object. Objects belong to the page engine-side, so disposal
/// only returns the page borrow.
pub struct PageObject {
    handle: PageObjectHandle,
    index: usize,
    borrow: Rc<PageBorrow>,
    life: DisposableHandle,
}

impl PageObject {
    pub(crate) fn open(borrow: PageBorrow, index: usize) -> Result<Self> {
        let handle = {
            let page = borrow.page()?;
            let rt = page.runtime();
            let raw = rt.call(|e| e.page_get_object(page.handle().raw(), index as i32));
            PageObjectHandle::from_raw(raw).ok_or_else(|| rt.failure(entry::PAGE_GET_OBJECT))?
        };
        let borrow = Rc::new(borrow);
        let held = Rc::clone(&borrow);
        let life = DisposableHandle::new("page object", move || {
            held.release();
        })
        .with_safety_net();
        Ok(Self {
            handle,
            index,
            borrow,
            life,
        })
    }

    fn runtime(&self) -> Result<&Runtime> {
        self.life.ensure_active()?;
        Ok(self.borrow.page()?.runtime())
    }

    /// Index on the page.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The engine handle.
    pub fn handle(&self) -> PageObjectHandle {
        self.handle
    }

    /// Object type.
    pub fn kind(&self) -> Result<PageObjectType> {
        let rt = self.runtime()?;
        Ok(PageObjectType::from_raw(
            rt.call(|e| e.page_obj_get_type(self.handle.raw())),
        ))
    }

    /// Bounds in page space.
    pub fn bounds(&self) -> Result<Option<Rect>> {
        let rt = self.runtime()?;
        let out = rt.arena().scoped(16)?;
        let base = out.offset();
        let ok = rt.call(|e| {
            e.page_obj_get_bounds(self.handle.raw(), base, base + 4, base + 8, base + 12)
        });
        if !ok {
            return Ok(None);
        }
        Ok(Some(Rect::new(
            out.read_f32(0)?,
            out.read_f32(4)?,
            out.read_f32(8)?,
            out.read_f32(12)?,
        )))
    }

    /// The font of a text object; `None` for every other kind.
    ///
    /// The font takes its own borrow on the page and may outlive this
    /// object.
    pub fn font(&self) -> Result<Option<Font>> {
        let rt = self.runtime()?;
        let raw = rt.call(|e| e.text_obj_get_font(self.handle.raw()));
        if raw == 0 {
            return Ok(None);
        }
        Font::open(self.borrow.share()?, raw).map(Some)
    }
}

impl Disposable for PageObject {
    fn dispose(&self) -> Result<()> {
        self.life.dispose();
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }
}

impl fmt::Debug for PageObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageObject")
            .field("handle", &self.handle)
            .field("index", &self.index)
            .field("state", &self.life.state())
            .finish()
    }
}
