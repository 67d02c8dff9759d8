//! Annotations: borrowed views that also own an engine handle.

use std::fmt;
use std::rc::Rc;

use vellum_core::{AnnotationHandle, Color, Disposable, DisposableHandle, Rect, Result};
use vellum_engine::status::{ANNOT_COLOR_INTERIOR, ANNOT_COLOR_STROKE};
use vellum_engine::{entry, AnnotationSubtype};

use crate::borrow::PageBorrow;
use crate::library::Runtime;

/// One annotation on a page.
///
/// Disposal closes the annotation handle first and returns the page borrow
/// second, so the page can never be closed underneath an open annotation.
/// The page tracks the handle while it is open; if the document force-releases
/// the page, the page closes the handle and disposal does not touch it again.
pub struct Annotation {
    handle: AnnotationHandle,
    index: usize,
    borrow: Rc<PageBorrow>,
    life: DisposableHandle,
}

impl Annotation {
    pub(crate) fn open(borrow: PageBorrow, index: usize) -> Result<Self> {
        let handle = {
            let page = borrow.page()?;
            let rt = page.runtime();
            let raw = rt.call(|e| e.page_get_annot(page.handle().raw(), index as i32));
            let handle = AnnotationHandle::from_raw(raw).ok_or_else(|| rt.failure(entry::PAGE_GET_ANNOT))?;
            page.track_annotation(handle);
            handle
        };
        let borrow = Rc::new(borrow);
        let held = Rc::clone(&borrow);
        let life = DisposableHandle::new("annotation", move || {
            if let Ok(page) = held.page() {
                page.close_annotation(handle);
            }
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
    pub fn handle(&self) -> AnnotationHandle {
        self.handle
    }

    /// Annotation subtype.
    pub fn subtype(&self) -> Result<AnnotationSubtype> {
        let rt = self.runtime()?;
        let raw = rt.call(|e| e.annot_get_subtype(self.handle.raw()));
        Ok(AnnotationSubtype::from_raw(raw))
    }

    /// Bounding rectangle in page space.
    pub fn rect(&self) -> Result<Option<Rect>> {
        let rt = self.runtime()?;
        let out = rt.arena().scoped(16)?;
        if !rt.call(|e| e.annot_get_rect(self.handle.raw(), out.offset())) {
            return Ok(None);
        }
        let left = out.read_f32(0)?;
        let top = out.read_f32(4)?;
        let right = out.read_f32(8)?;
        let bottom = out.read_f32(12)?;
        Ok(Some(Rect::new(left, bottom, right, top)))
    }

    /// Stroke colour, if set.
    pub fn color(&self) -> Result<Option<Color>> {
        self.read_color(ANNOT_COLOR_STROKE)
    }

    /// Interior colour, if set.
    pub fn interior_color(&self) -> Result<Option<Color>> {
        self.read_color(ANNOT_COLOR_INTERIOR)
    }

    fn read_color(&self, color_type: i32) -> Result<Option<Color>> {
        let rt = self.runtime()?;
        let out = rt.arena().scoped(16)?;
        let base = out.offset();
        let ok = rt.call(|e| {
            e.annot_get_color(
                self.handle.raw(),
                color_type,
                base,
                base + 4,
                base + 8,
                base + 12,
            )
        });
        if !ok {
            return Ok(None);
        }
        let channel = |at| -> Result<u8> { Ok(u8::try_from(out.read_u32(at)?).unwrap_or(u8::MAX)) };
        Ok(Some(Color::rgba(
            channel(0)?,
            channel(4)?,
            channel(8)?,
            channel(12)?,
        )))
    }
}

impl Disposable for Annotation {
    fn dispose(&self) -> Result<()> {
        self.life.dispose();
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotation")
            .field("handle", &self.handle)
            .field("index", &self.index)
            .field("state", &self.life.state())
            .finish()
    }
}
