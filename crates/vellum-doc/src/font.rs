//! Fonts referenced by text objects.

use std::fmt;
use std::rc::Rc;

use vellum_core::{Disposable, DisposableHandle, Error, FontHandle, Result};
use vellum_engine::entry;

use crate::borrow::PageBorrow;
use crate::library::Runtime;
use crate::marshal;

/// A font used on a page.
///
/// Fonts are owned by the engine document and never closed individually;
/// a [`Font`] exists to keep its page's text objects alive while it is
/// held. Disposing the page while a font is held defers the page's release
/// until the font is disposed.
pub struct Font {
    handle: FontHandle,
    borrow: Rc<PageBorrow>,
    life: DisposableHandle,
}

impl Font {
    pub(crate) fn open(borrow: PageBorrow, raw: u32) -> Result<Self> {
        let handle = FontHandle::from_raw(raw).ok_or_else(|| Error::InvalidArgument {
            reason: "null font handle".into(),
        })?;
        let borrow = Rc::new(borrow);
        let held = Rc::clone(&borrow);
        let life = DisposableHandle::new("font", move || {
            held.release();
        })
        .with_safety_net();
        Ok(Self {
            handle,
            borrow,
            life,
        })
    }

    fn runtime(&self) -> Result<&Runtime> {
        self.life.ensure_active()?;
        Ok(self.borrow.page()?.runtime())
    }

    /// The engine handle.
    pub fn handle(&self) -> FontHandle {
        self.handle
    }

    /// PostScript base name, e.g. `Helvetica-Bold`.
    pub fn base_name(&self) -> Result<Option<String>> {
        let rt = self.runtime()?;
        let font = self.handle.raw();
        marshal::read_utf8(rt, |e, buffer, len| e.font_get_base_name(font, buffer, len))
    }

    /// Weight (400 normal, 700 bold), if known.
    pub fn weight(&self) -> Result<Option<u32>> {
        let rt = self.runtime()?;
        let weight = rt.call(|e| e.font_get_weight(self.handle.raw()));
        Ok(u32::try_from(weight).ok())
    }

    /// Whether the font program is embedded in the file.
    pub fn is_embedded(&self) -> Result<bool> {
        let rt = self.runtime()?;
        match rt.call(|e| e.font_get_is_embedded(self.handle.raw())) {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(rt.failure(entry::FONT_GET_IS_EMBEDDED)),
        }
    }
}

impl Disposable for Font {
    fn dispose(&self) -> Result<()> {
        self.life.dispose();
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("handle", &self.handle)
            .field("state", &self.life.state())
            .finish()
    }
}
