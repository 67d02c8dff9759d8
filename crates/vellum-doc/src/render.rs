//! Render requests, bitmap buffers, and the channel swap.
//!
//! Every render goes through three stages:
//!
//! 1. [`validate_dimensions`] rejects the request before anything is
//!    allocated.
//! 2. A [`RenderTarget`] allocates `width * 4 * height` bytes in the arena,
//!    wraps them as a BGRA bitmap with stride `width * 4`, and fills the
//!    background.
//! 3. After the engine has drawn, the bytes are copied out and converted
//!    from the engine's BGRA to RGBA with [`bgra_to_rgba`].
//!
//! The target destroys the bitmap before freeing its buffer, on every path.

use std::fmt;
use std::rc::Rc;

use tracing::trace;
use vellum_core::{BitmapHandle, Color, DimensionError, RenderLimits, Result, Rotation};
use vellum_engine::status::render_flags;
use vellum_engine::{entry, BitmapFormat};

use crate::library::{EngineAllocation, Runtime};
use crate::page::{Page, PageCore};

/// Bytes per pixel of every bitmap this layer creates.
pub const BYTES_PER_PIXEL: u32 = 4;

/// What to render and how.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    /// Output width in device pixels. Rounded to the nearest whole pixel.
    pub width: f64,
    /// Output height in device pixels. Rounded to the nearest whole pixel.
    pub height: f64,
    /// Rotation applied on top of the page's own.
    pub rotation: Rotation,
    /// Engine render flags, see [`render_flags`].
    pub flags: i32,
    /// Background fill. `None` leaves the bitmap transparent.
    pub background: Option<Color>,
}

impl RenderOptions {
    /// `width` by `height` pixels on white, with annotations.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotation: Rotation::None,
            flags: render_flags::ANNOT,
            background: Some(Color::WHITE),
        }
    }

    /// The page's own size multiplied by `scale` (1.0 renders one pixel per
    /// point).
    pub fn scaled(page: &Page, scale: f64) -> Result<Self> {
        let width = f64::from(page.width()?) * scale;
        let height = f64::from(page.height()?) * scale;
        Ok(Self::new(width, height))
    }

    /// Builder-style setter.
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder-style setter.
    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    /// Builder-style setter.
    pub fn background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }
}

/// Validated whole-pixel bitmap size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapSize {
    /// Width in pixels, at least 1.
    pub width: u32,
    /// Height in pixels, at least 1.
    pub height: u32,
}

impl BitmapSize {
    /// Bytes per row.
    pub fn stride(self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }

    /// Total bytes.
    pub fn byte_len(self) -> usize {
        self.stride() as usize * self.height as usize
    }
}

/// Check a requested size against `limits`.
///
/// Checks run per axis (finite, at least one pixel after rounding, within
/// the axis maximum), then on the pixel budget, then on the byte size,
/// which must fit the engine's 32-bit address space.
pub fn validate_dimensions(
    width: f64,
    height: f64,
    limits: &RenderLimits,
) -> std::result::Result<BitmapSize, DimensionError> {
    let width_px = validate_axis("width", width, limits.max_width)?;
    let height_px = validate_axis("height", height, limits.max_height)?;
    let pixels = u64::from(width_px) * u64::from(height_px);
    if pixels > limits.max_pixels {
        return Err(DimensionError::TooManyPixels {
            width: width_px,
            height: height_px,
            max_pixels: limits.max_pixels,
        });
    }
    let stride = u64::from(width_px) * u64::from(BYTES_PER_PIXEL);
    if pixels * u64::from(BYTES_PER_PIXEL) > u64::from(u32::MAX) || stride > i32::MAX as u64 {
        return Err(DimensionError::ByteSizeOverflow {
            width: width_px,
            height: height_px,
        });
    }
    Ok(BitmapSize {
        width: width_px,
        height: height_px,
    })
}

fn validate_axis(axis: &'static str, value: f64, max: u32) -> std::result::Result<u32, DimensionError> {
    if !value.is_finite() {
        return Err(DimensionError::NonFinite { axis, value });
    }
    let rounded = value.round();
    if rounded < 1.0 {
        return Err(DimensionError::NonPositive { axis, value });
    }
    if rounded > f64::from(max) {
        return Err(DimensionError::ExceedsMaximum { axis, value, max });
    }
    Ok(rounded as u32)
}

/// Swap the blue and red channel of every 4-byte pixel in place.
pub fn bgra_to_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// A finished render, RGBA, rows top to bottom, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedBitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl RenderedBitmap {
    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL as usize
    }

    /// The RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = y as usize * self.stride() + x as usize * 4;
        let px = self.pixels.get(at..at + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for RenderedBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// An arena buffer wrapped as an engine bitmap.
pub(crate) struct RenderTarget {
    rt: Rc<Runtime>,
    size: BitmapSize,
    buffer: Option<EngineAllocation>,
    bitmap: Option<BitmapHandle>,
}

impl RenderTarget {
    pub(crate) fn create(rt: Rc<Runtime>, size: BitmapSize, background: Option<Color>) -> Result<Self> {
        let buffer = rt.arena().alloc(size.byte_len())?;
        let (width, height) = (size.width as i32, size.height as i32);
        let raw = rt.call(|e| {
            e.bitmap_create_ex(
                width,
                height,
                BitmapFormat::Bgra as i32,
                buffer.offset(),
                size.stride() as i32,
            )
        });
        let Some(bitmap) = BitmapHandle::from_raw(raw) else {
            let err = rt.failure(entry::BITMAP_CREATE_EX);
            buffer.free();
            return Err(err);
        };
        let target = Self {
            rt,
            size,
            buffer: Some(buffer),
            bitmap: Some(bitmap),
        };
        match background {
            Some(color) => {
                let filled = target
                    .rt
                    .call(|e| e.bitmap_fill_rect(bitmap.raw(), 0, 0, width, height, color.to_argb()));
                if !filled {
                    return Err(target.rt.failure(entry::BITMAP_FILL_RECT));
                }
            }
            None => {
                if let Some(buffer) = &target.buffer {
                    buffer.fill(0)?;
                }
            }
        }
        trace!(bitmap = %bitmap, width, height, "render target created");
        Ok(target)
    }

    pub(crate) fn size(&self) -> BitmapSize {
        self.size
    }

    /// Raw bitmap handle, or `0` once destroyed.
    pub(crate) fn bitmap_raw(&self) -> u32 {
        self.bitmap.map_or(0, BitmapHandle::raw)
    }

    /// Copy the buffer out as RGBA.
    pub(crate) fn pixels(&self) -> Result<RenderedBitmap> {
        let Some(buffer) = &self.buffer else {
            return Err(vellum_core::Error::disposed("render target"));
        };
        let mut pixels = buffer.read()?;
        bgra_to_rgba(&mut pixels);
        Ok(RenderedBitmap {
            width: self.size.width,
            height: self.size.height,
            pixels,
        })
    }

    /// Destroy the bitmap, then free its buffer. Idempotent.
    pub(crate) fn destroy(&mut self) {
        if let Some(bitmap) = self.bitmap.take() {
            self.rt.call(|e| e.bitmap_destroy(bitmap.raw()));
        }
        if let Some(buffer) = self.buffer.take() {
            buffer.free();
        }
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub(crate) fn render_page(page: &PageCore, options: &RenderOptions) -> Result<RenderedBitmap> {
    page.ensure_not_rendering()?;
    let rt = page.runtime();
    let size = validate_dimensions(options.width, options.height, &rt.config().render)?;
    let mut target = RenderTarget::create(page.shared_runtime(), size, options.background)?;
    let bitmap = target.bitmap_raw();
    rt.call(|e| {
        e.render_page_bitmap(
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
    let result = target.pixels();
    target.destroy();
    trace!(page = %page.handle(), width = size.width, height = size.height, "page rendered");
    result
}
