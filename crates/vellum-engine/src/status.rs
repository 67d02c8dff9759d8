//! Raw codes exchanged with the engine, and typed views of them.

/// Incremental render status codes.
pub mod render_status {
    /// Not started.
    pub const READY: i32 = 0;
    /// More steps required.
    pub const TO_BE_CONTINUED: i32 = 1;
    /// Finished successfully.
    pub const DONE: i32 = 2;
    /// Finished with an error.
    pub const FAILED: i32 = 3;
}

/// Render flag bits passed to the render entry points.
pub mod render_flags {
    /// Draw annotations.
    pub const ANNOT: i32 = 0x01;
    /// Sub-pixel text anti-aliasing.
    pub const LCD_TEXT: i32 = 0x02;
    /// Do not use native text output.
    pub const NO_NATIVE_TEXT: i32 = 0x04;
    /// Render in grayscale.
    pub const GRAYSCALE: i32 = 0x08;
    /// Limit the image cache size.
    pub const LIMITED_IMAGE_CACHE: i32 = 0x200;
    /// Always use halftone for image stretching.
    pub const FORCE_HALFTONE: i32 = 0x400;
    /// Render for printing.
    pub const PRINTING: i32 = 0x800;
    /// Disable anti-aliasing on text.
    pub const NO_SMOOTH_TEXT: i32 = 0x1000;
    /// Disable anti-aliasing on images.
    pub const NO_SMOOTH_IMAGE: i32 = 0x2000;
    /// Disable anti-aliasing on paths.
    pub const NO_SMOOTH_PATH: i32 = 0x4000;
}

/// Text search flag bits.
pub mod search_flags {
    /// Case-sensitive match.
    pub const MATCH_CASE: u32 = 0x01;
    /// Whole-word match.
    pub const MATCH_WHOLE_WORD: u32 = 0x02;
    /// Report consecutive (overlapping) matches.
    pub const CONSECUTIVE: u32 = 0x04;
}

/// Size of the zero-initialised form-info struct passed to
/// `init_form_fill_environment`. Offset 0 holds the `u32` version.
pub const FORM_FILL_INFO_SIZE: usize = 256;

/// Form-info struct version understood by the engine.
pub const FORM_FILL_INFO_VERSION: u32 = 2;

/// Stroke colour selector for `annot_get_color`.
pub const ANNOT_COLOR_STROKE: i32 = 0;

/// Interior colour selector for `annot_get_color`.
pub const ANNOT_COLOR_INTERIOR: i32 = 1;

/// A decoded incremental render status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// Not started.
    Ready,
    /// More steps required.
    ToBeContinued,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
    /// A code outside the documented set.
    Unknown(i32),
}

impl RenderStatus {
    /// Decode a raw status.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            render_status::READY => Self::Ready,
            render_status::TO_BE_CONTINUED => Self::ToBeContinued,
            render_status::DONE => Self::Done,
            render_status::FAILED => Self::Failed,
            other => Self::Unknown(other),
        }
    }
}

/// Bitmap pixel formats.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitmapFormat {
    /// 8-bit gray.
    Gray = 1,
    /// 24-bit B, G, R.
    Bgr = 2,
    /// 32-bit B, G, R, unused.
    Bgrx = 3,
    /// 32-bit B, G, R, A. The only format this layer creates.
    Bgra = 4,
}

impl BitmapFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Gray => 1,
            Self::Bgr => 3,
            Self::Bgrx | Self::Bgra => 4,
        }
    }
}

/// Page content object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageObjectType {
    /// Unrecognised object.
    Unknown,
    /// Text run.
    Text,
    /// Vector path.
    Path,
    /// Raster image.
    Image,
    /// Shading.
    Shading,
    /// Form XObject.
    Form,
}

impl PageObjectType {
    /// Decode a raw object type.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Text,
            2 => Self::Path,
            3 => Self::Image,
            4 => Self::Shading,
            5 => Self::Form,
            _ => Self::Unknown,
        }
    }

    /// The engine's encoding.
    pub fn raw(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Text => 1,
            Self::Path => 2,
            Self::Image => 3,
            Self::Shading => 4,
            Self::Form => 5,
        }
    }
}

/// Annotation subtypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AnnotationSubtype {
    Unknown,
    Text,
    Link,
    FreeText,
    Line,
    Square,
    Circle,
    Polygon,
    Polyline,
    Highlight,
    Underline,
    Squiggly,
    StrikeOut,
    Stamp,
    Caret,
    Ink,
    Popup,
    FileAttachment,
    Sound,
    Movie,
    Widget,
    Screen,
    PrinterMark,
    TrapNet,
    Watermark,
    ThreeD,
    RichMedia,
    XfaWidget,
    Redact,
    /// A code outside the documented set.
    Other(i32),
}

const SUBTYPES: [AnnotationSubtype; 29] = [
    AnnotationSubtype::Unknown,
    AnnotationSubtype::Text,
    AnnotationSubtype::Link,
    AnnotationSubtype::FreeText,
    AnnotationSubtype::Line,
    AnnotationSubtype::Square,
    AnnotationSubtype::Circle,
    AnnotationSubtype::Polygon,
    AnnotationSubtype::Polyline,
    AnnotationSubtype::Highlight,
    AnnotationSubtype::Underline,
    AnnotationSubtype::Squiggly,
    AnnotationSubtype::StrikeOut,
    AnnotationSubtype::Stamp,
    AnnotationSubtype::Caret,
    AnnotationSubtype::Ink,
    AnnotationSubtype::Popup,
    AnnotationSubtype::FileAttachment,
    AnnotationSubtype::Sound,
    AnnotationSubtype::Movie,
    AnnotationSubtype::Widget,
    AnnotationSubtype::Screen,
    AnnotationSubtype::PrinterMark,
    AnnotationSubtype::TrapNet,
    AnnotationSubtype::Watermark,
    AnnotationSubtype::ThreeD,
    AnnotationSubtype::RichMedia,
    AnnotationSubtype::XfaWidget,
    AnnotationSubtype::Redact,
];

impl AnnotationSubtype {
    /// Decode a raw subtype.
    pub fn from_raw(raw: i32) -> Self {
        usize::try_from(raw)
            .ok()
            .and_then(|i| SUBTYPES.get(i).copied())
            .unwrap_or(Self::Other(raw))
    }

    /// The engine's encoding.
    pub fn raw(self) -> i32 {
        match self {
            Self::Other(raw) => raw,
            known => SUBTYPES
                .iter()
                .position(|s| *s == known)
                .map_or(-1, |i| i as i32),
        }
    }
}
