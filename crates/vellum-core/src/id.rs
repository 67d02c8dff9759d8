//! Strongly-typed engine handles.
//!
//! The engine identifies every resource by an opaque `u32`, with `0` as the
//! null/failure sentinel. Each handle kind gets its own newtype over
//! [`NonZeroU32`] so a page handle can never be passed where a document
//! handle is expected, and "null" is expressed as `Option::None` rather
//! than a magic zero.

use std::fmt;
use std::num::NonZeroU32;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wrap a raw engine value, mapping the null sentinel to `None`.
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// The raw value to pass back across the engine boundary.
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

engine_handle!(
    /// An open document inside the engine.
    DocumentHandle,
    "document"
);
engine_handle!(
    /// A loaded page inside the engine.
    PageHandle,
    "page"
);
engine_handle!(
    /// A text index built over one loaded page.
    TextPageHandle,
    "text-page"
);
engine_handle!(
    /// An in-progress text search over a text index.
    SearchHandle,
    "search"
);
engine_handle!(
    /// A bitmap descriptor wrapping an arena buffer.
    BitmapHandle,
    "bitmap"
);
engine_handle!(
    /// A form-fill environment attached to a document.
    FormHandle,
    "form"
);
engine_handle!(
    /// An annotation opened from a page.
    AnnotationHandle,
    "annotation"
);
engine_handle!(
    /// A content object on a page. Owned by the page, never closed separately.
    PageObjectHandle,
    "page-object"
);
engine_handle!(
    /// A font referenced by a text object.
    FontHandle,
    "font"
);
engine_handle!(
    /// A node in the document outline.
    BookmarkHandle,
    "bookmark"
);
engine_handle!(
    /// A destination referenced by a bookmark or link.
    DestHandle,
    "dest"
);
