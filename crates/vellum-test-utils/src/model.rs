//! Document content served by [`FakeEngine`](crate::FakeEngine).
//!
//! All types are plain data (`Clone + Send`), so a fixture can be built on
//! one thread and handed to an engine factory running on another.

use vellum_core::{Color, Rect};

/// Default BGRA bytes painted by a render: B=0x10, G=0x20, R=0x30, A=0xFF.
pub const DEFAULT_PAINT: [u8; 4] = [0x10, 0x20, 0x30, 0xFF];

/// A document the fake engine will open when handed matching bytes.
#[derive(Clone, Debug, Default)]
pub struct FakeDocument {
    /// Required password, if any.
    pub password: Option<String>,
    /// Pages in order.
    pub pages: Vec<FakePage>,
    /// Info-dictionary entries.
    pub metadata: Vec<(String, String)>,
    /// File version in the engine's encoding (17 for 1.7).
    pub file_version: Option<i32>,
    /// Permission bits.
    pub permissions: u32,
    /// Outline nodes. Links between nodes are indices into this list and may
    /// form cycles.
    pub bookmarks: Vec<FakeBookmark>,
    /// Index of the first top-level outline node.
    pub outline_root: Option<usize>,
}

impl FakeDocument {
    /// A document with `count` default pages.
    pub fn with_pages(count: usize) -> Self {
        Self {
            pages: (0..count).map(|_| FakePage::default()).collect(),
            permissions: 0xFFFF_FFFC,
            file_version: Some(17),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: FakePage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn metadata(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((tag.into(), value.into()));
        self
    }

    /// Replace the outline. `root` indexes into `nodes`.
    pub fn outline(mut self, root: usize, nodes: Vec<FakeBookmark>) -> Self {
        self.outline_root = Some(root);
        self.bookmarks = nodes;
        self
    }

    /// Mutable access to page `index`. Panics if out of range.
    pub fn page_mut(&mut self, index: usize) -> &mut FakePage {
        &mut self.pages[index]
    }
}

/// One page.
#[derive(Clone, Debug)]
pub struct FakePage {
    /// Width in points.
    pub width: f32,
    /// Height in points.
    pub height: f32,
    /// Rotation in quarter turns.
    pub rotation: i32,
    /// Extracted text.
    pub text: String,
    /// Page label.
    pub label: Option<String>,
    /// Annotations.
    pub annotations: Vec<FakeAnnotation>,
    /// Content objects.
    pub objects: Vec<FakeObject>,
    /// Number of "to be continued" results `render_page_continue` returns
    /// before "done".
    pub progressive_steps: u32,
    /// `render_page_bitmap_start` reports done immediately.
    pub done_on_start: bool,
    /// Step at which the incremental render fails: `Some(0)` fails the start
    /// call, `Some(n)` the n-th continue call.
    pub fail_on_step: Option<u32>,
    /// BGRA bytes painted into every pixel on render.
    pub paint: [u8; 4],
}

impl Default for FakePage {
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            rotation: 0,
            text: String::new(),
            label: None,
            annotations: Vec::new(),
            objects: Vec::new(),
            progressive_steps: 0,
            done_on_start: false,
            fail_on_step: None,
            paint: DEFAULT_PAINT,
        }
    }
}

impl FakePage {
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn rotation(mut self, quarter_turns: i32) -> Self {
        self.rotation = quarter_turns;
        self
    }

    pub fn annotation(mut self, annotation: FakeAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn object(mut self, object: FakeObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn progressive_steps(mut self, steps: u32) -> Self {
        self.progressive_steps = steps;
        self
    }

    pub fn paint(mut self, bgra: [u8; 4]) -> Self {
        self.paint = bgra;
        self
    }
}

/// One annotation.
#[derive(Clone, Debug)]
pub struct FakeAnnotation {
    /// Raw subtype code.
    pub subtype: i32,
    /// Rectangle in page space.
    pub rect: Rect,
    /// Stroke colour.
    pub color: Option<Color>,
    /// Interior colour.
    pub interior: Option<Color>,
}

impl FakeAnnotation {
    pub fn new(subtype: i32, rect: Rect) -> Self {
        Self {
            subtype,
            rect,
            color: None,
            interior: None,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn interior(mut self, color: Color) -> Self {
        self.interior = Some(color);
        self
    }
}

/// One content object.
#[derive(Clone, Debug)]
pub struct FakeObject {
    /// Raw object type.
    pub kind: i32,
    /// Bounds in page space.
    pub bounds: Rect,
    /// Font, for text objects.
    pub font: Option<FakeFont>,
}

impl FakeObject {
    /// A text object using `font`.
    pub fn text(bounds: Rect, font: FakeFont) -> Self {
        Self {
            kind: 1,
            bounds,
            font: Some(font),
        }
    }

    /// A path object.
    pub fn path(bounds: Rect) -> Self {
        Self {
            kind: 2,
            bounds,
            font: None,
        }
    }

    /// An image object.
    pub fn image(bounds: Rect) -> Self {
        Self {
            kind: 3,
            bounds,
            font: None,
        }
    }
}

/// A font.
#[derive(Clone, Debug)]
pub struct FakeFont {
    /// Base font name.
    pub base_name: String,
    /// Weight.
    pub weight: i32,
    /// Embedded in the file.
    pub embedded: bool,
}

impl FakeFont {
    pub fn new(base_name: impl Into<String>, weight: i32, embedded: bool) -> Self {
        Self {
            base_name: base_name.into(),
            weight,
            embedded,
        }
    }
}

/// One outline node.
#[derive(Clone, Debug, Default)]
pub struct FakeBookmark {
    /// Title.
    pub title: String,
    /// Destination page index.
    pub dest_page: Option<i32>,
    /// Index of the first child node.
    pub first_child: Option<usize>,
    /// Index of the next sibling node.
    pub next_sibling: Option<usize>,
}

impl FakeBookmark {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn dest(mut self, page: i32) -> Self {
        self.dest_page = Some(page);
        self
    }

    pub fn child(mut self, index: usize) -> Self {
        self.first_child = Some(index);
        self
    }

    pub fn sibling(mut self, index: usize) -> Self {
        self.next_sibling = Some(index);
        self
    }
}
