//! The engine function table.

use vellum_arena::FlatMemory;

/// The foreign engine's exported entry points.
///
/// The engine owns its flat memory, so [`FlatMemory`] is a supertrait: the
/// same object that renders a page also hands out the buffers the page is
/// rendered into. Every method takes `&mut self` because every call may
/// update the engine's last-error state.
///
/// Out-parameters are offsets of caller-allocated buffers. Multi-field
/// out-structs are little-endian and packed in the order documented on each
/// method.
pub trait Engine: FlatMemory {
    // ── Library ─────────────────────────────────────────────────

    /// One-time engine initialisation.
    fn init_library(&mut self);

    /// Tear the engine down. No handle may be used afterwards.
    fn destroy_library(&mut self);

    /// Failure code of the most recent failing call (0..=6, see
    /// [`EngineErrorCode`](vellum_core::EngineErrorCode)).
    fn get_last_error(&mut self) -> u32;

    // ── Document ────────────────────────────────────────────────

    /// Open a document from `size` bytes at `data`. The buffer must stay
    /// valid until [`close_document`](Self::close_document). `password` is a
    /// NUL-terminated byte string or `0`.
    fn load_mem_document(&mut self, data: u32, size: u32, password: u32) -> u32;

    /// Close a document. All its pages must already be closed.
    fn close_document(&mut self, doc: u32);

    /// Number of pages, or a negative value on failure.
    fn get_page_count(&mut self, doc: u32) -> i32;

    /// Two-phase: info-dictionary entry `tag` (NUL-terminated bytes) as
    /// UTF-16LE.
    fn get_meta_text(&mut self, doc: u32, tag: u32, buffer: u32, buflen: u32) -> u32;

    /// Two-phase: label of page `index` as UTF-16LE.
    fn get_page_label(&mut self, doc: u32, index: i32, buffer: u32, buflen: u32) -> u32;

    /// Write the file version (e.g. 17 for 1.7) as an `i32` at `out`.
    fn get_file_version(&mut self, doc: u32, out: u32) -> bool;

    /// Permission bits from the security handler.
    fn get_doc_permissions(&mut self, doc: u32) -> u32;

    // ── Form fill ───────────────────────────────────────────────

    /// Create a form environment from the form-info struct at `form_info`.
    /// The struct must stay valid until the environment is exited.
    fn init_form_fill_environment(&mut self, doc: u32, form_info: u32) -> u32;

    /// Destroy a form environment.
    fn exit_form_fill_environment(&mut self, form: u32);

    /// Attach a freshly loaded page to the form environment.
    fn form_on_after_load_page(&mut self, page: u32, form: u32);

    /// Detach a page from the form environment; must precede `close_page`.
    fn form_on_before_close_page(&mut self, page: u32, form: u32);

    // ── Page ────────────────────────────────────────────────────

    /// Load page `index`.
    fn load_page(&mut self, doc: u32, index: i32) -> u32;

    /// Close a page.
    fn close_page(&mut self, page: u32);

    /// Width in points.
    fn get_page_width(&mut self, page: u32) -> f32;

    /// Height in points.
    fn get_page_height(&mut self, page: u32) -> f32;

    /// Rotation in quarter turns (0..=3), or -1 on failure.
    fn get_page_rotation(&mut self, page: u32) -> i32;

    // ── Text ────────────────────────────────────────────────────

    /// Build the text index for a page.
    fn text_load_page(&mut self, page: u32) -> u32;

    /// Release a text index.
    fn text_close_page(&mut self, text: u32);

    /// Number of characters, or -1 on failure.
    fn text_count_chars(&mut self, text: u32) -> i32;

    /// Write `count` UTF-16LE code units starting at `start` plus a NUL
    /// terminator to `result`, which must hold `(count + 1) * 2` bytes.
    /// Returns the number of code units written including the terminator.
    fn text_get_text(&mut self, text: u32, start: i32, count: i32, result: u32) -> i32;

    // ── Search ──────────────────────────────────────────────────

    /// Begin a search for the NUL-terminated UTF-16LE `pattern`.
    fn text_find_start(&mut self, text: u32, pattern: u32, flags: u32, start_index: i32) -> u32;

    /// Advance to the next match.
    fn text_find_next(&mut self, search: u32) -> bool;

    /// Character index of the current match.
    fn text_get_sch_result_index(&mut self, search: u32) -> i32;

    /// Length in characters of the current match.
    fn text_get_sch_count(&mut self, search: u32) -> i32;

    /// Release a search.
    fn text_find_close(&mut self, search: u32);

    // ── Bitmap ──────────────────────────────────────────────────

    /// Wrap `buffer` as a bitmap. The buffer must hold `stride * height`
    /// bytes and stay valid until [`bitmap_destroy`](Self::bitmap_destroy).
    fn bitmap_create_ex(
        &mut self,
        width: i32,
        height: i32,
        format: i32,
        buffer: u32,
        stride: i32,
    ) -> u32;

    /// Fill a rectangle with `0xAARRGGBB`.
    fn bitmap_fill_rect(
        &mut self,
        bitmap: u32,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        color: u32,
    ) -> bool;

    /// Destroy a bitmap descriptor. The buffer is not freed.
    fn bitmap_destroy(&mut self, bitmap: u32);

    // ── Render ──────────────────────────────────────────────────

    /// Render a page into a bitmap in one call.
    #[allow(clippy::too_many_arguments)]
    fn render_page_bitmap(
        &mut self,
        bitmap: u32,
        page: u32,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        rotate: i32,
        flags: i32,
    );

    /// Begin an incremental render. Returns a
    /// [`RenderStatus`](crate::RenderStatus) code. At most one incremental
    /// render may be open per page.
    #[allow(clippy::too_many_arguments)]
    fn render_page_bitmap_start(
        &mut self,
        bitmap: u32,
        page: u32,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        rotate: i32,
        flags: i32,
    ) -> i32;

    /// Run one step of the incremental render open on `page`.
    fn render_page_continue(&mut self, page: u32) -> i32;

    /// Discard the incremental render state on `page`.
    fn render_page_close(&mut self, page: u32);

    // ── Annotations ─────────────────────────────────────────────

    /// Number of annotations, or -1 on failure.
    fn page_get_annot_count(&mut self, page: u32) -> i32;

    /// Open annotation `index`. The handle must be closed.
    fn page_get_annot(&mut self, page: u32, index: i32) -> u32;

    /// Close an annotation handle.
    fn page_close_annot(&mut self, annot: u32);

    /// Subtype code, see [`AnnotationSubtype`](crate::AnnotationSubtype).
    fn annot_get_subtype(&mut self, annot: u32) -> i32;

    /// Write the rectangle as four `f32`: left, top, right, bottom.
    fn annot_get_rect(&mut self, annot: u32, rect: u32) -> bool;

    /// Write one `u32` per component to `r`, `g`, `b`, `a`.
    /// `color_type` 0 is the stroke colour, 1 the interior colour.
    fn annot_get_color(
        &mut self,
        annot: u32,
        color_type: i32,
        r: u32,
        g: u32,
        b: u32,
        a: u32,
    ) -> bool;

    // ── Page objects ────────────────────────────────────────────

    /// Number of content objects, or -1 on failure.
    fn page_count_objects(&mut self, page: u32) -> i32;

    /// Object `index`; owned by the page, never closed separately.
    fn page_get_object(&mut self, page: u32, index: i32) -> u32;

    /// Object type, see [`PageObjectType`](crate::PageObjectType).
    fn page_obj_get_type(&mut self, obj: u32) -> i32;

    /// Write the bounds as four `f32` to the four out-pointers.
    fn page_obj_get_bounds(
        &mut self,
        obj: u32,
        left: u32,
        bottom: u32,
        right: u32,
        top: u32,
    ) -> bool;

    // ── Fonts ───────────────────────────────────────────────────

    /// Font used by a text object; `0` for non-text objects.
    fn text_obj_get_font(&mut self, obj: u32) -> u32;

    /// Two-phase: base font name as NUL-terminated UTF-8.
    fn font_get_base_name(&mut self, font: u32, buffer: u32, buflen: u32) -> u32;

    /// Font weight (400 normal, 700 bold), or -1 if unknown.
    fn font_get_weight(&mut self, font: u32) -> i32;

    /// 1 if embedded, 0 if not, -1 on failure.
    fn font_get_is_embedded(&mut self, font: u32) -> i32;

    // ── Bookmarks ───────────────────────────────────────────────

    /// First child of `bookmark`, or the first top-level item when
    /// `bookmark` is `0`.
    fn bookmark_get_first_child(&mut self, doc: u32, bookmark: u32) -> u32;

    /// Next sibling of `bookmark`.
    fn bookmark_get_next_sibling(&mut self, doc: u32, bookmark: u32) -> u32;

    /// Two-phase: title as UTF-16LE.
    fn bookmark_get_title(&mut self, bookmark: u32, buffer: u32, buflen: u32) -> u32;

    /// Destination of `bookmark`, or `0`.
    fn bookmark_get_dest(&mut self, doc: u32, bookmark: u32) -> u32;

    /// Zero-based page index of a destination, or -1.
    fn dest_get_dest_page_index(&mut self, doc: u32, dest: u32) -> i32;
}
