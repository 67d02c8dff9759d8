//! An in-process [`Engine`] over registered [`FakeDocument`]s.
//!
//! Documents are looked up by the exact bytes handed to
//! `load_mem_document`. The fake enforces the engine's ordering rules and
//! reports breaches to its [`FakeProbe`] instead of corrupting state:
//!
//! - a document closed with pages still open;
//! - a page closed with a text index, annotation, incremental render, or
//!   form attachment still open;
//! - a buffer freed while a document, bitmap, or form environment still
//!   reads it;
//! - a free of an offset that is not allocated;
//! - any call after `destroy_library`.

use std::collections::HashMap;
use std::rc::Rc;

use vellum_arena::FlatMemory;
use vellum_core::Rect;
use vellum_engine::entry;
use vellum_engine::status::{render_status, search_flags, FORM_FILL_INFO_VERSION};
use vellum_engine::{BitmapFormat, Engine};

use crate::handles::HandleTable;
use crate::memory::FakeMemory;
use crate::model::{FakeAnnotation, FakeDocument, FakePage};
use crate::probe::{FakeProbe, ObjectKind, MALLOC};

const ERR_UNKNOWN: u32 = 1;
const ERR_FORMAT: u32 = 3;
const ERR_PASSWORD: u32 = 4;
const ERR_PAGE: u32 = 6;

struct DocState {
    model: Rc<FakeDocument>,
    data: u32,
    open_pages: usize,
    form: Option<u32>,
}

struct Progressive {
    bitmap: u32,
    continues: u32,
}

struct PageState {
    doc: u32,
    model: FakePage,
    text_pages: usize,
    open_annots: usize,
    form: Option<u32>,
    progressive: Option<Progressive>,
}

struct TextState {
    page: u32,
    units: Vec<u16>,
}

struct SearchState {
    text: u32,
    matches: Vec<(i32, i32)>,
    cursor: Option<usize>,
}

struct BitmapState {
    width: i32,
    height: i32,
    stride: i32,
    buffer: u32,
}

struct FormState {
    doc: u32,
    info: u32,
}

struct AnnotState {
    page: u32,
    model: FakeAnnotation,
}

enum Object {
    Document(DocState),
    Page(PageState),
    TextPage(TextState),
    Search(SearchState),
    Bitmap(BitmapState),
    Form(FormState),
    Annotation(AnnotState),
    PageObject { page: u32, index: usize },
    Font { page: u32, object: usize },
    Bookmark { doc: u32, node: usize },
    Dest { doc: u32, page_index: i32 },
}

impl Object {
    fn kind(&self) -> ObjectKind {
        match self {
            Self::Document(_) => ObjectKind::Document,
            Self::Page(_) => ObjectKind::Page,
            Self::TextPage(_) => ObjectKind::TextPage,
            Self::Search(_) => ObjectKind::Search,
            Self::Bitmap(_) => ObjectKind::Bitmap,
            Self::Form(_) => ObjectKind::Form,
            Self::Annotation(_) => ObjectKind::Annotation,
            Self::PageObject { .. } => ObjectKind::PageObject,
            Self::Font { .. } => ObjectKind::Font,
            Self::Bookmark { .. } => ObjectKind::Bookmark,
            Self::Dest { .. } => ObjectKind::Dest,
        }
    }

    /// The page a page-scoped object belongs to.
    fn owning_page(&self) -> Option<u32> {
        match self {
            Self::PageObject { page, .. } | Self::Font { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// Objects the engine hands out repeatedly without a close call. Interned
/// so the same node always yields the same handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum InternKey {
    PageObject(u32, usize),
    Font(u32, usize),
    Bookmark(u32, usize),
    Dest(u32, usize),
}

/// An in-process engine with flat `Vec<u8>` memory.
pub struct FakeEngine {
    memory: FakeMemory,
    objects: HandleTable<Object>,
    documents: Vec<(Vec<u8>, Rc<FakeDocument>)>,
    interned: HashMap<InternKey, u32>,
    last_error: u32,
    probe: FakeProbe,
}

impl FakeEngine {
    /// Default memory ceiling: 64 MiB.
    pub const DEFAULT_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

    pub fn new() -> Self {
        Self::with_memory_limit(Self::DEFAULT_MEMORY_LIMIT)
    }

    pub fn with_memory_limit(limit: usize) -> Self {
        Self {
            memory: FakeMemory::new(4096, limit),
            objects: HandleTable::new(),
            documents: Vec::new(),
            interned: HashMap::new(),
            last_error: 0,
            probe: FakeProbe::default(),
        }
    }

    /// Register `document` to be served when `bytes` are loaded.
    pub fn with_document(mut self, bytes: impl Into<Vec<u8>>, document: FakeDocument) -> Self {
        self.documents.push((bytes.into(), Rc::new(document)));
        self
    }

    /// A probe sharing this engine's state.
    pub fn probe(&self) -> FakeProbe {
        self.probe.clone()
    }

    /// Box as a trait object, keeping a probe.
    pub fn boxed(self) -> (Box<dyn Engine>, FakeProbe) {
        let probe = self.probe();
        (Box::new(self), probe)
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn call(&mut self, entry: &'static str, handle: u32) -> bool {
        self.probe.record(entry, handle);
        if self.probe.is_destroyed() {
            self.probe
                .violation(format!("{entry} called after destroy_library"));
        }
        if self.probe.take_fault(entry) {
            self.last_error = ERR_UNKNOWN;
            return false;
        }
        true
    }

    fn insert(&mut self, object: Object) -> u32 {
        self.probe.opened(object.kind());
        self.objects.insert(object)
    }

    fn remove(&mut self, handle: u32) -> Option<Object> {
        let object = self.objects.remove(handle)?;
        self.probe.closed(object.kind());
        Some(object)
    }

    fn intern(&mut self, key: InternKey, make: impl FnOnce() -> Object) -> u32 {
        if let Some(&handle) = self.interned.get(&key) {
            if self.objects.get(handle).is_some() {
                return handle;
            }
        }
        let handle = self.insert(make());
        self.interned.insert(key, handle);
        handle
    }

    fn doc(&self, handle: u32) -> Option<&DocState> {
        match self.objects.get(handle) {
            Some(Object::Document(d)) => Some(d),
            _ => None,
        }
    }

    fn doc_mut(&mut self, handle: u32) -> Option<&mut DocState> {
        match self.objects.get_mut(handle) {
            Some(Object::Document(d)) => Some(d),
            _ => None,
        }
    }

    fn page(&self, handle: u32) -> Option<&PageState> {
        match self.objects.get(handle) {
            Some(Object::Page(p)) => Some(p),
            _ => None,
        }
    }

    fn page_mut(&mut self, handle: u32) -> Option<&mut PageState> {
        match self.objects.get_mut(handle) {
            Some(Object::Page(p)) => Some(p),
            _ => None,
        }
    }

    fn annot(&self, handle: u32) -> Option<&AnnotState> {
        match self.objects.get(handle) {
            Some(Object::Annotation(a)) => Some(a),
            _ => None,
        }
    }

    fn page_object(&self, handle: u32) -> Option<&crate::model::FakeObject> {
        match self.objects.get(handle) {
            Some(Object::PageObject { page, index }) => self.page(*page)?.model.objects.get(*index),
            _ => None,
        }
    }

    fn font(&self, handle: u32) -> Option<&crate::model::FakeFont> {
        match self.objects.get(handle) {
            Some(Object::Font { page, object }) => {
                self.page(*page)?.model.objects.get(*object)?.font.as_ref()
            }
            _ => None,
        }
    }

    fn bookmark_node(&self, doc: u32, handle: u32) -> Option<usize> {
        match self.objects.get(handle) {
            Some(Object::Bookmark { doc: owner, node }) if *owner == doc => Some(*node),
            _ => None,
        }
    }

    fn read_cstr(&self, ptr: u32) -> Option<Vec<u8>> {
        if ptr == 0 {
            return None;
        }
        let tail = self.memory.bytes().get(ptr as usize..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        Some(tail[..end].to_vec())
    }

    fn read_wstr(&self, ptr: u32) -> Option<Vec<u16>> {
        if ptr == 0 {
            return None;
        }
        let tail = self.memory.bytes().get(ptr as usize..)?;
        let units: Vec<u16> = tail
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        Some(units)
    }

    fn write(&mut self, ptr: u32, data: &[u8]) -> bool {
        if ptr == 0 {
            return false;
        }
        match self.memory.slice_mut(ptr, data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Two-phase string result: returns the byte size and writes only when
    /// the buffer is large enough.
    fn two_phase(&mut self, data: &[u8], buffer: u32, buflen: u32) -> u32 {
        if buffer != 0 && buflen as usize >= data.len() {
            self.write(buffer, data);
        }
        data.len() as u32
    }

    fn paint(&mut self, bitmap: u32, bgra: [u8; 4]) {
        let Some(Object::Bitmap(b)) = self.objects.get(bitmap) else {
            return;
        };
        let (width, height, stride, buffer) = (b.width, b.height, b.stride, b.buffer);
        for y in 0..height {
            let row = buffer as usize + (y * stride) as usize;
            let Some(dst) = self.memory.bytes_mut().get_mut(row..row + (width * 4) as usize) else {
                return;
            };
            for px in dst.chunks_exact_mut(4) {
                px.copy_from_slice(&bgra);
            }
        }
    }

    /// Close everything scoped to `page` that the layer never closes itself.
    fn drop_page_scoped(&mut self, page: u32) {
        for object in self.objects.remove_where(|o| o.owning_page() == Some(page)) {
            self.probe.closed(object.kind());
        }
        self.interned.retain(|key, _| {
            !matches!(key, InternKey::PageObject(p, _) | InternKey::Font(p, _) if *p == page)
        });
    }

    fn drop_doc_scoped(&mut self, doc: u32) {
        let owned = |o: &Object| match o {
            Object::Bookmark { doc: d, .. } | Object::Dest { doc: d, .. } => *d == doc,
            _ => false,
        };
        for object in self.objects.remove_where(owned) {
            self.probe.closed(object.kind());
        }
        self.interned.retain(|key, _| {
            !matches!(key, InternKey::Bookmark(d, _) | InternKey::Dest(d, _) if *d == doc)
        });
    }

    fn find_matches(haystack: &[u16], needle: &[u16], flags: u32) -> Vec<(i32, i32)> {
        if needle.is_empty() || needle.len() > haystack.len() {
            return Vec::new();
        }
        let fold = |u: u16| -> u16 {
            if flags & search_flags::MATCH_CASE == 0 && u < 0x80 && (u as u8).is_ascii_uppercase() {
                u + 32
            } else {
                u
            }
        };
        let is_word = |u: u16| u < 0x80 && (u as u8).is_ascii_alphanumeric();
        let step_over = flags & search_flags::CONSECUTIVE == 0;
        let mut matches = Vec::new();
        let mut i = 0;
        while i + needle.len() <= haystack.len() {
            let window = &haystack[i..i + needle.len()];
            let hit = window.iter().zip(needle).all(|(a, b)| fold(*a) == fold(*b));
            let whole = flags & search_flags::MATCH_WHOLE_WORD == 0
                || ((i == 0 || !is_word(haystack[i - 1]))
                    && haystack.get(i + needle.len()).is_none_or(|&u| !is_word(u)));
            if hit && whole {
                matches.push((i as i32, needle.len() as i32));
                i += if step_over { needle.len() } else { 1 };
            } else {
                i += 1;
            }
        }
        matches
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatMemory for FakeEngine {
    fn malloc(&mut self, size: u32) -> u32 {
        if self.probe.take_fault(MALLOC) {
            return 0;
        }
        let ptr = self.memory.malloc(size);
        if ptr != 0 {
            self.probe.malloced(size as usize);
        }
        ptr
    }

    fn free(&mut self, ptr: u32) {
        let in_use = self.objects.iter().find_map(|(h, o)| match o {
            Object::Document(d) if d.data == ptr => Some(format!("document {h} source buffer")),
            Object::Bitmap(b) if b.buffer == ptr => Some(format!("bitmap {h} buffer")),
            Object::Form(f) if f.info == ptr => Some(format!("form {h} info struct")),
            _ => None,
        });
        if let Some(what) = in_use {
            self.probe
                .violation(format!("freed {what} at {ptr} while still in use"));
        }
        match self.memory.free(ptr) {
            Some(len) => self.probe.freed(len as usize),
            None => self
                .probe
                .violation(format!("free of unallocated offset {ptr}")),
        }
    }

    fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.memory.bytes_mut()
    }
}

impl Engine for FakeEngine {
    // ── Library ─────────────────────────────────────────────────

    fn init_library(&mut self) {
        self.probe.record(entry::INIT_LIBRARY, 0);
        self.probe.set_initialized();
    }

    fn destroy_library(&mut self) {
        self.probe.record(entry::DESTROY_LIBRARY, 0);
        let open: Vec<String> = self
            .objects
            .iter()
            .filter(|(_, o)| !matches!(o.kind(), ObjectKind::Bookmark | ObjectKind::Dest))
            .map(|(h, o)| format!("{:?} {h}", o.kind()))
            .collect();
        if !open.is_empty() {
            self.probe.violation(format!(
                "destroy_library with objects open: {}",
                open.join(", ")
            ));
        }
        self.probe.set_destroyed();
    }

    fn get_last_error(&mut self) -> u32 {
        self.last_error
    }

    // ── Document ────────────────────────────────────────────────

    fn load_mem_document(&mut self, data: u32, size: u32, password: u32) -> u32 {
        if !self.call(entry::LOAD_MEM_DOCUMENT, 0) {
            return 0;
        }
        if !self.memory.contains(data, size as usize) {
            self.last_error = ERR_UNKNOWN;
            return 0;
        }
        let bytes = self.memory.slice(data, size as usize).unwrap_or_default();
        let Some(model) = self
            .documents
            .iter()
            .find(|(b, _)| b.as_slice() == bytes)
            .map(|(_, m)| Rc::clone(m))
        else {
            self.last_error = ERR_FORMAT;
            return 0;
        };
        if let Some(expected) = &model.password {
            let given = self.read_cstr(password).unwrap_or_default();
            if given != expected.as_bytes() {
                self.last_error = ERR_PASSWORD;
                return 0;
            }
        }
        self.last_error = 0;
        self.insert(Object::Document(DocState {
            model,
            data,
            open_pages: 0,
            form: None,
        }))
    }

    fn close_document(&mut self, doc: u32) {
        self.call(entry::CLOSE_DOCUMENT, doc);
        let Some(state) = self.doc(doc) else {
            self.probe
                .violation(format!("close_document on invalid handle {doc}"));
            return;
        };
        if state.open_pages > 0 {
            self.probe.violation(format!(
                "close_document {doc} with {} page(s) open",
                state.open_pages
            ));
        }
        if let Some(form) = state.form {
            self.probe.violation(format!(
                "close_document {doc} with form environment {form} open"
            ));
        }
        self.drop_doc_scoped(doc);
        self.remove(doc);
    }

    fn get_page_count(&mut self, doc: u32) -> i32 {
        if !self.call(entry::GET_PAGE_COUNT, doc) {
            return -1;
        }
        self.doc(doc).map_or(-1, |d| d.model.pages.len() as i32)
    }

    fn get_meta_text(&mut self, doc: u32, tag: u32, buffer: u32, buflen: u32) -> u32 {
        if !self.call(entry::GET_META_TEXT, doc) {
            return 0;
        }
        let Some(tag) = self.read_cstr(tag) else {
            return 0;
        };
        let Some(state) = self.doc(doc) else {
            return 0;
        };
        let value = state
            .model
            .metadata
            .iter()
            .find(|(t, _)| t.as_bytes() == tag.as_slice())
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let encoded = utf16_with_nul(&value);
        self.two_phase(&encoded, buffer, buflen)
    }

    fn get_page_label(&mut self, doc: u32, index: i32, buffer: u32, buflen: u32) -> u32 {
        if !self.call(entry::GET_PAGE_LABEL, doc) {
            return 0;
        }
        let label = self
            .doc(doc)
            .and_then(|d| d.model.pages.get(usize::try_from(index).ok()?))
            .and_then(|p| p.label.clone());
        match label {
            Some(label) => {
                let encoded = utf16_with_nul(&label);
                self.two_phase(&encoded, buffer, buflen)
            }
            None => 0,
        }
    }

    fn get_file_version(&mut self, doc: u32, out: u32) -> bool {
        if !self.call(entry::GET_FILE_VERSION, doc) {
            return false;
        }
        match self.doc(doc).and_then(|d| d.model.file_version) {
            Some(version) => self.write(out, &version.to_le_bytes()),
            None => false,
        }
    }

    fn get_doc_permissions(&mut self, doc: u32) -> u32 {
        if !self.call(entry::GET_DOC_PERMISSIONS, doc) {
            return 0;
        }
        self.doc(doc).map_or(0, |d| d.model.permissions)
    }

    // ── Form fill ───────────────────────────────────────────────

    fn init_form_fill_environment(&mut self, doc: u32, form_info: u32) -> u32 {
        if !self.call(entry::INIT_FORM_FILL_ENVIRONMENT, doc) || self.doc(doc).is_none() {
            return 0;
        }
        let version = self
            .memory
            .slice(form_info, 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        if version != Some(FORM_FILL_INFO_VERSION) || !self.memory.contains(form_info, 4) {
            self.last_error = ERR_UNKNOWN;
            return 0;
        }
        let form = self.insert(Object::Form(FormState {
            doc,
            info: form_info,
        }));
        if let Some(d) = self.doc_mut(doc) {
            d.form = Some(form);
        }
        form
    }

    fn exit_form_fill_environment(&mut self, form: u32) {
        self.call(entry::EXIT_FORM_FILL_ENVIRONMENT, form);
        let attached = self
            .objects
            .iter()
            .filter(|(_, o)| matches!(o, Object::Page(p) if p.form == Some(form)))
            .count();
        if attached > 0 {
            self.probe.violation(format!(
                "exit_form_fill_environment {form} with {attached} page(s) attached"
            ));
        }
        match self.remove(form) {
            Some(Object::Form(state)) => {
                if let Some(d) = self.doc_mut(state.doc) {
                    d.form = None;
                }
            }
            _ => self
                .probe
                .violation(format!("exit_form_fill_environment on invalid handle {form}")),
        }
    }

    fn form_on_after_load_page(&mut self, page: u32, form: u32) {
        self.call(entry::FORM_ON_AFTER_LOAD_PAGE, page);
        if let Some(p) = self.page_mut(page) {
            p.form = Some(form);
        }
    }

    fn form_on_before_close_page(&mut self, page: u32, form: u32) {
        self.call(entry::FORM_ON_BEFORE_CLOSE_PAGE, page);
        if let Some(p) = self.page_mut(page) {
            if p.form == Some(form) {
                p.form = None;
            }
        }
    }

    // ── Page ────────────────────────────────────────────────────

    fn load_page(&mut self, doc: u32, index: i32) -> u32 {
        if !self.call(entry::LOAD_PAGE, doc) {
            self.last_error = ERR_PAGE;
            return 0;
        }
        let Some(model) = self
            .doc(doc)
            .and_then(|d| d.model.pages.get(usize::try_from(index).ok()?).cloned())
        else {
            self.last_error = ERR_PAGE;
            return 0;
        };
        let page = self.insert(Object::Page(PageState {
            doc,
            model,
            text_pages: 0,
            open_annots: 0,
            form: None,
            progressive: None,
        }));
        if let Some(d) = self.doc_mut(doc) {
            d.open_pages += 1;
        }
        page
    }

    fn close_page(&mut self, page: u32) {
        self.call(entry::CLOSE_PAGE, page);
        let Some(state) = self.page(page) else {
            self.probe
                .violation(format!("close_page on invalid handle {page}"));
            return;
        };
        let mut problems = Vec::new();
        if state.text_pages > 0 {
            problems.push(format!("{} text page(s)", state.text_pages));
        }
        if state.open_annots > 0 {
            problems.push(format!("{} annotation(s)", state.open_annots));
        }
        if state.progressive.is_some() {
            problems.push("an incremental render".to_string());
        }
        if let Some(form) = state.form {
            problems.push(format!("form {form} attachment"));
        }
        if !problems.is_empty() {
            self.probe.violation(format!(
                "close_page {page} with {} still open",
                problems.join(", ")
            ));
        }
        let doc = state.doc;
        let had_progressive = state.progressive.is_some();
        self.drop_page_scoped(page);
        self.remove(page);
        if had_progressive {
            self.probe.closed(ObjectKind::ProgressiveRender);
        }
        if let Some(d) = self.doc_mut(doc) {
            d.open_pages = d.open_pages.saturating_sub(1);
        }
    }

    fn get_page_width(&mut self, page: u32) -> f32 {
        self.call(entry::GET_PAGE_WIDTH, page);
        self.page(page).map_or(0.0, |p| p.model.width)
    }

    fn get_page_height(&mut self, page: u32) -> f32 {
        self.call(entry::GET_PAGE_HEIGHT, page);
        self.page(page).map_or(0.0, |p| p.model.height)
    }

    fn get_page_rotation(&mut self, page: u32) -> i32 {
        if !self.call(entry::GET_PAGE_ROTATION, page) {
            return -1;
        }
        self.page(page).map_or(-1, |p| p.model.rotation)
    }

    // ── Text ────────────────────────────────────────────────────

    fn text_load_page(&mut self, page: u32) -> u32 {
        if !self.call(entry::TEXT_LOAD_PAGE, page) {
            return 0;
        }
        let Some(state) = self.page_mut(page) else {
            return 0;
        };
        state.text_pages += 1;
        let units = state.model.text.encode_utf16().collect();
        self.insert(Object::TextPage(TextState { page, units }))
    }

    fn text_close_page(&mut self, text: u32) {
        self.call(entry::TEXT_CLOSE_PAGE, text);
        let searches = self
            .objects
            .iter()
            .filter(|(_, o)| matches!(o, Object::Search(s) if s.text == text))
            .count();
        if searches > 0 {
            self.probe.violation(format!(
                "text_close_page {text} with {searches} search(es) open"
            ));
        }
        match self.remove(text) {
            Some(Object::TextPage(state)) => {
                if let Some(p) = self.page_mut(state.page) {
                    p.text_pages = p.text_pages.saturating_sub(1);
                }
            }
            _ => self
                .probe
                .violation(format!("text_close_page on invalid handle {text}")),
        }
    }

    fn text_count_chars(&mut self, text: u32) -> i32 {
        if !self.call(entry::TEXT_COUNT_CHARS, text) {
            return -1;
        }
        match self.objects.get(text) {
            Some(Object::TextPage(t)) => t.units.len() as i32,
            _ => -1,
        }
    }

    fn text_get_text(&mut self, text: u32, start: i32, count: i32, result: u32) -> i32 {
        if !self.call(entry::TEXT_GET_TEXT, text) {
            return 0;
        }
        let Some(Object::TextPage(t)) = self.objects.get(text) else {
            return 0;
        };
        let (Ok(start), Ok(count)) = (usize::try_from(start), usize::try_from(count)) else {
            return 0;
        };
        let end = (start + count).min(t.units.len());
        let mut encoded: Vec<u8> = t.units[start.min(end)..end]
            .iter()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        encoded.extend_from_slice(&[0, 0]);
        let written = (encoded.len() / 2) as i32;
        if self.write(result, &encoded) {
            written
        } else {
            0
        }
    }

    // ── Search ──────────────────────────────────────────────────

    fn text_find_start(&mut self, text: u32, pattern: u32, flags: u32, start_index: i32) -> u32 {
        if !self.call(entry::TEXT_FIND_START, text) {
            return 0;
        }
        let Some(needle) = self.read_wstr(pattern) else {
            return 0;
        };
        let Some(Object::TextPage(t)) = self.objects.get(text) else {
            return 0;
        };
        let from = usize::try_from(start_index).unwrap_or(0).min(t.units.len());
        let matches = Self::find_matches(&t.units[from..], &needle, flags)
            .into_iter()
            .map(|(i, n)| (i + from as i32, n))
            .collect();
        self.insert(Object::Search(SearchState {
            text,
            matches,
            cursor: None,
        }))
    }

    fn text_find_next(&mut self, search: u32) -> bool {
        self.call(entry::TEXT_FIND_NEXT, search);
        let Some(Object::Search(s)) = self.objects.get_mut(search) else {
            return false;
        };
        let next = s.cursor.map_or(0, |c| c + 1);
        if next < s.matches.len() {
            s.cursor = Some(next);
            true
        } else {
            false
        }
    }

    fn text_get_sch_result_index(&mut self, search: u32) -> i32 {
        self.call(entry::TEXT_GET_SCH_RESULT_INDEX, search);
        match self.objects.get(search) {
            Some(Object::Search(s)) => s.cursor.map_or(-1, |c| s.matches[c].0),
            _ => -1,
        }
    }

    fn text_get_sch_count(&mut self, search: u32) -> i32 {
        self.call(entry::TEXT_GET_SCH_COUNT, search);
        match self.objects.get(search) {
            Some(Object::Search(s)) => s.cursor.map_or(0, |c| s.matches[c].1),
            _ => 0,
        }
    }

    fn text_find_close(&mut self, search: u32) {
        self.call(entry::TEXT_FIND_CLOSE, search);
        if !matches!(self.remove(search), Some(Object::Search(_))) {
            self.probe
                .violation(format!("text_find_close on invalid handle {search}"));
        }
    }

    // ── Bitmap ──────────────────────────────────────────────────

    fn bitmap_create_ex(
        &mut self,
        width: i32,
        height: i32,
        format: i32,
        buffer: u32,
        stride: i32,
    ) -> u32 {
        if !self.call(entry::BITMAP_CREATE_EX, buffer) {
            return 0;
        }
        if width <= 0 || height <= 0 || format != BitmapFormat::Bgra as i32 || stride < width * 4 {
            self.last_error = ERR_UNKNOWN;
            return 0;
        }
        let needed = stride as usize * height as usize;
        if !self.memory.contains(buffer, needed) {
            self.probe.violation(format!(
                "bitmap_create_ex over {needed} bytes at {buffer} outside any allocation"
            ));
            return 0;
        }
        self.insert(Object::Bitmap(BitmapState {
            width,
            height,
            stride,
            buffer,
        }))
    }

    fn bitmap_fill_rect(
        &mut self,
        bitmap: u32,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        color: u32,
    ) -> bool {
        if !self.call(entry::BITMAP_FILL_RECT, bitmap) {
            return false;
        }
        let Some(Object::Bitmap(b)) = self.objects.get(bitmap) else {
            return false;
        };
        let (bw, bh, stride, buffer) = (b.width, b.height, b.stride, b.buffer);
        let bgra = [
            color as u8,
            (color >> 8) as u8,
            (color >> 16) as u8,
            (color >> 24) as u8,
        ];
        let (x0, y0) = (left.max(0), top.max(0));
        let (x1, y1) = ((left + width).min(bw), (top + height).min(bh));
        for y in y0..y1 {
            for x in x0..x1 {
                let at = buffer as usize + (y * stride + x * 4) as usize;
                if let Some(px) = self.memory.bytes_mut().get_mut(at..at + 4) {
                    px.copy_from_slice(&bgra);
                }
            }
        }
        true
    }

    fn bitmap_destroy(&mut self, bitmap: u32) {
        self.call(entry::BITMAP_DESTROY, bitmap);
        let in_render = self.objects.iter().any(|(_, o)| {
            matches!(o, Object::Page(p) if p.progressive.as_ref().is_some_and(|r| r.bitmap == bitmap))
        });
        if in_render {
            self.probe.violation(format!(
                "bitmap_destroy {bitmap} while an incremental render targets it"
            ));
        }
        if !matches!(self.remove(bitmap), Some(Object::Bitmap(_))) {
            self.probe
                .violation(format!("bitmap_destroy on invalid handle {bitmap}"));
        }
    }

    // ── Render ──────────────────────────────────────────────────

    fn render_page_bitmap(
        &mut self,
        bitmap: u32,
        page: u32,
        _start_x: i32,
        _start_y: i32,
        _size_x: i32,
        _size_y: i32,
        _rotate: i32,
        _flags: i32,
    ) {
        if !self.call(entry::RENDER_PAGE_BITMAP, page) {
            return;
        }
        if self.page(page).is_some_and(|p| p.progressive.is_some()) {
            self.probe.violation(format!(
                "render_page_bitmap on page {page} with an incremental render open"
            ));
        }
        if let Some(paint) = self.page(page).map(|p| p.model.paint) {
            self.paint(bitmap, paint);
        }
    }

    fn render_page_bitmap_start(
        &mut self,
        bitmap: u32,
        page: u32,
        _start_x: i32,
        _start_y: i32,
        _size_x: i32,
        _size_y: i32,
        _rotate: i32,
        _flags: i32,
    ) -> i32 {
        if !self.call(entry::RENDER_PAGE_BITMAP_START, page) {
            return render_status::FAILED;
        }
        let Some(state) = self.page_mut(page) else {
            return render_status::FAILED;
        };
        if state.progressive.is_some() {
            self.probe.violation(format!(
                "render_page_bitmap_start on page {page} with a render already open"
            ));
            return render_status::FAILED;
        }
        state.progressive = Some(Progressive {
            bitmap,
            continues: 0,
        });
        let (fail_on, done, paint) = (state.model.fail_on_step, state.model.done_on_start, state.model.paint);
        self.probe.opened(ObjectKind::ProgressiveRender);
        if fail_on == Some(0) {
            return render_status::FAILED;
        }
        if done {
            self.paint(bitmap, paint);
            return render_status::DONE;
        }
        render_status::TO_BE_CONTINUED
    }

    fn render_page_continue(&mut self, page: u32) -> i32 {
        if !self.call(entry::RENDER_PAGE_CONTINUE, page) {
            return render_status::FAILED;
        }
        let Some(state) = self.page_mut(page) else {
            return render_status::FAILED;
        };
        let Some(progress) = state.progressive.as_mut() else {
            self.probe.violation(format!(
                "render_page_continue on page {page} with no render open"
            ));
            return render_status::FAILED;
        };
        progress.continues += 1;
        let (step, bitmap) = (progress.continues, progress.bitmap);
        if state.model.fail_on_step == Some(step) {
            return render_status::FAILED;
        }
        if step > state.model.progressive_steps {
            let paint = state.model.paint;
            self.paint(bitmap, paint);
            return render_status::DONE;
        }
        render_status::TO_BE_CONTINUED
    }

    fn render_page_close(&mut self, page: u32) {
        self.call(entry::RENDER_PAGE_CLOSE, page);
        if let Some(state) = self.page_mut(page) {
            if state.progressive.take().is_some() {
                self.probe.closed(ObjectKind::ProgressiveRender);
            }
        }
    }

    // ── Annotations ─────────────────────────────────────────────

    fn page_get_annot_count(&mut self, page: u32) -> i32 {
        if !self.call(entry::PAGE_GET_ANNOT_COUNT, page) {
            return -1;
        }
        self.page(page).map_or(-1, |p| p.model.annotations.len() as i32)
    }

    fn page_get_annot(&mut self, page: u32, index: i32) -> u32 {
        if !self.call(entry::PAGE_GET_ANNOT, page) {
            return 0;
        }
        let Some(state) = self.page_mut(page) else {
            return 0;
        };
        let Some(model) = usize::try_from(index)
            .ok()
            .and_then(|i| state.model.annotations.get(i).cloned())
        else {
            return 0;
        };
        state.open_annots += 1;
        self.insert(Object::Annotation(AnnotState { page, model }))
    }

    fn page_close_annot(&mut self, annot: u32) {
        self.call(entry::PAGE_CLOSE_ANNOT, annot);
        match self.remove(annot) {
            Some(Object::Annotation(state)) => {
                if let Some(p) = self.page_mut(state.page) {
                    p.open_annots = p.open_annots.saturating_sub(1);
                }
            }
            _ => self
                .probe
                .violation(format!("page_close_annot on invalid handle {annot}")),
        }
    }

    fn annot_get_subtype(&mut self, annot: u32) -> i32 {
        self.call(entry::ANNOT_GET_SUBTYPE, annot);
        self.annot(annot).map_or(0, |a| a.model.subtype)
    }

    fn annot_get_rect(&mut self, annot: u32, rect: u32) -> bool {
        if !self.call(entry::ANNOT_GET_RECT, annot) {
            return false;
        }
        let Some(r) = self.annot(annot).map(|a| a.model.rect) else {
            return false;
        };
        self.write(rect, &rect_ltrb(r))
    }

    fn annot_get_color(
        &mut self,
        annot: u32,
        color_type: i32,
        r: u32,
        g: u32,
        b: u32,
        a: u32,
    ) -> bool {
        if !self.call(entry::ANNOT_GET_COLOR, annot) {
            return false;
        }
        let color = self.annot(annot).and_then(|s| match color_type {
            0 => s.model.color,
            1 => s.model.interior,
            _ => None,
        });
        let Some(color) = color else {
            return false;
        };
        self.write(r, &u32::from(color.r).to_le_bytes())
            && self.write(g, &u32::from(color.g).to_le_bytes())
            && self.write(b, &u32::from(color.b).to_le_bytes())
            && self.write(a, &u32::from(color.a).to_le_bytes())
    }

    // ── Page objects ────────────────────────────────────────────

    fn page_count_objects(&mut self, page: u32) -> i32 {
        if !self.call(entry::PAGE_COUNT_OBJECTS, page) {
            return -1;
        }
        self.page(page).map_or(-1, |p| p.model.objects.len() as i32)
    }

    fn page_get_object(&mut self, page: u32, index: i32) -> u32 {
        if !self.call(entry::PAGE_GET_OBJECT, page) {
            return 0;
        }
        let Ok(index) = usize::try_from(index) else {
            return 0;
        };
        if self.page(page).is_none_or(|p| index >= p.model.objects.len()) {
            return 0;
        }
        self.intern(InternKey::PageObject(page, index), || Object::PageObject {
            page,
            index,
        })
    }

    fn page_obj_get_type(&mut self, obj: u32) -> i32 {
        self.call(entry::PAGE_OBJ_GET_TYPE, obj);
        self.page_object(obj).map_or(0, |o| o.kind)
    }

    fn page_obj_get_bounds(
        &mut self,
        obj: u32,
        left: u32,
        bottom: u32,
        right: u32,
        top: u32,
    ) -> bool {
        if !self.call(entry::PAGE_OBJ_GET_BOUNDS, obj) {
            return false;
        }
        let Some(b) = self.page_object(obj).map(|o| o.bounds) else {
            return false;
        };
        self.write(left, &b.left.to_le_bytes())
            && self.write(bottom, &b.bottom.to_le_bytes())
            && self.write(right, &b.right.to_le_bytes())
            && self.write(top, &b.top.to_le_bytes())
    }

    // ── Fonts ───────────────────────────────────────────────────

    fn text_obj_get_font(&mut self, obj: u32) -> u32 {
        if !self.call(entry::TEXT_OBJ_GET_FONT, obj) {
            return 0;
        }
        let Some(Object::PageObject { page, index }) = self.objects.get(obj) else {
            return 0;
        };
        let (page, index) = (*page, *index);
        if self.page_object(obj).is_none_or(|o| o.font.is_none()) {
            return 0;
        }
        self.intern(InternKey::Font(page, index), || Object::Font {
            page,
            object: index,
        })
    }

    fn font_get_base_name(&mut self, font: u32, buffer: u32, buflen: u32) -> u32 {
        if !self.call(entry::FONT_GET_BASE_NAME, font) {
            return 0;
        }
        let Some(name) = self.font(font).map(|f| f.base_name.clone()) else {
            return 0;
        };
        let mut encoded = name.into_bytes();
        encoded.push(0);
        self.two_phase(&encoded, buffer, buflen)
    }

    fn font_get_weight(&mut self, font: u32) -> i32 {
        self.call(entry::FONT_GET_WEIGHT, font);
        self.font(font).map_or(-1, |f| f.weight)
    }

    fn font_get_is_embedded(&mut self, font: u32) -> i32 {
        self.call(entry::FONT_GET_IS_EMBEDDED, font);
        self.font(font).map_or(-1, |f| i32::from(f.embedded))
    }

    // ── Bookmarks ───────────────────────────────────────────────

    fn bookmark_get_first_child(&mut self, doc: u32, bookmark: u32) -> u32 {
        if !self.call(entry::BOOKMARK_GET_FIRST_CHILD, bookmark) {
            return 0;
        }
        let Some(model) = self.doc(doc).map(|d| Rc::clone(&d.model)) else {
            return 0;
        };
        let child = if bookmark == 0 {
            model.outline_root
        } else {
            self.bookmark_node(doc, bookmark)
                .and_then(|n| model.bookmarks.get(n)?.first_child)
        };
        match child.filter(|&n| n < model.bookmarks.len()) {
            Some(node) => self.intern(InternKey::Bookmark(doc, node), || Object::Bookmark {
                doc,
                node,
            }),
            None => 0,
        }
    }

    fn bookmark_get_next_sibling(&mut self, doc: u32, bookmark: u32) -> u32 {
        if !self.call(entry::BOOKMARK_GET_NEXT_SIBLING, bookmark) {
            return 0;
        }
        let Some(model) = self.doc(doc).map(|d| Rc::clone(&d.model)) else {
            return 0;
        };
        let sibling = self
            .bookmark_node(doc, bookmark)
            .and_then(|n| model.bookmarks.get(n)?.next_sibling);
        match sibling.filter(|&n| n < model.bookmarks.len()) {
            Some(node) => self.intern(InternKey::Bookmark(doc, node), || Object::Bookmark {
                doc,
                node,
            }),
            None => 0,
        }
    }

    fn bookmark_get_title(&mut self, bookmark: u32, buffer: u32, buflen: u32) -> u32 {
        if !self.call(entry::BOOKMARK_GET_TITLE, bookmark) {
            return 0;
        }
        let title = match self.objects.get(bookmark) {
            Some(Object::Bookmark { doc, node }) => self
                .doc(*doc)
                .and_then(|d| d.model.bookmarks.get(*node))
                .map(|b| b.title.clone()),
            _ => None,
        };
        match title {
            Some(title) => {
                let encoded = utf16_with_nul(&title);
                self.two_phase(&encoded, buffer, buflen)
            }
            None => 0,
        }
    }

    fn bookmark_get_dest(&mut self, doc: u32, bookmark: u32) -> u32 {
        if !self.call(entry::BOOKMARK_GET_DEST, bookmark) {
            return 0;
        }
        let Some(node) = self.bookmark_node(doc, bookmark) else {
            return 0;
        };
        let dest = self
            .doc(doc)
            .and_then(|d| d.model.bookmarks.get(node)?.dest_page);
        match dest {
            Some(page_index) => self.intern(InternKey::Dest(doc, node), || Object::Dest {
                doc,
                page_index,
            }),
            None => 0,
        }
    }

    fn dest_get_dest_page_index(&mut self, _doc: u32, dest: u32) -> i32 {
        self.call(entry::DEST_GET_DEST_PAGE_INDEX, dest);
        match self.objects.get(dest) {
            Some(Object::Dest { page_index, .. }) => *page_index,
            _ => -1,
        }
    }
}

fn utf16_with_nul(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

/// FS_RECTF layout: left, top, right, bottom.
fn rect_ltrb(r: Rect) -> Vec<u8> {
    [r.left, r.top, r.right, r.bottom]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FakePage;

    fn engine_with(doc: FakeDocument) -> FakeEngine {
        let mut engine = FakeEngine::new().with_document(b"doc".to_vec(), doc);
        engine.init_library();
        engine
    }

    fn load(engine: &mut FakeEngine) -> (u32, u32) {
        let data = engine.malloc(3);
        engine.bytes_mut()[data as usize..data as usize + 3].copy_from_slice(b"doc");
        let doc = engine.load_mem_document(data, 3, 0);
        assert_ne!(doc, 0);
        (doc, data)
    }

    #[test]
    fn unknown_bytes_fail_with_format_error() {
        let mut engine = engine_with(FakeDocument::with_pages(1));
        let data = engine.malloc(3);
        engine.bytes_mut()[data as usize..data as usize + 3].copy_from_slice(b"xyz");
        assert_eq!(engine.load_mem_document(data, 3, 0), 0);
        assert_eq!(engine.get_last_error(), ERR_FORMAT);
    }

    #[test]
    fn closing_document_with_open_page_is_a_violation() {
        let mut engine = engine_with(FakeDocument::with_pages(2));
        let probe = engine.probe();
        let (doc, _) = load(&mut engine);
        let page = engine.load_page(doc, 1);
        assert_ne!(page, 0);
        engine.close_document(doc);
        assert_eq!(probe.violations().len(), 1);
    }

    #[test]
    fn freeing_source_buffer_before_close_is_a_violation() {
        let mut engine = engine_with(FakeDocument::with_pages(1));
        let probe = engine.probe();
        let (doc, data) = load(&mut engine);
        engine.free(data);
        assert!(probe.violations()[0].contains("source buffer"));
        engine.close_document(doc);
    }

    #[test]
    fn double_free_is_a_violation() {
        let mut engine = FakeEngine::new();
        let probe = engine.probe();
        let p = engine.malloc(16);
        engine.free(p);
        engine.free(p);
        assert_eq!(probe.violations().len(), 1);
        assert_eq!(probe.live_mallocs(), 0);
    }

    #[test]
    fn progressive_steps_then_done() {
        let doc = FakeDocument::default().page(FakePage::default().progressive_steps(2));
        let mut engine = engine_with(doc);
        let (doc, _) = load(&mut engine);
        let page = engine.load_page(doc, 0);
        let buffer = engine.malloc(16);
        let bitmap = engine.bitmap_create_ex(2, 2, 4, buffer, 8);
        assert_eq!(
            engine.render_page_bitmap_start(bitmap, page, 0, 0, 2, 2, 0, 0),
            render_status::TO_BE_CONTINUED
        );
        assert_eq!(engine.render_page_continue(page), render_status::TO_BE_CONTINUED);
        assert_eq!(engine.render_page_continue(page), render_status::TO_BE_CONTINUED);
        assert_eq!(engine.render_page_continue(page), render_status::DONE);
        assert_eq!(
            &engine.bytes()[buffer as usize..buffer as usize + 4],
            &crate::model::DEFAULT_PAINT
        );
    }

    #[test]
    fn one_shot_render_during_incremental_render_is_a_violation() {
        let doc = FakeDocument::default().page(FakePage::default().progressive_steps(2));
        let mut engine = engine_with(doc);
        let probe = engine.probe();
        let (doc, _) = load(&mut engine);
        let page = engine.load_page(doc, 0);
        let buffer = engine.malloc(16);
        let bitmap = engine.bitmap_create_ex(2, 2, 4, buffer, 8);
        engine.render_page_bitmap_start(bitmap, page, 0, 0, 2, 2, 0, 0);
        engine.render_page_bitmap(bitmap, page, 0, 0, 2, 2, 0, 0);
        assert!(probe.violations()[0].contains("incremental render open"));

        engine.render_page_close(page);
        engine.render_page_bitmap(bitmap, page, 0, 0, 2, 2, 0, 0);
        assert_eq!(probe.violations().len(), 1);
    }

    #[test]
    fn search_is_case_insensitive_by_default() {
        let units: Vec<u16> = "Hello hello HELLO".encode_utf16().collect();
        let needle: Vec<u16> = "hello".encode_utf16().collect();
        assert_eq!(FakeEngine::find_matches(&units, &needle, 0).len(), 3);
        assert_eq!(
            FakeEngine::find_matches(&units, &needle, search_flags::MATCH_CASE),
            vec![(6, 5)]
        );
    }

    #[test]
    fn whole_word_search_skips_embedded_matches() {
        let units: Vec<u16> = "cat catalog cat".encode_utf16().collect();
        let needle: Vec<u16> = "cat".encode_utf16().collect();
        assert_eq!(
            FakeEngine::find_matches(&units, &needle, search_flags::MATCH_WHOLE_WORD),
            vec![(0, 3), (12, 3)]
        );
    }

    #[test]
    fn injected_fault_fails_once() {
        let mut engine = engine_with(FakeDocument::with_pages(1));
        let probe = engine.probe();
        let (doc, _) = load(&mut engine);
        probe.fail_next(entry::LOAD_PAGE);
        assert_eq!(engine.load_page(doc, 0), 0);
        assert_eq!(engine.get_last_error(), ERR_PAGE);
        assert_ne!(engine.load_page(doc, 0), 0);
    }
}
