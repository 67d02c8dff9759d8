//! Text extraction and search over a page's text index.

use tracing::trace;
use vellum_core::{DisposableHandle, Result, SearchHandle};
use vellum_engine::entry;
use vellum_engine::status::search_flags;

use crate::marshal;
use crate::page::PageCore;

/// Search behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Case-sensitive comparison.
    pub match_case: bool,
    /// Only matches bounded by non-word characters.
    pub whole_word: bool,
    /// Report overlapping matches.
    pub consecutive: bool,
}

impl SearchOptions {
    /// The engine's flag bits.
    pub fn flags(self) -> u32 {
        let mut flags = 0;
        if self.match_case {
            flags |= search_flags::MATCH_CASE;
        }
        if self.whole_word {
            flags |= search_flags::MATCH_WHOLE_WORD;
        }
        if self.consecutive {
            flags |= search_flags::CONSECUTIVE;
        }
        flags
    }
}

/// One search hit, in text-index characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextMatch {
    /// Index of the first character.
    pub start: usize,
    /// Number of characters.
    pub len: usize,
}

pub(crate) fn char_count(page: &PageCore) -> Result<usize> {
    let text = page.text_page()?;
    let rt = page.runtime();
    let count = rt.call(|e| e.text_count_chars(text.raw()));
    usize::try_from(count).map_err(|_| rt.failure(entry::TEXT_COUNT_CHARS))
}

pub(crate) fn extract(page: &PageCore) -> Result<String> {
    let count = char_count(page)?;
    if count == 0 {
        return Ok(String::new());
    }
    let text = page.text_page()?;
    let rt = page.runtime();
    // UTF-16 units plus the terminator.
    let buffer = rt.arena().scoped((count + 1) * 2)?;
    let written = rt.call(|e| e.text_get_text(text.raw(), 0, count as i32, buffer.offset()));
    let units = usize::try_from(written)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| rt.failure(entry::TEXT_GET_TEXT))?;
    let bytes = buffer.read_at(0, units.min(count + 1) * 2)?;
    Ok(marshal::decode_wide(&bytes))
}

pub(crate) fn search(page: &PageCore, query: &str, options: SearchOptions) -> Result<Vec<TextMatch>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let text = page.text_page()?;
    let rt = page.runtime();
    let pattern = rt.arena().scoped_bytes(&marshal::wide_string(query))?;
    let raw = rt.call(|e| e.text_find_start(text.raw(), pattern.offset(), options.flags(), 0));
    let handle = SearchHandle::from_raw(raw).ok_or_else(|| rt.failure(entry::TEXT_FIND_START))?;
    let owner = page.shared_runtime();
    let search = DisposableHandle::new("search", move || {
        owner.call(|e| e.text_find_close(handle.raw()));
    })
    .with_safety_net();

    let matches = rt.call(|e| {
        let mut matches = Vec::new();
        while e.text_find_next(handle.raw()) {
            let start = e.text_get_sch_result_index(handle.raw());
            let len = e.text_get_sch_count(handle.raw());
            if let (Ok(start), Ok(len)) = (usize::try_from(start), usize::try_from(len)) {
                matches.push(TextMatch { start, len });
            }
        }
        matches
    });
    search.dispose();
    trace!(page = %page.handle(), query, hits = matches.len(), "search finished");
    Ok(matches)
}
