//! Document outline.

use std::collections::HashSet;

use tracing::{debug, trace};
use vellum_core::{BookmarkHandle, DestHandle, DocumentHandle, Error, Result};

use crate::library::Runtime;
use crate::marshal;

/// One outline entry and its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    /// Display title, if it has one.
    pub title: Option<String>,
    /// Target page, if the entry points inside the document.
    pub page_index: Option<usize>,
    /// Nested entries, in outline order.
    pub children: Vec<Bookmark>,
}

impl Bookmark {
    /// This entry plus every descendant.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Bookmark::node_count).sum::<usize>()
    }

    /// Depth-first search by exact title.
    pub fn find(&self, title: &str) -> Option<&Bookmark> {
        if self.title.as_deref() == Some(title) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(title))
    }
}

/// Walk the outline of `doc`, rejecting trees nested deeper than `limit`.
///
/// Engine bookmark handles are stable per node, so a handle seen twice
/// means the outline loops back on itself. The walk stops that branch
/// there instead of following it.
pub(crate) fn read_outline(rt: &Runtime, doc: DocumentHandle, limit: usize) -> Result<Vec<Bookmark>> {
    let mut walk = OutlineWalk {
        rt,
        doc: doc.raw(),
        limit,
        seen: HashSet::new(),
    };
    let outline = walk.children_of(0, 1)?;
    trace!(document = %doc, nodes = walk.seen.len(), "outline read");
    Ok(outline)
}

struct OutlineWalk<'a> {
    rt: &'a Runtime,
    doc: u32,
    limit: usize,
    seen: HashSet<u32>,
}

impl OutlineWalk<'_> {
    fn children_of(&mut self, parent: u32, depth: usize) -> Result<Vec<Bookmark>> {
        let doc = self.doc;
        let mut current = BookmarkHandle::from_raw(self.rt.call(|e| e.bookmark_get_first_child(doc, parent)));
        if current.is_some() && depth > self.limit {
            return Err(Error::DepthLimitExceeded { limit: self.limit });
        }
        let mut nodes = Vec::new();
        while let Some(node) = current {
            if !self.seen.insert(node.raw()) {
                debug!(bookmark = %node, depth, "outline cycle; branch cut");
                break;
            }
            let title = marshal::read_wide(self.rt, |e, buffer, len| {
                e.bookmark_get_title(node.raw(), buffer, len)
            })?;
            let page_index = self.destination(node);
            let children = self.children_of(node.raw(), depth + 1)?;
            nodes.push(Bookmark {
                title,
                page_index,
                children,
            });
            current = BookmarkHandle::from_raw(self.rt.call(|e| e.bookmark_get_next_sibling(doc, node.raw())));
        }
        Ok(nodes)
    }

    fn destination(&self, node: BookmarkHandle) -> Option<usize> {
        let doc = self.doc;
        let dest = DestHandle::from_raw(self.rt.call(|e| e.bookmark_get_dest(doc, node.raw())))?;
        let index = self.rt.call(|e| e.dest_get_dest_page_index(doc, dest.raw()));
        usize::try_from(index).ok()
    }
}
