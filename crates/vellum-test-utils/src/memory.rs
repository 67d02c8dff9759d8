//! First-fit allocator over a growable byte vector.

use std::collections::BTreeMap;

const ALIGN: u32 = 8;

/// Flat memory for the fake engine. Offsets below [`ALIGN`] are never handed
/// out, so `0` stays the null result.
pub(crate) struct FakeMemory {
    bytes: Vec<u8>,
    blocks: BTreeMap<u32, u32>,
    limit: usize,
}

impl FakeMemory {
    pub fn new(initial: usize, limit: usize) -> Self {
        Self {
            bytes: vec![0; initial.max(ALIGN as usize)],
            blocks: BTreeMap::new(),
            limit,
        }
    }

    pub fn malloc(&mut self, size: u32) -> u32 {
        if size == 0 {
            return 0;
        }
        let mut cursor = ALIGN;
        for (&start, &len) in &self.blocks {
            if start.saturating_sub(cursor) >= size {
                break;
            }
            cursor = (start + len).next_multiple_of(ALIGN);
        }
        let end = cursor as usize + size as usize;
        if end > self.limit {
            return 0;
        }
        if end > self.bytes.len() {
            let grown = end.max(self.bytes.len() * 2).min(self.limit);
            self.bytes.resize(grown, 0);
        }
        self.blocks.insert(cursor, size);
        cursor
    }

    /// Returns the freed length, or `None` if `ptr` was not allocated.
    pub fn free(&mut self, ptr: u32) -> Option<u32> {
        self.blocks.remove(&ptr)
    }

    /// Whether `ptr..ptr+len` lies inside one live block.
    pub fn contains(&self, ptr: u32, len: usize) -> bool {
        self.blocks
            .range(..=ptr)
            .next_back()
            .is_some_and(|(&start, &size)| ptr as usize + len <= start as usize + size as usize)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn slice(&self, ptr: u32, len: usize) -> Option<&[u8]> {
        self.bytes.get(ptr as usize..ptr as usize + len)
    }

    pub fn slice_mut(&mut self, ptr: u32, len: usize) -> Option<&mut [u8]> {
        self.bytes.get_mut(ptr as usize..ptr as usize + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_reuses_freed_gap() {
        let mut mem = FakeMemory::new(64, 4096);
        let a = mem.malloc(16);
        let b = mem.malloc(16);
        let c = mem.malloc(16);
        assert!(a != 0 && b > a && c > b);
        mem.free(b);
        assert_eq!(mem.malloc(8), b);
    }

    #[test]
    fn grows_up_to_limit() {
        let mut mem = FakeMemory::new(16, 256);
        assert_ne!(mem.malloc(200), 0);
        assert!(mem.bytes().len() >= 208);
        assert_eq!(mem.malloc(100), 0);
    }

    #[test]
    fn unknown_free_reports_none() {
        let mut mem = FakeMemory::new(16, 256);
        let a = mem.malloc(4);
        assert_eq!(mem.free(a), Some(4));
        assert_eq!(mem.free(a), None);
    }

    #[test]
    fn contains_checks_block_extent() {
        let mut mem = FakeMemory::new(16, 256);
        let a = mem.malloc(32);
        assert!(mem.contains(a, 32));
        assert!(mem.contains(a + 8, 24));
        assert!(!mem.contains(a, 33));
        assert!(!mem.contains(4, 1));
    }
}
