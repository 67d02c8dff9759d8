//! The arena: a ledger in front of the engine's allocator.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{trace, warn};
use vellum_core::{ArenaError, ConfigError};

use crate::allocation::{Allocation, ScopedAllocation};
use crate::config::ArenaConfig;
use crate::memory::FlatMemory;
use crate::stats::ArenaStats;

/// Live ranges keyed by start offset.
#[derive(Default)]
struct Ledger {
    live: IndexMap<u32, u32>,
    stats: ArenaStats,
}

/// Owns the engine memory and tracks every range handed out from it.
///
/// Ranges are requested through [`alloc`](Arena::alloc) (owned, long-lived)
/// or [`scoped`](Arena::scoped) (borrowed, freed at scope exit). Freeing a
/// range that is not in the ledger is logged and ignored, so a range can
/// never reach the engine's `free` twice.
///
/// The engine memory is also reachable through [`memory_mut`](Arena::memory_mut)
/// for making engine calls. No allocation may be requested or freed while
/// that borrow is held.
pub struct Arena<M: FlatMemory> {
    memory: RefCell<M>,
    ledger: RefCell<Ledger>,
    config: ArenaConfig,
}

impl<M: FlatMemory> Arena<M> {
    /// Wrap `memory` after validating `config`.
    pub fn new(memory: M, config: ArenaConfig) -> Result<Rc<Self>, ConfigError> {
        config.validate()?;
        Ok(Rc::new(Self {
            memory: RefCell::new(memory),
            ledger: RefCell::new(Ledger::default()),
            config,
        }))
    }

    /// Allocate `size` bytes owned by the returned handle.
    ///
    /// The handle keeps the arena alive. Prefer [`Allocation::free`]; dropping
    /// an unfreed handle frees the range as a fallback.
    pub fn alloc(self: &Rc<Self>, size: usize) -> Result<Allocation<M>, ArenaError> {
        let (offset, len) = self.reserve(size)?;
        Ok(Allocation::new(Rc::clone(self), offset, len))
    }

    /// Allocate `size` bytes freed when the returned guard goes out of scope.
    pub fn scoped(&self, size: usize) -> Result<ScopedAllocation<'_, M>, ArenaError> {
        let (offset, len) = self.reserve(size)?;
        Ok(ScopedAllocation::new(self, offset, len))
    }

    /// Scoped allocation initialised with `bytes`.
    pub fn scoped_bytes(&self, bytes: &[u8]) -> Result<ScopedAllocation<'_, M>, ArenaError> {
        let scratch = self.scoped(bytes.len())?;
        scratch.write(bytes)?;
        Ok(scratch)
    }

    /// Shared access to the engine memory.
    pub fn memory(&self) -> Ref<'_, M> {
        self.memory.borrow()
    }

    /// Exclusive access to the engine memory, for making engine calls.
    pub fn memory_mut(&self) -> RefMut<'_, M> {
        self.memory.borrow_mut()
    }

    /// [`memory_mut`](Arena::memory_mut), or `None` if the memory is already
    /// borrowed.
    pub fn try_memory_mut(&self) -> Option<RefMut<'_, M>> {
        self.memory.try_borrow_mut().ok()
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Usage counters.
    pub fn stats(&self) -> ArenaStats {
        self.ledger.borrow().stats
    }

    /// Bytes still available under the budget.
    pub fn available(&self) -> usize {
        self.config
            .capacity_bytes
            .saturating_sub(self.ledger.borrow().stats.live_bytes)
    }

    /// Whether `offset` is the start of a live range.
    pub fn is_live(&self, offset: u32) -> bool {
        self.ledger.borrow().live.contains_key(&offset)
    }

    fn reserve(&self, size: usize) -> Result<(u32, u32), ArenaError> {
        let result = self.try_reserve(size);
        if result.is_err() {
            self.ledger.borrow_mut().stats.failed_allocations += 1;
        }
        result
    }

    fn try_reserve(&self, size: usize) -> Result<(u32, u32), ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroSized);
        }
        if size > self.config.max_allocation_bytes {
            return Err(ArenaError::TooLarge {
                requested: size,
                limit: self.config.max_allocation_bytes,
            });
        }
        let available = self.available();
        if size > available {
            return Err(ArenaError::OutOfMemory {
                requested: size,
                available,
            });
        }
        let len = u32::try_from(size).map_err(|_| ArenaError::TooLarge {
            requested: size,
            limit: u32::MAX as usize,
        })?;

        let mut memory = self.memory.borrow_mut();
        let offset = memory.malloc(len);
        if offset == 0 {
            return Err(ArenaError::OutOfMemory {
                requested: size,
                available,
            });
        }
        let region = memory.bytes().len();
        if (offset as usize).saturating_add(size) > region {
            memory.free(offset);
            return Err(ArenaError::OutOfBounds {
                offset: offset as usize,
                len: size,
                size: region,
            });
        }
        drop(memory);

        let mut ledger = self.ledger.borrow_mut();
        ledger.live.insert(offset, len);
        let stats = &mut ledger.stats;
        stats.allocations += 1;
        stats.live_allocations += 1;
        stats.live_bytes += size;
        stats.peak_bytes = stats.peak_bytes.max(stats.live_bytes);
        trace!(offset, len, live_bytes = stats.live_bytes, "arena alloc");
        Ok((offset, len))
    }

    /// Return a range to the engine. Returns `false` if the range was not live.
    pub(crate) fn release(&self, offset: u32) -> bool {
        let Some(len) = self.ledger.borrow_mut().live.swap_remove(&offset) else {
            warn!(offset, "free of a range that is not live; ignored");
            return false;
        };
        let busy = self.memory.try_borrow_mut().map(|mut memory| memory.free(offset)).is_err();
        debug_assert!(!busy, "engine memory busy during free of offset {offset}");
        if busy {
            // The range stays reserved engine-side but is dropped from the budget.
            warn!(offset, len, "engine memory busy during free; range leaked");
        }
        let mut ledger = self.ledger.borrow_mut();
        let stats = &mut ledger.stats;
        stats.frees += 1;
        stats.live_allocations -= 1;
        stats.live_bytes -= len as usize;
        trace!(offset, len, live_bytes = stats.live_bytes, "arena free");
        true
    }

    pub(crate) fn read(&self, offset: u32, at: usize, len: usize, span: u32) -> Result<Vec<u8>, ArenaError> {
        let range = self.checked_range(offset, at, len, span)?;
        Ok(self.memory.borrow().bytes()[range].to_vec())
    }

    pub(crate) fn write(&self, offset: u32, at: usize, data: &[u8], span: u32) -> Result<(), ArenaError> {
        let range = self.checked_range(offset, at, data.len(), span)?;
        self.memory.borrow_mut().bytes_mut()[range].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn fill(&self, offset: u32, span: u32, value: u8) -> Result<(), ArenaError> {
        let range = self.checked_range(offset, 0, span as usize, span)?;
        self.memory.borrow_mut().bytes_mut()[range].fill(value);
        Ok(())
    }

    /// Bounds-check `at..at+len` within an allocation, then within the region.
    fn checked_range(
        &self,
        offset: u32,
        at: usize,
        len: usize,
        span: u32,
    ) -> Result<std::ops::Range<usize>, ArenaError> {
        let end = at.checked_add(len).ok_or(ArenaError::OutOfBounds {
            offset: at,
            len,
            size: span as usize,
        })?;
        if end > span as usize {
            return Err(ArenaError::OutOfBounds {
                offset: at,
                len,
                size: span as usize,
            });
        }
        let start = offset as usize + at;
        let region = self.memory.borrow().bytes().len();
        if start + len > region {
            return Err(ArenaError::OutOfBounds {
                offset: start,
                len,
                size: region,
            });
        }
        Ok(start..start + len)
    }
}
