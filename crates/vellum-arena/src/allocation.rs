//! Owned and scoped ranges of engine memory.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};
use vellum_core::ArenaError;

use crate::arena::Arena;
use crate::memory::FlatMemory;

/// Accessors shared by both allocation kinds. All offsets passed to these
/// methods are relative to the start of the allocation.
macro_rules! region_accessors {
    () => {
        /// Start offset in engine memory; the value passed to engine calls.
        pub fn offset(&self) -> u32 {
            self.offset
        }

        /// Length in bytes.
        pub fn len(&self) -> usize {
            self.len as usize
        }

        /// Always `false`: zero-sized allocations are rejected.
        pub fn is_empty(&self) -> bool {
            self.len == 0
        }

        /// Copy `data` to the start of the allocation.
        pub fn write(&self, data: &[u8]) -> Result<(), ArenaError> {
            self.arena.write(self.offset, 0, data, self.len)
        }

        /// Copy `data` to `at`.
        pub fn write_at(&self, at: usize, data: &[u8]) -> Result<(), ArenaError> {
            self.arena.write(self.offset, at, data, self.len)
        }

        /// Copy the whole allocation out.
        pub fn read(&self) -> Result<Vec<u8>, ArenaError> {
            self.arena.read(self.offset, 0, self.len as usize, self.len)
        }

        /// Copy `len` bytes starting at `at` out.
        pub fn read_at(&self, at: usize, len: usize) -> Result<Vec<u8>, ArenaError> {
            self.arena.read(self.offset, at, len, self.len)
        }

        /// Set every byte to `value`.
        pub fn fill(&self, value: u8) -> Result<(), ArenaError> {
            self.arena.fill(self.offset, self.len, value)
        }

        /// Little-endian `u32` at `at`.
        pub fn read_u32(&self, at: usize) -> Result<u32, ArenaError> {
            let bytes = self.read_at(at, 4)?;
            Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }

        /// Little-endian `i32` at `at`.
        pub fn read_i32(&self, at: usize) -> Result<i32, ArenaError> {
            self.read_u32(at).map(|v| v as i32)
        }

        /// Little-endian `f32` at `at`.
        pub fn read_f32(&self, at: usize) -> Result<f32, ArenaError> {
            self.read_u32(at).map(f32::from_bits)
        }

        /// Write a little-endian `u32` at `at`.
        pub fn write_u32(&self, at: usize, value: u32) -> Result<(), ArenaError> {
            self.write_at(at, &value.to_le_bytes())
        }
    };
}

/// A range owned by its handle.
///
/// Holds a strong reference to the arena, so it may outlive the scope that
/// created it (a document's source bytes, a progressive render's bitmap
/// buffer). [`free`](Self::free) is the expected path; dropping an unfreed
/// allocation frees it and logs.
pub struct Allocation<M: FlatMemory> {
    arena: Rc<Arena<M>>,
    offset: u32,
    len: u32,
    live: bool,
}

impl<M: FlatMemory> Allocation<M> {
    pub(crate) fn new(arena: Rc<Arena<M>>, offset: u32, len: u32) -> Self {
        Self {
            arena,
            offset,
            len,
            live: true,
        }
    }

    region_accessors!();

    /// Free the range. Consuming `self` makes a second free unrepresentable.
    pub fn free(mut self) {
        self.live = false;
        self.arena.release(self.offset);
    }
}

impl<M: FlatMemory> Drop for Allocation<M> {
    fn drop(&mut self) {
        if self.live {
            self.live = false;
            debug!(
                offset = self.offset,
                len = self.len,
                "allocation reclaimed on drop"
            );
            self.arena.release(self.offset);
        }
    }
}

impl<M: FlatMemory> fmt::Debug for Allocation<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// A range freed when the guard goes out of scope.
///
/// Used for every short-lived marshalling buffer: strings, out-parameter
/// structs, two-phase result buffers. Release happens on every exit path,
/// including `?` returns and unwinding.
pub struct ScopedAllocation<'a, M: FlatMemory> {
    arena: &'a Arena<M>,
    offset: u32,
    len: u32,
}

impl<'a, M: FlatMemory> ScopedAllocation<'a, M> {
    pub(crate) fn new(arena: &'a Arena<M>, offset: u32, len: u32) -> Self {
        Self { arena, offset, len }
    }

    region_accessors!();
}

impl<M: FlatMemory> Drop for ScopedAllocation<'_, M> {
    fn drop(&mut self) {
        trace!(offset = self.offset, "scoped allocation released");
        self.arena.release(self.offset);
    }
}

impl<M: FlatMemory> fmt::Debug for ScopedAllocation<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedAllocation")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::tests::arena;
    use vellum_core::ArenaError;

    #[test]
    fn scoped_releases_on_scope_exit() {
        let arena = arena(1024);
        {
            let s = arena.scoped(32).unwrap();
            s.write(b"hello").unwrap();
            assert_eq!(arena.stats().live_allocations, 1);
        }
        assert!(arena.stats().is_balanced());
    }

    #[test]
    fn scoped_releases_on_error_path() {
        fn fails(arena: &crate::Arena<crate::arena::tests::BumpMemory>) -> Result<(), ArenaError> {
            let s = arena.scoped(4)?;
            s.write(b"too long")?;
            Ok(())
        }
        let arena = arena(1024);
        assert!(matches!(fails(&arena), Err(ArenaError::OutOfBounds { .. })));
        assert!(arena.stats().is_balanced());
    }

    #[test]
    fn dropped_allocation_is_reclaimed_once() {
        let arena = arena(1024);
        let a = arena.alloc(10).unwrap();
        drop(a);
        assert!(arena.stats().is_balanced());
        assert_eq!(arena.memory().frees.len(), 1);
    }

    #[test]
    fn allocation_keeps_arena_alive() {
        let arena = arena(1024);
        let a = arena.alloc(10).unwrap();
        let weak = std::rc::Rc::downgrade(&arena);
        drop(arena);
        assert!(weak.upgrade().is_some());
        a.free();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn write_at_respects_allocation_bounds() {
        let arena = arena(1024);
        let s = arena.scoped(8).unwrap();
        assert!(s.write_at(4, &[1, 2, 3, 4]).is_ok());
        assert_eq!(
            s.write_at(6, &[1, 2, 3]),
            Err(ArenaError::OutOfBounds {
                offset: 6,
                len: 3,
                size: 8
            })
        );
        assert_eq!(s.read_at(4, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn little_endian_scalars() {
        let arena = arena(64);
        let s = arena.scoped(12).unwrap();
        s.write_u32(0, 0xDEAD_BEEF).unwrap();
        s.write_at(4, &(-7i32).to_le_bytes()).unwrap();
        s.write_at(8, &1.5f32.to_le_bytes()).unwrap();
        assert_eq!(s.read_u32(0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(s.read_i32(4).unwrap(), -7);
        assert_eq!(s.read_f32(8).unwrap(), 1.5);
    }

    #[test]
    fn fill_sets_every_byte() {
        let arena = arena(64);
        let s = arena.scoped(16).unwrap();
        s.fill(0xAB).unwrap();
        assert!(s.read().unwrap().iter().all(|&b| b == 0xAB));
    }

    mod proptests {
        use crate::arena::tests::arena;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn write_then_read_yields_identical_bytes(
                data in proptest::collection::vec(any::<u8>(), 1..512),
            ) {
                let arena = arena(4096);
                let a = arena.alloc(data.len()).unwrap();
                a.write(&data).unwrap();
                prop_assert_eq!(a.read().unwrap(), data);
                a.free();
                prop_assert!(arena.stats().is_balanced());
            }

            #[test]
            fn oom_leaves_prior_allocations_intact(
                first in proptest::collection::vec(any::<u8>(), 1..256),
                extra in 1usize..256,
            ) {
                let arena = arena(256);
                let held = arena.alloc(first.len()).unwrap();
                held.write(&first).unwrap();
                let remaining = 256 - first.len();
                let refused = arena.scoped((remaining + extra).min(256));
                let is_oom = matches!(refused, Err(vellum_core::ArenaError::OutOfMemory { .. }));
                prop_assert!(is_oom);
                prop_assert_eq!(held.read().unwrap(), first);
                prop_assert_eq!(arena.stats().live_allocations, 1);
            }
        }
    }
}
