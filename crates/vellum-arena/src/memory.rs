//! The engine-side allocator and byte region.

/// A flat, byte-addressable memory region with its own allocator.
///
/// Offsets are 32-bit, and `0` is the allocator's null/failure result. The
/// region may grow between calls, so slices obtained from
/// [`bytes`](Self::bytes) must not be held across a `malloc`.
pub trait FlatMemory {
    /// Reserve `size` bytes. Returns the start offset, or `0` on failure.
    fn malloc(&mut self, size: u32) -> u32;

    /// Return a range previously obtained from [`malloc`](Self::malloc).
    fn free(&mut self, ptr: u32);

    /// The whole region.
    fn bytes(&self) -> &[u8];

    /// The whole region, mutably.
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl<T: FlatMemory + ?Sized> FlatMemory for Box<T> {
    fn malloc(&mut self, size: u32) -> u32 {
        (**self).malloc(size)
    }

    fn free(&mut self, ptr: u32) {
        (**self).free(ptr)
    }

    fn bytes(&self) -> &[u8] {
        (**self).bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        (**self).bytes_mut()
    }
}
