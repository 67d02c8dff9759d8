//! Scoped allocations inside a foreign engine's flat memory.
//!
//! The engine owns one contiguous byte region and its own allocator. Every
//! string, out-parameter struct and bitmap buffer this layer hands across
//! the boundary lives in that region, where the host cannot see it. The
//! arena puts a ledger in front of the engine allocator so every range is
//! freed exactly once, on every exit path.
//!
//! # Architecture
//!
//! ```text
//! Rc<Arena<M: FlatMemory>>
//! ├── RefCell<M>             engine allocator + byte region
//! ├── RefCell<Ledger>        offset → len for every live range, stats
//! └── ArenaConfig            budget and per-request ceiling
//!
//! Allocation<M>              owns an Rc<Arena>; long-lived (document bytes,
//!                            bitmap buffers); freed explicitly or on drop
//! ScopedAllocation<'a, M>    borrows &Arena; marshalling scratch; freed on
//!                            scope exit, including `?` early returns
//! ```
//!
//! The arena is single-threaded by construction (`Rc`, `RefCell`). Work that
//! needs parallelism runs one arena and engine per thread.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocation;
pub mod arena;
pub mod config;
pub mod memory;
pub mod stats;

pub use allocation::{Allocation, ScopedAllocation};
pub use arena::Arena;
pub use config::ArenaConfig;
pub use memory::FlatMemory;
pub use stats::ArenaStats;
