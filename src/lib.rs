//! # rarena - A First-Fit Arena Heap
//!
//! This crate provides a general purpose **first-fit heap** that carves
//! variable-sized blocks out of large arenas mapped with `mmap(2)`.
//!
//! ## Overview
//!
//! Memory is requested from a [`PageSource`] in big, page-aligned arenas.
//! Each arena is divided into blocks, and every block of every arena is
//! chained into one circular list:
//!
//! ```text
//!   Arena list (creation order):
//!
//!   ┌─────────────────────────────────────┐     ┌──────────────────────────┐
//!   │ Arena │ B0 used │ B1 free │ B2 used │ ──► │ Arena │ B3 free          │
//!   └─────────────────────────────────────┘     └──────────────────────────┘
//!
//!   Block list (circular, anchor B0, searched from B3 round to B0):
//!
//!        ┌──► B0 ──► B3 ──► B1 ──► B2 ──┐
//!        └──────────────────────────────┘
//! ```
//!
//! A new arena's first block is linked in after the previous arena's first
//! block, so the list order across arenas need not follow addresses. Inside
//! one arena, list order and address order always agree.
//!
//! ## Crate Structure
//!
//! ```text
//!   rarena
//!   ├── align      - Alignment helpers (align!, page_align)
//!   ├── page       - PageSource trait, mmap source, byte budget
//!   ├── arena      - Arena headers and the arena list (internal)
//!   ├── block      - Block headers and the circular block list (internal)
//!   ├── span       - Pure split/merge arithmetic (internal)
//!   ├── heap       - Heap state and first-fit allocation
//!   ├── dealloc    - Release and coalescing
//!   ├── realloc    - In-place and relocating resize
//!   ├── stats      - Accounting and integrity checks
//!   ├── locked     - Spin-locked GlobalAlloc wrapper
//!   └── config     - HeapConfig and environment overrides
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rarena::{Heap, MmapPageSource};
//!
//! let mut heap = Heap::new(MmapPageSource::new());
//!
//! let ptr = heap.allocate(64).unwrap();
//! unsafe {
//!     ptr.as_ptr().write_bytes(0xAB, 64);
//!
//!     let ptr = heap.resize(ptr, 128).unwrap();
//!     assert_eq!(*ptr.as_ptr(), 0xAB);
//!
//!     heap.release(ptr);
//! }
//!
//! assert!(heap.check().is_ok());
//! ```
//!
//! ## How It Works
//!
//! Each block starts with a header. The pointer handed to the caller is the
//! first byte after it:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ next: ptr       │  │  ┌──────────────────────────┐  │
//!   │  │ capacity: N     │  │  │  requested bytes │ slack │  │
//!   │  │ requested: R    │  │  └──────────────────────────┘  │
//!   │  └─────────────────┘  │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! `requested == 0` marks a free block.
//!
//! - **allocate**: the first free block with enough capacity is taken,
//!   walking from the anchor's successor and checking the anchor last. If
//!   the leftover can hold another header plus at least one byte, it is
//!   split off as a new free block. Otherwise a new arena is mapped.
//! - **release**: the block is marked free and merged with its free,
//!   physically adjacent list neighbours.
//! - **resize**: shrinks in place, grows into a free neighbour, or moves to
//!   a new block and copies.
//!
//! ## Limitations
//!
//! - **Single-threaded core**: [`Heap`] needs `&mut self`; use
//!   [`LockedHeap`] to share it
//! - **Memory is never returned**: arenas live until the process exits
//! - **Word alignment**: [`Heap`] payloads are word aligned; [`LockedHeap`]
//!   serves larger alignments by over-allocating
//! - **Unix-only**: requires `libc` and `mmap`
//!
//! ## Safety
//!
//! Allocation is safe. Release and resize take raw pointers and are
//! `unsafe`: passing a pointer that is not live corrupts the heap.
//! [`Heap::try_release`] and [`Heap::check`] detect such misuse at a cost.

pub mod align;
mod arena;
mod block;
mod config;
mod dealloc;
mod error;
mod heap;
mod locked;
mod logging;
mod page;
mod realloc;
mod span;
mod stats;

pub use config::{GRANULARITY_VAR, HeapConfig, LIMIT_VAR};
pub use error::{AllocError, ConfigError};
pub use heap::{BlockInfo, Heap};
pub use locked::LockedHeap;
pub use page::{Bounded, DEFAULT_GRANULARITY, MmapPageSource, PageSource, Region};
pub use stats::HeapStats;

/// Bytes of metadata in front of every payload.
pub const BLOCK_OVERHEAD: usize = block::BLOCK_OVERHEAD;

/// Bytes of metadata at the start of every arena.
pub const ARENA_OVERHEAD: usize = arena::ARENA_OVERHEAD;
