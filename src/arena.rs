use std::ptr;

use crate::{
  align::page_align,
  block::{BLOCK_ALIGN, BLOCK_OVERHEAD, Block},
  error::AllocError,
  logging::heap_log,
  page::PageSource,
};

/// Size of the header at the start of every arena.
pub(crate) const ARENA_OVERHEAD: usize = size_of::<Arena>();

/// Header written at the start of every region taken from the page source.
///
/// ```text
///   ┌───────┬────────┬─────────────────────────────────────────┐
///   │ Arena │ Block  │                                         │
///   └───────┴────────┴─────────────────────────────────────────┘
///   |------------------------- size ---------------------------|
/// ```
#[repr(C)]
pub(crate) struct Arena {
  pub next: *mut Arena,
  pub size: usize,
}

impl Arena {
  /// Where the arena's initial block header lives.
  ///
  /// # Safety
  ///
  /// `arena` must point to a live arena header.
  pub unsafe fn first_block(arena: *mut Arena) -> *mut Block {
    unsafe { (arena as *mut u8).add(ARENA_OVERHEAD) as *mut Block }
  }
}

/// Arenas in creation order, with a cached tail for O(1) appends.
pub(crate) struct ArenaList {
  first: *mut Arena,
  last: *mut Arena,
  len: usize,
}

impl ArenaList {
  pub const fn new() -> Self {
    Self {
      first: ptr::null_mut(),
      last: ptr::null_mut(),
      len: 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.first.is_null()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Maps a new arena of at least `min_size` bytes and appends it.
  ///
  /// Panics if `min_size` cannot hold an arena header plus one block header.
  ///
  /// # Safety
  ///
  /// `source` must be the same source for every call on this list.
  pub unsafe fn acquire<S: PageSource>(
    &mut self,
    source: &mut S,
    min_size: usize,
  ) -> Result<*mut Arena, AllocError> {
    assert!(
      min_size > ARENA_OVERHEAD + BLOCK_OVERHEAD,
      "arena of {min_size} bytes cannot hold its own metadata"
    );

    let out_of_memory = AllocError::OutOfMemory {
      requested: min_size,
    };

    let size = page_align(min_size, source.granularity()).ok_or(out_of_memory)?;
    let Some(region) = source.request(size) else {
      heap_log!(warn, "page source exhausted, {} bytes requested", size);
      return Err(out_of_memory);
    };

    let base = region.base().as_ptr();
    debug_assert_eq!(base as usize % BLOCK_ALIGN, 0);

    // Keep the arena end on a header boundary.
    let size = region.len() & !(BLOCK_ALIGN - 1);
    debug_assert!(size >= min_size);

    let arena = base as *mut Arena;
    unsafe {
      ptr::write(
        arena,
        Arena {
          next: ptr::null_mut(),
          size,
        },
      );

      if self.first.is_null() {
        self.first = arena;
      } else {
        (*self.last).next = arena;
      }
    }
    self.last = arena;
    self.len += 1;

    heap_log!(
      debug,
      "acquired arena #{} at {:?}, {} bytes",
      self.len,
      arena,
      size
    );

    Ok(arena)
  }

  pub fn iter(&self) -> Arenas {
    Arenas {
      current: self.first,
    }
  }
}

pub(crate) struct Arenas {
  current: *mut Arena,
}

impl Iterator for Arenas {
  type Item = *mut Arena;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    let arena = self.current;
    // SAFETY: arenas are never unmapped.
    self.current = unsafe { (*arena).next };
    Some(arena)
  }
}
