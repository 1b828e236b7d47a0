use std::ptr::{self, NonNull};

use crate::{
  arena::{ARENA_OVERHEAD, Arena},
  span::Span,
};

/// `requested` value of a block nobody owns.
pub(crate) const FREE: usize = 0;

/// Size of the header in front of every payload.
pub(crate) const BLOCK_OVERHEAD: usize = size_of::<Block>();

/// Alignment of every header, and therefore of every payload.
pub(crate) const BLOCK_ALIGN: usize = align_of::<Block>();

/// Header stored immediately before the bytes it describes.
///
/// Blocks of all arenas are chained into a single circular list through
/// `next`.
#[repr(C)]
pub(crate) struct Block {
  pub next: *mut Block,
  pub capacity: usize,
  pub requested: usize,
}

impl Block {
  pub fn new(
    next: *mut Block,
    capacity: usize,
  ) -> Self {
    Self {
      next,
      capacity,
      requested: FREE,
    }
  }

  pub fn is_free(&self) -> bool {
    self.requested == FREE
  }

  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn span(block: *const Block) -> Span {
    Span::new(block as usize, unsafe { (*block).capacity })
  }

  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn payload(block: *mut Block) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked((block as *mut u8).add(BLOCK_OVERHEAD)) }
  }

  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`].
  pub unsafe fn from_payload(payload: NonNull<u8>) -> *mut Block {
    unsafe { payload.as_ptr().sub(BLOCK_OVERHEAD) as *mut Block }
  }
}

/// The global circular list of block headers.
///
/// `anchor` is the first block ever registered and the starting point of
/// every search. `cursor` is the arena-initial block registered last; the
/// next arena's initial block is spliced in right after it, which is not
/// necessarily the tail of the list once earlier arenas have been split.
pub(crate) struct BlockList {
  anchor: *mut Block,
  cursor: *mut Block,
}

impl BlockList {
  pub const fn new() -> Self {
    Self {
      anchor: ptr::null_mut(),
      cursor: ptr::null_mut(),
    }
  }

  pub fn anchor(&self) -> *mut Block {
    self.anchor
  }

  /// Turns the whole usable part of `arena` into one free block.
  ///
  /// # Safety
  ///
  /// `arena` must be a freshly acquired arena with no blocks in it.
  pub unsafe fn register_initial(
    &mut self,
    arena: *mut Arena,
  ) -> *mut Block {
    unsafe {
      let block = Arena::first_block(arena);
      let capacity = (*arena).size - ARENA_OVERHEAD - BLOCK_OVERHEAD;
      debug_assert!(capacity > 0);

      if self.cursor.is_null() {
        ptr::write(block, Block::new(block, capacity));
        self.anchor = block;
      } else {
        ptr::write(block, Block::new((*self.cursor).next, capacity));
        (*self.cursor).next = block;
      }

      self.cursor = block;
      block
    }
  }

  /// First free block that holds `size` bytes, walking the list from the
  /// anchor's successor round to the anchor itself, which is checked last.
  /// Null when there is none.
  pub unsafe fn first_fit(
    &self,
    size: usize,
  ) -> *mut Block {
    unsafe {
      if self.anchor.is_null() {
        return ptr::null_mut();
      }

      let mut current = self.anchor;
      loop {
        current = (*current).next;
        if (*current).is_free() && (*current).capacity >= size {
          return current;
        }

        if current == self.anchor {
          return ptr::null_mut();
        }
      }
    }
  }

  /// # Safety
  ///
  /// `block` must be free and listed.
  pub unsafe fn should_split(
    block: *mut Block,
    size: usize,
  ) -> bool {
    unsafe {
      debug_assert!((*block).is_free());
      Block::span(block).can_split(size)
    }
  }

  /// Carves `size` bytes (word aligned) off the front of `block` and links
  /// the remainder in as a new free block right after it.
  ///
  /// ```text
  ///   Before:        |---- capacity ----------|
  ///   ─────┬──────┬──────────────────────────┬─────
  ///        │Header│..........................│
  ///   ─────┴──────┴──────────────────────────┴─────
  ///
  ///   After:         |- size -|
  ///   ─────┬──────┬──────────┬──────┬────────┬─────
  ///        │Header│..........│Header│........│
  ///   ─────┴──────┴──────────┴──────┴────────┴─────
  ///           └──── next ────┘  └── next ───►
  /// ```
  ///
  /// # Safety
  ///
  /// `block` must be listed and [`BlockList::should_split`] must hold.
  pub unsafe fn split(
    block: *mut Block,
    size: usize,
  ) -> *mut Block {
    unsafe {
      let Some((left, right)) = Block::span(block).split(size) else {
        unreachable!("split of a block that cannot hold another header");
      };

      let right_block = right.start as *mut Block;
      ptr::write(right_block, Block::new((*block).next, right.capacity));

      (*block).next = right_block;
      (*block).capacity = left.capacity;

      right_block
    }
  }

  /// Whether `left` and `right` are both free and touch in memory.
  ///
  /// # Safety
  ///
  /// `right` must be `left`'s list successor and distinct from it.
  pub unsafe fn can_merge(
    left: *mut Block,
    right: *mut Block,
  ) -> bool {
    unsafe {
      debug_assert!((*left).next == right);
      debug_assert!(left != right);

      (*left).is_free() && (*right).is_free() && Block::span(left).is_adjacent(&Block::span(right))
    }
  }

  /// Absorbs `right` into `left`. `right`'s header stops being reachable.
  ///
  /// # Safety
  ///
  /// `right` must be `left`'s list successor and physically adjacent to it.
  /// `right` must not be the anchor or the cursor.
  pub unsafe fn merge(
    &mut self,
    left: *mut Block,
    right: *mut Block,
  ) {
    debug_assert!(right != self.anchor && right != self.cursor);

    unsafe {
      debug_assert!((*left).next == right);

      let Some(merged) = Span::merge(Block::span(left), Block::span(right)) else {
        unreachable!("merge of blocks that are not adjacent");
      };

      (*left).next = (*right).next;
      (*left).capacity = merged.capacity;
    }
  }

  /// The block whose `next` is `block`; `block` itself when it is alone.
  ///
  /// # Safety
  ///
  /// `block` must be listed.
  pub unsafe fn predecessor_of(
    &self,
    block: *mut Block,
  ) -> *mut Block {
    unsafe {
      let mut current = block;
      while (*current).next != block {
        current = (*current).next;
      }
      current
    }
  }

  /// Walks the list once, starting at the anchor.
  pub fn iter(&self) -> Blocks<'_> {
    Blocks {
      list: self,
      current: self.anchor,
    }
  }
}

pub(crate) struct Blocks<'a> {
  list: &'a BlockList,
  current: *mut Block,
}

impl Iterator for Blocks<'_> {
  type Item = *mut Block;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    let block = self.current;
    // SAFETY: every listed header stays mapped for the life of the heap.
    let next = unsafe { (*block).next };
    self.current = if next == self.list.anchor {
      ptr::null_mut()
    } else {
      next
    };

    Some(block)
  }
}
