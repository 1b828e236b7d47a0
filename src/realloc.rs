use std::{cmp, ptr::{self, NonNull}};

use crate::{
  block::{BLOCK_OVERHEAD, Block},
  error::AllocError,
  heap::Heap,
  logging::heap_log,
  page::PageSource,
};

impl<S: PageSource> Heap<S> {
  /// Changes the size of the allocation at `ptr` to `new_size` bytes.
  ///
  /// Tried in order:
  /// 1. same size: nothing to do
  /// 2. fits the current block: `requested` is updated, the tail stays in
  ///    the block as slack
  /// 3. the next block is free and directly behind this one: it is absorbed
  ///    without copying
  /// 4. a new block is allocated, the data copied and the old block released
  ///
  /// On `Err` the original allocation is untouched and still valid. A
  /// `new_size` of zero is treated as one byte.
  ///
  /// # Safety
  ///
  /// `ptr` must be live in this heap. On `Ok`, `ptr` must no longer be used
  /// unless it was returned again.
  pub unsafe fn resize(
    &mut self,
    ptr: NonNull<u8>,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let new_size = new_size.max(1);

    unsafe {
      let block = Block::from_payload(ptr);
      debug_assert!(!(*block).is_free(), "resize of released {ptr:?}");

      let requested = (*block).requested;
      if new_size == requested {
        return Ok(ptr);
      }

      if new_size <= (*block).capacity {
        heap_log!(trace, "resize({:?}, {}) in place", ptr, new_size);
        (*block).requested = new_size;
        return Ok(ptr);
      }

      let next = (*block).next;
      if next != block
        && (*next).is_free()
        && Block::span(block).is_adjacent(&Block::span(next))
        && (*next).capacity + (*block).capacity + BLOCK_OVERHEAD > new_size
      {
        heap_log!(trace, "resize({:?}, {}) absorbs {:?}", ptr, new_size, next);
        self.blocks.merge(block, next);
        (*block).requested = new_size;
        return Ok(ptr);
      }

      let moved = self.allocate(new_size)?;
      heap_log!(trace, "resize({:?}, {}) moves to {:?}", ptr, new_size, moved);

      ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), cmp::min(requested, new_size));
      self.release(ptr);

      Ok(moved)
    }
  }
}
