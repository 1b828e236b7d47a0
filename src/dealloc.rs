//! Releasing blocks and coalescing free neighbours.
//!
//! A released block is merged with its list successor and then with its list
//! predecessor, but only when the pair is free and physically adjacent. The
//! list can put blocks of different arenas next to each other, so list
//! adjacency alone never licenses a merge.
//!
//! Both directions also require the left block to sit at a lower address
//! than the right one. The circular list wraps from its last block back to
//! its first, and that wrap pair must never be merged.

use std::ptr::NonNull;

use crate::{
  block::{Block, BlockList, FREE},
  error::AllocError,
  heap::Heap,
  logging::heap_log,
  page::PageSource,
};

impl<S: PageSource> Heap<S> {
  /// Gives the block behind `ptr` back to the heap.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`Heap::allocate`] or
  /// [`Heap::resize`] on this heap and must not have been released since.
  /// Use [`Heap::try_release`] when that cannot be guaranteed.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    unsafe {
      let block = Block::from_payload(ptr);
      debug_assert!(!(*block).is_free(), "double release of {ptr:?}");

      (*block).requested = FREE;
      heap_log!(trace, "release({:?})", ptr);

      // Forward first: it grows `block`, which the backward test reads.
      let next = (*block).next;
      if block < next && BlockList::can_merge(block, next) {
        heap_log!(trace, "merge {:?} into {:?}", next, block);
        self.blocks.merge(block, next);
      }

      let prev = self.blocks.predecessor_of(block);
      if prev < block && BlockList::can_merge(prev, block) {
        heap_log!(trace, "merge {:?} into {:?}", block, prev);
        self.blocks.merge(prev, block);
      }
    }
  }

  /// Like [`Heap::release`], but first checks that `ptr` is the payload of a
  /// used block in this heap.
  ///
  /// Costs a walk over the block list.
  pub fn try_release(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), AllocError> {
    let addr = ptr.as_ptr() as usize;

    let Some(info) = self.blocks().find(|info| info.payload() == addr) else {
      return Err(AllocError::UnknownAddress { addr });
    };

    if info.is_free() {
      return Err(AllocError::AlreadyFree { addr });
    }

    // SAFETY: `ptr` is the payload of a listed, used block.
    unsafe { self.release(ptr) };
    Ok(())
  }
}
