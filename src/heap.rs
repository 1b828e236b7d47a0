use std::ptr::NonNull;

use crate::{
  arena::{ARENA_OVERHEAD, ArenaList},
  block::{BLOCK_OVERHEAD, Block, BlockList, FREE},
  config::HeapConfig,
  error::{AllocError, ConfigError},
  logging::heap_log,
  page::{Bounded, MmapPageSource, PageSource},
};

/// A first-fit heap drawing its arenas from a [`PageSource`].
///
/// All state lives in this value, so independent heaps never interfere.
/// Every operation takes `&mut self`; wrap the heap in
/// [`LockedHeap`](crate::LockedHeap) to share it between threads.
pub struct Heap<S: PageSource> {
  pub(crate) source: S,
  pub(crate) arenas: ArenaList,
  pub(crate) blocks: BlockList,
}

// SAFETY: the heap exclusively owns every arena it points into, so moving it
// to another thread moves that ownership along with it.
unsafe impl<S: PageSource + Send> Send for Heap<S> {}

impl<S: PageSource> Heap<S> {
  pub const fn new(source: S) -> Self {
    Self {
      source,
      arenas: ArenaList::new(),
      blocks: BlockList::new(),
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Hands out at least `size` writable bytes, aligned to the machine word.
  ///
  /// A request for zero bytes is served as a request for one byte.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let size = size.max(1);

    if self.arenas.is_empty() {
      self.grow(size)?;
    }

    unsafe {
      let mut block = self.blocks.first_fit(size);
      if block.is_null() {
        heap_log!(trace, "no free block holds {} bytes, growing", size);
        block = self.grow(size)?;
      }

      if BlockList::should_split(block, size) {
        let rest = BlockList::split(block, size);
        heap_log!(trace, "split {:?}, remainder {:?}", block, rest);
      }

      (*block).requested = size;

      let payload = Block::payload(block);
      heap_log!(trace, "allocate({}) -> {:?}", size, payload);
      Ok(payload)
    }
  }

  /// Acquires an arena big enough for `size` bytes and registers its block.
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<*mut Block, AllocError> {
    let min_size = size
      .checked_add(ARENA_OVERHEAD + BLOCK_OVERHEAD)
      .ok_or(AllocError::OutOfMemory { requested: size })?;

    unsafe {
      let arena = self
        .arenas
        .acquire(&mut self.source, min_size)
        .map_err(|_| AllocError::OutOfMemory { requested: size })?;

      Ok(self.blocks.register_initial(arena))
    }
  }

  /// Payload bytes available behind `ptr`, including slack.
  ///
  /// # Safety
  ///
  /// `ptr` must be live in this heap.
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { (*Block::from_payload(ptr)).capacity }
  }

  /// Bytes the caller last asked for at `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` must be live in this heap.
  pub unsafe fn requested_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { (*Block::from_payload(ptr)).requested }
  }

  /// Every block, in search order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.blocks.iter().map(|block| {
      // SAFETY: listed headers stay mapped for the life of the heap.
      unsafe {
        BlockInfo {
          addr: block as usize,
          capacity: (*block).capacity,
          requested: (*block).requested,
        }
      }
    })
  }
}

impl Heap<Bounded<MmapPageSource>> {
  /// Builds an mmap-backed heap with the granularity and limit from
  /// `config`. Without a limit the budget is unbounded.
  pub fn from_config(config: &HeapConfig) -> Result<Self, ConfigError> {
    config.validate()?;

    let source = MmapPageSource::with_granularity(config.granularity);
    Ok(Heap::new(Bounded::new(source, config.limit.unwrap_or(usize::MAX))))
  }
}

impl Default for Heap<MmapPageSource> {
  fn default() -> Self {
    Self::new(MmapPageSource::new())
  }
}

/// Snapshot of one block as seen by [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Header address.
  pub addr: usize,
  pub capacity: usize,
  /// Zero for free blocks.
  pub requested: usize,
}

impl BlockInfo {
  pub fn is_free(&self) -> bool {
    self.requested == FREE
  }

  /// Address handed to the caller for this block.
  pub fn payload(&self) -> usize {
    self.addr + BLOCK_OVERHEAD
  }

  /// One past the last payload byte.
  pub fn end(&self) -> usize {
    self.payload() + self.capacity
  }
}
