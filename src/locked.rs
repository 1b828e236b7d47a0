use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use spin::{Mutex, MutexGuard};

use crate::{
  block::BLOCK_ALIGN,
  heap::Heap,
  page::{MmapPageSource, PageSource},
};

/// A [`Heap`] behind a single spin lock, usable as `#[global_allocator]`.
///
/// Every entry point holds the lock for the whole operation, since almost
/// any call may touch both the arena and the block list.
///
/// ```rust,ignore
/// use rarena::{LockedHeap, MmapPageSource};
///
/// #[global_allocator]
/// static HEAP: LockedHeap<MmapPageSource> = LockedHeap::new(MmapPageSource::new());
/// ```
///
/// Layouts aligned beyond a word are served from a block `align` bytes
/// larger than asked for. The returned pointer is rounded up inside it and
/// the block's payload address is stored in the word just before it:
///
/// ```text
///   ┌────────┬──────────────┬─────────┬──────────────────────┬───────┐
///   │ Header │ padding ...  │ payload │ user data (aligned)  │ slack │
///   └────────┴──────────────┴─────────┴──────────────────────┴───────┘
///            ▲                        ▲
///            └── block payload        └── pointer returned to user
/// ```
///
/// Build without the `log` feature when the process also installs a logger
/// that allocates, or logging will try to take the lock it is running under.
pub struct LockedHeap<S: PageSource> {
  heap: Mutex<Heap<S>>,
}

impl<S: PageSource> LockedHeap<S> {
  pub const fn new(source: S) -> Self {
    Self {
      heap: Mutex::new(Heap::new(source)),
    }
  }

  /// Exclusive access to the underlying heap.
  pub fn lock(&self) -> MutexGuard<'_, Heap<S>> {
    self.heap.lock()
  }

  fn alloc_over_aligned(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    let Some(padded) = layout.size().checked_add(layout.align()) else {
      return ptr::null_mut();
    };
    let Ok(block) = self.lock().allocate(padded) else {
      return ptr::null_mut();
    };

    let payload = block.as_ptr();
    let mask = layout.align() - 1;
    let offset = ((payload as usize + size_of::<usize>() + mask) & !mask) - payload as usize;

    // SAFETY: `offset <= align`, so the user range stays inside the
    // `size + align` bytes just allocated, and the word before it is at
    // or after `payload`.
    unsafe {
      let user = payload.add(offset);
      user.cast::<*mut u8>().sub(1).write(payload);
      user
    }
  }

  /// # Safety
  ///
  /// `user` came from `alloc_over_aligned`.
  unsafe fn block_of(user: *mut u8) -> NonNull<u8> {
    // SAFETY: `alloc_over_aligned` stored a non-null payload address here.
    unsafe { NonNull::new_unchecked(user.cast::<*mut u8>().sub(1).read()) }
  }
}

impl Default for LockedHeap<MmapPageSource> {
  fn default() -> Self {
    Self::new(MmapPageSource::new())
  }
}

// SAFETY: payloads are word aligned and larger alignments are rounded up
// inside a padded block; `Heap` never hands out overlapping live blocks.
unsafe impl<S: PageSource + Send> GlobalAlloc for LockedHeap<S> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > BLOCK_ALIGN {
      return self.alloc_over_aligned(layout);
    }

    self
      .lock()
      .allocate(layout.size())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
  ) {
    let Some(ptr) = NonNull::new(ptr) else {
      return;
    };

    // SAFETY: the caller passes a pointer obtained from `alloc` with the
    // same layout.
    unsafe {
      if layout.align() > BLOCK_ALIGN {
        self.lock().release(Self::block_of(ptr.as_ptr()));
      } else {
        self.lock().release(ptr);
      }
    }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    // SAFETY: `GlobalAlloc::realloc` requires `new_size` to be valid for
    // `layout.align()`.
    let new_layout = unsafe { Layout::from_size_align_unchecked(new_size, layout.align()) };

    let Some(ptr) = NonNull::new(ptr) else {
      // SAFETY: forwarded with the caller's layout.
      return unsafe { self.alloc(new_layout) };
    };

    if layout.align() > BLOCK_ALIGN {
      // SAFETY: `ptr` is live with `layout`; the copy stays within both
      // allocations.
      unsafe {
        let moved = self.alloc(new_layout);
        if !moved.is_null() {
          ptr::copy_nonoverlapping(ptr.as_ptr(), moved, layout.size().min(new_size));
          self.dealloc(ptr.as_ptr(), layout);
        }
        return moved;
      }
    }

    // SAFETY: the caller passes a pointer obtained from `alloc`.
    unsafe { self.lock().resize(ptr, new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{sync::Arc, thread};

  fn locked() -> LockedHeap<MmapPageSource> {
    LockedHeap::new(MmapPageSource::with_granularity(4096))
  }

  #[test]
  fn test_global_alloc_round_trip() {
    let heap = locked();

    unsafe {
      let layout = Layout::new::<u64>();
      let ptr = heap.alloc(layout) as *mut u64;
      assert!(!ptr.is_null());

      ptr.write(0xDEADBEEF);
      assert_eq!(ptr.read(), 0xDEADBEEF);

      heap.dealloc(ptr as *mut u8, layout);
    }

    assert!(heap.lock().blocks().all(|b| b.is_free()));
    assert_eq!(heap.lock().check(), Ok(()));
  }

  #[test]
  fn test_over_aligned_layouts_are_served() {
    let heap = locked();

    unsafe {
      let mut ptrs = Vec::new();
      for align in [16, 64, 4096] {
        let layout = Layout::from_size_align(24, align).unwrap();
        let ptr = heap.alloc(layout);

        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % align, 0);
        ptr::write_bytes(ptr, 0xC3, 24);
        ptrs.push((ptr, layout));
      }

      for &(ptr, layout) in &ptrs {
        assert!(std::slice::from_raw_parts(ptr, 24).iter().all(|&b| b == 0xC3));
        heap.dealloc(ptr, layout);
      }
    }

    assert!(heap.lock().blocks().all(|b| b.is_free()));
    assert_eq!(heap.lock().check(), Ok(()));
  }

  #[test]
  fn test_over_aligned_realloc_keeps_alignment() {
    let heap = locked();

    unsafe {
      let layout = Layout::from_size_align(16, 32).unwrap();
      let ptr = heap.alloc(layout);
      for i in 0..16 {
        ptr.add(i).write(i as u8);
      }

      let grown = heap.realloc(ptr, layout, 5000);
      assert!(!grown.is_null());
      assert_eq!(grown as usize % 32, 0);
      for i in 0..16 {
        assert_eq!(grown.add(i).read(), i as u8);
      }

      heap.dealloc(grown, Layout::from_size_align(5000, 32).unwrap());
    }

    assert_eq!(heap.lock().stats().requested_bytes, 0);
  }

  #[test]
  fn test_over_aligned_exhaustion_is_null() {
    let heap = locked();

    let layout = Layout::from_size_align(isize::MAX as usize - 15, 16).unwrap();
    assert!(unsafe { heap.alloc(layout) }.is_null());
  }

  #[test]
  fn test_realloc_preserves_prefix() {
    let heap = locked();

    unsafe {
      let layout = Layout::array::<u8>(16).unwrap();
      let ptr = heap.alloc(layout);
      for i in 0..16 {
        ptr.add(i).write(i as u8);
      }

      let grown = heap.realloc(ptr, layout, 10_000);
      assert!(!grown.is_null());
      for i in 0..16 {
        assert_eq!(grown.add(i).read(), i as u8);
      }

      heap.dealloc(grown, Layout::array::<u8>(10_000).unwrap());
    }
  }

  #[test]
  fn test_alloc_zeroed() {
    let heap = locked();

    unsafe {
      let layout = Layout::array::<u8>(32).unwrap();
      let dirty = heap.alloc(layout);
      ptr::write_bytes(dirty, 0xFF, 32);
      heap.dealloc(dirty, layout);

      let clean = heap.alloc_zeroed(layout);
      assert!(std::slice::from_raw_parts(clean, 32).iter().all(|&b| b == 0));
    }
  }

  #[test]
  fn test_threads_share_one_heap() {
    let heap = Arc::new(locked());

    let handles: Vec<_> = (0..4u8)
      .map(|tag| {
        let heap = Arc::clone(&heap);
        thread::spawn(move || {
          let layout = Layout::array::<u8>(64).unwrap();
          for _ in 0..200 {
            unsafe {
              let ptr = heap.alloc(layout);
              assert!(!ptr.is_null());
              ptr::write_bytes(ptr, tag, 64);
              assert!(std::slice::from_raw_parts(ptr, 64).iter().all(|&b| b == tag));
              heap.dealloc(ptr, layout);
            }
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(heap.lock().check(), Ok(()));
    assert_eq!(heap.lock().stats().requested_bytes, 0);
  }
}
