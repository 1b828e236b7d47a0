//! Page sources: where arenas get their raw memory from.

use std::ptr::{self, NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, mmap};

use crate::logging::heap_log;

/// Default rounding unit for arena requests (128 KiB).
pub const DEFAULT_GRANULARITY: usize = 128 * 1024;

/// A contiguous span of memory handed out by a [`PageSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// # Safety
  ///
  /// `base..base + len` must be readable, writable, zero-filled and not
  /// referenced by anyone else.
  pub unsafe fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    Self { base, len }
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

/// Supplier of raw memory for arenas.
///
/// The heap never gives a region back: once handed out, a region belongs to
/// the heap for the rest of the process.
///
/// # Safety
///
/// Every region returned from [`PageSource::request`] must be at least the
/// requested length, zero-filled, exclusively owned by the caller, aligned to
/// at least `align_of::<usize>()`, and must stay mapped for the life of the
/// process.
pub unsafe trait PageSource {
  /// Unit that every request is rounded up to.
  fn granularity(&self) -> usize;

  /// Maps a fresh region of at least `len` bytes, or `None` when exhausted.
  fn request(
    &mut self,
    len: usize,
  ) -> Option<Region>;
}

/// Anonymous private mappings straight from the kernel.
#[derive(Debug, Clone, Copy)]
pub struct MmapPageSource {
  granularity: usize,
}

impl MmapPageSource {
  pub const fn new() -> Self {
    Self {
      granularity: DEFAULT_GRANULARITY,
    }
  }

  /// Uses `granularity` as rounding unit instead of [`DEFAULT_GRANULARITY`].
  ///
  /// Panics if `granularity` is zero or not word aligned.
  pub const fn with_granularity(granularity: usize) -> Self {
    assert!(granularity > 0 && granularity % align_of::<usize>() == 0);
    Self { granularity }
  }
}

impl Default for MmapPageSource {
  fn default() -> Self {
    Self::new()
  }
}

// SAFETY: anonymous private mappings are zero-filled, page aligned and
// exclusively owned by this process; they are never unmapped.
unsafe impl PageSource for MmapPageSource {
  fn granularity(&self) -> usize {
    self.granularity
  }

  fn request(
    &mut self,
    len: usize,
  ) -> Option<Region> {
    if len == 0 {
      return None;
    }

    // SAFETY: a null hint with MAP_ANONYMOUS and fd -1 touches no existing
    // memory.
    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      heap_log!(warn, "mmap of {} bytes failed", len);
      return None;
    }

    let base = NonNull::new(address as *mut u8)?;

    // SAFETY: the mapping was just created for us and is zero-filled.
    Some(unsafe { Region::new(base, len) })
  }
}

/// Caps the total number of bytes drawn from an inner source.
///
/// Requests that would push the running total past `limit` fail without
/// reaching the inner source.
#[derive(Debug, Clone, Copy)]
pub struct Bounded<S> {
  inner: S,
  limit: usize,
  used: usize,
}

impl<S> Bounded<S> {
  pub const fn new(
    inner: S,
    limit: usize,
  ) -> Self {
    Self {
      inner,
      limit,
      used: 0,
    }
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn limit(&self) -> usize {
    self.limit
  }
}

// SAFETY: regions are passed through unchanged from a source that upholds
// the contract itself.
unsafe impl<S: PageSource> PageSource for Bounded<S> {
  fn granularity(&self) -> usize {
    self.inner.granularity()
  }

  fn request(
    &mut self,
    len: usize,
  ) -> Option<Region> {
    let total = self.used.checked_add(len)?;
    if total > self.limit {
      heap_log!(
        warn,
        "request of {} bytes exceeds limit ({} of {} used)",
        len,
        self.used,
        self.limit
      );
      return None;
    }

    let region = self.inner.request(len)?;
    self.used = self.used.saturating_add(region.len());
    Some(region)
  }
}
