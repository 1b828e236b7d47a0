/// Rounds `value` up to the machine word alignment.
///
/// Block headers are word aligned, so every split boundary is rounded with
/// this macro before a new header is written there.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use rarena::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Rounds `size` up to a multiple of `granularity`.
///
/// Returns `None` when the rounded value does not fit in a `usize`. The
/// granularity does not have to be a power of two.
///
/// ```rust
/// use rarena::align::page_align;
///
/// assert_eq!(page_align(1, 4096), Some(4096));
/// assert_eq!(page_align(4096, 4096), Some(4096));
/// assert_eq!(page_align(4097, 4096), Some(8192));
/// assert_eq!(page_align(usize::MAX, 4096), None);
/// ```
pub fn page_align(
  size: usize,
  granularity: usize,
) -> Option<usize> {
  debug_assert!(granularity > 0);
  size.div_ceil(granularity).checked_mul(granularity)
}
