use thiserror::Error;

/// Everything the heap reports back to its caller.
///
/// Only [`AllocError::OutOfMemory`] is produced by the unchecked fast paths.
/// The other variants come from [`Heap::try_release`](crate::Heap::try_release)
/// and [`Heap::check`](crate::Heap::check), which look for contract
/// violations the fast paths let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  /// The page source could not hand out a region large enough for the
  /// request, or the request size overflowed. Heap state is unchanged.
  #[error("out of memory: cannot serve a request of {requested} bytes")]
  OutOfMemory { requested: usize },

  /// The address is not the payload of any block in the heap.
  #[error("address {addr:#x} was not returned by this heap")]
  UnknownAddress { addr: usize },

  /// The block behind the address has already been released.
  #[error("block at {addr:#x} is already free")]
  AlreadyFree { addr: usize },

  /// An invariant of the block or arena lists does not hold.
  #[error("heap corrupted at {addr:#x}: {reason}")]
  Corrupted { addr: usize, reason: &'static str },
}

/// Rejected [`HeapConfig`](crate::HeapConfig) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("granularity {0} is not a multiple of the block alignment")]
  MisalignedGranularity(usize),

  #[error("granularity {granularity} cannot hold an arena (minimum {minimum})")]
  GranularityTooSmall { granularity: usize, minimum: usize },
}
