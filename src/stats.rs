//! Heap-wide accounting and consistency checks.

use crate::{
  arena::ARENA_OVERHEAD,
  block::BLOCK_OVERHEAD,
  error::AllocError,
  heap::Heap,
  page::PageSource,
};

/// Totals over every arena and block of a heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub arenas: usize,
  /// Bytes drawn from the page source, arena headers included.
  pub arena_bytes: usize,
  pub blocks: usize,
  pub free_blocks: usize,
  /// Capacity of all free blocks.
  pub free_bytes: usize,
  /// Capacity of all used blocks, slack included.
  pub used_bytes: usize,
  /// Bytes callers actually asked for.
  pub requested_bytes: usize,
}

impl HeapStats {
  /// Bytes taken up by block and arena headers.
  pub fn overhead_bytes(&self) -> usize {
    self.blocks * BLOCK_OVERHEAD + self.arenas * ARENA_OVERHEAD
  }

  /// Whether every byte of every arena is accounted for by exactly one
  /// header or payload.
  pub fn is_conserved(&self) -> bool {
    self.free_bytes + self.used_bytes + self.overhead_bytes() == self.arena_bytes
  }
}

impl<S: PageSource> Heap<S> {
  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      arenas: self.arenas.len(),
      // SAFETY: arenas are never unmapped.
      arena_bytes: self.arenas.iter().map(|arena| unsafe { (*arena).size }).sum(),
      ..HeapStats::default()
    };

    for info in self.blocks() {
      stats.blocks += 1;
      if info.is_free() {
        stats.free_blocks += 1;
        stats.free_bytes += info.capacity;
      } else {
        stats.used_bytes += info.capacity;
        stats.requested_bytes += info.requested;
      }
    }

    stats
  }

  /// Walks both lists and verifies the heap invariants.
  ///
  /// Checks that the block cycle closes, that every block sits inside an
  /// arena, that no used block is over-requested, that used blocks do not
  /// overlap and that arena bytes are conserved.
  pub fn check(&self) -> Result<(), AllocError> {
    // Byte ranges that may hold block headers and payloads.
    let arenas: Vec<(usize, usize)> = self
      .arenas
      .iter()
      // SAFETY: arenas are never unmapped.
      .map(|arena| (arena as usize + ARENA_OVERHEAD, arena as usize + unsafe { (*arena).size }))
      .collect();

    let arena_bytes: usize = arenas.iter().map(|(start, end)| end - start).sum();
    let max_blocks = arena_bytes / BLOCK_OVERHEAD;

    let corrupted = |addr, reason| AllocError::Corrupted { addr, reason };

    let mut used = Vec::new();
    let mut seen = 0usize;

    // `blocks()` stops on returning to the anchor; a list that never does
    // would run past `max_blocks`.
    for info in self.blocks() {
      seen += 1;
      if seen > max_blocks {
        return Err(corrupted(info.addr, "block cycle does not close"));
      }

      // A corrupted capacity can push the end past `usize::MAX`.
      let inside = info.payload().checked_add(info.capacity).is_some_and(|block_end| {
        arenas
          .iter()
          .any(|&(start, end)| info.addr >= start && block_end <= end)
      });
      if !inside {
        return Err(corrupted(info.addr, "block lies outside every arena"));
      }

      if !info.is_free() {
        if info.requested > info.capacity {
          return Err(corrupted(info.addr, "requested size exceeds capacity"));
        }
        used.push((info.payload(), info.end()));
      }
    }

    used.sort_unstable();
    if let Some(pair) = used.windows(2).find(|pair| pair[0].1 > pair[1].0) {
      return Err(corrupted(pair[1].0, "used blocks overlap"));
    }

    if !self.stats().is_conserved() {
      return Err(corrupted(self.blocks.anchor() as usize, "arena bytes not conserved"));
    }

    Ok(())
  }
}
