//! Address arithmetic for blocks, kept apart from the raw headers.
//!
//! A [`Span`] describes one block as plain numbers: where its header starts
//! and how many payload bytes follow the header. Splitting and merging are
//! computed on spans first; the pointer code in [`crate::block`] only writes
//! the results back into memory.
//!
//! ```text
//!   start                 payload()                           end()
//!   │                     │                                   │
//!   ▼                     ▼                                   ▼
//!   ┌─────────────────────┬───────────────────────────────────┐
//!   │   Block header      │          capacity bytes           │
//!   └─────────────────────┴───────────────────────────────────┘
//!   |-- BLOCK_OVERHEAD ---|
//! ```

use crate::{align, block::BLOCK_OVERHEAD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
  pub start: usize,
  pub capacity: usize,
}

impl Span {
  pub const fn new(
    start: usize,
    capacity: usize,
  ) -> Self {
    Self { start, capacity }
  }

  /// First payload byte.
  pub const fn payload(&self) -> usize {
    self.start + BLOCK_OVERHEAD
  }

  /// One past the last payload byte.
  pub const fn end(&self) -> usize {
    self.payload() + self.capacity
  }

  /// Whether `right` begins exactly where `self` ends.
  pub const fn is_adjacent(
    &self,
    right: &Span,
  ) -> bool {
    self.end() == right.start
  }

  /// Whether carving `size` bytes off the front leaves room for another
  /// header and at least one payload byte.
  pub fn can_split(
    &self,
    size: usize,
  ) -> bool {
    let carved = align!(size);
    carved
      .checked_add(BLOCK_OVERHEAD + 1)
      .is_some_and(|needed| self.capacity >= needed)
  }

  /// Splits into a left span of `align!(size)` bytes and a right span
  /// holding the rest, minus one header.
  pub fn split(
    self,
    size: usize,
  ) -> Option<(Span, Span)> {
    if !self.can_split(size) {
      return None;
    }

    let carved = align!(size);
    let left = Span::new(self.start, carved);
    let right = Span::new(left.end(), self.capacity - carved - BLOCK_OVERHEAD);

    Some((left, right))
  }

  /// Joins two adjacent spans; the right header becomes payload.
  pub fn merge(
    left: Span,
    right: Span,
  ) -> Option<Span> {
    if !left.is_adjacent(&right) {
      return None;
    }

    Some(Span::new(left.start, left.capacity + BLOCK_OVERHEAD + right.capacity))
  }
}
