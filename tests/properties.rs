/*
 * properties.rs
 *
 * property-based tests for the heap.
 * random allocate/release/resize sequences must never corrupt the heap,
 * never hand out overlapping memory and never lose bytes.
 */

use proptest::prelude::*;
use std::{ptr::NonNull, slice};

use rarena::{AllocError, Bounded, Heap, MmapPageSource, PageSource};

const GRANULARITY: usize = 4096;

#[derive(Debug, Clone)]
enum Op {
  Allocate(usize),
  Release(usize),
  Resize(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    4 => (0usize..3000).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Release),
    2 => (any::<usize>(), 0usize..6000).prop_map(|(i, size)| Op::Resize(i, size)),
  ]
}

/* one live allocation: where it is, how long, and what it should hold */
struct Live {
  ptr: NonNull<u8>,
  len: usize,
  tag: u8,
}

impl Live {
  fn bytes(&self) -> &[u8] {
    unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }

  fn stamp(&self) {
    unsafe { self.ptr.as_ptr().write_bytes(self.tag, self.len) };
  }
}

fn assert_disjoint(live: &[Live]) {
  let mut ranges: Vec<_> = live
    .iter()
    .filter(|l| l.len > 0)
    .map(|l| (l.ptr.as_ptr() as usize, l.ptr.as_ptr() as usize + l.len))
    .collect();
  ranges.sort_unstable();

  for pair in ranges.windows(2) {
    assert!(pair[0].1 <= pair[1].0, "overlap: {:x?} and {:x?}", pair[0], pair[1]);
  }
}

/* applies `ops`, checking every invariant after each step */
fn run<S: PageSource>(
  heap: &mut Heap<S>,
  ops: &[Op],
) -> Result<(), TestCaseError> {
  let mut live: Vec<Live> = Vec::new();
  let mut next_tag = 1u8;

  for op in ops {
    match *op {
      Op::Allocate(size) => {
        let before: Vec<_> = heap.blocks().collect();
        match heap.allocate(size) {
          Ok(ptr) => {
            let entry = Live {
              ptr,
              len: size,
              tag: next_tag,
            };
            entry.stamp();
            live.push(entry);
            next_tag = next_tag.wrapping_add(1).max(1);
          }
          Err(AllocError::OutOfMemory { .. }) => {
            prop_assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
          }
          Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
      }
      Op::Release(i) if !live.is_empty() => {
        let entry = live.swap_remove(i % live.len());
        prop_assert_eq!(heap.try_release(entry.ptr), Ok(()));
      }
      Op::Resize(i, size) if !live.is_empty() => {
        let index = i % live.len();
        let old = &live[index];
        let keep = old.len.min(size);

        match unsafe { heap.resize(old.ptr, size) } {
          Ok(ptr) => {
            let moved = Live {
              ptr,
              len: size,
              tag: old.tag,
            };
            prop_assert!(moved.bytes()[..keep].iter().all(|&b| b == old.tag));
            moved.stamp();
            live[index] = moved;
          }
          Err(AllocError::OutOfMemory { .. }) => {
            prop_assert!(old.bytes().iter().all(|&b| b == old.tag));
          }
          Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
      }
      _ => {}
    }

    prop_assert_eq!(heap.check(), Ok(()));
    prop_assert!(heap.stats().is_conserved());
    assert_disjoint(&live);
    for entry in &live {
      prop_assert!(entry.bytes().iter().all(|&b| b == entry.tag));
    }
  }

  for entry in live.drain(..) {
    prop_assert_eq!(heap.try_release(entry.ptr), Ok(()));
  }
  prop_assert_eq!(heap.stats().requested_bytes, 0);
  prop_assert_eq!(heap.check(), Ok(()));

  Ok(())
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(200))]

  /* unbounded heap: every request succeeds, data survives every step */
  #[test]
  fn random_ops_keep_heap_consistent(ops in prop::collection::vec(op(), 1..80)) {
    let mut heap = Heap::new(MmapPageSource::with_granularity(GRANULARITY));
    run(&mut heap, &ops)?;
  }

  /* tight budget: out-of-memory is frequent and must never corrupt anything */
  #[test]
  fn random_ops_under_memory_pressure(ops in prop::collection::vec(op(), 1..80)) {
    let source = Bounded::new(MmapPageSource::with_granularity(GRANULARITY), 4 * GRANULARITY);
    let mut heap = Heap::new(source);
    run(&mut heap, &ops)?;
  }

  /* releasing everything in any order leaves only free blocks */
  #[test]
  fn release_order_does_not_matter(
    sizes in prop::collection::vec(1usize..2000, 1..40),
    seed in any::<u64>(),
  ) {
    let mut heap = Heap::new(MmapPageSource::with_granularity(GRANULARITY));
    let mut ptrs: Vec<_> = sizes.iter().map(|&s| heap.allocate(s).unwrap()).collect();

    // cheap deterministic shuffle
    let mut state = seed | 1;
    for i in (1..ptrs.len()).rev() {
      state ^= state << 13;
      state ^= state >> 7;
      state ^= state << 17;
      ptrs.swap(i, (state % (i as u64 + 1)) as usize);
    }

    for ptr in ptrs {
      unsafe { heap.release(ptr) };
      prop_assert_eq!(heap.check(), Ok(()));
    }

    prop_assert!(heap.blocks().all(|b| b.is_free()));
    // every arena ends up as at most a handful of free runs
    let stats = heap.stats();
    prop_assert!(stats.free_blocks <= 2 * stats.arenas);
  }
}
