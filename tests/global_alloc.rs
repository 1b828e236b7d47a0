/*
 * global_alloc.rs
 *
 * installs LockedHeap as the process allocator.
 * everything in this binary, the test harness included, allocates through it.
 */

use std::{collections::HashMap, sync::Arc, thread};

use rarena::{LockedHeap, MmapPageSource};

#[global_allocator]
static HEAP: LockedHeap<MmapPageSource> = LockedHeap::new(MmapPageSource::new());

/* ============================================================================
 * Collections
 * ============================================================================ */

#[test]
fn vec_of_strings() {
  let words: Vec<String> = (0..500).map(|i| format!("word-{i}")).collect();

  assert_eq!(words.len(), 500);
  assert_eq!(words[123], "word-123");
  assert!(words.iter().all(|w| w.starts_with("word-")));
}

/* hashbrown tables ask for 16-byte alignment on x86_64 */
#[test]
fn hash_map_grows_and_rehashes() {
  let mut map = HashMap::new();
  for i in 0..2000u32 {
    map.insert(i, i.to_string());
  }

  assert_eq!(map.len(), 2000);
  assert_eq!(map[&1999], "1999");

  map.retain(|k, _| k % 2 == 0);
  map.shrink_to_fit();
  assert_eq!(map.len(), 1000);
  assert!(map.contains_key(&1998));
}

#[test]
fn over_aligned_values() {
  #[repr(align(64))]
  struct Line([u8; 64]);

  let wide: Vec<Box<u128>> = (0..100).map(|i| Box::new(i as u128 * u64::MAX as u128)).collect();
  let lines: Vec<Box<Line>> = (0..100).map(|i| Box::new(Line([i as u8; 64]))).collect();

  for (i, value) in wide.iter().enumerate() {
    assert_eq!(&**value as *const u128 as usize % align_of::<u128>(), 0);
    assert_eq!(**value, i as u128 * u64::MAX as u128);
  }
  for (i, line) in lines.iter().enumerate() {
    assert_eq!(&**line as *const Line as usize % 64, 0);
    assert!(line.0.iter().all(|&b| b == i as u8));
  }
}

/* ============================================================================
 * Threads
 * ============================================================================ */

#[test]
fn threads_share_the_heap() {
  let shared = Arc::new((0..100).collect::<Vec<u64>>());

  let handles: Vec<_> = (0..4u64)
    .map(|t| {
      let shared = Arc::clone(&shared);
      thread::spawn(move || {
        let mut local = Vec::new();
        for i in 0..1000 {
          local.push(vec![t; (i % 50) + 1]);
          if i % 3 == 0 {
            local.swap_remove(0);
          }
        }
        shared.iter().sum::<u64>() + local.iter().map(|v| v.len() as u64).sum::<u64>()
      })
    })
    .collect();

  for handle in handles {
    assert!(handle.join().unwrap() >= 4950);
  }
}

/* ============================================================================
 * Accounting
 * ============================================================================ */

#[test]
fn heap_stays_conserved() {
  let keep: Vec<Vec<u8>> = (1..200).map(|n| vec![n as u8; n * 7]).collect();

  // `stats` does not allocate, so it is safe to call under the lock.
  let stats = HEAP.lock().stats();
  assert!(stats.arenas >= 1);
  assert!(stats.is_conserved());
  assert!(stats.requested_bytes >= keep.iter().map(Vec::len).sum::<usize>());
}
