use std::{io::Read, ptr::NonNull};

use rarena::{Heap, HeapConfig, PageSource};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the heap's block list in search order.
fn print_heap<S: PageSource>(
  label: &str,
  heap: &Heap<S>,
) {
  let stats = heap.stats();
  println!(
    "[{}] PID = {}, arenas = {}, blocks = {} ({} free), free bytes = {}, requested bytes = {}",
    label,
    std::process::id(),
    stats.arenas,
    stats.blocks,
    stats.free_blocks,
    stats.free_bytes,
    stats.requested_bytes,
  );

  for block in heap.blocks() {
    println!(
      "    {:#x}  capacity = {:>7}  {}",
      block.payload(),
      block.capacity,
      if block.is_free() {
        "free".to_string()
      } else {
        format!("used ({} requested)", block.requested)
      }
    );
  }
}

fn print_alloc(
  size: usize,
  addr: NonNull<u8>,
) {
  println!("Allocated {} bytes, address = {:?}", size, addr);
}

fn main() {
  env_logger::init();

  // RARENA_GRANULARITY / RARENA_LIMIT override the arena size and budget.
  let config = HeapConfig::from_env();
  let mut heap = match Heap::from_config(&config) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("invalid configuration: {err}");
      std::process::exit(1);
    }
  };

  unsafe {
    print_heap("start", &heap);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32. The first request maps the first arena
    //    and splits its single block.
    // --------------------------------------------------------------------
    let first_block = heap.allocate(size_of::<u32>()).unwrap();
    println!("\n[1] Allocate u32");
    print_alloc(size_of::<u32>(), first_block);

    let first_ptr = first_block.as_ptr() as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
    print_heap("1", &heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Two more allocations, back to back in the same arena.
    // --------------------------------------------------------------------
    let second_block = heap.allocate(12).unwrap();
    second_block.as_ptr().write_bytes(0xAB, 12);
    let third_block = heap.allocate(size_of::<u64>()).unwrap();
    println!("\n[2] Allocate [u8; 12] and u64");
    print_alloc(12, second_block);
    print_alloc(size_of::<u64>(), third_block);
    print_heap("2", &heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Release the first two blocks. They are free and adjacent, so they
    //    coalesce into one block.
    // --------------------------------------------------------------------
    heap.release(first_block);
    heap.release(second_block);
    println!("\n[3] Released first_block and second_block");
    print_heap("3", &heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) A small allocation. The coalesced block is the search anchor, so
    //    first fit tries the free space after the u64 before it.
    // --------------------------------------------------------------------
    let fourth_block = heap.allocate(2).unwrap();
    println!(
      "\n[4] Allocate [u8; 2]: {}",
      if fourth_block == first_block {
        "reused the freed block"
      } else {
        "allocated somewhere else"
      }
    );
    print_heap("4", &heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Grow the u64 well past its arena: it moves to a new arena and
    //    keeps its contents.
    // --------------------------------------------------------------------
    let third_ptr = third_block.as_ptr() as *mut u64;
    third_ptr.write(0x1122334455667788);

    let grown = heap.resize(third_block, 4 * config.granularity).unwrap();
    println!(
      "\n[5] Resized u64 to {} bytes, moved = {}, value = 0x{:X}",
      4 * config.granularity,
      grown != third_block,
      (grown.as_ptr() as *mut u64).read()
    );
    print_heap("5", &heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Exhaust the configured budget, if there is one.
    // --------------------------------------------------------------------
    if let Some(limit) = config.limit {
      match heap.allocate(limit) {
        Ok(ptr) => println!("\n[6] Allocated {} bytes at {:?}", limit, ptr),
        Err(err) => println!("\n[6] {err}"),
      }
    }

    heap.release(fourth_block);
    heap.release(grown);
    print_heap("end", &heap);

    match heap.check() {
      Ok(()) => println!("\n[7] Heap is consistent. Arenas stay mapped until the process exits."),
      Err(err) => println!("\n[7] {err}"),
    }
  }
}
