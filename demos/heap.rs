use std::{env, process, ptr::NonNull};

use subheap::{HEADER_SIZE, Heap, HeapError, Verbosity};

/// Prints the error the way a fatal heap fault is reported and exits.
fn fatal<T>(err: HeapError) -> T {
  eprintln!("{}", err);
  process::exit(1);
}

fn dump(
  heap: &Heap,
  label: &str,
  verbosity: Verbosity,
) {
  println!("\n[{}]", label);
  heap.dump_stdout(verbosity).unwrap_or_else(fatal);
}

fn allocate(
  heap: &mut Heap,
  size: u32,
) -> NonNull<u8> {
  match heap.allocate(size) {
    Some(ptr) => ptr,
    None => {
      eprintln!("no room for {} bytes", size);
      process::exit(1);
    }
  }
}

fn free(
  heap: &mut Heap,
  ptr: NonNull<u8>,
) {
  heap.deallocate(ptr.as_ptr()).unwrap_or_else(fatal);
}

fn main() {
  env_logger::init();

  // Heap size from the first argument, 4096 by default.
  let size = match env::args().nth(1).map(|arg| arg.parse::<u32>()) {
    None => 4096,
    Some(Ok(size)) => size,
    Some(Err(err)) => {
      eprintln!("usage: heap [SIZE]: {}", err);
      process::exit(2);
    }
  };

  let mut heap = Heap::new(size).unwrap_or_else(fatal);
  dump(&heap, "init", Verbosity::Stats);

  // --------------------------------------------------------------------
  // A) One allocation splits the initial chunk in two.
  // --------------------------------------------------------------------
  let a = allocate(&mut heap, 100);
  unsafe { a.as_ptr().write_bytes(0xAB, 100) };
  println!(
    "\n[A] allocate(100) -> offset {:?}, chunk of {} bytes",
    heap.offset_of(a.as_ptr()),
    100 + HEADER_SIZE
  );
  dump(&heap, "A", Verbosity::Compact);
  free(&mut heap, a);

  // --------------------------------------------------------------------
  // B) Freeing the middle of three chunks leaves a hole with no merge.
  // --------------------------------------------------------------------
  let chunks = [
    allocate(&mut heap, 50),
    allocate(&mut heap, 50),
    allocate(&mut heap, 50),
  ];
  free(&mut heap, chunks[1]);
  dump(&heap, "B: middle freed", Verbosity::Verbose);

  // --------------------------------------------------------------------
  // C) Freeing the rest merges everything back into one chunk.
  // --------------------------------------------------------------------
  free(&mut heap, chunks[0]);
  free(&mut heap, chunks[2]);
  dump(&heap, "C: all freed", Verbosity::Verbose);

  // --------------------------------------------------------------------
  // D) A request larger than the heap gets nothing and changes nothing.
  // --------------------------------------------------------------------
  println!(
    "\n[D] allocate({}) -> {:?}",
    heap.size() + 1,
    heap.allocate(heap.size() + 1)
  );
  dump(&heap, "D", Verbosity::Compact);

  // --------------------------------------------------------------------
  // E) Freeing one byte past a data start is rejected.
  // --------------------------------------------------------------------
  let e = allocate(&mut heap, 50);
  match heap.deallocate(unsafe { e.as_ptr().add(1) }) {
    Err(err @ HeapError::InvalidFree { .. }) => println!("\n[E] rejected: {}", err),
    Err(err) => fatal(err),
    Ok(()) => {
      eprintln!("[E] interior pointer was accepted");
      process::exit(1);
    }
  }
  free(&mut heap, e);

  heap.check().unwrap_or_else(fatal);
  dump(&heap, "end", Verbosity::Stats);

  heap.teardown();
}
