//! # subheap - A Fixed-Size Heap Sub-Allocator
//!
//! This crate manages one fixed-size buffer and serves allocation and
//! deallocation requests out of it, first-fit, without going back to the
//! platform allocator for individual requests.
//!
//! ## Overview
//!
//! The heap is tiled by chunks. Each chunk starts with a header holding its
//! status and its total size; the next chunk starts right where the previous
//! one ends:
//!
//! ```text
//!   Heap Layout:
//!
//!   offset 0                                                      heap size
//!   ┌────────┬──────────┬────────┬──────┬────────┬──────────────────────┐
//!   │ header │   data   │ header │ data │ header │        data          │
//!   │ A, 108 │          │ F, 48  │      │ A, 24  │ ...                  │
//!   └────────┴──────────┴────────┴──────┴────────┴──────────────────────┘
//!            ▲
//!            └── pointer returned by allocate()
//! ```
//!
//! Free chunks are also listed, in address order, in a free list that is
//! sized up front for the worst case:
//!
//! ```text
//!   Free List:
//!
//!   ┌─────┬─────┬─────┬─────────────────────────────┐
//!   │ 108 │ 980 │ 2K  │          unused             │
//!   └─────┴─────┴─────┴─────────────────────────────┘
//!     ▲ ascending offsets          ▲ capacity = heap size / header size
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   subheap
//!   ├── align      - Word alignment macro (align!)
//!   ├── header     - Chunk header layout and status sentinels
//!   ├── free_list  - Address-ordered list of free chunks
//!   ├── region     - Walking the heap chunk by chunk
//!   ├── heap       - Heap: init, allocate, deallocate, teardown
//!   ├── dump       - Dumps, statistics and the structural check
//!   └── error      - HeapError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use subheap::{Heap, Verbosity};
//!
//! let mut heap = Heap::new(4096)?;
//!
//! let ptr = heap.allocate(100).expect("heap has room");
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 100) };
//!
//! heap.dump(Verbosity::Compact, &mut std::io::stdout())?;
//! heap.deallocate(ptr.as_ptr())?;
//! heap.check()?;
//!
//! heap.teardown();
//! # Ok::<(), subheap::HeapError>(())
//! ```
//!
//! ## How It Works
//!
//! Allocation takes the first listed free chunk that can hold the request
//! plus a header. If what would be left over is smaller than
//! [`MIN_CHUNK_SPLIT`], the whole chunk is handed out; otherwise the front is
//! handed out and the tail stays on the free list in the same slot:
//!
//! ```text
//!   Split:
//!
//!   before  ┌─────────────── F, 4096 ───────────────┐
//!   after   ┌── A, 108 ──┬────────── F, 3988 ───────┐
//! ```
//!
//! Deallocation walks the headers from offset 0 to find the chunk and its
//! neighbours, then merges it with whichever neighbours are free:
//!
//! ```text
//!   Merge:
//!
//!   before  ┌── F ──┬── A (freed) ──┬── F ──┐
//!   after   ┌──────────── F ───────────────┐
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Send` nor `Sync`
//! - **Fixed size**: the heap never grows or shrinks after [`Heap::new`]
//! - **Word alignment only**: data areas are aligned to [`WORD_SIZE`]
//! - **Linear scans**: allocation is O(free chunks), deallocation O(chunks)
//!
//! ## Errors
//!
//! Running out of space is reported as `None`. Bad frees and corruption are
//! reported as [`HeapError`]; after a [`HeapError::Corruption`] the heap
//! must not be used again.

pub mod align;
mod dump;
mod error;
mod free_list;
mod header;
mod heap;
mod region;

pub use align::WORD_SIZE;
pub use dump::{HeapStats, Verbosity};
pub use error::{Corruption, HeapError, Result};
pub use header::{ALLOC, FREE, HEADER_SIZE, Status};
pub use heap::{Heap, MIN_CHUNK_SPLIT, MIN_HEAP};
pub use region::{Region, Regions};
