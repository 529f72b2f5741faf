use std::io;

use thiserror::Error;

/// Errors surfaced by the heap.
///
/// Running out of space is not an error: [`Heap::allocate`](crate::Heap::allocate)
/// reports it as `None`.
#[derive(Debug, Error)]
pub enum HeapError {
  #[error("could not acquire {size} bytes of heap storage")]
  SetupFailure { size: u32 },

  #[error("attempt to free unallocated chunk at {address:#x}")]
  InvalidFree { address: usize },

  #[error("heap corrupted at offset {offset}: {reason}")]
  Corruption { offset: u32, reason: Corruption },

  #[error("failed to write heap dump")]
  Io(#[from] io::Error),
}

/// What the structural walk found wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
  #[error("found bad chunk status {0:#010x}")]
  BadStatus(u32),

  #[error("chunk size {0} is not a positive multiple of the word size")]
  BadSize(u32),

  #[error("end of last chunk does not match end of heap")]
  Overrun,

  #[error("adjacent free chunks were not merged")]
  UnmergedFree,

  #[error("free list holds {listed} entries but the heap has {found} free chunks")]
  FreeCountMismatch { listed: u32, found: u32 },

  #[error("free list entry does not match the next free chunk")]
  FreeListMismatch,
}

pub type Result<T> = core::result::Result<T, HeapError>;
