use crate::{
  Heap, WORD_SIZE,
  error::{Corruption, HeapError, Result},
  header::{HEADER_SIZE, Status},
};

/// A chunk as found by walking the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
  /// Offset of the header from the heap start.
  pub offset: u32,
  pub status: Status,
  /// Whole chunk, header included.
  pub size: u32,
}

impl Region {
  pub fn is_free(&self) -> bool {
    self.status == Status::Free
  }

  /// Offset of the first byte after this chunk.
  pub fn end(&self) -> u32 {
    self.offset + self.size
  }
}

/// Walks the heap chunk by chunk, starting at offset 0 and stepping by each
/// chunk's size. Never consults the free list.
///
/// Yields an error and stops at the first header that cannot be trusted.
pub struct Regions<'a> {
  heap: &'a Heap,
  offset: u64,
  done: bool,
}

impl<'a> Regions<'a> {
  pub(crate) fn new(heap: &'a Heap) -> Self {
    Self {
      heap,
      offset: 0,
      done: false,
    }
  }

  fn corrupt(
    &mut self,
    reason: Corruption,
  ) -> Option<Result<Region>> {
    self.done = true;
    let offset = self.offset.min(u32::MAX as u64) as u32;
    log::error!("heap corrupted at offset {}: {}", offset, reason);
    Some(Err(HeapError::Corruption { offset, reason }))
  }
}

impl Iterator for Regions<'_> {
  type Item = Result<Region>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let heap_size = self.heap.size() as u64;

    if self.offset == heap_size {
      self.done = true;
      return None;
    }

    if self.offset + HEADER_SIZE as u64 > heap_size {
      return self.corrupt(Corruption::Overrun);
    }

    let offset = self.offset as u32;
    let header = self.heap.header(offset);

    let Some(status) = header.status() else {
      return self.corrupt(Corruption::BadStatus(header.status));
    };

    if header.size < HEADER_SIZE || header.size % WORD_SIZE != 0 {
      return self.corrupt(Corruption::BadSize(header.size));
    }

    self.offset += header.size as u64;

    Some(Ok(Region {
      offset,
      status,
      size: header.size,
    }))
  }
}
