use std::ptr::NonNull;

use log::{debug, warn};

use crate::{
  align,
  error::{Corruption, HeapError, Result},
  free_list::FreeList,
  header::{HEADER_SIZE, Header, Status},
  region::{Region, Regions},
};

/// Minimum total size of a heap, in bytes. Smaller requests are raised to it.
pub const MIN_HEAP: u32 = 4096;

/// Smallest remainder worth splitting off as a free chunk, header excluded.
pub const MIN_CHUNK_SPLIT: u32 = 32;

/// A fixed-size heap carved out of one buffer.
///
/// Every byte of the buffer belongs to exactly one chunk. Chunks are laid
/// out back to back from offset 0; each starts with a [`Header`] whose size
/// leads to the next one. Free chunks are additionally listed, in address
/// order, in the free list.
pub struct Heap {
  mem: NonNull<u8>,
  size: u32,
  free_list: FreeList,
}

impl Heap {
  /// Creates a heap of at least `size` bytes.
  ///
  /// Sizes under [`MIN_HEAP`] are raised to it and the result is rounded up
  /// to a multiple of [`WORD_SIZE`](crate::WORD_SIZE). The whole heap starts
  /// as a single free chunk.
  ///
  /// # Errors
  ///
  /// [`HeapError::SetupFailure`] if the buffer or the free list storage
  /// cannot be acquired.
  pub fn new(size: u32) -> Result<Self> {
    let size = align!(size.max(MIN_HEAP)).ok_or(HeapError::SetupFailure { size })?;

    let free_list = FreeList::with_capacity(size / HEADER_SIZE).map_err(|err| {
      warn!("could not reserve free list for {} bytes: {}", size, err);
      HeapError::SetupFailure { size }
    })?;

    let mem = unsafe { libc::malloc(size as usize) }.cast::<u8>();
    let Some(mem) = NonNull::new(mem) else {
      warn!("malloc({}) failed", size);
      return Err(HeapError::SetupFailure { size });
    };

    let mut heap = Self {
      mem,
      size,
      free_list,
    };

    heap.set_header(0, Header::new(Status::Free, size));
    heap.free_list.insert_at(0, 0);

    debug!(
      "heap at {:?}: {} bytes, room for {} free chunks",
      heap.mem,
      size,
      heap.free_list.capacity()
    );

    Ok(heap)
  }

  /// Releases the heap. Equivalent to dropping it.
  pub fn teardown(self) {
    drop(self);
  }

  /// Total size of the heap, in bytes.
  pub fn size(&self) -> u32 {
    self.size
  }

  /// Most free chunks the free list can ever hold.
  pub fn free_capacity(&self) -> u32 {
    self.free_list.capacity()
  }

  /// Number of free chunks currently listed.
  pub fn free_chunks(&self) -> u32 {
    self.free_list.len()
  }

  /// Offsets of the free chunks, ascending.
  pub fn free_offsets(&self) -> &[u32] {
    self.free_list.as_slice()
  }

  /// Walks every chunk in address order.
  pub fn regions(&self) -> Regions<'_> {
    Regions::new(self)
  }

  /// Displacement of `ptr` from the heap start, if it points inside the heap.
  pub fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<u32> {
    let offset = (ptr as usize).checked_sub(self.mem.as_ptr() as usize)?;

    if ptr.is_null() || offset >= self.size as usize {
      return None;
    }

    Some(offset as u32)
  }

  /// Allocates a chunk with room for `size` bytes and returns its data area.
  ///
  /// The first free chunk, in address order, that fits is used. It is
  /// handed out whole when the remainder would be smaller than
  /// [`MIN_CHUNK_SPLIT`], otherwise its tail stays free.
  ///
  /// Returns `None` for a zero-sized request or when nothing fits.
  pub fn allocate(
    &mut self,
    size: u32,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    let needed = align!(size)?.checked_add(HEADER_SIZE)?;

    let Some(index) = self
      .free_list
      .find_min_size(needed, |offset| self.header(offset).size)
    else {
      debug!("allocate({}): no free chunk of {} bytes", size, needed);
      return None;
    };

    let offset = self.free_list.get(index);
    let chunk = self.header(offset);

    if chunk.size - needed < MIN_CHUNK_SPLIT {
      self.set_header(offset, Header::new(Status::Allocated, chunk.size));
      self.free_list.remove_at(index);

      debug!("allocate({}): whole chunk {} ({} bytes)", size, offset, chunk.size);
    } else {
      let rest = offset + needed;

      self.set_header(rest, Header::new(Status::Free, chunk.size - needed));
      self.set_header(offset, Header::new(Status::Allocated, needed));
      self.free_list.replace(index, rest);

      debug!(
        "allocate({}): split chunk {} into {} + {} bytes",
        size,
        offset,
        needed,
        chunk.size - needed
      );
    }

    Some(self.data_ptr(offset))
  }

  /// Frees the chunk whose data area starts at `ptr`, merging it with free
  /// neighbours.
  ///
  /// # Errors
  ///
  /// [`HeapError::InvalidFree`] if `ptr` is null, is not the data start of a
  /// chunk, or names a chunk that is already free. The heap is left
  /// untouched in that case.
  ///
  /// [`HeapError::Corruption`] if the walk to the chunk hits a bad header.
  pub fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) -> Result<()> {
    let invalid = || {
      warn!("attempt to free unallocated chunk at {:?}", ptr);
      HeapError::InvalidFree {
        address: ptr as usize,
      }
    };

    let target = self
      .offset_of(ptr)
      .and_then(|offset| offset.checked_sub(HEADER_SIZE))
      .ok_or_else(invalid)?;

    let mut regions = self.regions();
    let mut prev: Option<Region> = None;
    let mut prev_free: Option<Region> = None;
    let mut found = None;

    for region in regions.by_ref() {
      let region = region?;

      if region.offset == target {
        found = Some(region);
        break;
      }

      if region.offset > target {
        break;
      }

      if region.is_free() {
        prev_free = Some(region);
      }
      prev = Some(region);
    }

    let chunk = found.filter(|chunk| !chunk.is_free()).ok_or_else(invalid)?;
    let next = regions.next().transpose()?;

    self.merge(prev, chunk, next, prev_free)
  }

  fn merge(
    &mut self,
    prev: Option<Region>,
    chunk: Region,
    next: Option<Region>,
    prev_free: Option<Region>,
  ) -> Result<()> {
    let prev = prev.filter(Region::is_free);
    let next = next.filter(Region::is_free);

    match (prev, next) {
      (Some(prev), Some(next)) => {
        let index = self.free_position(next.offset)?;
        self.free_list.remove_at(index);
        self.set_header(
          prev.offset,
          Header::new(Status::Free, prev.size + chunk.size + next.size),
        );

        debug!("free {}: merged into {} with {}", chunk.offset, prev.offset, next.offset);
      }
      (Some(prev), None) => {
        self.set_header(prev.offset, Header::new(Status::Free, prev.size + chunk.size));

        debug!("free {}: merged into {}", chunk.offset, prev.offset);
      }
      (None, Some(next)) => {
        let index = self.free_position(next.offset)?;
        self.set_header(chunk.offset, Header::new(Status::Free, chunk.size + next.size));
        self.free_list.replace(index, chunk.offset);

        debug!("free {}: absorbed {}", chunk.offset, next.offset);
      }
      (None, None) => {
        let index = match prev_free {
          Some(prev_free) => self.free_position(prev_free.offset)? + 1,
          None => 0,
        };
        self.set_header(chunk.offset, Header::new(Status::Free, chunk.size));
        self.free_list.insert_at(index, chunk.offset);

        debug!("free {}: standalone at free list [{}]", chunk.offset, index);
      }
    }

    Ok(())
  }

  /// Free list position of the free chunk at `offset`.
  fn free_position(
    &self,
    offset: u32,
  ) -> Result<usize> {
    self.free_list.position_of(offset).ok_or_else(|| {
      log::error!("free chunk {} is missing from the free list", offset);
      HeapError::Corruption {
        offset,
        reason: Corruption::FreeListMismatch,
      }
    })
  }

  pub(crate) fn header(
    &self,
    offset: u32,
  ) -> Header {
    debug_assert!(offset + HEADER_SIZE <= self.size);
    unsafe { Header::read(self.mem.as_ptr(), offset) }
  }

  fn set_header(
    &mut self,
    offset: u32,
    header: Header,
  ) {
    debug_assert!(offset + HEADER_SIZE <= self.size);
    unsafe { header.write(self.mem.as_ptr(), offset) }
  }

  fn data_ptr(
    &self,
    offset: u32,
  ) -> NonNull<u8> {
    unsafe { self.mem.add((offset + HEADER_SIZE) as usize) }
  }

  /// Overwrites the raw status word of the chunk at `offset`.
  #[cfg(test)]
  pub(crate) fn poke_status(
    &mut self,
    offset: u32,
    status: u32,
  ) {
    let size = self.header(offset).size;
    self.set_header(offset, Header { status, size });
  }

  #[cfg(test)]
  pub(crate) fn poke_header(
    &mut self,
    offset: u32,
    header: Header,
  ) {
    self.set_header(offset, header);
  }

  #[cfg(test)]
  pub(crate) fn free_list_mut(&mut self) -> &mut FreeList {
    &mut self.free_list
  }
}

impl Drop for Heap {
  fn drop(&mut self) {
    debug!("releasing heap at {:?} ({} bytes)", self.mem, self.size);
    unsafe { libc::free(self.mem.as_ptr().cast()) };
  }
}
