use std::mem;

/// Status sentinel for a chunk handed out to a caller.
pub const ALLOC: u32 = 0x5555_5555;

/// Status sentinel for a chunk tracked by the free list.
pub const FREE: u32 = 0xAAAA_AAAA;

/// Size of a chunk header, in bytes.
pub const HEADER_SIZE: u32 = mem::size_of::<Header>() as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Allocated,
  Free,
}

impl Status {
  pub fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      ALLOC => Some(Status::Allocated),
      FREE => Some(Status::Free),
      _ => None,
    }
  }

  pub fn raw(self) -> u32 {
    match self {
      Status::Allocated => ALLOC,
      Status::Free => FREE,
    }
  }
}

/// In-band metadata at the start of every chunk.
///
/// `size` counts the whole chunk, header included. The data area starts
/// [`HEADER_SIZE`] bytes after the header.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Header {
  pub status: u32,
  pub size: u32,
}

impl Header {
  pub fn new(
    status: Status,
    size: u32,
  ) -> Self {
    Self {
      status: status.raw(),
      size,
    }
  }

  pub fn status(&self) -> Option<Status> {
    Status::from_raw(self.status)
  }

  /// Reads the header stored `offset` bytes into `base`.
  ///
  /// # Safety
  ///
  /// `base + offset .. base + offset + HEADER_SIZE` must lie inside one live
  /// allocation and `offset` must be a multiple of the word size.
  pub unsafe fn read(
    base: *const u8,
    offset: u32,
  ) -> Self {
    unsafe { base.add(offset as usize).cast::<Header>().read() }
  }

  /// Writes this header `offset` bytes into `base`.
  ///
  /// # Safety
  ///
  /// Same requirements as [`Header::read`], with write access.
  pub unsafe fn write(
    self,
    base: *mut u8,
    offset: u32,
  ) {
    unsafe { base.add(offset as usize).cast::<Header>().write(self) }
  }
}
