use std::collections::TryReserveError;

use log::trace;

/// Offsets of the free chunks, kept in ascending address order.
///
/// Storage is reserved once, up front, for the worst case of every chunk
/// being header-sized, so inserting never reallocates.
#[derive(Debug)]
pub struct FreeList {
  entries: Vec<u32>,
  capacity: u32,
}

impl FreeList {
  pub fn with_capacity(capacity: u32) -> Result<Self, TryReserveError> {
    let mut entries = Vec::new();
    entries.try_reserve_exact(capacity as usize)?;

    Ok(Self { entries, capacity })
  }

  pub fn capacity(&self) -> u32 {
    self.capacity
  }

  pub fn len(&self) -> u32 {
    self.entries.len() as u32
  }

  pub fn as_slice(&self) -> &[u32] {
    &self.entries
  }

  /// First entry, in address order, whose chunk is at least `min_size` bytes.
  pub fn find_min_size(
    &self,
    min_size: u32,
    size_of: impl Fn(u32) -> u32,
  ) -> Option<usize> {
    self
      .entries
      .iter()
      .position(|&offset| size_of(offset) >= min_size)
  }

  /// Position of the entry for the chunk at `offset`.
  pub fn position_of(
    &self,
    offset: u32,
  ) -> Option<usize> {
    self.entries.iter().position(|&entry| entry == offset)
  }

  pub fn get(
    &self,
    index: usize,
  ) -> u32 {
    self.entries[index]
  }

  /// Points an existing entry at a different chunk.
  ///
  /// The caller keeps address order intact: the new offset must still sort
  /// between the neighbouring entries.
  pub fn replace(
    &mut self,
    index: usize,
    offset: u32,
  ) {
    trace!("free list [{}]: {} -> {}", index, self.entries[index], offset);
    self.entries[index] = offset;
  }

  /// Shifts the entries at and after `index` right and stores `offset` there.
  pub fn insert_at(
    &mut self,
    index: usize,
    offset: u32,
  ) {
    debug_assert!(self.len() < self.capacity, "free list is full");
    trace!("free list insert [{}] = {}", index, offset);
    self.entries.insert(index, offset);
  }

  /// Drops the entry at `index`, shifting the following entries left.
  pub fn remove_at(
    &mut self,
    index: usize,
  ) -> u32 {
    let offset = self.entries.remove(index);
    trace!("free list remove [{}] = {}", index, offset);
    offset
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn list(offsets: &[u32]) -> FreeList {
    let mut list = FreeList::with_capacity(16).unwrap();
    for (i, &offset) in offsets.iter().enumerate() {
      list.insert_at(i, offset);
    }
    list
  }

  #[test]
  fn test_reserves_capacity_once() {
    let list = FreeList::with_capacity(512).unwrap();

    assert_eq!(list.len(), 0);
    assert_eq!(list.capacity(), 512);
    assert!(list.entries.capacity() >= 512);
  }

  #[test]
  fn test_find_min_size_is_first_fit() {
    let list = list(&[0, 100, 300]);
    let sizes = |offset: u32| match offset {
      0 => 40,
      100 => 200,
      300 => 500,
      _ => unreachable!(),
    };

    assert_eq!(list.find_min_size(40, sizes), Some(0));
    assert_eq!(list.find_min_size(41, sizes), Some(1));
    assert_eq!(list.find_min_size(201, sizes), Some(2));
    assert_eq!(list.find_min_size(501, sizes), None);
  }

  #[test]
  fn test_position_of() {
    let list = list(&[8, 64, 128]);

    assert_eq!(list.position_of(64), Some(1));
    assert_eq!(list.position_of(65), None);
  }

  #[test]
  fn test_insert_shifts_right() {
    let mut list = list(&[8, 128]);

    list.insert_at(1, 64);
    list.insert_at(0, 0);
    list.insert_at(4, 256);

    assert_eq!(list.as_slice(), &[0, 8, 64, 128, 256]);
  }

  #[test]
  fn test_remove_shifts_left() {
    let mut list = list(&[0, 8, 64, 128]);

    assert_eq!(list.remove_at(1), 8);
    assert_eq!(list.as_slice(), &[0, 64, 128]);
    assert_eq!(list.remove_at(2), 128);
    assert_eq!(list.as_slice(), &[0, 64]);
    assert_eq!(list.len(), 2);
  }

  #[test]
  fn test_replace_in_place() {
    let mut list = list(&[0, 64]);

    list.replace(1, 32);

    assert_eq!(list.get(1), 32);
    assert_eq!(list.len(), 2);
  }
}
