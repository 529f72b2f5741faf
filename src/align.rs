/// Size of the allocation word, in bytes. Every region size is a multiple of it.
pub const WORD_SIZE: u32 = 4;

/// Rounds a `u32` up to the next multiple of [`WORD_SIZE`].
///
/// Returns `None` when the rounded value does not fit in a `u32`.
///
/// # Examples
///
/// ```rust
/// use subheap::align;
///
/// assert_eq!(align!(13), Some(16));
/// assert_eq!(align!(12), Some(12));
/// assert_eq!(align!(u32::MAX), None);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value as u32)
      .checked_add($crate::WORD_SIZE - 1)
      .map(|v| v & !($crate::WORD_SIZE - 1))
  };
}
