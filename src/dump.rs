//! Read-only views of the heap: dumps, statistics and the structural check.
//!
//! Everything here walks the chunk headers by address. The free list is
//! only read by [`Heap::check`], to compare it against what the walk finds.

use std::io::{self, Write};

use crate::{
  Heap,
  error::{Corruption, HeapError, Result},
  header::Status,
};

/// How much [`Heap::dump`] prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
  /// `+offset (status,size)` columns, five chunks per line.
  #[default]
  Compact,
  /// One sentence per chunk.
  Verbose,
  /// Like [`Verbosity::Verbose`], preceded by heap-wide counters.
  Stats,
}

impl TryFrom<u8> for Verbosity {
  type Error = u8;

  fn try_from(level: u8) -> core::result::Result<Self, u8> {
    match level {
      0 => Ok(Verbosity::Compact),
      1 => Ok(Verbosity::Verbose),
      2 => Ok(Verbosity::Stats),
      other => Err(other),
    }
  }
}

/// Heap-wide counters gathered by walking every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
  pub heap_size: u32,
  pub free_capacity: u32,
  pub free_chunks: u32,
  pub free_bytes: u32,
  pub allocated_chunks: u32,
  pub allocated_bytes: u32,
}

const CHUNKS_PER_LINE: u32 = 5;

impl Heap {
  /// Prints every chunk to `out`, in address order.
  ///
  /// # Errors
  ///
  /// [`HeapError::Corruption`] when the walk finds a header it cannot trust
  /// or does not end exactly at the end of the heap. The heap must not be
  /// used after that. [`HeapError::Io`] if `out` fails.
  pub fn dump<W: Write>(
    &self,
    verbosity: Verbosity,
    out: &mut W,
  ) -> Result<()> {
    if verbosity == Verbosity::Stats {
      writeln!(out, "heap size = {} bytes", self.size())?;
      writeln!(out, "maximum free chunks = {}", self.free_capacity())?;
      writeln!(out, "currently free chunks = {}", self.free_chunks())?;
    }

    let mut count = 0;

    for region in self.regions() {
      let region = match region {
        Ok(region) => region,
        Err(err) => return self.dump_failure(err, verbosity, count, out),
      };

      write_entry(out, verbosity, count, region.offset, region.status.raw(), region.size)?;
      count += 1;

      if verbosity != Verbosity::Compact || count % CHUNKS_PER_LINE == 0 {
        writeln!(out)?;
      }
    }

    if verbosity == Verbosity::Compact && count % CHUNKS_PER_LINE != 0 {
      writeln!(out)?;
    }

    Ok(())
  }

  /// Reports a failed walk the way the dump ends, then hands the error back.
  ///
  /// A chunk with an untrustworthy header still gets its entry, tagged `?`
  /// when the status is unknown. An overrun closes the current line first.
  fn dump_failure<W: Write>(
    &self,
    err: HeapError,
    verbosity: Verbosity,
    count: u32,
    out: &mut W,
  ) -> Result<()> {
    let HeapError::Corruption { offset, reason } = err else {
      return Err(err);
    };

    match reason {
      Corruption::BadStatus(_) | Corruption::BadSize(_) => {
        let header = self.header(offset);
        write_entry(out, verbosity, count, offset, header.status, header.size)?;
      }
      _ => {
        if verbosity == Verbosity::Compact && count % CHUNKS_PER_LINE != 0 {
          writeln!(out)?;
        }
      }
    }

    writeln!(out, "\ndump_heap exiting because {}", reason)?;
    Err(err)
  }

  /// [`Heap::dump`] to standard output.
  pub fn dump_stdout(
    &self,
    verbosity: Verbosity,
  ) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    self.dump(verbosity, &mut out)?;
    out.flush()?;
    Ok(())
  }

  /// Verifies the heap layout against the free list.
  ///
  /// Checks that the chunks tile the heap exactly, that no two neighbouring
  /// chunks are both free, and that the free list names exactly the free
  /// chunks, in address order.
  pub fn check(&self) -> Result<()> {
    let mut free = Vec::new();
    let mut prev_free = false;

    for region in self.regions() {
      let region = region?;

      if region.is_free() {
        if prev_free {
          return Err(corruption(region.offset, Corruption::UnmergedFree));
        }
        free.push(region.offset);
      }
      prev_free = region.is_free();
    }

    let listed = self.free_offsets();

    if listed.len() != free.len() {
      return Err(corruption(
        0,
        Corruption::FreeCountMismatch {
          listed: listed.len() as u32,
          found: free.len() as u32,
        },
      ));
    }

    if let Some((&found, _)) = free
      .iter()
      .zip(listed)
      .find(|(found, listed)| found != listed)
    {
      return Err(corruption(found, Corruption::FreeListMismatch));
    }

    Ok(())
  }

  /// Counts chunks and bytes by status.
  pub fn stats(&self) -> Result<HeapStats> {
    let mut stats = HeapStats {
      heap_size: self.size(),
      free_capacity: self.free_capacity(),
      ..HeapStats::default()
    };

    for region in self.regions() {
      let region = region?;

      match region.status {
        Status::Free => {
          stats.free_chunks += 1;
          stats.free_bytes += region.size;
        }
        Status::Allocated => {
          stats.allocated_chunks += 1;
          stats.allocated_bytes += region.size;
        }
      }
    }

    Ok(stats)
  }
}

fn corruption(
  offset: u32,
  reason: Corruption,
) -> HeapError {
  log::error!("heap check failed at offset {}: {}", offset, reason);
  HeapError::Corruption { offset, reason }
}

fn write_entry<W: Write>(
  out: &mut W,
  verbosity: Verbosity,
  index: u32,
  offset: u32,
  status: u32,
  size: u32,
) -> io::Result<()> {
  let (tag, name) = match Status::from_raw(status) {
    Some(Status::Free) => ('F', "free"),
    Some(Status::Allocated) => ('A', "allocated"),
    None => ('?', "?"),
  };

  if verbosity == Verbosity::Compact {
    write!(out, "+{:05} ({},{:5}) ", offset, tag, size)
  } else {
    write!(
      out,
      "chunk {}: status = {}, size = {} bytes, offset from heap start = {} bytes",
      index, name, size, offset
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::header::{HEADER_SIZE, Header};

  fn dump(
    heap: &Heap,
    verbosity: Verbosity,
  ) -> String {
    let mut out = Vec::new();
    heap.dump(verbosity, &mut out).unwrap();
    String::from_utf8(out).unwrap()
  }

  #[test]
  fn test_verbosity_levels() {
    assert_eq!(Verbosity::try_from(0), Ok(Verbosity::Compact));
    assert_eq!(Verbosity::try_from(1), Ok(Verbosity::Verbose));
    assert_eq!(Verbosity::try_from(2), Ok(Verbosity::Stats));
    assert_eq!(Verbosity::try_from(3), Err(3));
  }

  #[test]
  fn test_compact_dump() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(100).unwrap();

    assert_eq!(
      dump(&heap, Verbosity::Compact),
      "+00000 (A,  108) +00108 (F, 3988) \n"
    );
  }

  #[test]
  fn test_compact_dump_wraps_every_five() {
    let mut heap = Heap::new(4096).unwrap();
    for _ in 0..5 {
      heap.allocate(8).unwrap();
    }

    let out = dump(&heap, Verbosity::Compact);
    let lines: Vec<_> = out.lines().collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(
      lines[0],
      "+00000 (A,   16) +00016 (A,   16) +00032 (A,   16) +00048 (A,   16) +00064 (A,   16) "
    );
    assert_eq!(lines[1], "+00080 (F, 4016) ");
  }

  #[test]
  fn test_verbose_dump() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(100).unwrap();

    assert_eq!(
      dump(&heap, Verbosity::Verbose),
      "chunk 0: status = allocated, size = 108 bytes, offset from heap start = 0 bytes\n\
       chunk 1: status = free, size = 3988 bytes, offset from heap start = 108 bytes\n"
    );
  }

  #[test]
  fn test_stats_dump() {
    let heap = Heap::new(4096).unwrap();

    assert_eq!(
      dump(&heap, Verbosity::Stats),
      "heap size = 4096 bytes\n\
       maximum free chunks = 512\n\
       currently free chunks = 1\n\
       chunk 0: status = free, size = 4096 bytes, offset from heap start = 0 bytes\n"
    );
  }

  #[test]
  fn test_dump_reports_bad_status() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(100).unwrap();
    heap.poke_status(108, 0x1234_5678);

    let mut out = Vec::new();
    let err = heap.dump(Verbosity::Compact, &mut out).unwrap_err();

    assert!(matches!(
      err,
      HeapError::Corruption {
        offset: 108,
        reason: Corruption::BadStatus(0x1234_5678)
      }
    ));
    let out = String::from_utf8(out).unwrap();
    assert_eq!(
      out,
      "+00000 (A,  108) +00108 (?, 3988) \n\
       dump_heap exiting because found bad chunk status 0x12345678\n"
    );
  }

  #[test]
  fn test_dump_reports_overrun() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(100).unwrap();
    heap.poke_header(108, Header::new(Status::Free, 4000));

    let mut out = Vec::new();
    let err = heap.dump(Verbosity::Compact, &mut out).unwrap_err();

    assert!(matches!(
      err,
      HeapError::Corruption {
        offset: 4108,
        reason: Corruption::Overrun
      }
    ));
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "+00000 (A,  108) +00108 (F, 4000) \n\
       \n\
       dump_heap exiting because end of last chunk does not match end of heap\n"
    );
  }

  #[test]
  fn test_verbose_dump_reports_overrun() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(100).unwrap();
    heap.poke_header(108, Header::new(Status::Free, 3984));

    let mut out = Vec::new();
    let err = heap.dump(Verbosity::Verbose, &mut out).unwrap_err();

    // 4 bytes are left, too few for a header.
    assert!(matches!(
      err,
      HeapError::Corruption {
        offset: 4092,
        reason: Corruption::Overrun
      }
    ));
    assert!(
      String::from_utf8(out)
        .unwrap()
        .ends_with("offset from heap start = 108 bytes\n\ndump_heap exiting because end of last chunk does not match end of heap\n")
    );
  }

  #[test]
  fn test_zero_sized_chunk_stops_walk() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(100).unwrap();
    heap.poke_header(108, Header::new(Status::Free, 0));

    let walked: Vec<_> = heap.regions().collect();
    assert_eq!(walked.len(), 2);
    assert!(walked[0].is_ok());
    assert!(matches!(
      walked[1],
      Err(HeapError::Corruption {
        offset: 108,
        reason: Corruption::BadSize(0)
      })
    ));

    let mut out = Vec::new();
    let err = heap.dump(Verbosity::Compact, &mut out).unwrap_err();

    assert!(matches!(
      err,
      HeapError::Corruption {
        reason: Corruption::BadSize(0),
        ..
      }
    ));
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "+00000 (A,  108) +00108 (F,    0) \n\
       dump_heap exiting because chunk size 0 is not a positive multiple of the word size\n"
    );
    assert!(matches!(
      heap.check(),
      Err(HeapError::Corruption {
        reason: Corruption::BadSize(0),
        ..
      })
    ));
  }

  #[test]
  fn test_check_detects_missing_free_entry() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(40).unwrap();
    heap.free_list_mut().remove_at(0);

    assert!(matches!(
      heap.check(),
      Err(HeapError::Corruption {
        reason: Corruption::FreeCountMismatch {
          listed: 0,
          found: 1
        },
        ..
      })
    ));
  }

  #[test]
  fn test_check_detects_misplaced_free_entry() {
    let mut heap = Heap::new(4096).unwrap();
    let a = heap.allocate(40).unwrap();
    heap.allocate(40).unwrap();
    heap.deallocate(a.as_ptr()).unwrap();
    heap.check().unwrap();

    heap.free_list_mut().replace(1, 100);

    assert!(matches!(
      heap.check(),
      Err(HeapError::Corruption {
        offset: 96,
        reason: Corruption::FreeListMismatch
      })
    ));
  }

  #[test]
  fn test_check_and_stats() {
    let mut heap = Heap::new(4096).unwrap();
    let a = heap.allocate(40).unwrap();
    heap.allocate(40).unwrap();

    heap.check().unwrap();
    heap.deallocate(a.as_ptr()).unwrap();
    heap.check().unwrap();

    let stats = heap.stats().unwrap();
    assert_eq!(stats.free_chunks, 2);
    assert_eq!(stats.free_bytes, 4096 - 40 - HEADER_SIZE);
    assert_eq!(stats.allocated_chunks, 1);
    assert_eq!(stats.allocated_bytes, 40 + HEADER_SIZE);
    assert_eq!(stats.free_bytes + stats.allocated_bytes, stats.heap_size);
  }

  #[test]
  fn test_check_detects_unmerged_free() {
    let mut heap = Heap::new(4096).unwrap();
    heap.allocate(40).unwrap();
    heap.poke_status(0, crate::header::FREE);

    assert!(matches!(
      heap.check(),
      Err(HeapError::Corruption {
        reason: Corruption::UnmergedFree,
        ..
      })
    ));
  }
}
