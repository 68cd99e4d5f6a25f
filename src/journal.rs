//! A buffer plus an append-only log of byte-range edits, and the alignment
//! algorithm that carries stale offsets forward through those edits.
//!
//! Every size-changing splice appends an [`Entry`] recording where the edit
//! happened, how many bytes it inserted or removed, and the payload start
//! of the innermost enclosing length-prefixed region. A handle created at
//! journal version `v` replays the entries logged since `v` to find its
//! current byte range, or learns that the bytes it pointed at are gone.
//! Alignment is O(number of intervening edits); nothing is re-parsed.

use log::trace;

use crate::buffer::Buffer;
use crate::Error;

/// The version a handle is stamped with once the part it referenced is
/// gone. Latched: an invalidated handle never becomes valid again.
pub const SENTINEL: usize = usize::MAX;

/// One logged edit: at absolute position `offset`, `delta` bytes were
/// inserted (`> 0`) or removed (`< 0`); the payload of the innermost
/// enclosing length-prefixed region began at `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    origin: usize,
    offset: usize,
    delta: isize,
}

impl Entry {
    /// The enclosing region's payload start at the time of the edit.
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// The absolute position of the edit (the end of the replaced range).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The size change in bytes.
    pub fn delta(&self) -> isize {
        self.delta
    }
}

/// Relative offsets from a part's payload start to its enclosing headers:
/// the enclosing group's payload start, the part's own tag, and the part's
/// length prefix. All zero for a top-level message.
///
/// Invariant: `origin <= tag <= length <= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diff {
    /// Offset to the enclosing length-prefixed group's payload start.
    pub origin: isize,
    /// Offset to the part's tag.
    pub tag: isize,
    /// Offset to the part's length prefix (zero when the part has none).
    pub length: isize,
}

/// A byte range `[start, end)` in the buffer as of some journal version,
/// plus the header diffs that let alignment track the enclosing headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    /// Payload start.
    pub start: usize,
    /// Payload end.
    pub end: usize,
    /// Relative header offsets.
    pub diff: Diff,
}

impl Offset {
    /// An offset spanning `[start, end)` with all diffs zero.
    pub fn span(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            diff: Diff::default(),
        }
    }

    /// The payload size in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A buffer with an edit log.
#[derive(Debug)]
pub struct Journal<'a> {
    buffer: Buffer<'a>,
    entries: Vec<Entry>,
}

impl Default for Journal<'static> {
    fn default() -> Self {
        Journal::new()
    }
}

impl<'a> Journal<'a> {
    /// Creates a journal over an empty owned buffer.
    pub fn new() -> Journal<'static> {
        Journal::with_buffer(Buffer::new())
    }

    /// Creates a journal over a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Result<Journal<'static>, Error> {
        Ok(Journal::with_buffer(Buffer::from_slice(data)?))
    }

    /// Creates a journal over a zero-copy buffer borrowing `data`.
    ///
    /// Edits that change the total size fail with [`Error::Alloc`].
    pub fn zero_copy(data: &'a mut [u8]) -> Journal<'a> {
        Journal::with_buffer(Buffer::zero_copy(data))
    }

    /// Creates a journal over an existing buffer.
    pub fn with_buffer(buffer: Buffer<'a>) -> Journal<'a> {
        Journal {
            buffer,
            entries: Vec::new(),
        }
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &Buffer<'a> {
        &self.buffer
    }

    /// The current buffer contents.
    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    /// The current buffer size in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The journal version: the number of logged entries.
    pub fn version(&self) -> usize {
        self.entries.len()
    }

    /// The logged entries.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Replaces the bytes in `[start, end)` with `data`, logging the size
    /// change. `origin` is the payload start of the innermost enclosing
    /// length-prefixed region (for a deletion of a complete field, the
    /// start of the removed range).
    ///
    /// A same-size write splices without logging. On a failed splice the
    /// logged entry is popped again; the journal never records an edit
    /// that did not happen.
    pub fn write(
        &mut self,
        origin: usize,
        start: usize,
        end: usize,
        data: &[u8],
    ) -> Result<(), Error> {
        if start > end || end > self.buffer.len() {
            return Err(Error::Offset);
        }

        let delta = data.len() as isize - (end - start) as isize;
        if delta == 0 {
            return self.buffer.write(start, end, data);
        }

        trace!(
            "journal: splice [{start}, {end}) -> {} bytes (origin {origin}, delta {delta})",
            data.len()
        );

        self.entries.push(Entry {
            origin,
            offset: end,
            delta,
        });
        if let Err(err) = self.buffer.write(start, end, data) {
            self.entries.pop();
            return Err(err);
        }

        Ok(())
    }

    /// Removes the bytes in `[start, end)`, logging the size change.
    pub fn clear(&mut self, origin: usize, start: usize, end: usize) -> Result<(), Error> {
        self.write(origin, start, end, &[])
    }

    /// Replays the entries logged since `version` over `offset`, bringing
    /// both up to date.
    ///
    /// Each entry is classified against the offset and applied:
    ///
    /// 1. an edit strictly before the part moves it (and any header the
    ///    edit landed behind),
    /// 2. an edit within the payload resizes it,
    /// 3. an enclosing group collapsing to nothing collapses the part,
    /// 4. a foreign deletion swallowing the part's header erases it.
    ///
    /// In cases 3 and 4 (and for a packed member whose block collapses in
    /// case 2), `version` is set to [`SENTINEL`] and the result is
    /// [`Error::Invalid`]: the bytes the offset referred to no longer
    /// exist.
    pub fn align(&self, version: &mut usize, offset: &mut Offset) -> Result<(), Error> {
        if *version == SENTINEL {
            return Err(Error::Invalid);
        }
        if *version >= self.entries.len() {
            return Ok(());
        }

        let mut invalid = false;
        for entry in &self.entries[*version..] {
            let start = offset.start as isize;
            let end = offset.end as isize;
            let origin = entry.origin as isize;
            let position = entry.offset as isize;
            let delta = entry.delta;

            if origin < start && position < end {
                // The edit happened strictly before this part: shift it,
                // along with any header offset the edit landed behind.
                offset.start = (start + delta) as usize;
                offset.end = (end + delta) as usize;

                for diff in [
                    &mut offset.diff.origin,
                    &mut offset.diff.tag,
                    &mut offset.diff.length,
                ] {
                    if position > offset.start as isize + *diff - delta {
                        *diff -= delta;
                    }
                }
            } else if origin >= start + offset.diff.origin && position <= end {
                if origin >= start {
                    // The edit happened within this part's payload.
                    offset.end = (end + delta) as usize;
                    if offset.diff.origin != 0 && offset.diff.tag == 0 && offset.is_empty() {
                        // packed member whose block collapsed
                        invalid = true;
                    }
                } else if (start + offset.diff.origin) - (end + delta) == 0 {
                    // The enclosing group collapsed to zero length, taking
                    // this part with it.
                    offset.start = (start + offset.diff.origin) as usize;
                    offset.end = (end + delta) as usize;
                    offset.diff = Diff::default();
                    invalid = true;
                }
            } else if origin <= start + offset.diff.origin
                && origin == position + delta
                && position >= end
            {
                // A pure deletion of a foreign region swallowed this
                // part's header whole.
                offset.start = entry.origin;
                offset.end = entry.origin;
                offset.diff = Diff::default();
                invalid = true;
            }
            // Anything else is a parent-level resize wrapping this part;
            // the part itself does not move.
        }

        if invalid {
            *version = SENTINEL;
            Err(Error::Invalid)
        } else {
            *version = self.entries.len();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::alloc::test_util::Capped;
    use crate::journal::{Diff, Offset, SENTINEL};

    use super::*;

    #[test]
    fn same_size_writes_are_not_logged() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(b"abc")?;
        journal.write(0, 1, 2, b"x")?;

        assert_eq!(journal.data(), b"axc");
        assert_eq!(journal.version(), 0);
        Ok(())
    }

    #[test]
    fn align_moves_a_part_behind_an_insertion() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(b"ABCDEFGHI")?;
        journal.write(0, 0, 0, b"AMAZING ")?;

        assert_eq!(journal.data(), b"AMAZING ABCDEFGHI");
        assert_eq!(journal.entries(), &[Entry { origin: 0, offset: 0, delta: 8 }]);

        let mut version = 0;
        let mut offset = Offset::span(8, 9);
        journal.align(&mut version, &mut offset)?;

        assert_eq!(version, journal.version());
        assert_eq!(offset, Offset::span(16, 17));
        Ok(())
    }

    #[test]
    fn align_grows_a_part_resized_inside() -> anyhow::Result<()> {
        // tag 1, length-delimited, one payload byte
        let mut journal = Journal::from_slice(&[0x0a, 0x01, b'X'])?;
        journal.write(2, 2, 3, b"8 bytes!")?;

        assert_eq!(journal.entries(), &[Entry { origin: 2, offset: 3, delta: 7 }]);

        let mut version = 0;
        let mut offset = Offset {
            start: 2,
            end: 3,
            diff: Diff { origin: -2, tag: -2, length: -1 },
        };
        journal.align(&mut version, &mut offset)?;

        assert_eq!(version, journal.version());
        assert_eq!(
            offset,
            Offset {
                start: 2,
                end: 10,
                diff: Diff { origin: -2, tag: -2, length: -1 },
            }
        );
        Ok(())
    }

    #[test]
    fn align_invalidates_a_cleared_part() -> anyhow::Result<()> {
        // tag 1, length-delimited, two payload bytes
        let mut journal = Journal::from_slice(&[0x0a, 0x02, b'X', b'Y'])?;
        journal.clear(0, 0, 4)?;

        assert_eq!(journal.entries(), &[Entry { origin: 0, offset: 4, delta: -4 }]);

        let mut version = 0;
        let mut offset = Offset {
            start: 2,
            end: 4,
            diff: Diff { origin: -2, tag: -2, length: -1 },
        };
        assert_matches!(
            journal.align(&mut version, &mut offset),
            Err(Error::Invalid)
        );

        assert_eq!(version, SENTINEL);
        assert_eq!(offset, Offset::span(0, 0));

        // latched: aligning again still reports Invalid
        assert_matches!(
            journal.align(&mut version, &mut offset),
            Err(Error::Invalid)
        );
        Ok(())
    }

    #[test]
    fn align_adjusts_headers_behind_a_prefix_resize() -> anyhow::Result<()> {
        // a part whose enclosing group sits at 0, tag at 2, prefix at 4,
        // payload [5, 8); the prefix grows from one byte to two
        let mut journal = Journal::from_slice(&[0x12, 0x06, 0x0a, 0x03, 0x78, b'a', b'b', b'c'])?;
        journal.write(0, 4, 5, &[0x81, 0x01])?;

        let mut version = 0;
        let mut offset = Offset {
            start: 5,
            end: 8,
            diff: Diff { origin: -5, tag: -3, length: -1 },
        };
        journal.align(&mut version, &mut offset)?;

        // the part moved, the group start and tag did not
        assert_eq!(
            offset,
            Offset {
                start: 6,
                end: 9,
                diff: Diff { origin: -6, tag: -4, length: -2 },
            }
        );
        Ok(())
    }

    #[test]
    fn align_is_idempotent_once_current() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(b"0123456789")?;
        journal.write(0, 0, 2, b"")?;

        let mut version = 0;
        let mut offset = Offset::span(4, 8);
        journal.align(&mut version, &mut offset)?;
        let aligned = offset;

        journal.align(&mut version, &mut offset)?;
        assert_eq!(offset, aligned);
        assert_eq!(version, journal.version());
        Ok(())
    }

    #[test]
    fn zero_copy_journals_refuse_resizes() {
        let mut data = [0x08, 0x01];
        let mut journal = Journal::zero_copy(&mut data);

        // in-place rewrites are fine
        journal.write(1, 1, 2, &[0x7f]).unwrap();
        assert_eq!(journal.data(), &[0x08, 0x7f]);

        // anything size-changing is an allocation failure, unlogged
        assert_matches!(journal.write(1, 1, 2, &[0x80, 0x01]), Err(Error::Alloc));
        assert_eq!(journal.version(), 0);
        assert_eq!(journal.data(), &[0x08, 0x7f]);
    }

    #[test]
    fn failed_splice_pops_the_entry() {
        let buffer = Buffer::with_allocator(b"abcd", &Capped(4)).unwrap();
        let mut journal = Journal::with_buffer(buffer);

        assert_matches!(journal.write(0, 4, 4, b"efgh"), Err(Error::Alloc));
        assert_eq!(journal.version(), 0);
        assert_eq!(journal.data(), b"abcd");
    }
}
