//! A handle onto a byte range of a journaled buffer that stays usable
//! across edits made through other handles.
//!
//! A part is plain data: a journal version, an [`Offset`], and the chain of
//! enclosing length-prefixed group offsets. It does not borrow the journal;
//! operations take the journal explicitly, and validity is a property of
//! the version rather than of any reference. A part aligned to the
//! [`SENTINEL`] version is permanently invalid.
//!
//! The parent chain is what propagates length-prefix adjustments outward:
//! any edit that changes this part's size re-encodes its own length prefix
//! and then the prefix of every enclosing group, innermost first.

use log::trace;

use crate::journal::{Journal, Offset, SENTINEL};
use crate::wire;
use crate::Error;

/// A `(version, offset)` handle into a journal.
#[derive(Debug, Clone)]
pub struct Part {
    version: usize,
    offset: Offset,
    parents: Vec<Offset>,
}

impl Part {
    /// A part spanning the whole buffer, as for a top-level message.
    pub fn whole(journal: &Journal<'_>) -> Part {
        Part {
            version: journal.version(),
            offset: Offset::span(0, journal.len()),
            parents: Vec::new(),
        }
    }

    /// A part for `offset` nested directly inside `self`.
    ///
    /// `self` must be freshly aligned; the child is stamped with the
    /// journal's current version and inherits the full parent chain.
    pub(crate) fn child(&self, journal: &Journal<'_>, offset: Offset) -> Part {
        let mut parents = Vec::with_capacity(self.parents.len() + 1);
        parents.push(self.offset);
        parents.extend_from_slice(&self.parents);

        Part {
            version: journal.version(),
            offset,
            parents,
        }
    }

    /// Replays journal entries logged since this part's version, updating
    /// the part's offsets (and those of its enclosing groups).
    ///
    /// Reports [`Error::Invalid`], permanently, once the bytes the part
    /// referred to are gone.
    pub fn align(&mut self, journal: &Journal<'_>) -> Result<(), Error> {
        if self.version == SENTINEL {
            return Err(Error::Invalid);
        }
        if self.version == journal.version() {
            return Ok(());
        }

        let mut version = self.version;
        let mut result = journal.align(&mut version, &mut self.offset);
        for parent in &mut self.parents {
            let mut parent_version = self.version;
            if journal.align(&mut parent_version, parent).is_err() {
                result = Err(Error::Invalid);
            }
        }

        self.version = match result {
            Ok(()) => journal.version(),
            Err(_) => SENTINEL,
        };
        result
    }

    /// Whether the part still references live bytes.
    pub fn valid(&self) -> bool {
        self.version != SENTINEL
    }

    /// The latched error, if any.
    pub fn error(&self) -> Option<Error> {
        (!self.valid()).then_some(Error::Invalid)
    }

    /// The part's offset as of its version.
    pub(crate) fn offset(&self) -> Offset {
        self.offset
    }

    /// The payload start. Only meaningful after [`Part::align`].
    pub fn start(&self) -> usize {
        self.offset.start
    }

    /// The payload end. Only meaningful after [`Part::align`].
    pub fn end(&self) -> usize {
        self.offset.end
    }

    /// The payload size in bytes. Only meaningful after [`Part::align`].
    pub fn len(&self) -> usize {
        self.offset.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.offset.is_empty()
    }

    /// Aligns and returns the payload bytes.
    pub fn bytes<'j>(&mut self, journal: &'j Journal<'_>) -> Result<&'j [u8], Error> {
        self.align(journal)?;
        journal.buffer().data_at(self.offset.start, self.offset.end)
    }

    /// Marks the part invalid without touching the journal, for operations
    /// that removed the part's own bytes.
    pub(crate) fn invalidate(&mut self) {
        self.version = SENTINEL;
        self.offset = Offset::default();
    }

    /// Replaces the part's payload with `data`, re-encoding its own length
    /// prefix and those of all enclosing groups.
    pub(crate) fn replace(&mut self, journal: &mut Journal<'_>, data: &[u8]) -> Result<(), Error> {
        self.align(journal)?;

        let delta = data.len() as isize - self.offset.len() as isize;
        let mut patched = false;

        trace!(
            "part: replace [{}, {}) with {} bytes",
            self.offset.start,
            self.offset.end,
            data.len()
        );

        // A narrowing prefix has to be re-encoded while the old payload
        // still spans bytes, or alignment cannot relocate this part past
        // its own prefix edit.
        if delta != 0 && self.offset.diff.length < 0 {
            let old_width = (-self.offset.diff.length) as usize;
            if wire::varint_size(data.len() as u64) < old_width {
                Self::patch_prefix(journal, self.offset, data.len())?;
                self.align(journal)?;
                patched = true;
            }
        }

        let Offset { start, end, .. } = self.offset;
        journal.write(start, start, end, data)?;
        self.align(journal)?;

        if delta != 0 {
            if !patched && self.offset.diff.length < 0 {
                Self::patch_prefix(journal, self.offset, data.len())?;
                self.align(journal)?;
            }
            self.patch_parents(journal)?;
        }

        Ok(())
    }

    /// Appends `data` at the end of the part's payload, updating length
    /// prefixes as for [`Part::replace`].
    pub(crate) fn append(&mut self, journal: &mut Journal<'_>, data: &[u8]) -> Result<(), Error> {
        self.align(journal)?;
        if data.is_empty() {
            return Ok(());
        }

        trace!("part: append {} bytes at {}", data.len(), self.offset.end);

        let Offset { start, end, .. } = self.offset;
        journal.write(start, end, end, data)?;
        self.align(journal)?;

        if self.offset.diff.length < 0 {
            Self::patch_prefix(journal, self.offset, self.offset.len())?;
            self.align(journal)?;
        }
        self.patch_parents(journal)
    }

    /// Removes the part's complete field (tag through payload) from the
    /// buffer, updating enclosing length prefixes. The handle is latched
    /// invalid; enclosing handles learn of the removal when they align.
    pub(crate) fn remove(&mut self, journal: &mut Journal<'_>) -> Result<(), Error> {
        self.align(journal)?;

        let removed = self.offset.len() + (-self.offset.diff.tag) as usize;

        // If the removal empties the innermost enclosing group and that
        // group has a multi-byte prefix, the prefix has to narrow while
        // the group's payload still spans bytes.
        if let Some(parent) = self.parents.first().copied() {
            if parent.diff.length < -1 && parent.len() == removed {
                Self::patch_prefix(journal, parent, 0)?;
                self.align(journal)?;
            }
        }

        let wire_start = (self.offset.start as isize + self.offset.diff.tag) as usize;
        trace!("part: remove [{wire_start}, {})", self.offset.end);
        journal.clear(wire_start, wire_start, self.offset.end)?;

        // The part's own bytes are gone; cascade the remaining prefixes
        // through a detached chain.
        let mut version = self.version;
        let mut parents = std::mem::take(&mut self.parents);
        self.invalidate();

        for i in 0..parents.len() {
            if parents[i].diff.length < 0 {
                Self::align_chain(journal, &mut version, &mut parents)?;
                Self::patch_prefix(journal, parents[i], parents[i].len())?;
            }
        }

        Ok(())
    }

    /// Re-encodes the length prefixes of all enclosing groups, innermost
    /// first, from their current (aligned) payload sizes.
    fn patch_parents(&mut self, journal: &mut Journal<'_>) -> Result<(), Error> {
        for i in 0..self.parents.len() {
            if self.parents[i].diff.length < 0 {
                self.align(journal)?;
                Self::patch_prefix(journal, self.parents[i], self.parents[i].len())?;
            }
        }
        self.align(journal)
    }

    /// Writes a freshly encoded length prefix for the group at `at`,
    /// declaring `len` payload bytes.
    fn patch_prefix(journal: &mut Journal<'_>, at: Offset, len: usize) -> Result<(), Error> {
        let start = at.start as isize;
        let prefix_start = (start + at.diff.length) as usize;
        let origin = (start + at.diff.origin) as usize;

        let prefix = wire::encode_varint(len as u64);
        journal.write(origin, prefix_start, at.start, &prefix)
    }

    fn align_chain(
        journal: &Journal<'_>,
        version: &mut usize,
        offsets: &mut [Offset],
    ) -> Result<(), Error> {
        let from = *version;
        let mut result = Ok(());
        for offset in offsets.iter_mut() {
            let mut v = from;
            if journal.align(&mut v, offset).is_err() {
                result = Err(Error::Invalid);
            }
            *version = v;
        }
        result
    }
}
