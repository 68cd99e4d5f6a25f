//! The contiguous byte store that journals splice.
//!
//! A buffer either owns its bytes (and may grow or shrink through its
//! allocator) or borrows caller memory (zero-copy, fixed capacity). A
//! failed allocation latches the buffer: the bytes are left untouched, the
//! failing operation reports [`Error::Alloc`], and every later mutation
//! reports [`Error::Invalid`].

use crate::alloc::{Allocator, SYSTEM};
use crate::Error;

#[derive(Debug)]
enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

/// A contiguous byte region with splice semantics.
#[derive(Debug)]
pub struct Buffer<'a> {
    storage: Storage<'a>,
    alloc: &'a dyn Allocator,
    error: Option<Error>,
}

impl Default for Buffer<'static> {
    fn default() -> Self {
        Buffer::new()
    }
}

impl<'a> Buffer<'a> {
    /// Creates an empty owned buffer. Allocates nothing.
    pub fn new() -> Buffer<'static> {
        Buffer {
            storage: Storage::Owned(Vec::new()),
            alloc: &SYSTEM,
            error: None,
        }
    }

    /// Creates an owned buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Result<Buffer<'static>, Error> {
        Buffer::with_allocator(data, &SYSTEM)
    }

    /// Creates an owned buffer holding a copy of `data`, growing through
    /// `alloc` from then on.
    pub fn with_allocator(data: &[u8], alloc: &'a dyn Allocator) -> Result<Buffer<'a>, Error> {
        let mut block = alloc.allocate(data.len()).ok_or(Error::Alloc)?;
        block[..data.len()].copy_from_slice(data);

        Ok(Buffer {
            storage: Storage::Owned(block),
            alloc,
            error: None,
        })
    }

    /// Creates a zero-copy buffer borrowing `data`.
    ///
    /// The capacity is fixed: writes that would change the size fail with
    /// [`Error::Alloc`].
    pub fn zero_copy(data: &'a mut [u8]) -> Buffer<'a> {
        Buffer {
            storage: Storage::Borrowed(data),
            alloc: &SYSTEM,
            error: None,
        }
    }

    /// The current contents.
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(vec) => vec,
            Storage::Borrowed(slice) => slice,
        }
    }

    /// The bytes in `[start, end)`, or [`Error::Offset`] if the range is
    /// out of bounds.
    pub fn data_at(&self, start: usize, end: usize) -> Result<&[u8], Error> {
        self.data().get(start..end).ok_or(Error::Offset)
    }

    /// The bytes from `start` to the end of the buffer.
    pub fn data_from(&self, start: usize) -> Result<&[u8], Error> {
        self.data().get(start..).ok_or(Error::Offset)
    }

    /// The current size in bytes.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The latched error, if an allocation has failed.
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Whether the buffer is still usable.
    pub fn valid(&self) -> bool {
        self.error.is_none()
    }

    /// Replaces the bytes in `[start, end)` with `data`, growing or
    /// shrinking the buffer by the difference.
    pub fn write(&mut self, start: usize, end: usize, data: &[u8]) -> Result<(), Error> {
        if self.error.is_some() {
            return Err(Error::Invalid);
        }
        if start > end || end > self.len() {
            return Err(Error::Offset);
        }

        match &mut self.storage {
            Storage::Borrowed(slice) => {
                if data.len() != end - start {
                    self.error = Some(Error::Alloc);
                    return Err(Error::Alloc);
                }
                slice[start..end].copy_from_slice(data);
            }
            Storage::Owned(vec) => {
                let old_len = vec.len();
                let removed = end - start;

                if data.len() > removed {
                    // grow first so the tail has room to move right
                    let new_len = old_len + (data.len() - removed);
                    if !self.alloc.resize(vec, new_len) {
                        self.error = Some(Error::Alloc);
                        return Err(Error::Alloc);
                    }
                    vec.copy_within(end..old_len, start + data.len());
                } else if data.len() < removed {
                    // move the tail left, then truncate in place
                    vec.copy_within(end..old_len, start + data.len());
                    vec.truncate(old_len - (removed - data.len()));
                }

                vec[start..start + data.len()].copy_from_slice(data);
            }
        }

        Ok(())
    }

    /// Removes the bytes in `[start, end)`.
    pub fn clear(&mut self, start: usize, end: usize) -> Result<(), Error> {
        self.write(start, end, &[])
    }

    /// Consumes an owned buffer, returning its bytes.
    ///
    /// Fails with [`Error::Invalid`] for zero-copy buffers, which do not
    /// own their bytes.
    pub fn into_vec(self) -> Result<Vec<u8>, Error> {
        match self.storage {
            Storage::Owned(vec) => Ok(vec),
            Storage::Borrowed(_) => Err(Error::Invalid),
        }
    }
}

impl AsRef<[u8]> for Buffer<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}
