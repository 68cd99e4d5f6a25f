//! Defines the error codes surfaced by every fallible operation.

use thiserror::Error;

/// An error code surfaced to callers.
///
/// `Absent` and `Eom` are normal outcomes rather than failures: the former
/// reports a missing optional field, the latter an exhausted cursor.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// An allocation or resize failed. The operation was reverted and the
    /// pre-edit state is intact.
    #[error("allocation failed")]
    Alloc,
    /// An invalidated handle was used, or the arguments are inconsistent.
    #[error("invalid handle or arguments")]
    Invalid,
    /// A referenced descriptor is missing or malformed.
    #[error("missing or malformed descriptor")]
    Descriptor,
    /// An unknown wire type was encountered.
    #[error("unknown wire type {0}")]
    Wiretype(u64),
    /// A length prefix points past the end of the buffer.
    #[error("length prefix exceeds buffer")]
    Overflow,
    /// The buffer ended in the middle of a value.
    #[error("unexpected end of buffer")]
    Underrun,
    /// A byte range lies outside the buffer.
    #[error("offset out of range")]
    Offset,
    /// The field is not present and no default is available.
    #[error("field absent")]
    Absent,
    /// A varint is malformed or out of range for its target type.
    #[error("malformed varint")]
    Varint,
    /// The cursor is exhausted.
    #[error("end of message")]
    Eom,
}
