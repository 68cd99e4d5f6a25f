//! A write-only appender producing wire bytes without journaling.
//!
//! Fields written to an encoder are immutable once past; there is no edit
//! log and no alignment. This is the cheap path for building a message
//! front to back, with [`Message`](crate::message::Message) reserved for
//! editing existing buffers.

use crate::buffer::Buffer;
use crate::descriptor::{FieldDescriptor, MessageDescriptor, Value};
use crate::wire::{self, WireType};
use crate::Error;

/// A streaming encoder for one message type.
#[derive(Debug)]
pub struct Encoder<'a, 'd> {
    descriptor: &'d MessageDescriptor<'d>,
    buffer: Buffer<'a>,
}

impl<'d> Encoder<'static, 'd> {
    /// An encoder writing into a fresh owned buffer.
    pub fn new(descriptor: &'d MessageDescriptor<'d>) -> Encoder<'static, 'd> {
        Encoder {
            descriptor,
            buffer: Buffer::new(),
        }
    }
}

impl<'a, 'd> Encoder<'a, 'd> {
    /// An encoder appending to an existing buffer, for callers that bring
    /// their own allocator or storage.
    pub fn with_buffer(descriptor: &'d MessageDescriptor<'d>, buffer: Buffer<'a>) -> Encoder<'a, 'd> {
        Encoder { descriptor, buffer }
    }

    /// The message descriptor this encoder writes.
    pub fn descriptor(&self) -> &'d MessageDescriptor<'d> {
        self.descriptor
    }

    /// The bytes encoded so far.
    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    /// The number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been encoded yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the encoder, returning its buffer.
    pub fn into_buffer(self) -> Buffer<'a> {
        self.buffer
    }

    fn field_for(&self, tag: u32) -> Result<&'d FieldDescriptor<'d>, Error> {
        self.descriptor.field_by_tag(tag).ok_or(Error::Descriptor)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = self.buffer.len();
        self.buffer.write(len, len, bytes)
    }

    /// Appends one occurrence of a scalar field.
    pub fn encode(&mut self, tag: u32, value: &Value) -> Result<(), Error> {
        self.encode_all(tag, std::slice::from_ref(value))
    }

    /// Appends `values` as occurrences of `tag`.
    ///
    /// A packed field is written as a single length-prefixed block; any
    /// other field as one tag/value pair per occurrence. An empty slice
    /// writes nothing.
    pub fn encode_all(&mut self, tag: u32, values: &[Value]) -> Result<(), Error> {
        let field = self.field_for(tag)?;
        for value in values {
            if !value.matches_type(field.typ()) {
                return Err(Error::Descriptor);
            }
        }
        if values.is_empty() {
            return Ok(());
        }

        let mut out = Vec::new();
        if field.is_packed() {
            let mut block = Vec::new();
            for value in values {
                field.typ().encode_value(value, &mut block)?;
            }
            wire::write_varint(&mut out, wire::pack_tag(tag, WireType::Length));
            wire::write_varint(&mut out, block.len() as u64);
            out.extend_from_slice(&block);
        } else {
            for value in values {
                let mut payload = Vec::new();
                field.typ().encode_value(value, &mut payload)?;

                wire::write_varint(&mut out, wire::pack_tag(tag, field.typ().wiretype()));
                if field.typ().wiretype() == WireType::Length {
                    wire::write_varint(&mut out, payload.len() as u64);
                }
                out.extend_from_slice(&payload);
            }
        }

        self.append(&out)
    }

    /// Appends the accumulated bytes of a nested encoder as one occurrence
    /// of the sub-message field `tag`.
    pub fn encode_message(&mut self, tag: u32, nested: &Encoder<'_, 'd>) -> Result<(), Error> {
        let field = self.field_for(tag)?;
        let expected = field.message_descriptor().ok_or(Error::Descriptor)?;
        if !std::ptr::eq(expected, nested.descriptor) {
            return Err(Error::Descriptor);
        }

        let payload = nested.data();
        let mut out = Vec::new();
        wire::write_varint(&mut out, wire::pack_tag(tag, WireType::Length));
        wire::write_varint(&mut out, payload.len() as u64);
        out.extend_from_slice(payload);

        self.append(&out)
    }

    /// Appends the field's declared default value.
    pub fn encode_default(&mut self, tag: u32) -> Result<(), Error> {
        let field = self.field_for(tag)?;
        let default = field.default().cloned().ok_or(Error::Absent)?;
        self.encode(tag, &default)
    }
}
