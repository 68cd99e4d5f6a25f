//! A schema-driven walk over a wire-encoded buffer.
//!
//! The decoder is a plain iterator yielding `(field descriptor, value)`
//! pairs in wire order. Sub-messages are yielded as raw byte slices the
//! caller recurses into with a fresh decoder; packed blocks are expanded
//! member-wise; unknown tags are skipped by wire-type length. The first
//! malformed byte sequence yields an error and ends iteration.

use crate::descriptor::{FieldDescriptor, FieldType, MessageDescriptor, Value};
use crate::field::packed_member_len;
use crate::message::RawField;
use crate::wire::WireType;
use crate::Error;

/// One decoded field occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<'a> {
    /// A scalar value, decoded per the descriptor's type.
    Value(Value),
    /// A sub-message's raw payload, to be walked with its own [`Decoder`].
    Message(&'a [u8]),
}

/// An iterator over the fields of a wire-encoded message.
#[derive(Debug)]
pub struct Decoder<'a, 'd> {
    descriptor: &'d MessageDescriptor<'d>,
    data: &'a [u8],
    pos: usize,
    packed: Option<(usize, &'d FieldDescriptor<'d>)>,
    failed: bool,
}

impl<'a, 'd> Decoder<'a, 'd> {
    /// A decoder over `data`, interpreted per `descriptor`.
    pub fn new(data: &'a [u8], descriptor: &'d MessageDescriptor<'d>) -> Decoder<'a, 'd> {
        Decoder {
            descriptor,
            data,
            pos: 0,
            packed: None,
            failed: false,
        }
    }

    fn step(&mut self) -> Result<Option<(&'d FieldDescriptor<'d>, Decoded<'a>)>, Error> {
        loop {
            if let Some((block_end, field)) = self.packed {
                if self.pos < block_end {
                    let len = packed_member_len(field.typ(), &self.data[self.pos..block_end])?;
                    let member = &self.data[self.pos..self.pos + len];
                    self.pos += len;
                    return Ok(Some((field, Decoded::Value(field.typ().decode_value(member)?))));
                }
                self.packed = None;
            }

            if self.pos >= self.data.len() {
                return Ok(None);
            }

            let raw = RawField::parse(self.data, self.data.len(), self.pos)?;
            self.pos = raw.end;

            let Some(field) = self.descriptor.field_by_tag(raw.tag) else {
                // unknown tag, skip by wire length
                continue;
            };

            let payload = &self.data[raw.payload_start..raw.end];

            if field.typ() == FieldType::Message {
                if raw.wiretype != WireType::Length {
                    return Err(Error::Wiretype(raw.wiretype as u64));
                }
                return Ok(Some((field, Decoded::Message(payload))));
            }

            if field.is_packed() && raw.wiretype == WireType::Length {
                self.packed = Some((raw.end, field));
                self.pos = raw.payload_start;
                continue;
            }

            if raw.wiretype != field.typ().wiretype() {
                return Err(Error::Wiretype(raw.wiretype as u64));
            }

            return Ok(Some((field, Decoded::Value(field.typ().decode_value(payload)?))));
        }
    }
}

impl<'a, 'd> Iterator for Decoder<'a, 'd> {
    type Item = Result<(&'d FieldDescriptor<'d>, Decoded<'a>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.step() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
