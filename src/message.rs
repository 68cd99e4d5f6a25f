//! A descriptor-typed view of a journaled message: a part whose payload is
//! a sequence of tag-prefixed fields.
//!
//! Lookups walk the wire bytes with the codec and never decode payloads
//! they are not asked for. Mutations splice through the journal, so every
//! other outstanding handle onto the same journal can re-locate itself.

use log::debug;

use crate::descriptor::{FieldDescriptor, FieldType, Label, MessageDescriptor, Value};
use crate::field::{packed_member_len, Field};
use crate::journal::{Diff, Journal, Offset};
use crate::part::Part;
use crate::wire::{self, WireType};
use crate::Error;

/// One raw field occurrence, located but not decoded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawField {
    pub(crate) tag: u32,
    pub(crate) wiretype: WireType,
    pub(crate) wire_start: usize,
    pub(crate) length_start: usize,
    pub(crate) payload_start: usize,
    pub(crate) end: usize,
}

impl RawField {
    /// Parses the field starting at `pos`, bounded by `limit`.
    pub(crate) fn parse(data: &[u8], limit: usize, pos: usize) -> Result<RawField, Error> {
        let window = data.get(pos..limit).ok_or(Error::Offset)?;
        let (tag, wiretype, tag_len) = wire::read_tag(window)?;
        let length_start = pos + tag_len;
        let rest = &data[length_start..limit];

        let (payload_start, end) = match wiretype {
            WireType::Length => {
                let (len, len_len) = wire::read_varint(rest)?;
                let len = usize::try_from(len).map_err(|_| Error::Overflow)?;
                let payload_start = length_start + len_len;
                let end = payload_start.checked_add(len).ok_or(Error::Overflow)?;
                if end > limit {
                    return Err(Error::Overflow);
                }
                (payload_start, end)
            }
            _ => {
                let len = wire::payload_len(wiretype, rest)?;
                (length_start, length_start + len)
            }
        };

        Ok(RawField {
            tag,
            wiretype,
            wire_start: pos,
            length_start,
            payload_start,
            end,
        })
    }

    /// The occurrence's payload offset, with header diffs relative to a
    /// message whose payload starts at `origin`.
    pub(crate) fn to_offset(self, origin: usize) -> Offset {
        Offset {
            start: self.payload_start,
            end: self.end,
            diff: Diff {
                origin: origin as isize - self.payload_start as isize,
                tag: self.wire_start as isize - self.payload_start as isize,
                length: self.length_start as isize - self.payload_start as isize,
            },
        }
    }
}

/// A message bound to a byte range of a journal.
#[derive(Debug, Clone)]
pub struct Message<'d> {
    descriptor: &'d MessageDescriptor<'d>,
    part: Part,
}

impl<'d> Message<'d> {
    /// Binds a top-level message over the journal's whole buffer.
    pub fn new(descriptor: &'d MessageDescriptor<'d>, journal: &Journal<'_>) -> Message<'d> {
        Message {
            descriptor,
            part: Part::whole(journal),
        }
    }

    pub(crate) fn from_part(descriptor: &'d MessageDescriptor<'d>, part: Part) -> Message<'d> {
        Message { descriptor, part }
    }

    /// The message's descriptor.
    pub fn descriptor(&self) -> &'d MessageDescriptor<'d> {
        self.descriptor
    }

    /// The underlying part.
    pub fn part(&self) -> &Part {
        &self.part
    }

    /// Whether the message handle still references live bytes.
    pub fn valid(&self) -> bool {
        self.part.valid()
    }

    /// Brings the handle up to date with the journal.
    pub fn align(&mut self, journal: &Journal<'_>) -> Result<(), Error> {
        self.part.align(journal)
    }

    /// The message payload size in bytes.
    pub fn size(&mut self, journal: &Journal<'_>) -> Result<usize, Error> {
        self.part.align(journal)?;
        Ok(self.part.len())
    }

    /// The message's raw payload bytes.
    pub fn bytes<'j>(&mut self, journal: &'j Journal<'_>) -> Result<&'j [u8], Error> {
        self.part.bytes(journal)
    }

    /// Whether at least one occurrence of `tag` is present. Walks the wire
    /// bytes without decoding any payload.
    pub fn has(&mut self, journal: &Journal<'_>, tag: u32) -> Result<bool, Error> {
        self.part.align(journal)?;

        let data = journal.data();
        let mut pos = self.part.start();
        while pos < self.part.end() {
            let raw = RawField::parse(data, self.part.end(), pos)?;
            if raw.tag == tag {
                return Ok(true);
            }
            pos = raw.end;
        }

        Ok(false)
    }

    /// Locates the last occurrence of `tag`, if any.
    fn locate_last(&mut self, journal: &Journal<'_>, tag: u32) -> Result<Option<RawField>, Error> {
        self.part.align(journal)?;

        let data = journal.data();
        let mut pos = self.part.start();
        let mut found = None;
        while pos < self.part.end() {
            let raw = RawField::parse(data, self.part.end(), pos)?;
            if raw.tag == tag {
                found = Some(raw);
            }
            pos = raw.end;
        }

        Ok(found)
    }

    fn descriptor_for(&self, tag: u32) -> Result<&'d FieldDescriptor<'d>, Error> {
        self.descriptor.field_by_tag(tag).ok_or(Error::Descriptor)
    }

    /// Decodes the last occurrence of `tag`, per the usual wire semantics:
    /// for singular fields, later occurrences win.
    ///
    /// Absent fields are [`Error::Absent`]; see
    /// [`Message::get_or_default`] for descriptor defaults. Sub-message
    /// fields are accessed with [`Message::read_within`] or
    /// [`Message::raw`] instead.
    pub fn get(&mut self, journal: &Journal<'_>, tag: u32) -> Result<Value, Error> {
        let field = self.descriptor_for(tag)?;
        if field.typ() == FieldType::Message {
            return Err(Error::Descriptor);
        }

        let raw = self.locate_last(journal, tag)?.ok_or(Error::Absent)?;
        let data = journal.data();
        let payload = &data[raw.payload_start..raw.end];

        // a packed block decodes to its last member
        if raw.wiretype == WireType::Length && field.typ().wiretype() != WireType::Length {
            let mut pos = 0;
            let mut last = None;
            while pos < payload.len() {
                let len = packed_member_len(field.typ(), &payload[pos..])?;
                last = Some(&payload[pos..pos + len]);
                pos += len;
            }
            let member = last.ok_or(Error::Absent)?;
            return field.typ().decode_value(member);
        }

        if raw.wiretype != field.typ().wiretype() {
            return Err(Error::Wiretype(raw.wiretype as u64));
        }

        field.typ().decode_value(payload)
    }

    /// Like [`Message::get`], but an absent field with a declared default
    /// yields the default instead of [`Error::Absent`].
    pub fn get_or_default(&mut self, journal: &Journal<'_>, tag: u32) -> Result<Value, Error> {
        match self.get(journal, tag) {
            Err(Error::Absent) => {
                let field = self.descriptor_for(tag)?;
                field.default().cloned().ok_or(Error::Absent)
            }
            other => other,
        }
    }

    /// A [`Field`] handle onto the last occurrence of `tag`.
    pub fn field(&mut self, journal: &Journal<'_>, tag: u32) -> Result<Field<'d>, Error> {
        let descriptor = self.descriptor_for(tag)?;
        let raw = self.locate_last(journal, tag)?.ok_or(Error::Absent)?;
        let offset = raw.to_offset(self.part.start());

        Ok(Field::new(descriptor, self.part.child(journal, offset)))
    }

    /// Writes `value` for `tag`.
    ///
    /// A present singular field is overwritten in place (last occurrence);
    /// a repeated field gains a new occurrence at the end of the message,
    /// appended to the shared block if the field is packed. Writing a
    /// member of a oneof erases the other members first.
    pub fn put(&mut self, journal: &mut Journal<'_>, tag: u32, value: &Value) -> Result<(), Error> {
        let field = self.descriptor_for(tag)?;
        if !value.matches_type(field.typ()) {
            return Err(Error::Descriptor);
        }

        if let Some(oneof) = field.oneof() {
            for &member in oneof.tags() {
                if member != tag {
                    self.erase(journal, member)?;
                }
            }
        }

        if field.is_packed() {
            let mut member = Vec::new();
            field.typ().encode_value(value, &mut member)?;

            if let Some(block) = self.locate_last(journal, tag)? {
                let offset = block.to_offset(self.part.start());
                let mut block = self.part.child(journal, offset);
                return block.append(journal, &member);
            }

            let mut out = Vec::new();
            wire::write_varint(&mut out, wire::pack_tag(tag, WireType::Length));
            wire::write_varint(&mut out, member.len() as u64);
            out.extend_from_slice(&member);
            return self.part.append(journal, &out);
        }

        if field.label() != Label::Repeated {
            if let Some(raw) = self.locate_last(journal, tag)? {
                let offset = raw.to_offset(self.part.start());
                let mut handle = Field::new(field, self.part.child(journal, offset));
                return handle.put(journal, value);
            }
        }

        let bytes = Self::encode_occurrence(field, value)?;
        self.part.append(journal, &bytes)
    }

    /// Writes raw payload bytes for a length-delimited field, most notably
    /// splicing an already-encoded sub-message in under `tag`.
    pub fn put_raw(
        &mut self,
        journal: &mut Journal<'_>,
        tag: u32,
        payload: &[u8],
    ) -> Result<(), Error> {
        let field = self.descriptor_for(tag)?;
        if field.typ().wiretype() != WireType::Length {
            return Err(Error::Descriptor);
        }

        if field.label() != Label::Repeated {
            if let Some(raw) = self.locate_last(journal, tag)? {
                let offset = raw.to_offset(self.part.start());
                let mut part = self.part.child(journal, offset);
                return part.replace(journal, payload);
            }
        }

        let mut out = Vec::new();
        wire::write_varint(&mut out, wire::pack_tag(tag, WireType::Length));
        wire::write_varint(&mut out, payload.len() as u64);
        out.extend_from_slice(payload);
        self.part.append(journal, &out)
    }

    fn encode_occurrence(field: &FieldDescriptor<'_>, value: &Value) -> Result<Vec<u8>, Error> {
        let mut payload = Vec::new();
        field.typ().encode_value(value, &mut payload)?;

        let mut out = Vec::new();
        wire::write_varint(&mut out, wire::pack_tag(field.tag(), field.typ().wiretype()));
        if field.typ().wiretype() == WireType::Length {
            wire::write_varint(&mut out, payload.len() as u64);
        }
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Removes every occurrence of `tag` from the message.
    pub fn erase(&mut self, journal: &mut Journal<'_>, tag: u32) -> Result<(), Error> {
        self.part.align(journal)?;

        let data = journal.data();
        let mut pos = self.part.start();
        let mut occurrences = Vec::new();
        while pos < self.part.end() {
            let raw = RawField::parse(data, self.part.end(), pos)?;
            if raw.tag == tag {
                // stamp the handle now, before any removal moves the rest
                occurrences.push(self.part.child(journal, raw.to_offset(self.part.start())));
            }
            pos = raw.end;
        }

        for part in &mut occurrences {
            part.remove(journal)?;
        }

        self.part.align(journal)
    }

    /// Removes the message from the buffer: the whole payload for a
    /// top-level message, tag through payload for a nested one.
    ///
    /// The handle is invalid afterwards, as is every handle onto anything
    /// the message contained.
    pub fn clear(&mut self, journal: &mut Journal<'_>) -> Result<(), Error> {
        self.part.align(journal)?;
        debug!("message {}: clear {} bytes", self.descriptor.name(), self.part.len());

        if self.part.offset().diff.tag != 0 {
            self.part.remove(journal)
        } else {
            self.part.replace(journal, &[])?;
            self.part.invalidate();
            Ok(())
        }
    }

    /// The raw payload bytes of the last occurrence of `tag`. Only valid
    /// until the next mutation of the journal.
    pub fn raw<'j>(&mut self, journal: &'j Journal<'_>, tag: u32) -> Result<&'j [u8], Error> {
        let raw = self.locate_last(journal, tag)?.ok_or(Error::Absent)?;
        journal.buffer().data_at(raw.payload_start, raw.end)
    }

    /// A message handle onto the last occurrence of the sub-message field
    /// `tag`, without creating anything.
    pub fn read_within(&mut self, journal: &Journal<'_>, tag: u32) -> Result<Message<'d>, Error> {
        let field = self.descriptor_for(tag)?;
        let descriptor = field.message_descriptor().ok_or(Error::Descriptor)?;

        let raw = self.locate_last(journal, tag)?.ok_or(Error::Absent)?;
        let offset = raw.to_offset(self.part.start());
        Ok(Message::from_part(descriptor, self.part.child(journal, offset)))
    }

    /// A message handle onto the sub-message field `tag`, inserting an
    /// empty occurrence (tag plus zero length prefix) if none exists.
    pub fn create_within(
        &mut self,
        journal: &mut Journal<'_>,
        tag: u32,
    ) -> Result<Message<'d>, Error> {
        let field = self.descriptor_for(tag)?;
        let descriptor = field.message_descriptor().ok_or(Error::Descriptor)?;

        if let Some(raw) = self.locate_last(journal, tag)? {
            let offset = raw.to_offset(self.part.start());
            return Ok(Message::from_part(descriptor, self.part.child(journal, offset)));
        }

        let mut header = Vec::new();
        wire::write_varint(&mut header, wire::pack_tag(tag, WireType::Length));
        header.push(0x00);
        self.part.append(journal, &header)?;

        let end = self.part.end();
        let offset = Offset {
            start: end,
            end,
            diff: Diff {
                origin: self.part.start() as isize - end as isize,
                tag: -(header.len() as isize),
                length: -1,
            },
        };

        Ok(Message::from_part(descriptor, self.part.child(journal, offset)))
    }

    /// Repeated [`Message::create_within`] along a branch of sub-message
    /// fields.
    pub fn create_nested(
        &mut self,
        journal: &mut Journal<'_>,
        tags: &[u32],
    ) -> Result<Message<'d>, Error> {
        let (&first, rest) = tags.split_first().ok_or(Error::Invalid)?;

        let mut current = self.create_within(journal, first)?;
        for &tag in rest {
            current = current.create_within(journal, tag)?;
        }

        Ok(current)
    }

    /// Appends an already-encoded occurrence of a repeated sub-message
    /// field and returns a handle onto it.
    pub fn append_within(
        &mut self,
        journal: &mut Journal<'_>,
        tag: u32,
    ) -> Result<Message<'d>, Error> {
        let field = self.descriptor_for(tag)?;
        let descriptor = field.message_descriptor().ok_or(Error::Descriptor)?;
        if field.label() != Label::Repeated {
            return Err(Error::Descriptor);
        }

        let mut header = Vec::new();
        wire::write_varint(&mut header, wire::pack_tag(tag, WireType::Length));
        header.push(0x00);
        self.part.align(journal)?;
        self.part.append(journal, &header)?;

        let end = self.part.end();
        let offset = Offset {
            start: end,
            end,
            diff: Diff {
                origin: self.part.start() as isize - end as isize,
                tag: -(header.len() as isize),
                length: -1,
            },
        };

        Ok(Message::from_part(descriptor, self.part.child(journal, offset)))
    }
}

macro_rules! typed_accessors {
    ($($get:ident, $put:ident, $native:ty, $variant:ident;)*) => {
        /// Thin typed wrappers over the generic [`Message::get`] and
        /// [`Message::put`] entry points, as generated accessor stubs
        /// would call them.
        impl<'d> Message<'d> {
            $(
                #[doc = concat!("Reads `tag` as `", stringify!($native), "`.")]
                pub fn $get(&mut self, journal: &Journal<'_>, tag: u32) -> Result<$native, Error> {
                    match self.get_or_default(journal, tag)? {
                        Value::$variant(v) => Ok(v),
                        _ => Err(Error::Descriptor),
                    }
                }

                #[doc = concat!("Writes `tag` from `", stringify!($native), "`.")]
                pub fn $put(
                    &mut self,
                    journal: &mut Journal<'_>,
                    tag: u32,
                    value: $native,
                ) -> Result<(), Error> {
                    self.put(journal, tag, &Value::$variant(value))
                }
            )*
        }
    };
}

typed_accessors! {
    get_bool, put_bool, bool, Bool;
    get_int32, put_int32, i32, Int32;
    get_int64, put_int64, i64, Int64;
    get_uint32, put_uint32, u32, UInt32;
    get_uint64, put_uint64, u64, UInt64;
    get_float, put_float, f32, Float;
    get_double, put_double, f64, Double;
    get_string, put_string, String, String;
    get_bytes, put_bytes, Vec<u8>, Bytes;
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::test_util::{address_book, person};

    use super::*;

    const PERSON_WIRE: &[u8] = &[
        0x0a, 0x08, b'J', b'o', b'h', b'n', b' ', b'D', b'o', b'e', // name
        0x10, 0xd2, 0x09, // id
        0x1a, 0x10, b'j', b'd', b'o', b'e', b'@', b'e', b'x', b'a', b'm', b'p', b'l', b'e',
        b'.', b'c', b'o', b'm', // email
    ];

    #[test]
    fn build_a_person_from_scratch() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut person = Message::new(person(), &journal);

        person.put_string(&mut journal, 1, "John Doe".into())?;
        person.put_int32(&mut journal, 2, 1234)?;
        person.put_string(&mut journal, 3, "jdoe@example.com".into())?;

        assert_eq!(journal.data(), PERSON_WIRE);
        Ok(())
    }

    #[test]
    fn read_back_fields() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(PERSON_WIRE)?;
        let mut person = Message::new(person(), &journal);

        assert!(person.has(&mut journal, 1)?);
        assert!(!person.has(&mut journal, 4)?);

        assert_eq!(person.get_string(&mut journal, 1)?, "John Doe");
        assert_eq!(person.get_int32(&mut journal, 2)?, 1234);
        assert_eq!(person.raw(&mut journal, 3)?, b"jdoe@example.com");
        assert_matches!(person.get(&mut journal, 6), Err(Error::Absent));
        Ok(())
    }

    #[test]
    fn singular_put_overwrites_in_place() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(PERSON_WIRE)?;
        let mut msg = Message::new(person(), &journal);

        msg.put_string(&mut journal, 1, "Jane".into())?;
        msg.put_int32(&mut journal, 2, 7)?;

        assert_eq!(msg.get_string(&mut journal, 1)?, "Jane");
        assert_eq!(msg.get_int32(&mut journal, 2)?, 7);
        assert_eq!(msg.get_string(&mut journal, 3)?, "jdoe@example.com");

        // still exactly one occurrence of each tag
        let mut rebuilt = Journal::new();
        let mut expected = Message::new(person(), &rebuilt);
        expected.put_string(&mut rebuilt, 1, "Jane".into())?;
        expected.put_int32(&mut rebuilt, 2, 7)?;
        expected.put_string(&mut rebuilt, 3, "jdoe@example.com".into())?;
        assert_eq!(journal.data(), rebuilt.data());
        Ok(())
    }

    #[test]
    fn repeated_puts_keep_the_last_value() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut msg = Message::new(person(), &journal);

        // each overwrite resizes the occurrence: one byte, two bytes, a
        // sign-extended ten, back to one
        for value in [1, 300, -7, 42] {
            msg.put_int32(&mut journal, 2, value)?;
            assert_eq!(msg.get_int32(&mut journal, 2)?, value);
        }

        msg.put_string(&mut journal, 1, "a".into())?;
        msg.put_string(&mut journal, 1, "something longer".into())?;
        msg.put_string(&mut journal, 1, "z".into())?;

        assert_eq!(msg.get_string(&mut journal, 1)?, "z");
        assert_eq!(msg.get_int32(&mut journal, 2)?, 42);

        // still exactly one occurrence of each
        let mut fresh = Journal::new();
        let mut expected = Message::new(person(), &fresh);
        expected.put_int32(&mut fresh, 2, 42)?;
        expected.put_string(&mut fresh, 1, "z".into())?;
        assert_eq!(journal.data(), fresh.data());
        Ok(())
    }

    #[test]
    fn last_occurrence_wins() -> anyhow::Result<()> {
        // two occurrences of the singular id field
        let mut journal = Journal::from_slice(&[0x10, 0x01, 0x10, 0x02])?;
        let mut person = Message::new(person(), &journal);

        assert_eq!(person.get_int32(&mut journal, 2)?, 2);
        Ok(())
    }

    #[test]
    fn erase_restores_emptiness() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(PERSON_WIRE)?;
        let mut person = Message::new(person(), &journal);
        let before = person.size(&mut journal)?;

        person.put_int32(&mut journal, 5, 99)?;
        assert!(person.size(&mut journal)? > before);

        person.erase(&mut journal, 5)?;
        assert_eq!(person.size(&mut journal)?, before);
        assert_eq!(journal.data(), PERSON_WIRE);
        Ok(())
    }

    #[test]
    fn erase_removes_every_occurrence() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(&[0x10, 0x01, 0x08, 0x05, 0x10, 0x02])?;
        let mut msg = Message::new(person(), &journal);

        msg.erase(&mut journal, 2)?;
        assert_eq!(journal.data(), &[0x08, 0x05]);
        Ok(())
    }

    #[test]
    fn defaults_surface_for_absent_fields() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(PERSON_WIRE)?;
        let mut person = Message::new(person(), &journal);

        // age (tag 5) is absent but declares a default of 18
        assert_matches!(person.get(&mut journal, 5), Err(Error::Absent));
        assert_eq!(person.get_int32(&mut journal, 5)?, 18);

        // email has no default
        person.erase(&mut journal, 3)?;
        assert_matches!(person.get_or_default(&mut journal, 3), Err(Error::Absent));
        Ok(())
    }

    #[test]
    fn oneof_put_erases_siblings() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut person = Message::new(person(), &journal);

        person.put_string(&mut journal, 6, "555-4321".into())?;
        person.put_string(&mut journal, 7, "555-1234".into())?;

        assert!(!person.has(&mut journal, 6)?);
        assert_eq!(person.get_string(&mut journal, 7)?, "555-1234");
        Ok(())
    }

    #[test]
    fn packed_put_extends_the_block() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut person = Message::new(person(), &journal);

        person.put_uint32(&mut journal, 4, 3)?;
        person.put_uint32(&mut journal, 4, 270)?;
        person.put_uint32(&mut journal, 4, 86942)?;

        // one block, three members
        assert_eq!(
            journal.data(),
            &[0x22, 0x06, 0x03, 0x8e, 0x02, 0x9e, 0xa7, 0x05]
        );

        // get decodes the last member
        assert_eq!(person.get_uint32(&mut journal, 4)?, 86942);

        person.erase(&mut journal, 4)?;
        assert!(journal.is_empty());
        Ok(())
    }

    #[test]
    fn nested_create_and_write() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut book = Message::new(address_book(), &journal);

        let mut entry = book.create_within(&mut journal, 1)?;
        entry.put_string(&mut journal, 1, "John Doe".into())?;
        entry.put_int32(&mut journal, 2, 1234)?;

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0x0a, 0x0d]);
        expected.extend_from_slice(&PERSON_WIRE[..13]);
        assert_eq!(journal.data(), &expected[..]);

        // reading through a fresh handle sees the same person
        let mut reread = book.read_within(&journal, 1)?;
        assert_eq!(reread.get_string(&mut journal, 1)?, "John Doe");
        assert_eq!(reread.get_int32(&mut journal, 2)?, 1234);
        Ok(())
    }

    #[test]
    fn create_nested_walks_a_branch() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut book = Message::new(address_book(), &journal);

        let mut person = book.create_nested(&mut journal, &[1])?;
        person.put_int32(&mut journal, 2, 42)?;

        assert_eq!(journal.data(), &[0x0a, 0x02, 0x10, 0x2a]);

        // creating again returns the existing occurrence
        let mut again = book.create_nested(&mut journal, &[1])?;
        assert_eq!(again.get_int32(&mut journal, 2)?, 42);
        Ok(())
    }

    #[test]
    fn clear_invalidates_descendant_handles() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut book = Message::new(address_book(), &journal);

        let mut entry = book.create_within(&mut journal, 1)?;
        entry.put_int32(&mut journal, 2, 1234)?;
        let mut id = entry.field(&journal, 2)?;

        entry.clear(&mut journal)?;

        assert!(!entry.valid());
        assert_matches!(id.align(&journal), Err(Error::Invalid));
        assert!(journal.is_empty());
        Ok(())
    }

    #[test]
    fn clear_top_level_message() -> anyhow::Result<()> {
        let mut journal = Journal::from_slice(PERSON_WIRE)?;
        let mut person = Message::new(person(), &journal);
        let mut name = person.field(&journal, 1)?;

        person.clear(&mut journal)?;

        assert!(journal.is_empty());
        assert!(!person.valid());
        assert_matches!(name.align(&journal), Err(Error::Invalid));
        Ok(())
    }

    #[test]
    fn put_raw_splices_an_encoded_submessage() -> anyhow::Result<()> {
        let mut journal = Journal::new();
        let mut book = Message::new(address_book(), &journal);

        book.put_raw(&mut journal, 1, &PERSON_WIRE[..13])?;

        let mut person = book.read_within(&journal, 1)?;
        assert_eq!(person.get_string(&mut journal, 1)?, "John Doe");
        assert_eq!(person.get_int32(&mut journal, 2)?, 1234);
        Ok(())
    }

    #[test]
    fn malformed_bytes_fail_the_operation() -> anyhow::Result<()> {
        // length prefix pointing past the end of the buffer
        let mut journal = Journal::from_slice(&[0x0a, 0x10, b'x'])?;
        let mut person = Message::new(person(), &journal);

        assert_matches!(person.get(&mut journal, 1), Err(Error::Overflow));
        assert_eq!(journal.data(), &[0x0a, 0x10, b'x']);
        Ok(())
    }
}
