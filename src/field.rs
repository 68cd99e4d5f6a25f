//! A typed handle onto one field occurrence inside a journaled message.

use crate::descriptor::{FieldDescriptor, FieldType, Value};
use crate::journal::Journal;
use crate::part::Part;
use crate::Error;

/// One occurrence of a field, bound to its payload bytes.
///
/// Fields are handed out by [`Message`](crate::message::Message) and
/// [`Cursor`](crate::cursor::Cursor); they stay usable across edits made
/// through other handles on the same journal, and report
/// [`Error::Invalid`] once the occurrence itself has been removed.
#[derive(Debug, Clone)]
pub struct Field<'d> {
    descriptor: &'d FieldDescriptor<'d>,
    part: Part,
}

impl<'d> Field<'d> {
    pub(crate) fn new(descriptor: &'d FieldDescriptor<'d>, part: Part) -> Self {
        Self { descriptor, part }
    }

    /// The field's descriptor.
    pub fn descriptor(&self) -> &'d FieldDescriptor<'d> {
        self.descriptor
    }

    /// Whether the occurrence still exists.
    pub fn valid(&self) -> bool {
        self.part.valid()
    }

    /// Brings the handle up to date with the journal.
    pub fn align(&mut self, journal: &Journal<'_>) -> Result<(), Error> {
        self.part.align(journal)
    }

    /// The underlying part.
    pub fn part(&self) -> &Part {
        &self.part
    }

    /// Decodes the field's current value.
    pub fn get(&mut self, journal: &Journal<'_>) -> Result<Value, Error> {
        let bytes = self.part.bytes(journal)?;
        self.descriptor.typ().decode_value(bytes)
    }

    /// The field's raw payload bytes. Only valid until the next mutation
    /// of the journal.
    pub fn raw<'j>(&mut self, journal: &'j Journal<'_>) -> Result<&'j [u8], Error> {
        self.part.bytes(journal)
    }

    /// Re-encodes the field with `value`, splicing the new payload (and an
    /// updated length prefix, where the wire type carries one) in place.
    pub fn put(&mut self, journal: &mut Journal<'_>, value: &Value) -> Result<(), Error> {
        if !value.matches_type(self.descriptor.typ()) {
            return Err(Error::Descriptor);
        }

        let mut payload = Vec::new();
        self.descriptor.typ().encode_value(value, &mut payload)?;
        self.part.replace(journal, &payload)
    }

    /// Removes the occurrence (tag through payload) from its message.
    ///
    /// The handle is invalid afterwards.
    pub fn clear(&mut self, journal: &mut Journal<'_>) -> Result<(), Error> {
        self.part.remove(journal)
    }

    /// Whether the field currently decodes to `value`.
    ///
    /// Values of differing sizes never match; byte and string payloads are
    /// compared length-first.
    pub fn matches(&mut self, journal: &Journal<'_>, value: &Value) -> Result<bool, Error> {
        Ok(self.get(journal)? == *value)
    }
}

/// Decodes `typ`-typed members out of a packed block payload.
pub(crate) fn packed_member_len(typ: FieldType, buf: &[u8]) -> Result<usize, Error> {
    match typ.fixed_size() {
        Some(size) => {
            if buf.len() < size {
                Err(Error::Underrun)
            } else {
                Ok(size)
            }
        }
        None => {
            let (_, consumed) = crate::wire::read_varint(buf)?;
            Ok(consumed)
        }
    }
}
