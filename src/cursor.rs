//! A forward cursor over a message's fields that stays valid across its
//! own edits.
//!
//! The cursor owns its message handle and walks the payload in wire order,
//! which is physical order, which is insertion order. Edits made through
//! the cursor (put, erase) relocate its recorded position through the
//! journal, so iteration continues seamlessly; a foreign edit that crosses
//! the current position invalidates the cursor on its next alignment.
//!
//! Packed repeated primitives are traversed member by member inside the
//! shared block.

use crate::descriptor::{FieldDescriptor, Value};
use crate::field::{packed_member_len, Field};
use crate::journal::{Diff, Journal, Offset};
use crate::message::{Message, RawField};
use crate::part::Part;
use crate::wire::WireType;
use crate::Error;

/// A forward iterator over a message's fields, optionally filtered by tag.
#[derive(Debug)]
pub struct Cursor<'d> {
    message: Message<'d>,
    filter: Option<u32>,
    descriptor: Option<&'d FieldDescriptor<'d>>,
    current: Part,
    packed: Option<Part>,
    started: bool,
    count: usize,
    err: Option<Error>,
}

impl<'d> Cursor<'d> {
    /// A cursor over every field of `message`.
    pub fn new(message: Message<'d>) -> Cursor<'d> {
        Self::with_filter(message, None)
    }

    /// A cursor over the occurrences of `tag` only.
    pub fn filtered(message: Message<'d>, tag: u32) -> Cursor<'d> {
        Self::with_filter(message, Some(tag))
    }

    fn with_filter(message: Message<'d>, filter: Option<u32>) -> Cursor<'d> {
        let current = message.part().clone();

        Cursor {
            message,
            filter,
            descriptor: None,
            current,
            packed: None,
            started: false,
            count: 0,
            err: None,
        }
    }

    /// The message the cursor iterates.
    pub fn message(&self) -> &Message<'d> {
        &self.message
    }

    /// The descriptor of the current field, once positioned.
    pub fn descriptor(&self) -> Option<&'d FieldDescriptor<'d>> {
        self.descriptor
    }

    /// The tag of the current field, once positioned.
    pub fn tag(&self) -> Option<u32> {
        self.descriptor.map(|d| d.tag())
    }

    /// The zero-based index of the current field among those delivered.
    pub fn pos(&self) -> usize {
        self.count.saturating_sub(1)
    }

    /// The latched error: [`Error::Eom`] once exhausted, or whatever
    /// invalidated the cursor.
    pub fn error(&self) -> Option<Error> {
        self.err
    }

    /// Advances to the next (matching) field.
    ///
    /// Returns `Ok(false)` once the message is exhausted; the cursor then
    /// reports [`Error::Eom`] until rewound. Any other failure latches.
    pub fn next(&mut self, journal: &Journal<'_>) -> Result<bool, Error> {
        match self.err {
            Some(Error::Eom) => return Ok(false),
            Some(err) => return Err(err),
            None => {}
        }

        match self.step(journal) {
            Ok(()) => {
                self.count += 1;
                Ok(true)
            }
            Err(Error::Eom) => {
                self.err = Some(Error::Eom);
                Ok(false)
            }
            Err(err) => {
                self.err = Some(err);
                Err(err)
            }
        }
    }

    fn step(&mut self, journal: &Journal<'_>) -> Result<(), Error> {
        self.message.align(journal)?;

        let mut scan = if self.started {
            self.current.align(journal)?;
            self.verify_position(journal)?;
            self.current.end()
        } else {
            self.started = true;
            self.message.part().start()
        };

        loop {
            if let Some(block) = &mut self.packed {
                block.align(journal)?;

                if scan < block.end() {
                    let descriptor = self.descriptor.ok_or(Error::Descriptor)?;
                    let data = journal.buffer().data_at(scan, block.end())?;
                    let len = packed_member_len(descriptor.typ(), data)?;

                    let offset = Offset {
                        start: scan,
                        end: scan + len,
                        diff: Diff {
                            origin: block.start() as isize - scan as isize,
                            tag: 0,
                            length: 0,
                        },
                    };
                    self.current = block.child(journal, offset);
                    return Ok(());
                }

                scan = block.end();
                self.packed = None;
            }

            if scan >= self.message.part().end() {
                return Err(Error::Eom);
            }

            let raw = RawField::parse(journal.data(), self.message.part().end(), scan)?;

            let field = match self.message.descriptor().field_by_tag(raw.tag) {
                Some(field) => field,
                None => {
                    // unknown tag, skip by wire length
                    scan = raw.end;
                    continue;
                }
            };

            if self.filter.is_some_and(|filter| filter != raw.tag) {
                scan = raw.end;
                continue;
            }

            if field.is_packed() && raw.wiretype == WireType::Length {
                let offset = raw.to_offset(self.message.part().start());
                self.descriptor = Some(field);
                self.packed = Some(self.message.part().child(journal, offset));
                scan = raw.payload_start;
                continue;
            }

            self.descriptor = Some(field);
            self.current = self
                .message
                .part()
                .child(journal, raw.to_offset(self.message.part().start()));
            return Ok(());
        }
    }

    /// Checks that the recorded occurrence still parses in place. A
    /// foreign edit that removed or split the current field leaves other
    /// bytes behind its offsets; the cursor must not iterate onward from
    /// the middle of them.
    fn verify_position(&self, journal: &Journal<'_>) -> Result<(), Error> {
        let (Some(descriptor), None) = (self.descriptor, &self.packed) else {
            return Ok(());
        };

        let offset = self.current.offset();
        if offset.diff.tag == 0 {
            // a post-erase anchor, nothing recorded to verify
            return Ok(());
        }

        let wire_start = (offset.start as isize + offset.diff.tag) as usize;
        match RawField::parse(journal.data(), self.message.part().end(), wire_start) {
            Ok(raw)
                if raw.tag == descriptor.tag()
                    && raw.payload_start == offset.start
                    && raw.end == offset.end =>
            {
                Ok(())
            }
            _ => Err(Error::Invalid),
        }
    }

    /// Restarts iteration from the beginning of the message.
    ///
    /// Clears an [`Error::Eom`] latch; a cursor invalidated by a foreign
    /// edit stays invalid.
    pub fn rewind(&mut self, journal: &Journal<'_>) -> Result<(), Error> {
        if let Some(err) = self.err {
            if err != Error::Eom {
                return Err(err);
            }
            self.err = None;
        }

        self.message.align(journal)?;
        self.started = false;
        self.descriptor = None;
        self.packed = None;
        self.count = 0;
        Ok(())
    }

    /// Advances until the current field decodes equal to `value`.
    pub fn seek(&mut self, journal: &Journal<'_>, value: &Value) -> Result<bool, Error> {
        while self.next(journal)? {
            if self.get(journal)? == *value {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn current_field(&self) -> Result<Field<'d>, Error> {
        let descriptor = self.descriptor.ok_or(Error::Invalid)?;
        Ok(Field::new(descriptor, self.current.clone()))
    }

    /// Decodes the current field.
    pub fn get(&mut self, journal: &Journal<'_>) -> Result<Value, Error> {
        self.current_field()?.get(journal)
    }

    /// The current field's raw payload bytes.
    pub fn raw<'j>(&mut self, journal: &'j Journal<'_>) -> Result<&'j [u8], Error> {
        self.current.bytes(journal)
    }

    /// A message handle onto the current field, for sub-message fields.
    pub fn read_message(&mut self, journal: &Journal<'_>) -> Result<Message<'d>, Error> {
        let descriptor = self.descriptor.ok_or(Error::Invalid)?;
        let nested = descriptor.message_descriptor().ok_or(Error::Descriptor)?;

        self.current.align(journal)?;
        Ok(Message::from_part(nested, self.current.clone()))
    }

    /// Overwrites the current field with `value`.
    ///
    /// The cursor's recorded position moves with the edit, so a following
    /// [`Cursor::next`] continues after the rewritten field.
    pub fn put(&mut self, journal: &mut Journal<'_>, value: &Value) -> Result<(), Error> {
        let mut field = self.current_field()?;
        field.put(journal, value)?;
        self.current = field.part().clone();
        Ok(())
    }

    /// Removes the current field occurrence (or packed member) and leaves
    /// the cursor positioned just before whatever followed it.
    pub fn erase(&mut self, journal: &mut Journal<'_>) -> Result<(), Error> {
        if self.descriptor.is_none() {
            return Err(Error::Invalid);
        }

        self.current.align(journal)?;
        let offset = self.current.offset();
        let resume = (offset.start as isize + offset.diff.tag) as usize;

        self.current.remove(journal)?;
        self.message.align(journal)?;

        // an empty stand-in part at the removal point; the next step scans
        // onward from here
        let anchor = Offset {
            start: resume,
            end: resume,
            diff: Diff {
                origin: self.message.part().start() as isize - resume as isize,
                tag: 0,
                length: 0,
            },
        };
        self.current = self.message.part().child(journal, anchor);
        Ok(())
    }
}
