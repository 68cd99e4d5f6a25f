//! In-place, partial, mutable access to Protocol Buffers wire data.
//!
//! Rather than parsing a whole message into an object graph, mutating it
//! and re-encoding, this crate operates directly on the wire-format bytes:
//! reads decode only what they need, and writes splice the backing buffer
//! through a [`Journal`] of size changes, so every other outstanding
//! handle onto the same message can re-locate itself lazily. Creating,
//! reading, updating and erasing single fields of a large message costs
//! time proportional to the edit, not to the message.
//!
//! ```
//! use pbedit::{FieldDescriptor, FieldType, Journal, Label, Message, MessageDescriptor};
//!
//! # fn main() -> Result<(), pbedit::Error> {
//! let descriptor = MessageDescriptor::new(
//!     "Person",
//!     vec![
//!         FieldDescriptor::scalar(1, "name", FieldType::String, Label::Optional),
//!         FieldDescriptor::scalar(2, "id", FieldType::Int32, Label::Optional),
//!     ],
//! )?;
//!
//! let mut journal = Journal::new();
//! let mut person = Message::new(&descriptor, &journal);
//! person.put_string(&mut journal, 1, "John Doe".into())?;
//! person.put_int32(&mut journal, 2, 1234)?;
//!
//! assert_eq!(person.get_int32(&mut journal, 2)?, 1234);
//! assert_eq!(journal.data()[..2], [0x0a, 0x08]);
//! # Ok(())
//! # }
//! ```
//!
//! The wire format is bit-exact proto2/proto3; see [`Encoder`] and
//! [`Decoder`] for the stateless streaming path that skips the journal
//! entirely.

#![warn(
    anonymous_parameters,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications
)]

pub mod alloc;
pub mod buffer;
pub mod cursor;
pub mod decoder;
pub mod descriptor;
pub mod encoder;
pub mod field;
pub mod journal;
pub mod message;
pub mod part;
pub mod wire;

mod error;

pub use buffer::Buffer;
pub use cursor::Cursor;
pub use decoder::{Decoded, Decoder};
pub use descriptor::{
    EnumDescriptor, FieldDescriptor, FieldType, Label, MessageDescriptor, OneofDescriptor, Value,
};
pub use encoder::Encoder;
pub use error::Error;
pub use field::Field;
pub use journal::Journal;
pub use message::Message;
pub use part::Part;

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::OnceLock;

    use crate::descriptor::*;

    fn contact() -> &'static OneofDescriptor {
        static CONTACT: OnceLock<OneofDescriptor> = OnceLock::new();
        CONTACT.get_or_init(|| OneofDescriptor::new("contact", vec![6, 7]))
    }

    /// The message used throughout the test suite:
    ///
    /// ```proto
    /// message Person {
    ///   optional string name   = 1;
    ///   optional int32  id     = 2;
    ///   optional string email  = 3;
    ///   repeated uint32 scores = 4 [packed = true];
    ///   optional int32  age    = 5 [default = 18];
    ///   oneof contact {
    ///     string phone = 6;
    ///     string fax   = 7;
    ///   }
    /// }
    /// ```
    pub(crate) fn person() -> &'static MessageDescriptor<'static> {
        static PERSON: OnceLock<MessageDescriptor<'static>> = OnceLock::new();
        PERSON.get_or_init(|| {
            MessageDescriptor::new(
                "Person",
                vec![
                    FieldDescriptor::scalar(1, "name", FieldType::String, Label::Optional),
                    FieldDescriptor::scalar(2, "id", FieldType::Int32, Label::Optional),
                    FieldDescriptor::scalar(3, "email", FieldType::String, Label::Optional),
                    FieldDescriptor::scalar(4, "scores", FieldType::UInt32, Label::Repeated)
                        .packed(),
                    FieldDescriptor::scalar(5, "age", FieldType::Int32, Label::Optional)
                        .with_default(Value::Int32(18)),
                    FieldDescriptor::scalar(6, "phone", FieldType::String, Label::Oneof)
                        .in_oneof(contact()),
                    FieldDescriptor::scalar(7, "fax", FieldType::String, Label::Oneof)
                        .in_oneof(contact()),
                ],
            )
            .unwrap()
        })
    }

    /// `message AddressBook { repeated Person people = 1; }`
    pub(crate) fn address_book() -> &'static MessageDescriptor<'static> {
        static BOOK: OnceLock<MessageDescriptor<'static>> = OnceLock::new();
        BOOK.get_or_init(|| {
            MessageDescriptor::new(
                "AddressBook",
                vec![FieldDescriptor::message(1, "people", Label::Repeated, person())],
            )
            .unwrap()
        })
    }
}
