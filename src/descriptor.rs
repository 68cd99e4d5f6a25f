//! Static schema tables: message, field, enum and oneof descriptors, plus
//! the dynamic [`Value`] type exchanged with generic accessors.
//!
//! Descriptors are immutable shared data once constructed. Generated code
//! (or a test) builds them at startup, optionally registers extensions, and
//! then hands out shared references.

use bitflags::bitflags;
use enum_primitive_derive::Primitive;

use crate::wire::{self, WireType};
use crate::Error;

/// One of the 17 scalar or message field types.
///
/// Discriminants match the `FieldDescriptorProto.Type` numbers from the
/// schema language; the deprecated group type (10) is not representable.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
#[allow(missing_docs)]
pub enum FieldType {
    Double = 1,
    Float = 2,
    Int64 = 3,
    UInt64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Message = 11,
    Bytes = 12,
    UInt32 = 13,
    Enum = 14,
    SFixed32 = 15,
    SFixed64 = 16,
    SInt32 = 17,
    SInt64 = 18,
}

impl FieldType {
    /// The wire type used to delimit payloads of this field type.
    pub fn wiretype(self) -> WireType {
        use FieldType::*;

        match self {
            Int32 | Int64 | UInt32 | UInt64 | SInt32 | SInt64 | Bool | Enum => WireType::Varint,
            Fixed64 | SFixed64 | Double => WireType::Fixed64,
            Fixed32 | SFixed32 | Float => WireType::Fixed32,
            String | Bytes | Message => WireType::Length,
        }
    }

    /// The fixed encoded size of this type on the wire, if it has one.
    pub fn fixed_size(self) -> Option<usize> {
        match self.wiretype() {
            WireType::Fixed32 => Some(4),
            WireType::Fixed64 => Some(8),
            WireType::Varint | WireType::Length => None,
        }
    }

    /// Whether repeated occurrences may share a single length prefix.
    pub fn packable(self) -> bool {
        !matches!(self, FieldType::String | FieldType::Bytes | FieldType::Message)
    }

    /// Encodes `value` as a payload of this type, appending to `out`.
    ///
    /// The tag and, for length-delimited types, the length prefix are the
    /// caller's concern. A value of the wrong variant is
    /// [`Error::Descriptor`]; so is [`FieldType::Message`], whose payloads
    /// are raw bytes spliced in by the message layer.
    pub fn encode_value(self, value: &Value, out: &mut Vec<u8>) -> Result<(), Error> {
        use FieldType::*;

        match (self, value) {
            (Int32, Value::Int32(v)) => wire::write_varint(out, *v as i64 as u64),
            (Int64, Value::Int64(v)) => wire::write_varint(out, *v as u64),
            (UInt32, Value::UInt32(v)) => wire::write_varint(out, u64::from(*v)),
            (UInt64, Value::UInt64(v)) => wire::write_varint(out, *v),
            (SInt32, Value::Int32(v)) => wire::write_varint(out, u64::from(wire::zigzag32(*v))),
            (SInt64, Value::Int64(v)) => wire::write_varint(out, wire::zigzag64(*v)),
            (Bool, Value::Bool(v)) => wire::write_varint(out, u64::from(*v)),
            (Enum, Value::Enum(v)) => wire::write_varint(out, *v as i64 as u64),
            (Fixed32, Value::UInt32(v)) => wire::write_fixed32(out, *v),
            (SFixed32, Value::Int32(v)) => wire::write_fixed32(out, *v as u32),
            (Float, Value::Float(v)) => wire::write_fixed32(out, v.to_bits()),
            (Fixed64, Value::UInt64(v)) => wire::write_fixed64(out, *v),
            (SFixed64, Value::Int64(v)) => wire::write_fixed64(out, *v as u64),
            (Double, Value::Double(v)) => wire::write_fixed64(out, v.to_bits()),
            (String, Value::String(v)) => out.extend_from_slice(v.as_bytes()),
            (Bytes, Value::Bytes(v)) => out.extend_from_slice(v),
            _ => return Err(Error::Descriptor),
        }

        Ok(())
    }

    /// Decodes a payload slice of this type.
    ///
    /// Integers decode strictly: a varint out of range for the target
    /// width is [`Error::Varint`].
    pub fn decode_value(self, buf: &[u8]) -> Result<Value, Error> {
        use FieldType::*;

        let varint = |buf: &[u8]| -> Result<u64, Error> {
            let (value, consumed) = wire::read_varint(buf)?;
            if consumed != buf.len() {
                return Err(Error::Varint);
            }
            Ok(value)
        };

        let narrow32 = |raw: u64| i32::try_from(raw as i64).map_err(|_| Error::Varint);

        Ok(match self {
            Int32 => Value::Int32(narrow32(varint(buf)?)?),
            Int64 => Value::Int64(varint(buf)? as i64),
            UInt32 => Value::UInt32(u32::try_from(varint(buf)?).map_err(|_| Error::Varint)?),
            UInt64 => Value::UInt64(varint(buf)?),
            SInt32 => {
                let raw = u32::try_from(varint(buf)?).map_err(|_| Error::Varint)?;
                Value::Int32(wire::unzigzag32(raw))
            }
            SInt64 => Value::Int64(wire::unzigzag64(varint(buf)?)),
            Bool => Value::Bool(varint(buf)? != 0),
            Enum => Value::Enum(narrow32(varint(buf)?)?),
            Fixed32 => Value::UInt32(wire::read_fixed32(buf)?),
            SFixed32 => Value::Int32(wire::read_fixed32(buf)? as i32),
            Float => Value::Float(f32::from_bits(wire::read_fixed32(buf)?)),
            Fixed64 => Value::UInt64(wire::read_fixed64(buf)?),
            SFixed64 => Value::Int64(wire::read_fixed64(buf)? as i64),
            Double => Value::Double(f64::from_bits(wire::read_fixed64(buf)?)),
            String => Value::String(
                std::str::from_utf8(buf).map_err(|_| Error::Invalid)?.to_owned(),
            ),
            Bytes => Value::Bytes(buf.to_vec()),
            Message => return Err(Error::Descriptor),
        })
    }
}

/// How many occurrences of a field a message may carry.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
pub enum Label {
    /// Exactly one occurrence (proto2).
    Required = 1,
    /// At most one occurrence.
    Optional = 2,
    /// Any number of occurrences, in order.
    Repeated = 3,
    /// At most one occurrence across the whole oneof group.
    Oneof = 4,
}

bitflags! {
    /// Per-field behavior flags.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
    pub struct FieldFlags: u32 {
        /// Repeated occurrences share a single length prefix.
        const PACKED = 0x0001;
    }
}

/// A dynamic scalar value, as exchanged with the generic get/put entry
/// points, descriptor defaults and the streaming decoder.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Enum(i32),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Whether this value is the right variant for a field of `typ`.
    pub fn matches_type(&self, typ: FieldType) -> bool {
        use FieldType::*;

        matches!(
            (typ, self),
            (Int32 | SInt32 | SFixed32, Value::Int32(_))
                | (Int64 | SInt64 | SFixed64, Value::Int64(_))
                | (UInt32 | Fixed32, Value::UInt32(_))
                | (UInt64 | Fixed64, Value::UInt64(_))
                | (Float, Value::Float(_))
                | (Double, Value::Double(_))
                | (Bool, Value::Bool(_))
                | (Enum, Value::Enum(_))
                | (String, Value::String(_))
                | (Bytes, Value::Bytes(_))
        )
    }
}

/// Describes a single field of a message.
#[derive(Debug, Clone)]
pub struct FieldDescriptor<'d> {
    tag: u32,
    name: &'static str,
    typ: FieldType,
    label: Label,
    message: Option<&'d MessageDescriptor<'d>>,
    enumeration: Option<&'d EnumDescriptor>,
    oneof: Option<&'d OneofDescriptor>,
    default: Option<Value>,
    flags: FieldFlags,
}

impl<'d> FieldDescriptor<'d> {
    /// Creates a descriptor for a scalar field.
    ///
    /// [`FieldType::Message`] fields need [`FieldDescriptor::message`], and
    /// [`FieldType::Enum`] fields [`FieldDescriptor::enumeration`], so that
    /// the referenced descriptor travels with the field.
    pub fn scalar(tag: u32, name: &'static str, typ: FieldType, label: Label) -> Self {
        Self {
            tag,
            name,
            typ,
            label,
            message: None,
            enumeration: None,
            oneof: None,
            default: None,
            flags: FieldFlags::empty(),
        }
    }

    /// Creates a descriptor for a sub-message field.
    pub fn message(
        tag: u32,
        name: &'static str,
        label: Label,
        descriptor: &'d MessageDescriptor<'d>,
    ) -> Self {
        Self {
            message: Some(descriptor),
            ..Self::scalar(tag, name, FieldType::Message, label)
        }
    }

    /// Creates a descriptor for an enum field.
    pub fn enumeration(
        tag: u32,
        name: &'static str,
        label: Label,
        descriptor: &'d EnumDescriptor,
    ) -> Self {
        Self {
            enumeration: Some(descriptor),
            ..Self::scalar(tag, name, FieldType::Enum, label)
        }
    }

    /// Marks a repeated primitive field as packed.
    pub fn packed(mut self) -> Self {
        self.flags |= FieldFlags::PACKED;
        self
    }

    /// Attaches a default value, surfaced by `get_or_default` when the
    /// field is absent.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Places the field in a oneof group.
    pub fn in_oneof(mut self, oneof: &'d OneofDescriptor) -> Self {
        self.oneof = Some(oneof);
        self
    }

    /// The field number.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// The field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field type.
    pub fn typ(&self) -> FieldType {
        self.typ
    }

    /// The field label.
    pub fn label(&self) -> Label {
        self.label
    }

    /// The referenced message descriptor, for sub-message fields.
    pub fn message_descriptor(&self) -> Option<&'d MessageDescriptor<'d>> {
        self.message
    }

    /// The referenced enum descriptor, for enum fields.
    pub fn enum_descriptor(&self) -> Option<&'d EnumDescriptor> {
        self.enumeration
    }

    /// The oneof group this field belongs to, if any.
    pub fn oneof(&self) -> Option<&'d OneofDescriptor> {
        self.oneof
    }

    /// The default value, if one was declared.
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The behavior flags.
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Whether occurrences of this field are packed into one block.
    pub fn is_packed(&self) -> bool {
        self.flags.contains(FieldFlags::PACKED)
            && self.label == Label::Repeated
            && self.typ.packable()
    }
}

/// Describes a message: an ordered set of fields plus any registered
/// extensions.
#[derive(Debug, Clone)]
pub struct MessageDescriptor<'d> {
    name: &'static str,
    fields: Vec<FieldDescriptor<'d>>,
    extensions: Vec<FieldDescriptor<'d>>,
}

impl<'d> MessageDescriptor<'d> {
    /// Creates a message descriptor.
    ///
    /// Field tags must be strictly ascending and unique, message-typed
    /// fields must reference a message descriptor, and enum-typed fields an
    /// enum descriptor; anything else is [`Error::Descriptor`].
    pub fn new(name: &'static str, fields: Vec<FieldDescriptor<'d>>) -> Result<Self, Error> {
        for (i, field) in fields.iter().enumerate() {
            Self::check_field(field)?;
            if i > 0 && fields[i - 1].tag >= field.tag {
                return Err(Error::Descriptor);
            }
        }

        Ok(Self {
            name,
            fields,
            extensions: Vec::new(),
        })
    }

    fn check_field(field: &FieldDescriptor<'d>) -> Result<(), Error> {
        if field.tag == 0 {
            return Err(Error::Descriptor);
        }
        match field.typ {
            FieldType::Message if field.message.is_none() => Err(Error::Descriptor),
            FieldType::Enum if field.enumeration.is_none() => Err(Error::Descriptor),
            _ => Ok(()),
        }
    }

    /// Registers an extension field, appending it to the extension list.
    ///
    /// Meant to run at startup, before the descriptor is shared. The tag
    /// must not collide with an existing field or extension.
    pub fn register_extension(&mut self, field: FieldDescriptor<'d>) -> Result<(), Error> {
        Self::check_field(&field)?;
        if self.field_by_tag(field.tag).is_some() {
            return Err(Error::Descriptor);
        }

        self.extensions.push(field);
        Ok(())
    }

    /// The message name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared fields, ascending by tag.
    pub fn fields(&self) -> &[FieldDescriptor<'d>] {
        &self.fields
    }

    /// The registered extensions, in registration order.
    pub fn extensions(&self) -> &[FieldDescriptor<'d>] {
        &self.extensions
    }

    /// Looks up a field or extension by tag.
    pub fn field_by_tag(&self, tag: u32) -> Option<&FieldDescriptor<'d>> {
        match self.fields.binary_search_by_key(&tag, |f| f.tag) {
            Ok(i) => Some(&self.fields[i]),
            Err(_) => self.extensions.iter().find(|f| f.tag == tag),
        }
    }

    /// Looks up a field or extension by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor<'d>> {
        self.fields
            .iter()
            .chain(self.extensions.iter())
            .find(|f| f.name == name)
    }
}

/// Describes an enum: (number, name) pairs ascending by number.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    name: &'static str,
    values: Vec<(i32, &'static str)>,
}

impl EnumDescriptor {
    /// Creates an enum descriptor. Numbers must be strictly ascending.
    pub fn new(name: &'static str, values: Vec<(i32, &'static str)>) -> Result<Self, Error> {
        for pair in values.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(Error::Descriptor);
            }
        }

        Ok(Self { name, values })
    }

    /// The enum name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared values.
    pub fn values(&self) -> &[(i32, &'static str)] {
        &self.values
    }

    /// Looks up a value name by number.
    pub fn name_by_number(&self, number: i32) -> Option<&'static str> {
        self.values
            .binary_search_by_key(&number, |&(n, _)| n)
            .ok()
            .map(|i| self.values[i].1)
    }

    /// Looks up a value number by name.
    pub fn number_by_name(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|&&(_, n)| n == name).map(|&(n, _)| n)
    }
}

/// Describes a oneof: a named group of field tags of which at most one may
/// be present.
#[derive(Debug, Clone)]
pub struct OneofDescriptor {
    name: &'static str,
    tags: Vec<u32>,
}

impl OneofDescriptor {
    /// Creates a oneof descriptor over the given member tags.
    pub fn new(name: &'static str, tags: Vec<u32>) -> Self {
        Self { name, tags }
    }

    /// The oneof name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The member field tags.
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn simple() -> MessageDescriptor<'static> {
        MessageDescriptor::new(
            "Simple",
            vec![
                FieldDescriptor::scalar(1, "name", FieldType::String, Label::Optional),
                FieldDescriptor::scalar(2, "id", FieldType::Int32, Label::Optional),
                FieldDescriptor::scalar(4, "scores", FieldType::UInt32, Label::Repeated).packed(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn tags_must_ascend() {
        let fields = vec![
            FieldDescriptor::scalar(2, "a", FieldType::Bool, Label::Optional),
            FieldDescriptor::scalar(2, "b", FieldType::Bool, Label::Optional),
        ];
        assert_matches!(MessageDescriptor::new("Bad", fields), Err(Error::Descriptor));

        let fields = vec![
            FieldDescriptor::scalar(3, "a", FieldType::Bool, Label::Optional),
            FieldDescriptor::scalar(1, "b", FieldType::Bool, Label::Optional),
        ];
        assert_matches!(MessageDescriptor::new("Bad", fields), Err(Error::Descriptor));
    }

    #[test]
    fn message_fields_need_a_descriptor() {
        let fields = vec![FieldDescriptor::scalar(
            1,
            "nested",
            FieldType::Message,
            Label::Optional,
        )];
        assert_matches!(MessageDescriptor::new("Bad", fields), Err(Error::Descriptor));
    }

    #[test]
    fn lookup_by_tag_and_name() {
        let desc = simple();
        assert_eq!(desc.field_by_tag(2).unwrap().name(), "id");
        assert_eq!(desc.field_by_name("scores").unwrap().tag(), 4);
        assert!(desc.field_by_tag(3).is_none());
    }

    #[test]
    fn extension_registration() {
        let mut desc = simple();
        desc.register_extension(FieldDescriptor::scalar(
            100,
            "ext",
            FieldType::UInt64,
            Label::Optional,
        ))
        .unwrap();

        assert_eq!(desc.field_by_tag(100).unwrap().name(), "ext");

        // colliding tags are rejected
        let dup = FieldDescriptor::scalar(2, "dup", FieldType::Bool, Label::Optional);
        assert_matches!(desc.register_extension(dup), Err(Error::Descriptor));
    }

    #[test]
    fn packed_needs_repeated_primitive() {
        let desc = simple();
        assert!(desc.field_by_tag(4).unwrap().is_packed());
        assert!(!desc.field_by_tag(1).unwrap().is_packed());
    }

    #[test]
    fn enum_lookups() {
        let desc = EnumDescriptor::new("Corpus", vec![(0, "UNIVERSAL"), (1, "WEB"), (2, "IMAGES")])
            .unwrap();

        assert_eq!(desc.name_by_number(1), Some("WEB"));
        assert_eq!(desc.number_by_name("IMAGES"), Some(2));
        assert_eq!(desc.name_by_number(7), None);

        assert_matches!(
            EnumDescriptor::new("Bad", vec![(1, "A"), (1, "B")]),
            Err(Error::Descriptor)
        );
    }

    #[test]
    fn value_encode_decode_strictness() {
        let mut out = Vec::new();
        FieldType::SInt32.encode_value(&Value::Int32(-2), &mut out).unwrap();
        assert_eq!(out, vec![0x03]);
        assert_eq!(
            FieldType::SInt32.decode_value(&out).unwrap(),
            Value::Int32(-2)
        );

        // a u64-sized varint does not fit a uint32 field
        let wide = crate::wire::encode_varint(u64::from(u32::MAX) + 1);
        assert_matches!(FieldType::UInt32.decode_value(&wide), Err(Error::Varint));

        // negative int32 is sign-extended to ten bytes and comes back intact
        let mut out = Vec::new();
        FieldType::Int32.encode_value(&Value::Int32(-42), &mut out).unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(
            FieldType::Int32.decode_value(&out).unwrap(),
            Value::Int32(-42)
        );

        // mismatched variants are a descriptor error
        let mut out = Vec::new();
        assert_matches!(
            FieldType::Int32.encode_value(&Value::Bool(true), &mut out),
            Err(Error::Descriptor)
        );
    }
}
