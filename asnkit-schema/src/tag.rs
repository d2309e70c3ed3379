//! BER identifier model: tag classes, tagging modes and the
//! universal tag numbers assigned by X.680.

/// Tag class, carried in the two high bits of a BER identifier octet.
/// The declaration order matches the canonical DER ordering of classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0,
            TagClass::Application => 1,
            TagClass::ContextSpecific => 2,
            TagClass::Private => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Implicit,
    Explicit,
}

/// A tag as it appears on the wire: class plus tag number.
/// Ordering is class first, then number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub class: TagClass,
    pub number: u32,
}

impl Tag {
    pub const fn new(class: TagClass, number: u32) -> Self {
        Tag { class, number }
    }

    pub const fn universal(number: u32) -> Self {
        Tag::new(TagClass::Universal, number)
    }

    pub const fn context(number: u32) -> Self {
        Tag::new(TagClass::ContextSpecific, number)
    }
}

impl From<(TagClass, u32)> for Tag {
    fn from(value: (TagClass, u32)) -> Self {
        Tag::new(value.0, value.1)
    }
}

pub mod universal {
    pub const END_OF_CONTENTS: u32 = 0;
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const OBJECT_DESCRIPTOR: u32 = 7;
    pub const EXTERNAL: u32 = 8;
    pub const REAL: u32 = 9;
    pub const ENUMERATED: u32 = 10;
    pub const EMBEDDED_PDV: u32 = 11;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const NUMERIC_STRING: u32 = 18;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const TELETEX_STRING: u32 = 20;
    pub const VIDEOTEX_STRING: u32 = 21;
    pub const IA5_STRING: u32 = 22;
    pub const UTC_TIME: u32 = 23;
    pub const GENERALIZED_TIME: u32 = 24;
    pub const GRAPHIC_STRING: u32 = 25;
    pub const VISIBLE_STRING: u32 = 26;
    pub const GENERAL_STRING: u32 = 27;
    pub const UNIVERSAL_STRING: u32 = 28;
    pub const BMP_STRING: u32 = 30;
}
