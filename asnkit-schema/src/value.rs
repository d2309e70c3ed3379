//! Values that codecs produce when decoding and consume when encoding.
use alloc::{boxed::Box, collections::BTreeMap, string::String, vec::Vec};
use bitvec::{prelude::Msb0, vec::BitVec};
use num::{BigInt, ToPrimitive};

use crate::tag::Tag;

/// A decoded or encodable ASN1 value.
///
/// Integers that fit an `i64` are always represented as `Integer`;
/// codecs only produce `BigInteger` for larger magnitudes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    BigInteger(BigInt),
    Real(f64),
    Enumerated(i64),
    BitString(BitVec<u8, Msb0>),
    OctetString(Vec<u8>),
    /// Any character string type, including the time types.
    String(String),
    /// Dotted-decimal object identifier.
    ObjectIdentifier(String),
    /// SEQUENCE OF and SET OF elements.
    List(Vec<Value>),
    /// SEQUENCE, SET and EXTERNAL members.
    Record(Record),
    Choice(ChoiceValue),
    /// Complete TLV of an ANY value.
    Any(Vec<u8>),
}

impl Value {
    pub fn oid(dotted: &str) -> Self {
        Value::ObjectIdentifier(dotted.into())
    }

    pub fn record<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Record(members.into_iter().collect())
    }

    pub fn choice(name: &str, value: Value) -> Self {
        Value::Choice(ChoiceValue::Alternative(name.into(), Box::new(value)))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) | Value::Enumerated(i) => Some(*i),
            Value::BigInteger(i) => i.to_i64(),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::ObjectIdentifier(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        match value.to_i64() {
            Some(native) => Value::Integer(native),
            None => Value::BigInteger(value),
        }
    }
}

impl From<i128> for Value {
    fn from(value: i128) -> Self {
        match i64::try_from(value) {
            Ok(native) => Value::Integer(native),
            Err(_) => Value::BigInteger(value.into()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::OctetString(value)
    }
}

impl From<BitVec<u8, Msb0>> for Value {
    fn from(value: BitVec<u8, Msb0>) -> Self {
        Value::BitString(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

/// An extension addition the decoding schema does not know.
///
/// For PER, `index` is the position in the extension presence bitmap and
/// `payload` the open type octets. For BER and DER, `index` counts the
/// unknown elements in order of appearance and `payload` is the raw TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownExtension {
    pub index: usize,
    pub payload: Vec<u8>,
}

/// Members of a SEQUENCE or SET value. Only present members are stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    members: BTreeMap<String, Value>,
    pub unknown_extensions: Vec<UnknownExtension>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: Value) -> Option<Value> {
        self.members.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.members.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        Record {
            members: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            unknown_extensions: Vec::new(),
        }
    }
}

/// The selected alternative of a CHOICE value.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceValue {
    Alternative(String, Box<Value>),
    /// A BER/DER element whose tag matches no alternative of an
    /// extensible CHOICE. `payload` is the complete TLV.
    Unresolved { tag: Tag, payload: Vec<u8> },
    /// A PER extension alternative beyond the known additions.
    /// `index` counts extension additions from zero.
    UnknownExtension { index: usize, payload: Vec<u8> },
}

impl ChoiceValue {
    pub fn name(&self) -> Option<&str> {
        match self {
            ChoiceValue::Alternative(name, _) => Some(name),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ChoiceValue::Alternative(_, value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_big_integers() {
        assert_eq!(Value::from(BigInt::from(-145)), Value::Integer(-145));
        let big: BigInt = "84655465465466456456".parse().unwrap();
        assert_eq!(Value::from(big.clone()), Value::BigInteger(big));
        assert_eq!(Value::from(i128::from(i64::MIN)), Value::Integer(i64::MIN));
        assert!(matches!(
            Value::from(i128::from(i64::MAX) + 1),
            Value::BigInteger(_)
        ));
    }

    #[test]
    fn builds_records() {
        let value = Value::record([("b", Value::from(true)), ("a", Value::Null)]);
        let record = value.as_record().unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("b"), Some(&Value::Boolean(true)));
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            Record::new().with("a", Value::Null).with("b", true.into()),
            record.clone()
        );
    }

    #[test]
    fn inspects_choices() {
        let value = Value::choice("b", 7.into());
        match value {
            Value::Choice(choice) => {
                assert_eq!(choice.name(), Some("b"));
                assert_eq!(choice.value(), Some(&Value::Integer(7)));
            }
            other => panic!("unexpected value {other:?}"),
        }
        let unresolved = ChoiceValue::Unresolved {
            tag: Tag::context(9),
            payload: vec![0x89, 0x00],
        };
        assert_eq!(unresolved.name(), None);
    }
}
