//! Schema nodes: one immutable descriptor per ASN1 type.
//!
//! Nodes are created through the constructors on [`Node`] and refined with
//! the builder-style operators [`Node::tagged`], [`Node::optional`],
//! [`Node::with_default`], [`Node::constrained`] and [`Node::char_set`].
//! Every operator consumes its input and returns a new node, so a schema
//! tree that has been handed to a codec is never mutated behind its back.
use alloc::{boxed::Box, string::String, vec::Vec};

use crate::{
    alphabet::Alphabet,
    constraints::{Constraint, ConstraintKind},
    error::{SchemaError, SchemaErrorType},
    tag::{universal, Tag, TagClass, TagType},
    value::Value,
};

/// Representation of an ASN1 character string type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterStringType {
    NumericString,
    PrintableString,
    VisibleString,
    IA5String,
    GraphicString,
    GeneralString,
    ObjectDescriptor,
    UTCTime,
    GeneralizedTime,
    BMPString,
    UTF8String,
    TeletexString,
    VideotexString,
    UniversalString,
}

impl CharacterStringType {
    pub fn universal_tag(self) -> u32 {
        match self {
            CharacterStringType::NumericString => universal::NUMERIC_STRING,
            CharacterStringType::PrintableString => universal::PRINTABLE_STRING,
            CharacterStringType::VisibleString => universal::VISIBLE_STRING,
            CharacterStringType::IA5String => universal::IA5_STRING,
            CharacterStringType::GraphicString => universal::GRAPHIC_STRING,
            CharacterStringType::GeneralString => universal::GENERAL_STRING,
            CharacterStringType::ObjectDescriptor => universal::OBJECT_DESCRIPTOR,
            CharacterStringType::UTCTime => universal::UTC_TIME,
            CharacterStringType::GeneralizedTime => universal::GENERALIZED_TIME,
            CharacterStringType::BMPString => universal::BMP_STRING,
            CharacterStringType::UTF8String => universal::UTF8_STRING,
            CharacterStringType::TeletexString => universal::TELETEX_STRING,
            CharacterStringType::VideotexString => universal::VIDEOTEX_STRING,
            CharacterStringType::UniversalString => universal::UNIVERSAL_STRING,
        }
    }

    /// The canonical repertoire, for types that have one.
    pub fn alphabet(self) -> Option<Alphabet> {
        match self {
            CharacterStringType::NumericString => Some(Alphabet::numeric()),
            CharacterStringType::PrintableString => Some(Alphabet::printable()),
            CharacterStringType::VisibleString
            | CharacterStringType::UTCTime
            | CharacterStringType::GeneralizedTime => Some(Alphabet::visible()),
            CharacterStringType::IA5String | CharacterStringType::ObjectDescriptor => {
                Some(Alphabet::ia5())
            }
            CharacterStringType::GraphicString | CharacterStringType::GeneralString => {
                Some(Alphabet::octet())
            }
            CharacterStringType::BMPString => Some(Alphabet::bmp(0, 0xFFFF)),
            CharacterStringType::UTF8String
            | CharacterStringType::TeletexString
            | CharacterStringType::VideotexString
            | CharacterStringType::UniversalString => None,
        }
    }

    /// Teletex, Videotex and Universal strings are modelled but
    /// no codec encodes them.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            CharacterStringType::TeletexString
                | CharacterStringType::VideotexString
                | CharacterStringType::UniversalString
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterString {
    pub r#type: CharacterStringType,
    pub size: Constraint,
    pub alphabet: Option<Alphabet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedBit {
    pub name: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitString {
    pub size: Constraint,
    pub named_bits: Vec<NamedBit>,
}

/// A named value of an ENUMERATED type
#[derive(Debug, Clone, PartialEq)]
pub struct DistinguishedValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    pub values: Vec<DistinguishedValue>,
    pub extensions: Vec<DistinguishedValue>,
}

impl Enumeration {
    /// Largest value of the root enumeration.
    pub fn max_standard_value(&self) -> Option<i64> {
        self.values.iter().map(|v| v.value).max()
    }

    fn sorted_root(&self) -> Vec<i64> {
        let mut root: Vec<i64> = self.values.iter().map(|v| v.value).collect();
        root.sort_unstable();
        root
    }

    /// Index of `value` among the root values sorted in ascending order.
    pub fn root_index(&self, value: i64) -> Option<usize> {
        self.sorted_root().binary_search(&value).ok()
    }

    pub fn root_value(&self, index: usize) -> Option<i64> {
        self.sorted_root().get(index).copied()
    }

    /// Index of `value` among the extension additions, in declaration order.
    pub fn extension_index(&self, value: i64) -> Option<usize> {
        self.extensions.iter().position(|v| v.value == value)
    }

    pub fn extension_value(&self, index: usize) -> Option<i64> {
        self.extensions.get(index).map(|v| v.value)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .chain(self.extensions.iter())
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }
}

/// A named member of a SEQUENCE, SET or CHOICE
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub node: Node,
}

/// Members of a SEQUENCE, SET or CHOICE, split into the root
/// and the extension additions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub fields: Vec<Field>,
    pub extensions: Vec<Field>,
}

impl Structure {
    pub fn all(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().chain(self.extensions.iter())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.all().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|f| f.name.as_str())
    }

    /// Number of root members that PER announces in the presence bitmap.
    pub fn optional_count(&self) -> usize {
        self.fields.iter().filter(|f| f.node.is_optional()).count()
    }

    pub fn is_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|f| f.name == name)
    }
}

/// Element type and size range of a SEQUENCE OF or SET OF
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub element: Box<Node>,
    pub size: Constraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Null,
    Boolean,
    Integer(Constraint),
    Real,
    ObjectIdentifier,
    Enumerated(Enumeration),
    BitString(BitString),
    OctetString(Constraint),
    CharacterString(CharacterString),
    Sequence(Structure),
    Set(Structure),
    Choice(Structure),
    SequenceOf(Collection),
    SetOf(Collection),
    Any,
    External(Structure),
    EmbeddedPdv,
}

impl Kind {
    /// Universal tag of the kind. CHOICE and ANY carry none.
    pub fn universal_tag(&self) -> Option<u32> {
        Some(match self {
            Kind::Null => universal::NULL,
            Kind::Boolean => universal::BOOLEAN,
            Kind::Integer(_) => universal::INTEGER,
            Kind::Real => universal::REAL,
            Kind::ObjectIdentifier => universal::OBJECT_IDENTIFIER,
            Kind::Enumerated(_) => universal::ENUMERATED,
            Kind::BitString(_) => universal::BIT_STRING,
            Kind::OctetString(_) => universal::OCTET_STRING,
            Kind::CharacterString(c) => c.r#type.universal_tag(),
            Kind::Sequence(_) | Kind::SequenceOf(_) => universal::SEQUENCE,
            Kind::Set(_) | Kind::SetOf(_) => universal::SET,
            Kind::External(_) => universal::EXTERNAL,
            Kind::EmbeddedPdv => universal::EMBEDDED_PDV,
            Kind::Choice(_) | Kind::Any => return None,
        })
    }

    /// Kinds whose own TLV always uses the constructed form.
    pub fn is_constructed(&self) -> bool {
        matches!(
            self,
            Kind::Sequence(_)
                | Kind::Set(_)
                | Kind::SequenceOf(_)
                | Kind::SetOf(_)
                | Kind::External(_)
        )
    }
}

/// Immutable descriptor of one ASN1 type.
///
/// `tag` is the identifier of the TLV that carries the content, after any
/// implicit re-tagging. Explicit tags wrap that TLV and are listed in
/// `explicit`, outermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: Kind,
    tag: Option<Tag>,
    explicit: Vec<Tag>,
    tag_type: Option<TagType>,
    optional: bool,
    default: Option<Value>,
    extendable: bool,
}

impl From<Kind> for Node {
    fn from(kind: Kind) -> Self {
        Node {
            tag: kind.universal_tag().map(Tag::universal),
            kind,
            explicit: Vec::new(),
            tag_type: None,
            optional: false,
            default: None,
            extendable: false,
        }
    }
}

fn fields<I, S>(fields: I) -> Vec<Field>
where
    I: IntoIterator<Item = (S, Node)>,
    S: Into<String>,
{
    fields
        .into_iter()
        .map(|(name, node)| Field {
            name: name.into(),
            node,
        })
        .collect()
}

fn distinguished_values(values: &[(&str, i64)]) -> Vec<DistinguishedValue> {
    values
        .iter()
        .map(|(name, value)| DistinguishedValue {
            name: (*name).into(),
            value: *value,
        })
        .collect()
}

fn character_string(r#type: CharacterStringType) -> Node {
    Node::from(Kind::CharacterString(CharacterString {
        r#type,
        size: Constraint::unconstrained(),
        alphabet: r#type.alphabet(),
    }))
}

impl Node {
    pub fn null() -> Self {
        Kind::Null.into()
    }

    pub fn boolean() -> Self {
        Kind::Boolean.into()
    }

    pub fn integer() -> Self {
        Kind::Integer(Constraint::unconstrained()).into()
    }

    pub fn real() -> Self {
        Kind::Real.into()
    }

    pub fn object_identifier() -> Self {
        Kind::ObjectIdentifier.into()
    }

    pub fn bit_string() -> Self {
        Kind::BitString(BitString {
            size: Constraint::unconstrained(),
            named_bits: Vec::new(),
        })
        .into()
    }

    /// A BIT STRING with named bit positions.
    pub fn named_bit_string(bits: &[(&str, usize)]) -> Self {
        Kind::BitString(BitString {
            size: Constraint::unconstrained(),
            named_bits: bits
                .iter()
                .map(|(name, position)| NamedBit {
                    name: (*name).into(),
                    position: *position,
                })
                .collect(),
        })
        .into()
    }

    pub fn octet_string() -> Self {
        Kind::OctetString(Constraint::unconstrained()).into()
    }

    pub fn utf8_string() -> Self {
        character_string(CharacterStringType::UTF8String)
    }

    pub fn numeric_string() -> Self {
        character_string(CharacterStringType::NumericString)
    }

    pub fn printable_string() -> Self {
        character_string(CharacterStringType::PrintableString)
    }

    pub fn visible_string() -> Self {
        character_string(CharacterStringType::VisibleString)
    }

    pub fn ia5_string() -> Self {
        character_string(CharacterStringType::IA5String)
    }

    pub fn graphic_string() -> Self {
        character_string(CharacterStringType::GraphicString)
    }

    pub fn general_string() -> Self {
        character_string(CharacterStringType::GeneralString)
    }

    pub fn object_descriptor() -> Self {
        character_string(CharacterStringType::ObjectDescriptor)
    }

    pub fn utc_time() -> Self {
        character_string(CharacterStringType::UTCTime)
    }

    pub fn generalized_time() -> Self {
        character_string(CharacterStringType::GeneralizedTime)
    }

    pub fn teletex_string() -> Self {
        character_string(CharacterStringType::TeletexString)
    }

    pub fn videotex_string() -> Self {
        character_string(CharacterStringType::VideotexString)
    }

    pub fn universal_string() -> Self {
        character_string(CharacterStringType::UniversalString)
    }

    pub fn bmp_string() -> Self {
        character_string(CharacterStringType::BMPString)
    }

    /// A BMPString whose characters lie in `first..=last`.
    pub fn bmp_string_range(first: u16, last: u16) -> Self {
        Kind::CharacterString(CharacterString {
            r#type: CharacterStringType::BMPString,
            size: Constraint::unconstrained(),
            alphabet: Some(Alphabet::bmp(first, last)),
        })
        .into()
    }

    pub fn any() -> Self {
        Kind::Any.into()
    }

    pub fn embedded_pdv() -> Self {
        Kind::EmbeddedPdv.into()
    }

    /// The EXTERNAL type, with `single_type` as the type of its
    /// `single-ASN1-type` encoding alternative.
    pub fn external(single_type: Node) -> Self {
        let encoding = Node::choice([
            (
                "single-ASN1-type",
                single_type.tagged(0, TagType::Explicit, TagClass::ContextSpecific),
            ),
            ("octet-aligned", Node::octet_string().implicit(1)),
            ("arbitrary", Node::bit_string().implicit(2)),
        ]);
        Kind::External(Structure {
            fields: fields([
                ("direct-reference", Node::object_identifier().optional()),
                ("indirect-reference", Node::integer().optional()),
                ("data-value-descriptor", Node::object_descriptor().optional()),
                ("encoding", encoding),
            ]),
            extensions: Vec::new(),
        })
        .into()
    }

    pub fn sequence<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, Node)>,
        S: Into<String>,
    {
        Kind::Sequence(Structure {
            fields: fields(members),
            extensions: Vec::new(),
        })
        .into()
    }

    /// An extensible SEQUENCE with `extensions` as its extension additions.
    pub fn sequence_ext<I, J, S, T>(members: I, extensions: J) -> Self
    where
        I: IntoIterator<Item = (S, Node)>,
        J: IntoIterator<Item = (T, Node)>,
        S: Into<String>,
        T: Into<String>,
    {
        Node::extendable_from(Kind::Sequence(Structure {
            fields: fields(members),
            extensions: fields(extensions),
        }))
    }

    pub fn set<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, Node)>,
        S: Into<String>,
    {
        Kind::Set(Structure {
            fields: fields(members),
            extensions: Vec::new(),
        })
        .into()
    }

    pub fn set_ext<I, J, S, T>(members: I, extensions: J) -> Self
    where
        I: IntoIterator<Item = (S, Node)>,
        J: IntoIterator<Item = (T, Node)>,
        S: Into<String>,
        T: Into<String>,
    {
        Node::extendable_from(Kind::Set(Structure {
            fields: fields(members),
            extensions: fields(extensions),
        }))
    }

    pub fn choice<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = (S, Node)>,
        S: Into<String>,
    {
        Kind::Choice(Structure {
            fields: fields(alternatives),
            extensions: Vec::new(),
        })
        .into()
    }

    pub fn choice_ext<I, J, S, T>(alternatives: I, extensions: J) -> Self
    where
        I: IntoIterator<Item = (S, Node)>,
        J: IntoIterator<Item = (T, Node)>,
        S: Into<String>,
        T: Into<String>,
    {
        Node::extendable_from(Kind::Choice(Structure {
            fields: fields(alternatives),
            extensions: fields(extensions),
        }))
    }

    pub fn sequence_of(element: Node) -> Self {
        Kind::SequenceOf(Collection {
            element: Box::new(element),
            size: Constraint::unconstrained(),
        })
        .into()
    }

    pub fn set_of(element: Node) -> Self {
        Kind::SetOf(Collection {
            element: Box::new(element),
            size: Constraint::unconstrained(),
        })
        .into()
    }

    pub fn enumerated(values: &[(&str, i64)]) -> Self {
        Kind::Enumerated(Enumeration {
            values: distinguished_values(values),
            extensions: Vec::new(),
        })
        .into()
    }

    pub fn enumerated_ext(values: &[(&str, i64)], extensions: &[(&str, i64)]) -> Self {
        Node::extendable_from(Kind::Enumerated(Enumeration {
            values: distinguished_values(values),
            extensions: distinguished_values(extensions),
        }))
    }

    fn extendable_from(kind: Kind) -> Self {
        let mut node = Node::from(kind);
        node.extendable = true;
        node
    }

    /// Applies a tag to the node.
    ///
    /// Implicit tagging replaces the outermost tag. Explicit tagging wraps
    /// the node's current encoding in a constructed TLV. Types without a tag
    /// of their own (CHOICE, ANY) can only be tagged explicitly, so an
    /// implicit tag on them is applied explicitly.
    /// * `number` - tag number
    /// * `tag_type` - implicit or explicit tagging
    /// * `class` - tag class of the new tag
    pub fn tagged(mut self, number: u32, tag_type: TagType, class: TagClass) -> Self {
        let tag = Tag::new(class, number);
        let untagged = self.tag.is_none() && self.explicit.is_empty();
        match tag_type {
            TagType::Explicit => self.explicit.insert(0, tag),
            TagType::Implicit if untagged => self.explicit.insert(0, tag),
            TagType::Implicit => match self.explicit.first_mut() {
                Some(outer) => *outer = tag,
                None => self.tag = Some(tag),
            },
        }
        self.tag_type = Some(if self.explicit.is_empty() {
            TagType::Implicit
        } else {
            TagType::Explicit
        });
        self
    }

    /// Shorthand for an implicit context-specific tag.
    pub fn implicit(self, number: u32) -> Self {
        self.tagged(number, TagType::Implicit, TagClass::ContextSpecific)
    }

    /// Shorthand for an explicit context-specific tag.
    pub fn explicit(self, number: u32) -> Self {
        self.tagged(number, TagType::Explicit, TagClass::ContextSpecific)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the node optional with a default value that decoders
    /// fill in when the member is absent.
    pub fn with_default(mut self, value: Value) -> Self {
        self.optional = true;
        self.default = Some(value);
        self
    }

    /// Applies a value range (INTEGER) or size range (strings and
    /// collections) to the node.
    pub fn constrained(
        mut self,
        kind: ConstraintKind,
        lower: i128,
        upper: i128,
    ) -> Result<Self, SchemaError> {
        let constraint = Constraint::new(kind, lower, upper)?;
        let negative_size = || {
            SchemaError::new(
                "Size constraints cannot have a negative lower limit.",
                SchemaErrorType::InvalidConstraint,
            )
        };
        match &mut self.kind {
            Kind::Integer(range) => *range = constraint,
            Kind::BitString(BitString { size, .. })
            | Kind::OctetString(size)
            | Kind::CharacterString(CharacterString { size, .. })
            | Kind::SequenceOf(Collection { size, .. })
            | Kind::SetOf(Collection { size, .. }) => {
                if lower < 0 {
                    return Err(negative_size());
                }
                *size = constraint;
            }
            _ => {
                return Err(SchemaError::new(
                    "Only integers, strings and collections can be constrained.",
                    SchemaErrorType::InvalidConstraint,
                ))
            }
        }
        if kind == ConstraintKind::Extendable {
            self.extendable = true;
        }
        Ok(self)
    }

    /// Restricts the permitted alphabet of a character string node.
    pub fn char_set(mut self, repertoire: &str, kind: ConstraintKind) -> Result<Self, SchemaError> {
        let Kind::CharacterString(CharacterString {
            alphabet: Some(alphabet),
            ..
        }) = &mut self.kind
        else {
            return Err(SchemaError::new(
                "Permitted alphabets apply to restricted character strings only.",
                SchemaErrorType::InvalidCharacterSet,
            ));
        };
        *alphabet = alphabet.clone().restrict(repertoire, kind)?;
        Ok(self)
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Identifier of the TLV carrying the node's content.
    pub fn tag(&self) -> Option<Tag> {
        self.tag
    }

    /// Explicit wrapper tags, outermost first.
    pub fn explicit_tags(&self) -> &[Tag] {
        &self.explicit
    }

    /// The first tag a decoder sees for this node.
    pub fn outer_tag(&self) -> Option<Tag> {
        self.explicit.first().copied().or(self.tag)
    }

    pub fn tag_class(&self) -> Option<TagClass> {
        self.outer_tag().map(|t| t.class)
    }

    /// Tagging mode, if a tag was applied to the node.
    pub fn tag_type(&self) -> Option<TagType> {
        self.tag_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_extendable(&self) -> bool {
        self.extendable
    }

    /// Whether a TLV with identifier `tag` can start an encoding of this
    /// node. Untagged CHOICE nodes accept the tags of their alternatives,
    /// ANY accepts every tag.
    pub fn accepts(&self, tag: Tag) -> bool {
        match (self.outer_tag(), &self.kind) {
            (Some(own), _) => own == tag,
            (None, Kind::Choice(alternatives)) => alternatives.all().any(|f| f.node.accepts(tag)),
            (None, Kind::Any) => true,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_universal_tags() {
        assert_eq!(Node::boolean().tag(), Some(Tag::universal(1)));
        assert_eq!(Node::utc_time().tag(), Some(Tag::universal(23)));
        assert_eq!(Node::bmp_string().tag(), Some(Tag::universal(30)));
        assert_eq!(Node::set_of(Node::null()).tag(), Some(Tag::universal(17)));
        assert_eq!(Node::external(Node::any()).tag(), Some(Tag::universal(8)));
        assert_eq!(Node::choice([("a", Node::null())]).tag(), None);
        assert_eq!(Node::any().tag(), None);
    }

    #[test]
    fn tags_implicitly_and_explicitly() {
        let implicit = Node::integer().implicit(3);
        assert_eq!(implicit.tag(), Some(Tag::context(3)));
        assert_eq!(implicit.tag_type(), Some(TagType::Implicit));
        assert!(implicit.explicit_tags().is_empty());

        let explicit = Node::integer().explicit(0);
        assert_eq!(explicit.tag(), Some(Tag::universal(2)));
        assert_eq!(explicit.explicit_tags(), &[Tag::context(0)]);
        assert_eq!(explicit.outer_tag(), Some(Tag::context(0)));
        assert_eq!(explicit.tag_type(), Some(TagType::Explicit));

        let retagged = explicit.implicit(7);
        assert_eq!(retagged.explicit_tags(), &[Tag::context(7)]);
        assert_eq!(retagged.tag(), Some(Tag::universal(2)));

        let nested = Node::boolean()
            .explicit(1)
            .tagged(4, TagType::Explicit, TagClass::Application);
        assert_eq!(
            nested.explicit_tags(),
            &[Tag::new(TagClass::Application, 4), Tag::context(1)]
        );
    }

    #[test]
    fn promotes_implicit_choice_tags() {
        let choice = Node::choice([("a", Node::null()), ("b", Node::boolean())]).implicit(2);
        assert_eq!(choice.tag(), None);
        assert_eq!(choice.explicit_tags(), &[Tag::context(2)]);
        assert_eq!(choice.tag_type(), Some(TagType::Explicit));
    }

    #[test]
    fn leaves_input_node_untouched() {
        let base = Node::integer();
        let tagged = base.clone().implicit(1).optional();
        assert_eq!(base, Node::integer());
        assert!(tagged.is_optional());
        assert!(!base.is_optional());
    }

    #[test]
    fn rejects_negative_sizes() {
        assert_eq!(
            Node::octet_string()
                .constrained(ConstraintKind::Fixed, -1, 4)
                .unwrap_err()
                .kind,
            SchemaErrorType::InvalidConstraint
        );
        assert!(Node::ia5_string()
            .constrained(ConstraintKind::Fixed, -2, 2)
            .is_err());
        assert!(Node::integer()
            .constrained(ConstraintKind::Fixed, -2, 2)
            .is_ok());
        assert!(Node::boolean()
            .constrained(ConstraintKind::Fixed, 0, 1)
            .is_err());
    }

    #[test]
    fn extendable_constraints_mark_node() {
        let node = Node::integer()
            .constrained(ConstraintKind::Extendable, 12, 128)
            .unwrap();
        assert!(node.is_extendable());
        assert_eq!(
            node.kind(),
            &Kind::Integer(Constraint {
                kind: ConstraintKind::Extendable,
                lower: 12,
                upper: 128
            })
        );
    }

    #[test]
    fn restricts_character_sets() {
        let node = Node::ia5_string()
            .char_set("ABC", ConstraintKind::Fixed)
            .unwrap();
        match node.kind() {
            Kind::CharacterString(CharacterString {
                alphabet: Some(alphabet),
                ..
            }) => assert_eq!(alphabet.aligned_bits(), 2),
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(Node::utf8_string()
            .char_set("ABC", ConstraintKind::Fixed)
            .is_err());
    }

    #[test]
    fn accepts_choice_alternative_tags() {
        let time = Node::choice([
            ("utcTime", Node::utc_time()),
            ("generalTime", Node::generalized_time()),
        ]);
        assert!(time.accepts(Tag::universal(23)));
        assert!(time.accepts(Tag::universal(24)));
        assert!(!time.accepts(Tag::universal(2)));
        assert!(Node::any().accepts(Tag::context(9)));
        assert!(Node::integer().explicit(0).accepts(Tag::context(0)));
        assert!(!Node::integer().explicit(0).accepts(Tag::universal(2)));
    }

    #[test]
    fn describes_structures() {
        let node = Node::sequence_ext(
            [
                ("a", Node::boolean()),
                ("b", Node::integer().optional()),
                ("c", Node::integer().with_default(Value::Integer(4))),
            ],
            [("d", Node::null())],
        );
        match node.kind() {
            Kind::Sequence(s) => {
                assert_eq!(s.optional_count(), 2);
                assert_eq!(s.field_names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
                assert_eq!(s.extension_names().collect::<Vec<_>>(), vec!["d"]);
                assert!(s.is_extension("d"));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(node.is_extendable());
        assert!(!Node::sequence([("a", Node::null())]).is_extendable());
    }

    #[test]
    fn orders_enumeration_roots() {
        let node = Node::enumerated_ext(&[("c", 8), ("a", 1), ("b", 4)], &[("d", 2), ("e", 20)]);
        match node.kind() {
            Kind::Enumerated(e) => {
                assert_eq!(e.max_standard_value(), Some(8));
                assert_eq!(e.root_index(4), Some(1));
                assert_eq!(e.root_value(2), Some(8));
                assert_eq!(e.extension_index(20), Some(1));
                assert_eq!(e.extension_value(0), Some(2));
                assert_eq!(e.name_of(2), Some("d"));
                assert_eq!(e.root_index(2), None);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
