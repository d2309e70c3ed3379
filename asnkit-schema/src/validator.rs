//! Whole-tree checks of the tag and enumeration invariants that the
//! constructors cannot enforce locally.
use alloc::{format, vec::Vec};

use crate::{
    error::{SchemaError, SchemaErrorType},
    tag::{Tag, TagClass},
    types::{DistinguishedValue, Field, Kind, Node},
};

pub trait Validate {
    fn validate(&self) -> Result<(), SchemaError>;
}

impl Validate for Node {
    fn validate(&self) -> Result<(), SchemaError> {
        match self.kind() {
            Kind::Sequence(s) | Kind::External(s) => {
                check_sequence_block(&s.fields)?;
                check_sequence_block(&s.extensions)?;
                s.all().try_for_each(|f| f.node.validate())
            }
            Kind::Set(s) | Kind::Choice(s) => {
                check_distinct(&s.fields, |_| true)?;
                check_distinct(&s.extensions, |_| true)?;
                s.all().try_for_each(|f| f.node.validate())
            }
            Kind::SequenceOf(c) | Kind::SetOf(c) => c.element.validate(),
            Kind::Enumerated(e) => check_enumeration(e.values.iter().chain(e.extensions.iter())),
            _ => Ok(()),
        }
    }
}

/// Tags a decoder may see first for `node`.
fn leading_tags(node: &Node) -> Vec<Tag> {
    match (node.outer_tag(), node.kind()) {
        (Some(tag), _) => alloc::vec![tag],
        (None, Kind::Choice(s)) => s.all().flat_map(|f| leading_tags(&f.node)).collect(),
        _ => Vec::new(),
    }
}

fn check_distinct(fields: &[Field], relevant: impl Fn(&Tag) -> bool) -> Result<(), SchemaError> {
    let mut seen: Vec<Tag> = Vec::new();
    for field in fields {
        for tag in leading_tags(&field.node).into_iter().filter(|t| relevant(t)) {
            if seen.contains(&tag) {
                return Err(SchemaError::new(
                    &format!("Tag {:?} of member {} is not unique.", tag, field.name),
                    SchemaErrorType::DuplicateTag,
                ));
            }
            seen.push(tag);
        }
    }
    Ok(())
}

/// Context-specific tags are looked up by tag and must be unique.
/// Any run of optional members together with the member that follows
/// it must have distinct tags so that absent members can be inferred.
fn check_sequence_block(fields: &[Field]) -> Result<(), SchemaError> {
    check_distinct(fields, |t| t.class == TagClass::ContextSpecific)?;
    let mut start = 0;
    for (index, field) in fields.iter().enumerate() {
        if !field.node.is_optional() {
            check_distinct(&fields[start..=index], |_| true)?;
            start = index + 1;
        }
    }
    check_distinct(&fields[start..], |_| true)
}

fn check_enumeration<'a>(
    values: impl Iterator<Item = &'a DistinguishedValue>,
) -> Result<(), SchemaError> {
    let mut seen: Vec<i64> = Vec::new();
    for value in values {
        if seen.contains(&value.value) {
            return Err(SchemaError::new(
                &format!("Enumeration value {} of {} is not unique.", value.value, value.name),
                SchemaErrorType::DuplicateEnumerationValue,
            ));
        }
        seen.push(value.value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_repeated_universal_tags_in_sequences() {
        let node = Node::sequence([
            ("a", Node::integer()),
            ("b", Node::integer()),
            ("c", Node::integer().implicit(0).optional()),
            ("d", Node::boolean().implicit(1).optional()),
        ]);
        assert!(node.validate().is_ok());
    }

    #[test]
    fn rejects_ambiguous_optional_runs() {
        let node = Node::sequence([
            ("a", Node::integer().optional()),
            ("b", Node::integer()),
        ]);
        assert_eq!(
            node.validate().unwrap_err().kind,
            SchemaErrorType::DuplicateTag
        );
    }

    #[test]
    fn rejects_duplicate_context_tags() {
        let node = Node::sequence([
            ("a", Node::integer().implicit(0)),
            ("b", Node::boolean().implicit(0)),
        ]);
        assert!(node.validate().is_err());
    }

    #[test]
    fn checks_choice_alternatives_recursively() {
        let time = Node::choice([
            ("utcTime", Node::utc_time()),
            ("generalTime", Node::generalized_time()),
        ]);
        let clash = Node::choice([("time", time.clone()), ("other", Node::utc_time())]);
        assert!(clash.validate().is_err());
        let nested = Node::sequence_of(Node::set([("time", time), ("n", Node::integer())]));
        assert!(nested.validate().is_ok());
    }

    #[test]
    fn separates_extension_blocks() {
        let node = Node::choice_ext(
            [("a", Node::integer().implicit(0))],
            [("b", Node::integer().implicit(0))],
        );
        assert!(node.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_enumeration_values() {
        let node = Node::enumerated_ext(&[("a", 0), ("b", 1)], &[("c", 1)]);
        assert_eq!(
            node.validate().unwrap_err().kind,
            SchemaErrorType::DuplicateEnumerationValue
        );
    }
}
