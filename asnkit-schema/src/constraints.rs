use crate::error::{SchemaError, SchemaErrorType};

/// Default upper limit of an unconstrained value or size range.
pub const DEFAULT_UPPER_LIMIT: i128 = u32::MAX as i128;

/// How a value or size range restricts its node.
///
/// * `Unconstrained` - no PER-visible bounds
/// * `Partial` - only the lower limit applies (semi-constrained)
/// * `Fixed` - both limits apply and values outside are rejected
/// * `Extendable` - both limits apply to the root, values outside
/// are encoded through the extension path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintKind {
    #[default]
    Unconstrained,
    Partial,
    Fixed,
    Extendable,
}

/// A value or size range with its constraint kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub lower: i128,
    pub upper: i128,
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::unconstrained()
    }
}

impl Constraint {
    pub const fn unconstrained() -> Self {
        Constraint {
            kind: ConstraintKind::Unconstrained,
            lower: 0,
            upper: DEFAULT_UPPER_LIMIT,
        }
    }

    pub fn new(kind: ConstraintKind, lower: i128, upper: i128) -> Result<Self, SchemaError> {
        if matches!(kind, ConstraintKind::Fixed | ConstraintKind::Extendable) && lower > upper {
            return Err(SchemaError::new(
                "Lower limit of a range constraint exceeds its upper limit.",
                SchemaErrorType::InvalidConstraint,
            ));
        }
        Ok(Constraint { kind, lower, upper })
    }

    /// Both limits are PER-visible.
    pub fn is_bounded(&self) -> bool {
        matches!(
            self.kind,
            ConstraintKind::Fixed | ConstraintKind::Extendable
        )
    }

    pub fn is_extendable(&self) -> bool {
        self.kind == ConstraintKind::Extendable
    }

    /// Whether `value` lies in the root of this constraint.
    /// Unconstrained ranges admit every value.
    pub fn contains(&self, value: i128) -> bool {
        match self.kind {
            ConstraintKind::Unconstrained => true,
            ConstraintKind::Partial => value >= self.lower,
            ConstraintKind::Fixed | ConstraintKind::Extendable => {
                self.lower <= value && value <= self.upper
            }
        }
    }

    /// Lower and upper limit of a bounded size range, if it is bounded
    /// and does not exceed `usize`.
    pub fn size_bounds(&self) -> Option<(usize, usize)> {
        if !self.is_bounded() {
            return None;
        }
        Some((
            usize::try_from(self.lower).ok()?,
            usize::try_from(self.upper).ok()?,
        ))
    }

    /// A bounded range that admits exactly one value.
    pub fn is_single_value(&self) -> bool {
        self.is_bounded() && self.lower == self.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_ranges() {
        assert!(Constraint::new(ConstraintKind::Fixed, 10, 2).is_err());
        assert!(Constraint::new(ConstraintKind::Extendable, 10, 2).is_err());
        assert!(Constraint::new(ConstraintKind::Partial, 10, 2).is_ok());
    }

    #[test]
    fn checks_root_membership() {
        let fixed = Constraint::new(ConstraintKind::Fixed, 12, 128).unwrap();
        assert!(fixed.contains(12));
        assert!(fixed.contains(128));
        assert!(!fixed.contains(2));
        let partial = Constraint::new(ConstraintKind::Partial, -5, 0).unwrap();
        assert!(partial.contains(1_000_000));
        assert!(!partial.contains(-6));
        assert!(Constraint::unconstrained().contains(i128::MIN));
    }

    #[test]
    fn reports_size_bounds() {
        let size = Constraint::new(ConstraintKind::Extendable, 1, 4).unwrap();
        assert_eq!(size.size_bounds(), Some((1, 4)));
        assert_eq!(Constraint::unconstrained().size_bounds(), None);
        assert!(Constraint::new(ConstraintKind::Fixed, 3, 3)
            .unwrap()
            .is_single_value());
    }
}
