//! Canonical character repertoires of the restricted character string
//! types and the permitted-alphabet bookkeeping PER packing relies on.
use alloc::vec::Vec;

use crate::{
    constraints::ConstraintKind,
    error::{SchemaError, SchemaErrorType},
};

const MAXIMUM_SET_SIZE: usize = 512;

/// Number of bits needed to index a repertoire of `range` characters.
pub fn count_bits(range: u64) -> u32 {
    match range {
        0 => 32,
        1 => 1,
        r => 64 - (r - 1).leading_zeros(),
    }
}

/// The canonical repertoire of a string type.
#[derive(Debug, Clone, PartialEq)]
pub enum Repertoire {
    /// Characters in ascending code order.
    Listed(Vec<char>),
    /// A contiguous range of code points, as used for BMPString.
    Range { first: u32, last: u32 },
}

impl Repertoire {
    fn size(&self) -> u64 {
        match self {
            Repertoire::Listed(chars) => chars.len() as u64,
            Repertoire::Range { first, last } => u64::from(last - first) + 1,
        }
    }

    fn contains(&self, c: char) -> bool {
        match self {
            Repertoire::Listed(chars) => chars.binary_search(&c).is_ok(),
            Repertoire::Range { first, last } => (*first..=*last).contains(&(c as u32)),
        }
    }
}

/// Canonical repertoire plus an optional permitted subset, with the
/// bit widths a PER codec needs for every character.
#[derive(Debug, Clone, PartialEq)]
pub struct Alphabet {
    canonical: Repertoire,
    permitted: Option<Vec<char>>,
    canonical_bits: u32,
    unaligned_bits: u32,
    aligned_bits: u32,
}

impl Alphabet {
    fn listed(chars: Vec<char>) -> Self {
        let bits = count_bits(chars.len() as u64);
        Alphabet {
            canonical: Repertoire::Listed(chars),
            permitted: None,
            canonical_bits: bits,
            unaligned_bits: bits,
            aligned_bits: bits.next_power_of_two(),
        }
    }

    fn code_range(first: u32, last: u32) -> Self {
        Alphabet::listed((first..=last).filter_map(char::from_u32).collect())
    }

    /// IA5String and ObjectDescriptor: codes 0 to 127.
    pub fn ia5() -> Self {
        Alphabet::code_range(0, 0x7F)
    }

    /// VisibleString and the time types: codes 0x20 to 0x7E.
    pub fn visible() -> Self {
        Alphabet::code_range(0x20, 0x7E)
    }

    /// GeneralString and GraphicString: every octet value.
    pub fn octet() -> Self {
        Alphabet::code_range(0, 0xFF)
    }

    pub fn numeric() -> Self {
        Alphabet::listed(" 0123456789".chars().collect())
    }

    pub fn printable() -> Self {
        Alphabet::listed(
            " '()+,-./0123456789:=?ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz"
                .chars()
                .collect(),
        )
    }

    /// BMPString restricted to the code points `first..=last`.
    pub fn bmp(first: u16, last: u16) -> Self {
        let (first, last) = (u32::from(first.min(last)), u32::from(first.max(last)));
        let bits = count_bits(u64::from(last - first) + 1);
        Alphabet {
            canonical: Repertoire::Range { first, last },
            permitted: None,
            canonical_bits: 16,
            unaligned_bits: bits,
            aligned_bits: bits.next_power_of_two(),
        }
    }

    /// Restricts the working repertoire to the characters of `set` that
    /// belong to the canonical repertoire.
    pub fn restrict(mut self, set: &str, kind: ConstraintKind) -> Result<Self, SchemaError> {
        if kind == ConstraintKind::Unconstrained {
            self.permitted = None;
            let bits = count_bits(self.canonical.size());
            self.unaligned_bits = bits;
            self.aligned_bits = bits.next_power_of_two();
            return Ok(self);
        }
        let mut chars: Vec<char> = set.chars().collect();
        if chars.is_empty() {
            return Err(SchemaError::new(
                "Permitted alphabet must not be empty.",
                SchemaErrorType::InvalidCharacterSet,
            ));
        }
        if chars.len() >= MAXIMUM_SET_SIZE {
            return Err(SchemaError::new(
                "Permitted alphabet exceeds the maximum set size.",
                SchemaErrorType::InvalidCharacterSet,
            ));
        }
        chars.retain(|c| self.canonical.contains(*c));
        chars.sort_unstable();
        chars.dedup();
        if chars.is_empty() {
            return Err(SchemaError::new(
                "Permitted alphabet shares no character with the canonical repertoire.",
                SchemaErrorType::InvalidCharacterSet,
            ));
        }
        let bits = count_bits(chars.len() as u64);
        self.unaligned_bits = bits;
        self.aligned_bits = bits.next_power_of_two();
        self.permitted = Some(chars);
        Ok(self)
    }

    pub fn canonical(&self) -> &Repertoire {
        &self.canonical
    }

    pub fn permitted(&self) -> Option<&[char]> {
        self.permitted.as_deref()
    }

    pub fn canonical_bits(&self) -> u32 {
        self.canonical_bits
    }

    pub fn aligned_bits(&self) -> u32 {
        self.aligned_bits
    }

    pub fn unaligned_bits(&self) -> u32 {
        self.unaligned_bits
    }

    pub fn bits(&self, aligned: bool) -> u32 {
        if aligned {
            self.aligned_bits
        } else {
            self.unaligned_bits
        }
    }

    /// Characters encoded with `bits` bits are written as raw code units
    /// instead of indices into the working repertoire.
    pub fn is_full_width(&self, bits: u32) -> bool {
        bits >= self.canonical_bits && self.canonical_bits > 4
    }

    pub fn contains(&self, c: char) -> bool {
        match &self.permitted {
            Some(permitted) => permitted.binary_search(&c).is_ok(),
            None => self.canonical.contains(c),
        }
    }

    /// Position of `c` in the working repertoire.
    pub fn index_of(&self, c: char) -> Option<u32> {
        match (&self.permitted, &self.canonical) {
            (Some(chars), _) | (None, Repertoire::Listed(chars)) => {
                chars.binary_search(&c).ok().map(|i| i as u32)
            }
            (None, range @ Repertoire::Range { first, .. }) => {
                range.contains(c).then(|| c as u32 - first)
            }
        }
    }

    /// Inverse of [`Alphabet::index_of`].
    pub fn char_at(&self, index: u32) -> Option<char> {
        match (&self.permitted, &self.canonical) {
            (Some(chars), _) | (None, Repertoire::Listed(chars)) => {
                chars.get(index as usize).copied()
            }
            (None, Repertoire::Range { first, last }) => first
                .checked_add(index)
                .filter(|code| code <= last)
                .and_then(char::from_u32),
        }
    }
}
