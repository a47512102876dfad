use std::{fmt, ops::Neg, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{bridge::BridgeOrigin, dna::reverse_complement};

/// Unsigned segment identifier. Always > 0.
pub type SegId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub enum Strand {
    /// 5' -> 3'
    Forward,
    /// 3' -> 5'
    Reverse,
}

impl Strand {
    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }
    pub fn is_reverse(self) -> bool {
        self == Self::Reverse
    }
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

/// A signed segment id: `5+` is the forward strand of segment 5, `5-` its
/// reverse complement. Negation flips strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedSeg(i64);

impl SignedSeg {
    pub fn new(id: SegId, strand: Strand) -> Self {
        assert!(id > 0, "segment ids must be positive");
        match strand {
            Strand::Forward => Self(i64::from(id)),
            Strand::Reverse => Self(-i64::from(id)),
        }
    }
    pub fn forward(id: SegId) -> Self {
        Self::new(id, Strand::Forward)
    }
    pub fn reverse(id: SegId) -> Self {
        Self::new(id, Strand::Reverse)
    }

    /// The unsigned segment id.
    pub fn id(self) -> SegId {
        self.0.unsigned_abs() as SegId
    }
    pub fn strand(self) -> Strand {
        if self.0 > 0 {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
    pub fn is_forward(self) -> bool {
        self.strand().is_forward()
    }
}

impl Neg for SignedSeg {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

/// Ordered by unsigned id, then signed value, so that sorted iteration
/// visits `5-` before `5+` and both before `6-`.
impl Ord for SignedSeg {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        Ord::cmp(&self.id(), &other.id()).then_with(|| Ord::cmp(&self.0, &other.0))
    }
}
impl PartialOrd for SignedSeg {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SignedSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_forward() { '+' } else { '-' };
        write!(f, "{}{sign}", self.id())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid signed segment id: {from:?}")]
pub struct SignedSegParseError {
    pub from: String,
}

/// Parses the `<id>+` / `<id>-` convention used by GFA path lines and
/// SPAdes paths files.
impl FromStr for SignedSeg {
    type Err = SignedSegParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SignedSegParseError { from: s.to_owned() };
        let (id, strand) = match (s.strip_suffix('+'), s.strip_suffix('-')) {
            (Some(id), _) => (id, Strand::Forward),
            (_, Some(id)) => (id, Strand::Reverse),
            _ => return Err(err()),
        };
        let id: SegId = id.parse().map_err(|_| err())?;
        if id == 0 {
            return Err(err());
        }
        Ok(Self::new(id, strand))
    }
}

/// A length of double-stranded DNA with a read depth.
///
/// The forward and reverse sequences are constructed together and stay in
/// sync: one is always the reverse complement of the other.
#[derive(Debug, Clone)]
pub struct Segment {
    pub depth: f64,
    forward_sequence: String,
    reverse_sequence: String,
    origin: Option<BridgeOrigin>,
}

impl Segment {
    pub fn new(depth: f64, sequence: String, strand: Strand) -> Self {
        let other = reverse_complement(&sequence);
        let (forward_sequence, reverse_sequence) = match strand {
            Strand::Forward => (sequence, other),
            Strand::Reverse => (other, sequence),
        };
        Self {
            depth,
            forward_sequence,
            reverse_sequence,
            origin: None,
        }
    }

    /// A segment created by applying a bridge; the forward sequence is the
    /// bridge sequence.
    pub fn with_origin(depth: f64, sequence: String, origin: BridgeOrigin) -> Self {
        Self {
            origin: Some(origin),
            ..Self::new(depth, sequence, Strand::Forward)
        }
    }

    pub fn forward_sequence(&self) -> &str {
        &self.forward_sequence
    }
    pub fn reverse_sequence(&self) -> &str {
        &self.reverse_sequence
    }
    pub fn sequence(&self, strand: Strand) -> &str {
        match strand {
            Strand::Forward => &self.forward_sequence,
            Strand::Reverse => &self.reverse_sequence,
        }
    }

    pub fn origin(&self) -> Option<&BridgeOrigin> {
        self.origin.as_ref()
    }

    pub fn len(&self) -> usize {
        self.forward_sequence.len()
    }
    pub fn is_empty(&self) -> bool {
        self.forward_sequence.is_empty()
    }
    /// Segment length with the graph overlap subtracted, floored at zero.
    pub fn len_no_overlap(&self, overlap: usize) -> usize {
        self.len().saturating_sub(overlap)
    }

    pub fn divide_depth(&mut self, divisor: f64) {
        self.depth /= divisor;
    }
    /// Subtracts depth, clamping at zero.
    pub fn remove_depth(&mut self, amount: f64) {
        self.depth = (self.depth - amount).max(0.0);
    }

    /// True if the sequence is one repeated base (case-insensitive).
    pub fn is_homopolymer(&self) -> bool {
        let mut bases = self.forward_sequence.bytes();
        let Some(first) = bases.next() else {
            return false;
        };
        let first = first.to_ascii_lowercase();
        bases.all(|b| b.to_ascii_lowercase() == first)
    }
}
