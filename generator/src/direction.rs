// direction.rs — First-neighborhood direction algebra
//
// Canonical bijection between offset triples with components in {-1, 0, 1}
// and the 27 symbolic direction names (26 communication directions plus the
// center), together with inversion and the staged decomposition used to
// derive which exchanges carry a diagonal neighbor's value.
//
// Preconditions: none.
// Postconditions: `offset_to_direction` is total and bijective on the first
//                 neighborhood.
// Failure modes: offsets with a component of magnitude > 1 are rejected with
//                `GenError::UnsupportedOffset`.
// Side effects: none.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use crate::error::GenError;

// ── Offset ──────────────────────────────────────────────────────────────────

/// Integer offset triple `(x, y, z)`.
///
/// Ordering is lexicographic on the components, which is the order used to
/// sort direction groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Offset(pub [i32; 3]);

impl Offset {
    pub const ZERO: Offset = Offset([0, 0, 0]);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Offset([x, y, z])
    }

    pub fn components(self) -> [i32; 3] {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == [0, 0, 0]
    }

    pub fn is_first_neighborhood(self) -> bool {
        self.0.iter().all(|c| c.abs() <= 1)
    }

    /// Largest component magnitude (the stencil radius this offset needs).
    pub fn radius(self) -> u32 {
        self.0.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0)
    }

    pub fn nonzero_count(self) -> usize {
        self.0.iter().filter(|c| **c != 0).count()
    }

    /// Return `self` if it lies in the first neighborhood.
    pub fn checked(self) -> Result<Self, GenError> {
        if self.is_first_neighborhood() {
            Ok(self)
        } else {
            Err(GenError::UnsupportedOffset { offset: self })
        }
    }

    /// All 27 first-neighborhood offsets in lexicographic order.
    pub fn neighborhood() -> impl Iterator<Item = Offset> {
        (-1..=1).flat_map(|x| (-1..=1).flat_map(move |y| (-1..=1).map(move |z| Offset::new(x, y, z))))
    }
}

impl Neg for Offset {
    type Output = Offset;

    fn neg(self) -> Offset {
        let [x, y, z] = self.0;
        Offset([-x, -y, -z])
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "({}, {}, {})", x, y, z)
    }
}

// ── Direction ───────────────────────────────────────────────────────────────

/// The 27 first-neighborhood directions. `C` is the center and never a
/// communication direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    C,
    N,
    S,
    W,
    E,
    T,
    B,
    NW,
    NE,
    SW,
    SE,
    TN,
    TS,
    TW,
    TE,
    BN,
    BS,
    BW,
    BE,
    TNE,
    TNW,
    TSE,
    TSW,
    BNE,
    BNW,
    BSE,
    BSW,
}

impl Direction {
    pub const ALL: [Direction; 27] = [
        Direction::C,
        Direction::N,
        Direction::S,
        Direction::W,
        Direction::E,
        Direction::T,
        Direction::B,
        Direction::NW,
        Direction::NE,
        Direction::SW,
        Direction::SE,
        Direction::TN,
        Direction::TS,
        Direction::TW,
        Direction::TE,
        Direction::BN,
        Direction::BS,
        Direction::BW,
        Direction::BE,
        Direction::TNE,
        Direction::TNW,
        Direction::TSE,
        Direction::TSW,
        Direction::BNE,
        Direction::BNW,
        Direction::BSE,
        Direction::BSW,
    ];

    /// Every direction except the center.
    pub fn communication() -> impl Iterator<Item = Direction> {
        Self::ALL.into_iter().filter(|d| *d != Direction::C)
    }

    pub fn offset(self) -> Offset {
        match self {
            Direction::C => Offset::new(0, 0, 0),
            Direction::N => Offset::new(0, 1, 0),
            Direction::S => Offset::new(0, -1, 0),
            Direction::W => Offset::new(-1, 0, 0),
            Direction::E => Offset::new(1, 0, 0),
            Direction::T => Offset::new(0, 0, 1),
            Direction::B => Offset::new(0, 0, -1),
            Direction::NW => Offset::new(-1, 1, 0),
            Direction::NE => Offset::new(1, 1, 0),
            Direction::SW => Offset::new(-1, -1, 0),
            Direction::SE => Offset::new(1, -1, 0),
            Direction::TN => Offset::new(0, 1, 1),
            Direction::TS => Offset::new(0, -1, 1),
            Direction::TW => Offset::new(-1, 0, 1),
            Direction::TE => Offset::new(1, 0, 1),
            Direction::BN => Offset::new(0, 1, -1),
            Direction::BS => Offset::new(0, -1, -1),
            Direction::BW => Offset::new(-1, 0, -1),
            Direction::BE => Offset::new(1, 0, -1),
            Direction::TNE => Offset::new(1, 1, 1),
            Direction::TNW => Offset::new(-1, 1, 1),
            Direction::TSE => Offset::new(1, -1, 1),
            Direction::TSW => Offset::new(-1, -1, 1),
            Direction::BNE => Offset::new(1, 1, -1),
            Direction::BNW => Offset::new(-1, 1, -1),
            Direction::BSE => Offset::new(1, -1, -1),
            Direction::BSW => Offset::new(-1, -1, -1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::C => "C",
            Direction::N => "N",
            Direction::S => "S",
            Direction::W => "W",
            Direction::E => "E",
            Direction::T => "T",
            Direction::B => "B",
            Direction::NW => "NW",
            Direction::NE => "NE",
            Direction::SW => "SW",
            Direction::SE => "SE",
            Direction::TN => "TN",
            Direction::TS => "TS",
            Direction::TW => "TW",
            Direction::TE => "TE",
            Direction::BN => "BN",
            Direction::BS => "BS",
            Direction::BW => "BW",
            Direction::BE => "BE",
            Direction::TNE => "TNE",
            Direction::TNW => "TNW",
            Direction::TSE => "TSE",
            Direction::TSW => "TSW",
            Direction::BNE => "BNE",
            Direction::BNW => "BNW",
            Direction::BSE => "BSE",
            Direction::BSW => "BSW",
        }
    }

    pub fn inverse(self) -> Direction {
        // Negation stays inside the first neighborhood, so the lookup is total.
        match offset_to_direction(-self.offset()) {
            Ok(d) => d,
            Err(_) => unreachable!("negated first-neighborhood offset"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<Offset> for Direction {
    type Error = GenError;

    fn try_from(offset: Offset) -> Result<Self, GenError> {
        offset_to_direction(offset)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        Direction::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| format!("unknown direction '{}'", s))
    }
}

// ── Direction algebra ───────────────────────────────────────────────────────

/// Map a first-neighborhood offset to its direction name.
pub fn offset_to_direction(offset: Offset) -> Result<Direction, GenError> {
    let offset = offset.checked()?;
    // Every first-neighborhood offset appears exactly once in `ALL`.
    Direction::ALL
        .into_iter()
        .find(|d| d.offset() == offset)
        .ok_or(GenError::UnsupportedOffset { offset })
}

/// Negate each component. Involutive.
pub fn inverse_direction(offset: Offset) -> Offset {
    -offset
}

/// Staged decomposition of a communication direction.
///
/// Yields `offset` itself, then for each non-zero component in ascending axis
/// order the offset with that single component zeroed, skipping the all-zero
/// result. A diagonal neighbor's value travels either directly or through the
/// adjacent face/edge exchanges; the consumer applies exchanges in this order.
/// The zero offset decomposes into nothing.
pub fn comm_directions(offset: Offset) -> Vec<Offset> {
    if offset.is_zero() {
        return Vec::new();
    }
    let mut out = vec![offset];
    for axis in 0..3 {
        if offset.0[axis] != 0 {
            let mut reduced = offset.0;
            reduced[axis] = 0;
            let reduced = Offset(reduced);
            if !reduced.is_zero() {
                out.push(reduced);
            }
        }
    }
    out
}

// ── Tests ───────────────────────────────────────────────────────────────────
