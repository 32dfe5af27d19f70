// pack_spec.rs — Which per-cell terms cross which boundary
//
// Derives, from a kernel's field accesses, the mapping from direction group
// to the ordered set of terms that must be exchanged with the neighbor in
// that direction. Pull terms are center accesses; push terms keep the
// offset of the write, so the pack kernel reads the value the writer left
// in its ghost layer and the unpack kernel lands it one cell inwards.
//
// Preconditions: every access offset lies in the first neighborhood.
// Postconditions: groups are ordered by their offset tuples; every term
//                 sequence is sorted and deduplicated by canonical name, so
//                 sender and receiver agree on buffer offsets.
// Failure modes: `UnsupportedOffset` for offsets outside the first
//                neighborhood; `Configuration` for a group containing the
//                center or no direction at all.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use crate::direction::{comm_directions, inverse_direction, offset_to_direction, Direction, Offset};
use crate::error::GenError;
use crate::field::{Assignment, Field, FieldAccess};

/// Which side of the stencil crosses block boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilKind {
    /// The kernel reads neighbor values; their owners must send them.
    #[default]
    Pull,
    /// The kernel writes into neighbor cells; the writer must send them.
    Push,
}

impl StencilKind {
    pub fn parse(s: &str) -> Option<StencilKind> {
        match s {
            "pull" => Some(StencilKind::Pull),
            "push" => Some(StencilKind::Push),
            _ => None,
        }
    }
}

// ── Direction group ─────────────────────────────────────────────────────────

/// Tuple of communication directions sharing one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectionGroup(Vec<Offset>);

impl DirectionGroup {
    pub fn new(offsets: Vec<Offset>) -> Result<Self, GenError> {
        if offsets.is_empty() {
            return Err(GenError::config("a direction group needs at least one direction"));
        }
        let mut unique: Vec<Offset> = Vec::with_capacity(offsets.len());
        for o in offsets {
            let o = o.checked()?;
            if o.is_zero() {
                return Err(GenError::config(
                    "the center is not a communication direction",
                ));
            }
            if !unique.contains(&o) {
                unique.push(o);
            }
        }
        Ok(DirectionGroup(unique))
    }

    pub fn single(offset: Offset) -> Result<Self, GenError> {
        Self::new(vec![offset])
    }

    pub fn from_directions(directions: &[Direction]) -> Result<Self, GenError> {
        Self::new(directions.iter().map(|d| d.offset()).collect())
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.0
    }

    pub fn directions(&self) -> Vec<Direction> {
        // Offsets were validated on construction.
        self.0
            .iter()
            .filter_map(|o| offset_to_direction(*o).ok())
            .collect()
    }

    /// Identifier fragment, e.g. `N_S` for a two-direction group.
    pub fn key(&self) -> String {
        let names: Vec<&str> = self.directions().iter().map(|d| d.name()).collect();
        names.join("_")
    }
}

impl fmt::Display for DirectionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ── Pack spec ───────────────────────────────────────────────────────────────

/// Ordered mapping direction group → sorted term sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackSpec {
    groups: Vec<(DirectionGroup, Vec<FieldAccess>)>,
}

impl PackSpec {
    /// Normalise caller-supplied groups: order by offset tuples, merge
    /// repeated groups, sort and deduplicate terms by canonical name.
    pub fn from_explicit(groups: Vec<(DirectionGroup, Vec<FieldAccess>)>) -> PackSpec {
        let mut builder = PackSpecBuilder::new();
        for (group, terms) in groups {
            for term in terms {
                builder.insert(group.clone(), term);
            }
        }
        builder.build()
    }

    pub fn groups(&self) -> &[(DirectionGroup, Vec<FieldAccess>)] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DirectionGroup, &[FieldAccess])> {
        self.groups.iter().map(|(g, t)| (g, t.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when no group carries a term.
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, terms)| terms.is_empty())
    }

    /// Union of all terms, sorted and deduplicated by canonical name.
    pub fn all_terms(&self) -> Vec<FieldAccess> {
        let mut union: BTreeMap<String, FieldAccess> = BTreeMap::new();
        for (_, terms) in &self.groups {
            for t in terms {
                union.entry(t.canonical_name()).or_insert_with(|| t.clone());
            }
        }
        union.into_values().collect()
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct PackSpecBuilder {
    groups: BTreeMap<DirectionGroup, BTreeMap<String, FieldAccess>>,
}

impl PackSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `term` to `group`; a term already present (by canonical name) is
    /// kept once.
    pub fn insert(&mut self, group: DirectionGroup, term: FieldAccess) {
        self.groups
            .entry(group)
            .or_default()
            .entry(term.canonical_name())
            .or_insert(term);
    }

    /// Record the boundary data a pull stencil's reads need. Center reads are
    /// never buffered.
    pub fn add_pull_reads(&mut self, reads: &[FieldAccess]) -> Result<(), GenError> {
        check_offsets(reads)?;
        for read in reads.iter().filter(|a| !a.is_center()) {
            for dir in comm_directions(inverse_direction(read.offset)) {
                self.insert(DirectionGroup::single(dir)?, read.to_center());
            }
        }
        Ok(())
    }

    /// Record the values a push stencil writes into neighbor territory.
    /// The written access itself is buffered, offset included.
    pub fn add_push_writes(&mut self, writes: &[FieldAccess]) -> Result<(), GenError> {
        check_offsets(writes)?;
        for write in writes.iter().filter(|a| !a.is_center()) {
            for dir in comm_directions(write.offset) {
                self.insert(DirectionGroup::single(dir)?, write.clone());
            }
        }
        Ok(())
    }

    /// Build from separate read and write access sets. Every offset is
    /// validated, including those the chosen kind does not use.
    pub fn from_accesses(
        reads: &[FieldAccess],
        writes: &[FieldAccess],
        kind: StencilKind,
    ) -> Result<PackSpec, GenError> {
        check_offsets(reads)?;
        check_offsets(writes)?;
        let mut builder = PackSpecBuilder::new();
        match kind {
            StencilKind::Pull => builder.add_pull_reads(reads)?,
            StencilKind::Push => builder.add_push_writes(writes)?,
        }
        Ok(builder.build())
    }

    pub fn from_kernel(assignments: &[Assignment], kind: StencilKind) -> Result<PackSpec, GenError> {
        let writes: Vec<FieldAccess> = assignments.iter().map(|a| a.lhs.clone()).collect();
        let reads: Vec<FieldAccess> = assignments.iter().flat_map(|a| a.reads()).collect();
        Self::from_accesses(&reads, &writes, kind)
    }

    /// One group spanning `directions` (all 26 when `None`) that carries
    /// every component of `field`.
    pub fn for_field(field: &Field, directions: Option<&[Direction]>) -> Result<PackSpec, GenError> {
        let group = match directions {
            Some(dirs) => DirectionGroup::from_directions(dirs)?,
            None => DirectionGroup::new(Direction::communication().map(|d| d.offset()).collect())?,
        };
        let mut builder = PackSpecBuilder::new();
        for term in field.all_index_accesses() {
            builder.insert(group.clone(), term);
        }
        Ok(builder.build())
    }

    pub fn build(self) -> PackSpec {
        PackSpec {
            groups: self
                .groups
                .into_iter()
                .map(|(g, terms)| (g, terms.into_values().collect()))
                .collect(),
        }
    }
}

fn check_offsets(accesses: &[FieldAccess]) -> Result<(), GenError> {
    for a in accesses {
        a.offset.checked()?;
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DType;

    fn names(spec: &PackSpec) -> Vec<(String, Vec<String>)> {
        spec.iter()
            .map(|(g, t)| (g.key(), t.iter().map(|a| a.to_string()).collect()))
            .collect()
    }

    #[test]
    fn pull_reads_are_sent_by_the_opposite_neighbor() {
        let src = Field::new("src", DType::Float64);
        let reads = vec![src.at(Offset::new(1, 0, 0), vec![]), src.center(vec![])];
        let spec = PackSpecBuilder::from_accesses(&reads, &[], StencilKind::Pull).unwrap();
        assert_eq!(names(&spec), vec![("W".to_string(), vec!["src_C".to_string()])]);
    }

    #[test]
    fn pull_diagonal_covers_sub_exchanges() {
        let src = Field::new("src", DType::Float64);
        let reads = vec![src.at(Offset::new(1, 1, 0), vec![])];
        let spec = PackSpecBuilder::from_accesses(&reads, &[], StencilKind::Pull).unwrap();
        let keys: Vec<String> = spec.iter().map(|(g, _)| g.key()).collect();
        // (-1,-1,0), (-1,0,0), (0,-1,0) in offset order
        assert_eq!(keys, vec!["SW", "W", "S"]);
    }

    #[test]
    fn push_uses_write_offsets_directly() {
        let pdfs = Field::new("pdfs", DType::Float64).with_index_shape(vec![3]);
        let writes = vec![pdfs.at(Offset::new(0, 0, 1), vec![2])];
        let spec = PackSpecBuilder::from_accesses(&[], &writes, StencilKind::Push).unwrap();
        assert_eq!(names(&spec), vec![("T".to_string(), vec!["pdfs_T^2".to_string()])]);
    }

    #[test]
    fn push_diagonal_write_travels_in_every_sub_direction() {
        let pdfs = Field::new("pdfs", DType::Float64).with_index_shape(vec![9]);
        let writes = vec![pdfs.at(Offset::new(1, 1, 0), vec![5])];
        let spec = PackSpecBuilder::from_accesses(&[], &writes, StencilKind::Push).unwrap();
        let term = vec!["pdfs_NE^5".to_string()];
        // (0,1,0), (1,0,0), (1,1,0) in offset order
        assert_eq!(
            names(&spec),
            vec![
                ("N".to_string(), term.clone()),
                ("E".to_string(), term.clone()),
                ("NE".to_string(), term),
            ]
        );
    }

    #[test]
    fn terms_are_deduplicated_and_sorted() {
        let a = Field::new("a", DType::Float64);
        let b = Field::new("b", DType::Float64);
        let reads = vec![
            b.at(Offset::new(0, -1, 0), vec![]),
            a.at(Offset::new(0, -1, 0), vec![]),
            a.at(Offset::new(0, -1, 0), vec![]),
        ];
        let spec = PackSpecBuilder::from_accesses(&reads, &[], StencilKind::Pull).unwrap();
        assert_eq!(
            names(&spec),
            vec![("N".to_string(), vec!["a_C".to_string(), "b_C".to_string()])]
        );
    }

    #[test]
    fn second_neighborhood_is_rejected_even_when_unused() {
        let src = Field::new("src", DType::Float64);
        let writes = vec![src.at(Offset::new(0, 0, -2), vec![])];
        let err = PackSpecBuilder::from_accesses(&[], &writes, StencilKind::Pull).unwrap_err();
        assert!(matches!(err, GenError::UnsupportedOffset { .. }));
    }

    #[test]
    fn for_field_spans_all_directions() {
        let pdfs = Field::new("pdfs", DType::Float32).with_index_shape(vec![2, 2]);
        let spec = PackSpecBuilder::for_field(&pdfs, None).unwrap();
        assert_eq!(spec.len(), 1);
        let (group, terms) = spec.iter().next().unwrap();
        assert_eq!(group.offsets().len(), 26);
        assert_eq!(terms.len(), 4);
    }

    #[test]
    fn center_is_not_a_group_member() {
        let err = DirectionGroup::from_directions(&[Direction::N, Direction::C]).unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
    }

    #[test]
    fn explicit_groups_are_normalised() {
        let f = Field::new("f", DType::Float64);
        let n = DirectionGroup::from_directions(&[Direction::N]).unwrap();
        let w = DirectionGroup::from_directions(&[Direction::W]).unwrap();
        let spec = PackSpec::from_explicit(vec![
            (n.clone(), vec![f.center(vec![])]),
            (w, vec![f.center(vec![])]),
            (n, vec![f.center(vec![])]),
        ]);
        let keys: Vec<String> = spec.iter().map(|(g, _)| g.key()).collect();
        assert_eq!(keys, vec!["W", "N"]);
        assert_eq!(spec.groups()[1].1.len(), 1);
    }
}
