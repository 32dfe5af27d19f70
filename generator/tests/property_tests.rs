// Property-based tests for generator invariants.
//
// Three categories:
// 1. Direction algebra: inversion, naming bijection, staged decomposition
// 2. Pack specs: determinism under input reordering, fused-union shape
// 3. Front end: generated scripts lex, parse and resolve cleanly
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::HashSet;

use proptest::prelude::*;
use sgen::direction::{comm_directions, inverse_direction, offset_to_direction, Direction, Offset};
use sgen::field::{DType, Field, FieldAccess};
use sgen::kernel::{CompileParams, Target};
use sgen::loop_kernel::LoopKernelCompiler;
use sgen::pack_spec::{PackSpec, PackSpecBuilder, StencilKind};
use sgen::packinfo::generate_pack_info;

// ── Strategies ──────────────────────────────────────────────────────────────

fn arb_offset() -> impl Strategy<Value = Offset> {
    (-1i32..=1, -1i32..=1, -1i32..=1).prop_map(|(x, y, z)| Offset::new(x, y, z))
}

fn arb_access() -> impl Strategy<Value = FieldAccess> {
    let fields = prop_oneof![
        Just(Field::new("a", DType::Float64)),
        Just(Field::new("b", DType::Float64)),
        Just(Field::new("pdfs", DType::Float64).with_index_shape(vec![3])),
    ];
    (fields, arb_offset(), 0usize..3).prop_map(|(field, offset, i)| {
        let index = if field.index_shape.is_empty() { vec![] } else { vec![i] };
        field.at(offset, index)
    })
}

fn spec_keys(spec: &PackSpec) -> Vec<(String, Vec<String>)> {
    spec.iter()
        .map(|(g, terms)| (g.key(), terms.iter().map(|t| t.to_string()).collect()))
        .collect()
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ── Direction algebra ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(config())]

    #[test]
    fn inverse_is_an_involution(o in arb_offset()) {
        prop_assert_eq!(inverse_direction(inverse_direction(o)), o);
    }

    #[test]
    fn inverse_matches_named_inverse(o in arb_offset()) {
        let d = offset_to_direction(o).unwrap();
        prop_assert_eq!(d.inverse().offset(), inverse_direction(o));
    }

    #[test]
    fn comm_directions_strip_one_component_at_a_time(o in arb_offset()) {
        let staged = comm_directions(o);
        if o.is_zero() {
            prop_assert!(staged.is_empty());
        } else {
            prop_assert_eq!(staged[0], o);
            prop_assert_eq!(staged.len(), 1 + if o.nonzero_count() > 1 { o.nonzero_count() } else { 0 });
            let unique: HashSet<Offset> = staged.iter().copied().collect();
            prop_assert_eq!(unique.len(), staged.len());
            for s in &staged[1..] {
                prop_assert!(!s.is_zero());
                prop_assert_eq!(s.nonzero_count(), o.nonzero_count() - 1);
                for axis in 0..3 {
                    let (c, full) = (s.components()[axis], o.components()[axis]);
                    prop_assert!(c == full || c == 0);
                }
            }
        }
    }

    #[test]
    fn magnitude_two_is_always_rejected(
        o in arb_offset(),
        axis in 0usize..3,
        sign in prop_oneof![Just(-2i32), Just(2i32)],
    ) {
        let mut c = o.components();
        c[axis] = sign;
        prop_assert!(offset_to_direction(Offset(c)).is_err());
    }
}

#[test]
fn every_direction_round_trips_through_its_name() {
    for d in Direction::ALL {
        assert_eq!(d.name().parse::<Direction>().unwrap(), d);
        assert_eq!(offset_to_direction(d.offset()).unwrap(), d);
    }
}

// ── Pack specs ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(config())]

    #[test]
    fn pack_spec_ignores_input_order(
        accesses in prop::collection::vec(arb_access(), 1..12),
        push in any::<bool>(),
    ) {
        let kind = if push { StencilKind::Push } else { StencilKind::Pull };
        let mut reversed = accesses.clone();
        reversed.reverse();
        let a = PackSpecBuilder::from_accesses(&accesses, &accesses, kind).unwrap();
        let b = PackSpecBuilder::from_accesses(&reversed, &reversed, kind).unwrap();
        prop_assert_eq!(spec_keys(&a), spec_keys(&b));
    }

    #[test]
    fn fused_kernel_covers_the_union_without_duplicates(
        accesses in prop::collection::vec(arb_access(), 1..12),
    ) {
        let spec = PackSpecBuilder::from_accesses(&accesses, &[], StencilKind::Pull).unwrap();
        prop_assume!(!spec.is_empty());
        let info = generate_pack_info(
            &spec,
            &LoopKernelCompiler::new(),
            &CompileParams::new(Target::Cpu, DType::Float64),
        )
        .unwrap();

        let union: HashSet<String> = spec
            .iter()
            .flat_map(|(_, terms)| terms.iter().map(|t| t.to_string()))
            .collect();
        let fused: Vec<String> = info
            .fused
            .kernel()
            .assignments()
            .iter()
            .flat_map(|a| a.reads())
            .map(|t| t.to_string())
            .collect();
        let fused_set: HashSet<String> = fused.iter().cloned().collect();
        prop_assert_eq!(fused.len(), fused_set.len());
        prop_assert_eq!(fused_set, union);
        prop_assert_eq!(info.fused_elements_per_cell, fused.len());
    }
}

// ── Front end ───────────────────────────────────────────────────────────────

/// Scripts of the shape `field f: double` / `kernel k { f_out = f[..] + ... }`.
fn arb_script() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_offset(), 1..6).prop_map(|offsets| {
        let terms: Vec<String> = offsets
            .iter()
            .map(|o| {
                let [x, y, z] = o.components();
                format!("src[{},{},{}]", x, y, z)
            })
            .collect();
        format!(
            "field src: double\nfield dst: double\nparam w\nkernel k {{\n  dst = w * ({})\n}}\nsweep K(k)\npackinfo P from k\n",
            terms.join(" + ")
        )
    })
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn generated_scripts_resolve(script in arb_script()) {
        let front = sgen::pipeline::analyze(&script);
        prop_assert!(front.diagnostics.is_empty(), "diagnostics: {:?}", front.diagnostics);
        let resolved = front.resolved.unwrap();
        prop_assert_eq!(resolved.requests.len(), 2);
    }
}
