// Scenario tests for pack-info generation through the library API.
//
// Covers the fixed scenarios of the generator contract: face-only pull
// stencils, mixed element types, second-neighborhood offsets, empty specs,
// and determinism of two independent generation runs.

use sgen::direction::{Direction, Offset};
use sgen::error::GenError;
use sgen::field::{Assignment, BinOp, DType, Expr, Field};
use sgen::kernel::{CompileParams, Kernel, Target};
use sgen::loop_kernel::LoopKernelCompiler;
use sgen::pack_spec::{DirectionGroup, PackSpec, PackSpecBuilder, StencilKind};
use sgen::packinfo::generate_pack_info;

fn params() -> CompileParams {
    CompileParams::new(Target::Cpu, DType::Float64)
}

const FACES: [Offset; 6] = [
    Offset::new(1, 0, 0),
    Offset::new(-1, 0, 0),
    Offset::new(0, 1, 0),
    Offset::new(0, -1, 0),
    Offset::new(0, 0, 1),
    Offset::new(0, 0, -1),
];

/// `dst = src[E] + src[W] + ... ` over the six face neighbors.
fn face_stencil(src: &Field, dst: &Field) -> Vec<Assignment> {
    let rhs = FACES
        .iter()
        .map(|o| Expr::Access(src.at(*o, vec![])))
        .reduce(|acc, e| Expr::binary(BinOp::Add, acc, e))
        .unwrap();
    vec![Assignment::new(dst.center(vec![]), rhs)]
}

#[test]
fn face_pull_stencil_yields_six_single_term_groups() {
    let src = Field::new("src", DType::Float64);
    let dst = Field::new("dst", DType::Float64);
    let spec = PackSpecBuilder::from_kernel(&face_stencil(&src, &dst), StencilKind::Pull).unwrap();
    assert_eq!(spec.len(), 6);
    for (group, terms) in spec.iter() {
        assert_eq!(group.offsets().len(), 1);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].to_string(), "src_C");
    }

    let info = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap();
    assert_eq!(info.groups.len(), 6);
    // Every face neighbor sends the same center value, so the union is one term.
    assert_eq!(info.fused_elements_per_cell, 1);
}

#[test]
fn face_pull_stencil_over_six_fields_fuses_six_terms() {
    // One field per face: each group carries exactly one distinct term.
    let dst = Field::new("dst", DType::Float64);
    let fields: Vec<Field> = (0..6)
        .map(|i| Field::new(format!("f{}", i), DType::Float64))
        .collect();
    let rhs = FACES
        .iter()
        .zip(&fields)
        .map(|(o, f)| Expr::Access(f.at(*o, vec![])))
        .reduce(|acc, e| Expr::binary(BinOp::Add, acc, e))
        .unwrap();
    let assignments = vec![Assignment::new(dst.center(vec![]), rhs)];

    let spec = PackSpecBuilder::from_kernel(&assignments, StencilKind::Pull).unwrap();
    assert_eq!(spec.len(), 6);
    assert!(spec.iter().all(|(_, terms)| terms.len() == 1));

    let info = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap();
    assert_eq!(info.fused_elements_per_cell, 6);
    assert_eq!(info.fused.kernel().assignments().len(), 6);
    assert_eq!(info.fields, vec!["f0", "f1", "f2", "f3", "f4", "f5"]);
}

#[test]
fn mixed_element_types_are_rejected() {
    let a = Field::new("a", DType::Float64);
    let b = Field::new("b", DType::Float32);
    let reads = vec![a.at(Offset::new(1, 0, 0), vec![]), b.at(Offset::new(0, 1, 0), vec![])];
    let spec = PackSpecBuilder::from_accesses(&reads, &[], StencilKind::Pull).unwrap();
    let err = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap_err();
    match err {
        GenError::MixedType { detail } => {
            assert_eq!(detail, " - a [double]\n - b [float]");
        }
        other => panic!("expected MixedType, got {other:?}"),
    }
}

#[test]
fn magnitude_two_offset_is_rejected() {
    let src = Field::new("src", DType::Float64);
    let dst = Field::new("dst", DType::Float64);
    let assignments = vec![Assignment::new(
        dst.center(vec![]),
        Expr::Access(src.at(Offset::new(2, 0, 0), vec![])),
    )];
    for kind in [StencilKind::Pull, StencilKind::Push] {
        let err = PackSpecBuilder::from_kernel(&assignments, kind).unwrap_err();
        assert!(matches!(
            err,
            GenError::UnsupportedOffset {
                offset
            } if offset == Offset::new(2, 0, 0)
        ));
    }
}

#[test]
fn center_only_stencil_is_an_empty_spec() {
    let src = Field::new("src", DType::Float64);
    let dst = Field::new("dst", DType::Float64);
    let assignments = vec![Assignment::new(
        dst.center(vec![]),
        Expr::Access(src.center(vec![])),
    )];
    let spec = PackSpecBuilder::from_kernel(&assignments, StencilKind::Pull).unwrap();
    assert!(spec.is_empty());
    let err = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap_err();
    assert!(matches!(err, GenError::EmptySpec));
}

#[test]
fn two_runs_render_identical_kernels() {
    let src = Field::new("src", DType::Float64);
    let dst = Field::new("dst", DType::Float64);
    let render = || {
        let spec =
            PackSpecBuilder::from_kernel(&face_stencil(&src, &dst), StencilKind::Pull).unwrap();
        let info = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap();
        info.groups
            .iter()
            .map(|g| format!("{}\n{}", g.pack.kernel().definition(), g.unpack.kernel().definition()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(render(), render());
}

#[test]
fn explicit_group_shares_one_buffer_layout() {
    let pdfs = Field::new("pdfs", DType::Float64).with_index_shape(vec![19]);
    let group = DirectionGroup::from_directions(&[Direction::N, Direction::S]).unwrap();
    let spec = PackSpec::from_explicit(vec![(
        group.clone(),
        vec![pdfs.center(vec![4]), pdfs.center(vec![2]), pdfs.center(vec![4])],
    )]);
    let info = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap();
    let kernels = info.group(&group).unwrap();
    assert_eq!(kernels.pack.function_name(), "pack_N_S");
    assert_eq!(kernels.elements_per_cell, 2);

    // Buffer slot i holds the same term on both sides.
    let packed: Vec<String> = kernels
        .pack
        .kernel()
        .assignments()
        .iter()
        .map(|a| format!("{}<-{}", a.lhs.index[0], a.reads()[0]))
        .collect();
    let unpacked: Vec<String> = kernels
        .unpack
        .kernel()
        .assignments()
        .iter()
        .map(|a| format!("{}<-{}", a.reads()[0].index[0], a.lhs))
        .collect();
    assert_eq!(packed, vec!["0<-pdfs_C^2", "1<-pdfs_C^4"]);
    assert_eq!(packed, unpacked);
}

#[test]
fn accelerator_pack_kernels_compile_for_the_device() {
    let pdfs = Field::new("pdfs", DType::Float32).with_index_shape(vec![3]);
    let spec = PackSpecBuilder::for_field(&pdfs, Some(&[Direction::T, Direction::B])).unwrap();
    let info = generate_pack_info(
        &spec,
        &LoopKernelCompiler::new(),
        &CompileParams::new(Target::Gpu, DType::Float64),
    )
    .unwrap();
    // The element type follows the fields, not the requested default.
    assert_eq!(info.dtype, DType::Float32);
    let def = info.fused.kernel().definition();
    assert!(def.starts_with("static FUNC_PREFIX void pack_ALL("));
    assert!(def.contains("blockIdx.x"));
}
