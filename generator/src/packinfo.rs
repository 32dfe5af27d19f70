// packinfo.rs — Pack/unpack kernel synthesis
//
// Turns a `PackSpec` into one pack and one unpack kernel per direction group
// plus a fused kernel covering every term, compiled through the kernel
// compiler collaborator.
//
// Preconditions: `spec` was produced by `PackSpecBuilder` or
//                `PackSpec::from_explicit` (groups validated).
// Postconditions: buffer element `i` of a group holds that group's `i`-th
//                 term on both sides; the unpack kernel is keyed by the same
//                 direction tuple as its pack kernel.
// Failure modes: `MixedType`, `EmptySpec`, and anything the compiler raises.
// Side effects: none (logs at debug level).

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::GenError;
use crate::field::{Assignment, DType, Expr, Field, FieldAccess};
use crate::kernel::{CompileParams, Kernel, KernelCompiler, KernelInfo};
use crate::pack_spec::{DirectionGroup, PackSpec};

/// Kernels for one direction group.
#[derive(Debug)]
pub struct PackKernels<K> {
    pub group: DirectionGroup,
    pub pack: KernelInfo<K>,
    pub unpack: KernelInfo<K>,
    /// Buffer values per cell (the group's term count).
    pub elements_per_cell: usize,
}

/// Everything the pack-info templates need.
#[derive(Debug)]
pub struct PackInfo<K> {
    pub dtype: DType,
    pub groups: Vec<PackKernels<K>>,
    pub fused: KernelInfo<K>,
    pub fused_elements_per_cell: usize,
    /// Distinct field names the kernels touch (buffer excluded), sorted.
    pub fields: Vec<String>,
}

impl<K: Kernel> PackInfo<K> {
    pub fn group(&self, group: &DirectionGroup) -> Option<&PackKernels<K>> {
        self.groups.iter().find(|g| &g.group == group)
    }
}

pub fn generate_pack_info<C: KernelCompiler>(
    spec: &PackSpec,
    compiler: &C,
    params: &CompileParams,
) -> Result<PackInfo<C::Kernel>, GenError> {
    let all_terms = spec.all_terms();
    let dtype = uniform_dtype(&all_terms)?;

    let params = params
        .clone()
        .with_data_type(dtype)
        .with_ghost_layers(0);

    let mut groups = Vec::with_capacity(spec.len());
    for (group, terms) in spec.iter() {
        if terms.is_empty() {
            continue;
        }
        let key = group.key();
        let pack = compile_named(
            compiler,
            format!("pack_{}", key),
            pack_assignments(terms, dtype),
            &params,
        )?;
        let unpack = compile_named(
            compiler,
            format!("unpack_{}", key),
            unpack_assignments(terms, dtype),
            &params,
        )?;
        debug!(group = %key, terms = terms.len(), "synthesized pack/unpack kernels");
        groups.push(PackKernels {
            group: group.clone(),
            pack,
            unpack,
            elements_per_cell: terms.len(),
        });
    }

    let fused = compile_named(
        compiler,
        "pack_ALL".to_string(),
        pack_assignments(&all_terms, dtype),
        &params,
    )?;
    debug!(terms = all_terms.len(), "synthesized fused pack kernel");

    let fields: BTreeSet<String> = all_terms.iter().map(|t| t.field.name.clone()).collect();

    Ok(PackInfo {
        dtype,
        groups,
        fused,
        fused_elements_per_cell: all_terms.len(),
        fields: fields.into_iter().collect(),
    })
}

/// Common element type of `terms`; empty term sets are rejected after the
/// type check so that a mixed but otherwise valid set reports the mix.
fn uniform_dtype(terms: &[FieldAccess]) -> Result<DType, GenError> {
    let mut by_field: BTreeMap<&str, DType> = BTreeMap::new();
    for t in terms {
        by_field.insert(&t.field.name, t.field.dtype);
    }
    let mut dtypes: Vec<DType> = by_field.values().copied().collect();
    dtypes.sort();
    dtypes.dedup();
    match dtypes.as_slice() {
        [] => Err(GenError::EmptySpec),
        [one] => Ok(*one),
        _ => {
            let detail: Vec<String> = by_field
                .iter()
                .map(|(name, dtype)| format!(" - {} [{}]", name, dtype))
                .collect();
            Err(GenError::MixedType {
                detail: detail.join("\n"),
            })
        }
    }
}

fn pack_assignments(terms: &[FieldAccess], dtype: DType) -> Vec<Assignment> {
    let buffer = Field::buffer(dtype, terms.len());
    terms
        .iter()
        .enumerate()
        .map(|(i, t)| Assignment::new(buffer.center(vec![i]), Expr::Access(t.clone())))
        .collect()
}

fn unpack_assignments(terms: &[FieldAccess], dtype: DType) -> Vec<Assignment> {
    let buffer = Field::buffer(dtype, terms.len());
    terms
        .iter()
        .enumerate()
        .map(|(i, t)| Assignment::new(t.clone(), Expr::Access(buffer.center(vec![i]))))
        .collect()
}

fn compile_named<C: KernelCompiler>(
    compiler: &C,
    name: String,
    assignments: Vec<Assignment>,
    params: &CompileParams,
) -> Result<KernelInfo<C::Kernel>, GenError> {
    let mut kernel = compiler.compile(assignments, params)?;
    kernel.set_function_name(name);
    Ok(KernelInfo::new(kernel))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Offset;
    use crate::kernel::Target;
    use crate::loop_kernel::LoopKernelCompiler;
    use crate::pack_spec::{PackSpecBuilder, StencilKind};

    fn params() -> CompileParams {
        CompileParams::new(Target::Cpu, DType::Float64)
    }

    #[test]
    fn kernels_are_named_after_the_group() {
        let src = Field::new("src", DType::Float64);
        let reads = vec![src.at(Offset::new(0, 1, 0), vec![])];
        let spec = PackSpecBuilder::from_accesses(&reads, &[], StencilKind::Pull).unwrap();
        let info = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap();
        assert_eq!(info.groups.len(), 1);
        assert_eq!(info.groups[0].pack.function_name(), "pack_S");
        assert_eq!(info.groups[0].unpack.function_name(), "unpack_S");
        assert_eq!(info.fused.function_name(), "pack_ALL");
        assert_eq!(info.groups[0].pack.kernel().ghost_layers(), 0);
        assert_eq!(info.fields, vec!["src"]);
    }

    #[test]
    fn element_type_follows_the_fields() {
        let f = Field::new("f", DType::Float32);
        let spec = PackSpecBuilder::for_field(&f, None).unwrap();
        let info = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap();
        assert_eq!(info.dtype, DType::Float32);
    }

    #[test]
    fn mixed_types_list_every_field() {
        let a = Field::new("a", DType::Float64);
        let b = Field::new("b", DType::Float32);
        let reads = vec![a.at(Offset::new(1, 0, 0), vec![]), b.at(Offset::new(1, 0, 0), vec![])];
        let spec = PackSpecBuilder::from_accesses(&reads, &[], StencilKind::Pull).unwrap();
        match generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()) {
            Err(GenError::MixedType { detail }) => {
                assert_eq!(detail, " - a [double]\n - b [float]");
            }
            other => panic!("expected MixedType, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_spec_is_rejected() {
        let spec = PackSpecBuilder::new().build();
        let err = generate_pack_info(&spec, &LoopKernelCompiler::new(), &params()).unwrap_err();
        assert!(matches!(err, GenError::EmptySpec));
    }
}
