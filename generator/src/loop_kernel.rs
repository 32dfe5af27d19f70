// loop_kernel.rs — Default kernel compiler: plain loop nests
//
// Turns an assignment list into a kernel handle with a deterministic
// parameter list and a straightforward C (host) or CUDA (accelerator)
// definition. No vectorization or loop transformations: those belong to an
// optimizing kernel compiler plugged in through `KernelCompiler`.
//
// Memory model shared with the call-site marshalling:
//   - field pointers point at the first cell of the iteration region
//     including the kernel's ghost layers,
//   - `_stride_f` holds x, y, z strides followed by one stride per index
//     dimension when the field stores more than one value per cell,
//   - `_size_f` holds the matching extents of the shape field,
//   - buffers are addressed linearly by cell counter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use tracing::debug;

use crate::error::GenError;
use crate::field::{Assignment, Field, FieldAccess};
use crate::kernel::{
    BlockIndexing, CompileParams, IndexingScheme, Kernel, KernelCompiler, KernelParameter,
    LaunchGeometry, Target,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopKernelCompiler {
    pub indexing: BlockIndexing,
}

impl LoopKernelCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct LoopKernel {
    name: String,
    assignments: Vec<Assignment>,
    fields: Vec<Field>,
    written: BTreeSet<String>,
    scalars: BTreeSet<String>,
    shape_field: String,
    ghost_layers: u32,
    params: CompileParams,
    indexing: BlockIndexing,
}

impl KernelCompiler for LoopKernelCompiler {
    type Kernel = LoopKernel;

    fn compile(
        &self,
        assignments: Vec<Assignment>,
        params: &CompileParams,
    ) -> Result<LoopKernel, GenError> {
        if assignments.is_empty() {
            return Err(GenError::config("cannot compile an empty assignment list"));
        }

        let mut fields: BTreeMap<String, Field> = BTreeMap::new();
        let mut written = BTreeSet::new();
        let mut scalars = BTreeSet::new();
        let mut radius = 0;
        for a in &assignments {
            written.insert(a.lhs.field.name.clone());
            for access in std::iter::once(a.lhs.clone()).chain(a.reads()) {
                match fields.get(&access.field.name) {
                    Some(existing) if *existing != access.field => {
                        return Err(GenError::config(format!(
                            "field '{}' is used with conflicting definitions",
                            access.field.name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        fields.insert(access.field.name.clone(), access.field.clone());
                    }
                }
                if !access.field.is_buffer() {
                    radius = radius.max(access.offset.radius());
                }
            }
            a.rhs.collect_symbols(&mut scalars);
        }

        let shape_field = fields
            .values()
            .find(|f| !f.is_buffer())
            .map(|f| f.name.clone())
            .ok_or_else(|| GenError::config("kernel accesses no spatial field"))?;
        let ghost_layers = params.ghost_layers.unwrap_or(radius);

        debug!(
            fields = fields.len(),
            assignments = assignments.len(),
            ghost_layers,
            target = %params.target,
            "compiled loop kernel"
        );

        Ok(LoopKernel {
            name: "kernel".to_string(),
            assignments,
            fields: fields.into_values().collect(),
            written,
            scalars,
            shape_field,
            ghost_layers,
            params: params.clone(),
            indexing: self.indexing,
        })
    }
}

impl LoopKernel {
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Field whose `_size_` parameter bounds the iteration space.
    pub fn shape_field(&self) -> &str {
        &self.shape_field
    }

    fn has_buffer(&self) -> bool {
        self.fields.iter().any(|f| f.is_buffer())
    }

    fn signature_entry(&self, p: &KernelParameter) -> String {
        match p {
            KernelParameter::FieldPointer { field, dtype } => {
                if self.written.contains(field) {
                    format!("{} * RESTRICT {}", dtype, p.name())
                } else {
                    format!("{} * RESTRICT const {}", dtype, p.name())
                }
            }
            KernelParameter::FieldStride { .. } | KernelParameter::FieldShape { .. } => {
                format!("const int64_t * const {}", p.name())
            }
            KernelParameter::Scalar { dtype, .. } => format!("{} {}", dtype, p.name()),
        }
    }

    fn upper_bound(&self, axis: usize) -> String {
        if self.ghost_layers == 0 {
            format!("_size_{}[{}]", self.shape_field, axis)
        } else {
            format!("_size_{}[{}] - {}", self.shape_field, axis, self.ghost_layers)
        }
    }

    /// Linear cell number inside the iteration region.
    fn cell_counter(&self) -> String {
        let g = self.ghost_layers;
        let local = |axis: usize| {
            if g == 0 {
                format!("ctr_{}", axis)
            } else {
                format!("(ctr_{} - {})", axis, g)
            }
        };
        let extent = |axis: usize| {
            if g == 0 {
                format!("_size_{}[{}]", self.shape_field, axis)
            } else {
                format!("(_size_{}[{}] - {})", self.shape_field, axis, 2 * g)
            }
        };
        format!(
            "({} * {} + {}) * {} + {}",
            local(2),
            extent(1),
            local(1),
            extent(0),
            local(0)
        )
    }

    fn render_statements(&self, out: &mut String, indent: &str) {
        if self.has_buffer() {
            let _ = writeln!(out, "{}const int64_t _cell = {};", indent, self.cell_counter());
        }
        let dtype = self.params.data_type;
        for a in &self.assignments {
            let rhs = a.rhs.to_c(dtype, &render_access);
            let _ = writeln!(out, "{}{} = {};", indent, render_access(&a.lhs), rhs);
        }
    }
}

/// Memory expression for one access.
fn render_access(access: &FieldAccess) -> String {
    let field = &access.field;
    let data = format!("_data_{}", field.name);
    if field.is_buffer() {
        return format!(
            "{}[{} * _cell + {}]",
            data,
            field.values_per_cell(),
            access.linear_index()
        );
    }

    let stride = format!("_stride_{}", field.name);
    let mut terms = Vec::new();
    for (axis, d) in access.offset.components().into_iter().enumerate() {
        let coord = match d {
            0 => format!("ctr_{}", axis),
            d if d > 0 => format!("(ctr_{} + {})", axis, d),
            d => format!("(ctr_{} - {})", axis, -d),
        };
        terms.push(format!("{} * {}[{}]", coord, stride, axis));
    }
    if field.has_components() {
        for (dim, &i) in access.index.iter().enumerate() {
            if i != 0 {
                terms.push(format!("{} * {}[{}]", i, stride, 3 + dim));
            }
        }
    }
    format!("{}[{}]", data, terms.join(" + "))
}

impl Kernel for LoopKernel {
    fn function_name(&self) -> &str {
        &self.name
    }

    fn set_function_name(&mut self, name: String) {
        self.name = name;
    }

    fn parameters(&self) -> Vec<KernelParameter> {
        let mut params = Vec::new();
        for f in &self.fields {
            params.push(KernelParameter::FieldPointer {
                field: f.name.clone(),
                dtype: f.dtype,
            });
            if !f.is_buffer() {
                params.push(KernelParameter::FieldStride {
                    field: f.name.clone(),
                });
            }
        }
        params.push(KernelParameter::FieldShape {
            field: self.shape_field.clone(),
        });
        for s in &self.scalars {
            params.push(KernelParameter::Scalar {
                name: s.clone(),
                dtype: self.params.data_type,
            });
        }
        params.sort_by_key(|p| p.name());
        params
    }

    fn fields_accessed(&self) -> &[Field] {
        &self.fields
    }

    fn ghost_layers(&self) -> u32 {
        self.ghost_layers
    }

    fn target(&self) -> Target {
        self.params.target
    }

    fn launch_geometry(&self, spatial_shape: &[String]) -> LaunchGeometry {
        self.indexing
            .call_parameters(spatial_shape, self.ghost_layers)
    }

    fn definition(&self) -> String {
        let params = self.parameters();
        let signature: Vec<String> = params
            .iter()
            .filter(|p| self.params.target == Target::Cpu || !p.is_constant_memory())
            .map(|p| self.signature_entry(p))
            .collect();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "static FUNC_PREFIX void {}({})",
            self.name,
            signature.join(", ")
        );
        let _ = writeln!(out, "{{");
        let g = self.ghost_layers;
        match self.params.target {
            Target::Cpu => {
                if self.params.cpu_openmp {
                    let _ = writeln!(out, "   #pragma omp parallel for schedule(static)");
                }
                for (depth, axis) in [2usize, 1, 0].into_iter().enumerate() {
                    let indent = "   ".repeat(depth + 1);
                    let _ = writeln!(
                        out,
                        "{}for (int64_t ctr_{} = {}; ctr_{} < {}; ctr_{} += 1)",
                        indent,
                        axis,
                        g,
                        axis,
                        self.upper_bound(axis),
                        axis
                    );
                    let _ = writeln!(out, "{}{{", indent);
                }
                self.render_statements(&mut out, &"   ".repeat(4));
                for depth in (0..3).rev() {
                    let _ = writeln!(out, "{}}}", "   ".repeat(depth + 1));
                }
            }
            Target::Gpu => {
                let lanes = ["x", "y", "z"];
                for (axis, lane) in lanes.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "   const int64_t ctr_{} = blockDim.{} * blockIdx.{} + threadIdx.{} + {};",
                        axis, lane, lane, lane, g
                    );
                }
                let guard: Vec<String> = (0..3)
                    .map(|axis| format!("ctr_{} < {}", axis, self.upper_bound(axis)))
                    .collect();
                let _ = writeln!(out, "   if ({})", guard.join(" && "));
                let _ = writeln!(out, "   {{");
                self.render_statements(&mut out, "      ");
                let _ = writeln!(out, "   }}");
            }
        }
        let _ = writeln!(out, "}}");
        out
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
