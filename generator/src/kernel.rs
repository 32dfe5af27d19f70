// kernel.rs — Kernel-compiler collaborator interface and kernel metadata
//
// The generator never inspects a compiled kernel's instructions. It talks to
// the kernel compiler through `KernelCompiler`, keeps the returned handle
// opaque behind `Kernel`, and wraps it in a `KernelInfo` that caches the
// parameter list and carries the call-site metadata (temporary fields, field
// swaps, varying parameters).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::field::{Assignment, DType, Field};

// ── Compilation parameters ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Host CPU.
    Cpu,
    /// Accelerator (CUDA).
    Gpu,
}

impl Target {
    pub fn parse(s: &str) -> Option<Target> {
        match s {
            "cpu" => Some(Target::Cpu),
            "gpu" => Some(Target::Gpu),
            _ => None,
        }
    }

    pub fn source_extension(self) -> &'static str {
        match self {
            Target::Cpu => "cpp",
            Target::Gpu => "cu",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cpu => f.write_str("cpu"),
            Target::Gpu => f.write_str("gpu"),
        }
    }
}

/// Host vectorization hints forwarded to the kernel compiler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorizeInfo {
    pub instruction_set: Option<String>,
    pub assume_inner_stride_one: bool,
    pub assume_aligned: bool,
    pub nontemporal: bool,
}

/// Parameters shared by every kernel compiled within one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileParams {
    pub target: Target,
    pub data_type: DType,
    pub cpu_openmp: bool,
    pub vectorize: VectorizeInfo,
    /// Ghost layers the kernel iterates over; `None` lets the compiler derive
    /// them from the access offsets.
    pub ghost_layers: Option<u32>,
}

impl CompileParams {
    pub fn new(target: Target, data_type: DType) -> Self {
        CompileParams {
            target,
            data_type,
            cpu_openmp: false,
            vectorize: VectorizeInfo::default(),
            ghost_layers: None,
        }
    }

    pub fn with_ghost_layers(mut self, ghost_layers: u32) -> Self {
        self.ghost_layers = Some(ghost_layers);
        self
    }

    pub fn with_data_type(mut self, data_type: DType) -> Self {
        self.data_type = data_type;
        self
    }
}

// ── Kernel parameters ───────────────────────────────────────────────────────

/// One entry of a compiled kernel's parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KernelParameter {
    FieldPointer { field: String, dtype: DType },
    FieldStride { field: String },
    FieldShape { field: String },
    Scalar { name: String, dtype: DType },
}

impl KernelParameter {
    /// Name of the C parameter (`_data_f`, `_stride_f`, `_size_f`, or the
    /// scalar's own name).
    pub fn name(&self) -> String {
        match self {
            KernelParameter::FieldPointer { field, .. } => format!("_data_{}", field),
            KernelParameter::FieldStride { field } => format!("_stride_{}", field),
            KernelParameter::FieldShape { field } => format!("_size_{}", field),
            KernelParameter::Scalar { name, .. } => name.clone(),
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            KernelParameter::FieldPointer { field, .. }
            | KernelParameter::FieldStride { field }
            | KernelParameter::FieldShape { field } => Some(field),
            KernelParameter::Scalar { .. } => None,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            KernelParameter::FieldPointer { dtype, .. } | KernelParameter::Scalar { dtype, .. } => {
                *dtype
            }
            KernelParameter::FieldStride { .. } | KernelParameter::FieldShape { .. } => DType::Int64,
        }
    }

    /// Strides and shapes live in constant memory on accelerators.
    pub fn is_constant_memory(&self) -> bool {
        matches!(
            self,
            KernelParameter::FieldStride { .. } | KernelParameter::FieldShape { .. }
        )
    }
}

// ── Launch geometry ─────────────────────────────────────────────────────────

/// Block and grid dimensions as C expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub block: [String; 3],
    pub grid: [String; 3],
}

/// Indexing-scheme collaborator: derives the launch geometry from the
/// iteration space of an accelerator kernel.
pub trait IndexingScheme {
    /// `spatial_shape` holds one host-side C expression per spatial axis;
    /// `ghost_layers` cells are skipped at both ends of each axis.
    fn call_parameters(&self, spatial_shape: &[String], ghost_layers: u32) -> LaunchGeometry;
}

/// Fixed-size thread blocks; the grid covers the iteration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndexing {
    pub block_size: [u32; 3],
}

impl Default for BlockIndexing {
    fn default() -> Self {
        BlockIndexing {
            block_size: [128, 1, 1],
        }
    }
}

impl IndexingScheme for BlockIndexing {
    fn call_parameters(&self, spatial_shape: &[String], ghost_layers: u32) -> LaunchGeometry {
        let block = self.block_size.map(|b| b.to_string());
        let mut grid = [String::from("1"), String::from("1"), String::from("1")];
        for (axis, extent) in spatial_shape.iter().take(3).enumerate() {
            let cells = if ghost_layers == 0 {
                extent.clone()
            } else {
                format!("{} - {}", extent, 2 * ghost_layers)
            };
            let b = self.block_size[axis];
            grid[axis] = if b == 1 {
                cells
            } else {
                format!("({} + {}) / {}", cells, b - 1, b)
            };
        }
        LaunchGeometry { block, grid }
    }
}

// ── Collaborator traits ─────────────────────────────────────────────────────

/// Opaque handle to a compiled kernel.
pub trait Kernel {
    fn function_name(&self) -> &str;
    fn set_function_name(&mut self, name: String);
    /// Ordered parameter list of the kernel's C signature.
    fn parameters(&self) -> Vec<KernelParameter>;
    fn fields_accessed(&self) -> &[Field];
    /// Ghost layers the kernel reads beyond the iteration region.
    fn ghost_layers(&self) -> u32;
    fn target(&self) -> Target;
    fn launch_geometry(&self, spatial_shape: &[String]) -> LaunchGeometry;
    /// Full C/CUDA definition of the kernel function.
    fn definition(&self) -> String;
}

pub trait KernelCompiler {
    type Kernel: Kernel;

    fn compile(
        &self,
        assignments: Vec<Assignment>,
        params: &CompileParams,
    ) -> Result<Self::Kernel, GenError>;
}

// ── Kernel info ─────────────────────────────────────────────────────────────

/// Ping-pong pair: `field` and its scratch twin `temporary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSwap {
    pub field: String,
    pub temporary: String,
}

/// Optional scalar parameter that is always part of the generated call
/// signature, whether or not the kernel consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingParameter {
    pub name: String,
    pub dtype: DType,
}

/// How a scalar in the generated signature reaches the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Passed to the kernel call.
    Kernel,
    /// Accepted and stored, ignored by the current kernel.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureEntry {
    Field { name: String },
    Scalar { name: String, dtype: DType, binding: Binding },
}

/// A kernel handle plus the metadata needed to call it.
///
/// The parameter list is read once at construction. The handle is only
/// reachable by shared reference afterwards, so the cache cannot go stale.
#[derive(Debug)]
pub struct KernelInfo<K> {
    kernel: K,
    parameters: Vec<KernelParameter>,
    field_swaps: Vec<FieldSwap>,
    varying: Vec<VaryingParameter>,
}

impl<K: Kernel> KernelInfo<K> {
    pub fn new(kernel: K) -> Self {
        let parameters = kernel.parameters();
        KernelInfo {
            kernel,
            parameters,
            field_swaps: Vec::new(),
            varying: Vec::new(),
        }
    }

    pub fn with_field_swaps(mut self, swaps: Vec<FieldSwap>) -> Self {
        self.field_swaps = swaps;
        self
    }

    /// Declare optional parameters. A varying parameter that the kernel also
    /// takes must agree on its type.
    pub fn with_varying(mut self, varying: Vec<VaryingParameter>) -> Result<Self, GenError> {
        for v in &varying {
            let clash = self.parameters.iter().find(|p| {
                matches!(p, KernelParameter::Scalar { name, dtype } if *name == v.name && *dtype != v.dtype)
            });
            if let Some(p) = clash {
                return Err(GenError::config(format!(
                    "varying parameter '{}' declared as {} but the kernel takes {}",
                    v.name,
                    v.dtype,
                    p.dtype()
                )));
            }
        }
        self.varying = varying;
        Ok(self)
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn function_name(&self) -> &str {
        self.kernel.function_name()
    }

    pub fn parameters(&self) -> &[KernelParameter] {
        &self.parameters
    }

    pub fn field_swaps(&self) -> &[FieldSwap] {
        &self.field_swaps
    }

    pub fn varying_parameters(&self) -> &[VaryingParameter] {
        &self.varying
    }

    pub fn temporary_fields(&self) -> impl Iterator<Item = &str> {
        self.field_swaps.iter().map(|s| s.temporary.as_str())
    }

    pub fn is_temporary(&self, field: &str) -> bool {
        self.field_swaps.iter().any(|s| s.temporary == field)
    }

    /// Original field whose twin `temporary` is.
    pub fn original_of(&self, temporary: &str) -> Option<&str> {
        self.field_swaps
            .iter()
            .find(|s| s.temporary == temporary)
            .map(|s| s.field.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.kernel.fields_accessed().iter().find(|f| f.name == name)
    }

    /// Stable constructor signature: block fields (minus temporaries) in
    /// name order, then kernel scalars merged with varying parameters in
    /// name order.
    pub fn signature(&self) -> Vec<SignatureEntry> {
        let mut fields: Vec<String> = self
            .parameters
            .iter()
            .filter_map(|p| match p {
                KernelParameter::FieldPointer { field, .. } => Some(field.clone()),
                _ => None,
            })
            .filter(|f| !self.is_temporary(f))
            .filter(|f| self.field(f).map(|fd| !fd.is_buffer()).unwrap_or(true))
            .collect();
        for swap in &self.field_swaps {
            if !fields.contains(&swap.field) {
                fields.push(swap.field.clone());
            }
        }
        fields.sort();

        let mut scalars: BTreeMap<String, (DType, Binding)> = BTreeMap::new();
        for p in &self.parameters {
            if let KernelParameter::Scalar { name, dtype } = p {
                scalars.insert(name.clone(), (*dtype, Binding::Kernel));
            }
        }
        for v in &self.varying {
            scalars
                .entry(v.name.clone())
                .or_insert((v.dtype, Binding::Ignored));
        }

        fields
            .into_iter()
            .map(|name| SignatureEntry::Field { name })
            .chain(
                scalars
                    .into_iter()
                    .map(|(name, (dtype, binding))| SignatureEntry::Scalar {
                        name,
                        dtype,
                        binding,
                    }),
            )
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_names() {
        let p = KernelParameter::FieldStride { field: "src".into() };
        assert_eq!(p.name(), "_stride_src");
        assert_eq!(p.dtype(), DType::Int64);
        assert!(p.is_constant_memory());
        let s = KernelParameter::Scalar {
            name: "omega".into(),
            dtype: DType::Float64,
        };
        assert_eq!(s.name(), "omega");
        assert_eq!(s.field_name(), None);
    }

    #[test]
    fn block_indexing_rounds_up() {
        let shape = vec!["n0".to_string(), "n1".to_string(), "n2".to_string()];
        let g = BlockIndexing::default().call_parameters(&shape, 1);
        assert_eq!(g.block, ["128".to_string(), "1".to_string(), "1".to_string()]);
        assert_eq!(g.grid[0], "(n0 - 2 + 127) / 128");
        assert_eq!(g.grid[1], "n1 - 2");
        assert_eq!(g.grid[2], "n2 - 2");
    }
}
