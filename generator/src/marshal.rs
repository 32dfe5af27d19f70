// marshal.rs — Kernel parameter marshalling for generated call sites
//
// Turns a compiled kernel's parameter list into the C++ statements that
// supply every argument and invoke the kernel: field extraction from a
// block, pointer origins with ghost-layer arithmetic, stride and shape
// arrays (staged into constant memory on accelerators), the call or launch
// itself, and the post-call pointer swaps.
//
// Preconditions: the kernel's fields are declared in its `KernelInfo`; block
//                fields are in scope under their own names, buffers under
//                `buffer`.
// Postconditions: every parameter of the kernel is bound exactly once, in
//                 parameter-list order.
// Failure modes: `Configuration` when a parameter cannot be marshalled
//                (stride or shape of a buffer, accelerator call without a
//                shape parameter or without a stream).
// Side effects: none.

use crate::error::GenError;
use crate::field::Field;
use crate::kernel::{Kernel, KernelInfo, KernelParameter, SignatureEntry, Target};

/// Name of the flat buffer pointer in scope of pack/unpack call sites.
pub const BUFFER_VARIABLE: &str = "buffer";

const AXES: [&str; 3] = ["x", "y", "z"];

/// Iteration region of a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    /// Whole block interior plus this many extra ghost layers.
    GhostLayers(u32),
    /// Explicit sub-region; the string is the C++ `CellInterval` variable.
    CellInterval(String),
}

/// Where scalar kernel arguments come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarSource {
    /// Already in scope as function arguments.
    Argument,
    /// Stored as members of the generated object.
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalOptions {
    pub region: Region,
    /// Execution stream expression; required for accelerator kernels.
    pub stream: Option<String>,
    pub scalars: ScalarSource,
}

impl MarshalOptions {
    pub fn new(region: Region) -> Self {
        MarshalOptions {
            region,
            stream: None,
            scalars: ScalarSource::Argument,
        }
    }

    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    pub fn with_member_scalars(mut self) -> Self {
        self.scalars = ScalarSource::Member;
        self
    }
}

// ── Field types and lookup ──────────────────────────────────────────────────

/// Host framework type holding `field` on `target`.
pub fn field_type(field: &Field, target: Target) -> String {
    match target {
        Target::Cpu => format!(
            "GhostLayerField< {}, {} >",
            field.dtype,
            field.values_per_cell()
        ),
        Target::Gpu => format!("cuda::GPUField< {} >", field.dtype),
    }
}

/// Declaration of a field named in the kernel info. A swap original the
/// kernel never touches takes its temporary's definition.
fn field_def<'a, K: Kernel>(info: &'a KernelInfo<K>, name: &str) -> Result<&'a Field, GenError> {
    if let Some(f) = info.field(name) {
        return Ok(f);
    }
    info.field_swaps()
        .iter()
        .filter(|s| s.field == name)
        .find_map(|s| info.field(&s.temporary))
        .ok_or_else(|| GenError::config(format!("field '{}' is not accessed by the kernel", name)))
}

fn non_buffer<'a>(field: &'a Field, what: &str) -> Result<&'a Field, GenError> {
    if field.is_buffer() {
        Err(GenError::config(format!(
            "buffer '{}' has no {}; buffers are addressed linearly",
            field.name, what
        )))
    } else {
        Ok(field)
    }
}

// ── Value lists ─────────────────────────────────────────────────────────────

/// x, y, z strides, then one stride per index dimension when the field has
/// more than one value per cell.
fn stride_values(field: &Field) -> Vec<String> {
    let mut values: Vec<String> = AXES
        .iter()
        .map(|a| format!("int64_t({}->{}Stride())", field.name, a))
        .collect();
    if field.has_components() {
        for dim in 0..field.index_dimensions() {
            let factor: usize = field.index_shape[dim + 1..].iter().product();
            values.push(if factor == 1 {
                format!("int64_t({}->fStride())", field.name)
            } else {
                format!("int64_t({} * {}->fStride())", factor, field.name)
            });
        }
    }
    values
}

fn shape_values(field: &Field, region: &Region, required: u32) -> Vec<String> {
    let mut values: Vec<String> = AXES
        .iter()
        .map(|a| match region {
            Region::GhostLayers(extra) => {
                let total = extra + required;
                if total == 0 {
                    format!("int64_t({}->{}Size())", field.name, a)
                } else {
                    format!("int64_t({}->{}Size() + {})", field.name, a, 2 * total)
                }
            }
            Region::CellInterval(ci) => {
                if required == 0 {
                    format!("int64_t({}.{}Size())", ci, a)
                } else {
                    format!("int64_t({}.{}Size() + {})", ci, a, 2 * required)
                }
            }
        })
        .collect();
    if field.has_components() {
        if field.index_dimensions() == 1 {
            values.push(format!("int64_t({}->fSize())", field.name));
        } else {
            values.extend(field.index_shape.iter().map(|n| n.to_string()));
        }
    }
    values
}

/// Access origin per spatial axis.
fn origin(region: &Region, required: u32) -> [String; 3] {
    match region {
        Region::GhostLayers(extra) => {
            let total = extra + required;
            let c = if total == 0 {
                "0".to_string()
            } else {
                format!("-{}", total)
            };
            [c.clone(), c.clone(), c]
        }
        Region::CellInterval(ci) => AXES.map(|a| {
            if required == 0 {
                format!("{}.{}Min()", ci, a)
            } else {
                format!("{}.{}Min() - {}", ci, a, required)
            }
        }),
    }
}

fn push_array(
    lines: &mut Vec<String>,
    target: Target,
    name: &str,
    values: &[String],
    stream: Option<&str>,
) -> Result<(), GenError> {
    match target {
        Target::Cpu => {
            lines.push(format!("const int64_t {} [] = {{{}}};", name, values.join(", ")));
        }
        Target::Gpu => {
            let stream = stream.ok_or_else(|| {
                GenError::config(format!("staging '{}' needs an execution stream", name))
            })?;
            lines.push(format!("const int64_t {}_cpu [] = {{{}}};", name, values.join(", ")));
            lines.push(format!(
                "WALBERLA_CUDA_CHECK( cudaMemcpyToSymbolAsync(internal::{}, {}_cpu, {} * sizeof(int64_t), 0, cudaMemcpyHostToDevice, {}) );",
                name,
                name,
                values.len(),
                stream
            ));
        }
    }
    Ok(())
}

// ── Call site ───────────────────────────────────────────────────────────────

/// Argument construction and invocation of `info`'s kernel.
pub fn generate_call<K: Kernel>(info: &KernelInfo<K>, opts: &MarshalOptions) -> Result<String, GenError> {
    let kernel = info.kernel();
    let target = kernel.target();
    let required = kernel.ghost_layers();
    let mut lines = Vec::new();
    let mut spatial_shape: Option<Vec<String>> = None;

    for param in info.parameters() {
        let name = param.name();
        match param {
            KernelParameter::FieldPointer { field, dtype } => {
                let fd = field_def(info, field)?;
                if fd.is_buffer() {
                    lines.push(format!("{} * RESTRICT {} = {};", dtype, name, BUFFER_VARIABLE));
                    continue;
                }
                lines.push(format!(
                    "WALBERLA_ASSERT_GREATER_EQUAL({}->nrOfGhostLayers(), {});",
                    field, required
                ));
                let [x, y, z] = origin(&opts.region, required);
                let cast = match target {
                    Target::Cpu => String::new(),
                    Target::Gpu => format!("({} *) ", dtype),
                };
                lines.push(format!(
                    "{} * RESTRICT {} = {}{}->dataAt({}, {}, {}, 0);",
                    dtype, name, cast, field, x, y, z
                ));
            }
            KernelParameter::FieldStride { field } => {
                let fd = non_buffer(field_def(info, field)?, "strides")?;
                push_array(&mut lines, target, &name, &stride_values(fd), opts.stream.as_deref())?;
            }
            KernelParameter::FieldShape { field } => {
                let fd = non_buffer(field_def(info, field)?, "shape")?;
                let values = shape_values(fd, &opts.region, required);
                for (axis, value) in values.iter().take(3).enumerate() {
                    lines.push(format!(
                        "WALBERLA_ASSERT_GREATER_EQUAL(int64_t({}->{}SizeWithGhostLayer()), {});",
                        field, AXES[axis], value
                    ));
                }
                if fd.index_dimensions() > 1 {
                    lines.push(format!(
                        "WALBERLA_ASSERT_GREATER_EQUAL(int64_t({}->fSize()), {});",
                        field,
                        fd.values_per_cell()
                    ));
                }
                push_array(&mut lines, target, &name, &values, opts.stream.as_deref())?;
                let host_name = match target {
                    Target::Cpu => name.clone(),
                    Target::Gpu => format!("{}_cpu", name),
                };
                spatial_shape = Some((0..3).map(|i| format!("{}[{}]", host_name, i)).collect());
            }
            KernelParameter::Scalar { name, .. } => {
                if opts.scalars == ScalarSource::Member {
                    lines.push(format!("auto & {} = this->{};", name, name));
                }
            }
        }
    }

    match target {
        Target::Cpu => {
            let args: Vec<String> = info.parameters().iter().map(|p| p.name()).collect();
            lines.push(format!("internal::{}({});", kernel.function_name(), args.join(", ")));
        }
        Target::Gpu => {
            let shape = spatial_shape.ok_or_else(|| {
                GenError::config(format!(
                    "accelerator kernel '{}' has no shape parameter to derive its launch geometry from",
                    kernel.function_name()
                ))
            })?;
            let stream = opts.stream.as_deref().ok_or_else(|| {
                GenError::config(format!(
                    "launching '{}' needs an execution stream",
                    kernel.function_name()
                ))
            })?;
            let geometry = kernel.launch_geometry(&shape);
            lines.push(format!(
                "dim3 _block(int({}), int({}), int({}));",
                geometry.block[0], geometry.block[1], geometry.block[2]
            ));
            lines.push(format!(
                "dim3 _grid(int({}), int({}), int({}));",
                geometry.grid[0], geometry.grid[1], geometry.grid[2]
            ));
            let args: Vec<String> = info
                .parameters()
                .iter()
                .filter(|p| !p.is_constant_memory())
                .map(|p| p.name())
                .collect();
            lines.push(format!(
                "internal::{}<<<_grid, _block, 0, {}>>>({});",
                kernel.function_name(),
                stream,
                args.join(", ")
            ));
        }
    }
    Ok(lines.join("\n"))
}

/// One pointer swap per declared field-swap pair.
pub fn generate_swaps<K: Kernel>(info: &KernelInfo<K>) -> String {
    info.field_swaps()
        .iter()
        .map(|s| format!("{}->swapDataPointers({});", s.field, s.temporary))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Field extraction ────────────────────────────────────────────────────────

/// Fetch every block field of the signature and resolve every temporary
/// through the per-instance twin cache.
pub fn field_extraction<K: Kernel>(info: &KernelInfo<K>, target: Target) -> Result<String, GenError> {
    let mut lines = Vec::new();
    for entry in info.signature() {
        if let SignatureEntry::Field { name } = entry {
            let ty = field_type(field_def(info, &name)?, target);
            lines.push(format!("auto {} = block->getData< {} >({}ID);", name, ty, name));
        }
    }
    for swap in info.field_swaps() {
        let ty = field_type(field_def(info, &swap.temporary)?, target);
        let tmp = &swap.temporary;
        let cache = cache_name(&swap.field);
        lines.push(format!("{} * {};", ty, tmp));
        lines.push("{".to_string());
        lines.push(format!("    auto it = {}.find({});", cache, swap.field));
        lines.push(format!("    if( it != {}.end() )", cache));
        lines.push("    {".to_string());
        lines.push(format!("        {} = it->second;", tmp));
        lines.push("    }".to_string());
        lines.push("    else".to_string());
        lines.push("    {".to_string());
        lines.push(format!("        {} = {}->cloneUninitialized();", tmp, swap.field));
        lines.push(format!("        {}[{}] = {};", cache, swap.field, tmp));
        lines.push("    }".to_string());
        lines.push("}".to_string());
    }
    Ok(lines.join("\n"))
}

fn cache_name(original: &str) -> String {
    format!("cache_{}_", original)
}

/// Twin cache members: at most one twin per original field instance.
pub fn twin_cache_members<K: Kernel>(info: &KernelInfo<K>, target: Target) -> Result<String, GenError> {
    let mut lines = Vec::new();
    for swap in info.field_swaps() {
        let ty = field_type(field_def(info, &swap.temporary)?, target);
        lines.push(format!("std::map< {} *, {} * > {};", ty, ty, cache_name(&swap.field)));
    }
    Ok(lines.join("\n"))
}

/// Destructor body releasing every cached twin.
pub fn twin_cache_cleanup<K: Kernel>(info: &KernelInfo<K>) -> String {
    info.field_swaps()
        .iter()
        .map(|s| {
            format!(
                "for( auto & entry : {} )\n    delete entry.second;",
                cache_name(&s.field)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Constructor and members ─────────────────────────────────────────────────

pub fn constructor_parameters<K: Kernel>(info: &KernelInfo<K>) -> String {
    info.signature()
        .iter()
        .map(|e| match e {
            SignatureEntry::Field { name } => format!("BlockDataID {}ID_", name),
            SignatureEntry::Scalar { name, dtype, .. } => format!("{} {}_", dtype, name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn constructor_initializer_list<K: Kernel>(info: &KernelInfo<K>) -> String {
    info.signature()
        .iter()
        .map(|e| match e {
            SignatureEntry::Field { name } => format!("{}ID({}ID_)", name, name),
            SignatureEntry::Scalar { name, .. } => format!("{}({}_)", name, name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn members<K: Kernel>(info: &KernelInfo<K>) -> String {
    info.signature()
        .iter()
        .map(|e| match e {
            SignatureEntry::Field { name } => format!("BlockDataID {}ID;", name),
            SignatureEntry::Scalar { name, dtype, .. } => format!("{} {};", dtype, name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `__constant__` symbols an accelerator kernel reads strides and shapes
/// from. Empty on host targets.
pub fn constant_memory_declarations<K: Kernel>(info: &KernelInfo<K>) -> Result<String, GenError> {
    if info.kernel().target() != Target::Gpu {
        return Ok(String::new());
    }
    let mut lines = Vec::new();
    for p in info.parameters() {
        let len = match p {
            KernelParameter::FieldStride { field } => {
                stride_values(non_buffer(field_def(info, field)?, "strides")?).len()
            }
            KernelParameter::FieldShape { field } => {
                shape_values(non_buffer(field_def(info, field)?, "shape")?, &Region::GhostLayers(0), 0)
                    .len()
            }
            _ => continue,
        };
        lines.push(format!("__constant__ int64_t {}[{}];", p.name(), len));
    }
    Ok(lines.join("\n"))
}

// ── Tests ───────────────────────────────────────────────────────────────────
