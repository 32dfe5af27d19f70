// emit.rs — Header/source rendering for sweeps and pack infos
//
// Assembles the two text artifacts of a generation request from kernel
// definitions and marshalling fragments. Output is a pure function of the
// inputs: identical requests render byte-identical artifacts.
//
// Preconditions: kernel infos were produced by `generate_sweep` or
//                `generate_pack_info`.
// Postconditions: every kernel definition lives in `namespace internal`;
//                 accelerator constant-memory symbols are declared once per
//                 translation unit.
// Failure modes: marshalling `Configuration` errors propagate.
// Side effects: none.

use std::fmt::Write as _;

use indexmap::IndexSet;
use tracing::info;

use crate::direction::Direction;
use crate::error::GenError;
use crate::field::Field;
use crate::kernel::{Kernel, KernelInfo, SignatureEntry, Target};
use crate::marshal::{
    constant_memory_declarations, constructor_initializer_list, constructor_parameters,
    field_extraction, field_type, generate_call, generate_swaps, members, twin_cache_cleanup,
    twin_cache_members, MarshalOptions, Region, BUFFER_VARIABLE,
};
use crate::packinfo::PackInfo;
use crate::pipeline::Provenance;

/// Header and source text of one generated class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub header: String,
    pub source: String,
}

impl Artifacts {
    pub fn into_vec(self) -> Vec<String> {
        vec![self.header, self.source]
    }
}

/// Prefix every non-empty line of `text` with `spaces` blanks.
fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_macros(out: &mut String, target: Target) {
    match target {
        Target::Cpu => {
            let _ = writeln!(out, "#define FUNC_PREFIX");
        }
        Target::Gpu => {
            let _ = writeln!(out, "#define FUNC_PREFIX __global__");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "#ifdef __GNUC__");
    let _ = writeln!(out, "#define RESTRICT __restrict__");
    let _ = writeln!(out, "#elif _MSC_VER");
    let _ = writeln!(out, "#define RESTRICT __restrict");
    let _ = writeln!(out, "#else");
    let _ = writeln!(out, "#define RESTRICT");
    let _ = writeln!(out, "#endif");
    let _ = writeln!(out);
}

fn open_namespaces(out: &mut String, namespace: &str) {
    let _ = writeln!(out, "namespace walberla {{");
    let _ = writeln!(out, "namespace {} {{", namespace);
    let _ = writeln!(out);
}

fn close_namespaces(out: &mut String, namespace: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "}} // namespace {}", namespace);
    let _ = writeln!(out, "}} // namespace walberla");
}

/// Kernel definitions plus deduplicated constant-memory declarations.
fn write_internal<'a, K: Kernel + 'a>(
    out: &mut String,
    kernels: impl IntoIterator<Item = &'a KernelInfo<K>>,
) -> Result<(), GenError> {
    let mut constants: IndexSet<String> = IndexSet::new();
    let mut definitions = Vec::new();
    for k in kernels {
        for line in constant_memory_declarations(k)?.lines() {
            constants.insert(line.to_string());
        }
        definitions.push(k.kernel().definition());
    }
    let _ = writeln!(out, "namespace internal {{");
    let _ = writeln!(out);
    for c in &constants {
        let _ = writeln!(out, "{}", c);
    }
    if !constants.is_empty() {
        let _ = writeln!(out);
    }
    for d in definitions {
        let _ = writeln!(out, "{}", d);
    }
    let _ = writeln!(out, "}} // namespace internal");
    let _ = writeln!(out);
    Ok(())
}

fn field_include(target: Target) -> &'static str {
    match target {
        Target::Cpu => "#include \"field/GhostLayerField.h\"",
        Target::Gpu => "#include \"cuda/GPUField.h\"\n#include \"cuda/ErrorChecking.h\"",
    }
}

/// Block-local interval covering the interior of `field`.
fn interior_interval(field: &str) -> String {
    format!(
        "CellInterval ci( 0, 0, 0, cell_idx_c({f}->xSize()) - 1, cell_idx_c({f}->ySize()) - 1, cell_idx_c({f}->zSize()) - 1 );",
        f = field
    )
}

// ── Sweep ───────────────────────────────────────────────────────────────────

/// Entry points of a rendered sweep class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepLayout {
    /// `operator()` and `runOnCellInterval`.
    #[default]
    Whole,
    /// `operator()`, `inner` and `outer`, so communication can overlap the
    /// interior update.
    InnerOuter,
}

/// Boundary layers of an inner/outer split: the slice before the ghost
/// layer in each direction, shrunk by the given amount per axis so that no
/// cell belongs to two layers.
const OUTER_LAYERS: [(Direction, [i32; 3]); 6] = [
    (Direction::T, [0, 0, 0]),
    (Direction::B, [0, 0, 0]),
    (Direction::N, [0, 0, -1]),
    (Direction::S, [0, 0, -1]),
    (Direction::E, [0, -1, -1]),
    (Direction::W, [0, -1, -1]),
];

const OUTER_LAYERS_MEMBER: &str = "outerLayers_";

fn outer_layer_setup(field: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "if( {}.empty() )", OUTER_LAYERS_MEMBER);
    let _ = writeln!(out, "{{");
    let _ = writeln!(out, "    CellInterval ci;");
    for (dir, shrink) in OUTER_LAYERS {
        let _ = writeln!(out);
        let _ = writeln!(out, "    {}->getSliceBeforeGhostLayer(stencil::{}, ci, 1, false);", field, dir);
        if shrink != [0, 0, 0] {
            let _ = writeln!(
                out,
                "    ci.expand( Cell({}, {}, {}) );",
                shrink[0], shrink[1], shrink[2]
            );
        }
        let _ = writeln!(out, "    {}.push_back( ci );", OUTER_LAYERS_MEMBER);
    }
    let _ = write!(out, "}}");
    out
}

pub fn render_sweep<K: Kernel>(
    info: &KernelInfo<K>,
    class_name: &str,
    namespace: &str,
    layout: SweepLayout,
    provenance: &Provenance,
) -> Result<Artifacts, GenError> {
    let target = info.kernel().target();
    let gpu = target == Target::Gpu;

    let mut ctor_params = constructor_parameters(info);
    let mut init_list = constructor_initializer_list(info);
    if gpu {
        for (list, entry) in [
            (&mut ctor_params, "cudaStream_t stream_ = 0"),
            (&mut init_list, "stream(stream_)"),
        ] {
            if !list.is_empty() {
                list.push_str(", ");
            }
            list.push_str(entry);
        }
    }

    // header
    let mut h = String::new();
    let _ = writeln!(h, "{}", provenance.banner());
    let _ = writeln!(h, "#pragma once");
    let _ = writeln!(h);
    let _ = writeln!(h, "#include \"core/DataTypes.h\"");
    let _ = writeln!(h, "#include \"core/cell/CellInterval.h\"");
    let _ = writeln!(h, "{}", field_include(target));
    let _ = writeln!(h, "#include \"domain_decomposition/BlockDataID.h\"");
    let _ = writeln!(h, "#include \"domain_decomposition/IBlock.h\"");
    let _ = writeln!(h);
    let _ = writeln!(h, "#include <map>");
    if layout == SweepLayout::InnerOuter {
        let _ = writeln!(h, "#include <vector>");
    }
    let _ = writeln!(h);
    open_namespaces(&mut h, namespace);
    let _ = writeln!(h, "class {}", class_name);
    let _ = writeln!(h, "{{");
    let _ = writeln!(h, "public:");
    let _ = writeln!(h, "    {}( {} )", class_name, ctor_params);
    if !init_list.is_empty() {
        let _ = writeln!(h, "        : {}", init_list);
    }
    let _ = writeln!(h, "    {{}}");
    let _ = writeln!(h);
    let _ = writeln!(h, "    ~{}();", class_name);
    let _ = writeln!(h);
    let _ = writeln!(h, "    void operator()( IBlock * block );");
    match layout {
        SweepLayout::Whole => {
            let _ = writeln!(
                h,
                "    void runOnCellInterval( IBlock * block, const CellInterval & localCellInterval, cell_idx_t ghostLayers );"
            );
        }
        SweepLayout::InnerOuter => {
            let _ = writeln!(h);
            let _ = writeln!(h, "    void inner( IBlock * block );");
            let _ = writeln!(h, "    void outer( IBlock * block );");
        }
    }
    let _ = writeln!(h);
    let _ = writeln!(h, "private:");
    let m = members(info);
    if !m.is_empty() {
        let _ = writeln!(h, "{}", indent(&m, 4));
    }
    let caches = twin_cache_members(info, target)?;
    if !caches.is_empty() {
        let _ = writeln!(h, "{}", indent(&caches, 4));
    }
    if layout == SweepLayout::InnerOuter {
        let _ = writeln!(h, "    std::vector< CellInterval > {};", OUTER_LAYERS_MEMBER);
    }
    if gpu {
        let _ = writeln!(h, "    cudaStream_t stream;");
    }
    let _ = writeln!(h, "}};");
    close_namespaces(&mut h, namespace);

    // source
    let stream = gpu.then_some("stream");
    let whole = with_stream(
        MarshalOptions::new(Region::GhostLayers(0)).with_member_scalars(),
        stream,
    );
    let sub = with_stream(
        MarshalOptions::new(Region::CellInterval("ci".to_string())).with_member_scalars(),
        stream,
    );
    let extraction = field_extraction(info, target)?;
    let swaps = generate_swaps(info);
    let bounds_field = info
        .signature()
        .into_iter()
        .find_map(|e| match e {
            SignatureEntry::Field { name } => Some(name),
            SignatureEntry::Scalar { .. } => None,
        })
        .ok_or_else(|| GenError::config(format!("sweep '{}' has no block field", class_name)))?;

    let mut s = String::new();
    let _ = writeln!(s, "{}", provenance.banner());
    let _ = writeln!(s, "#include \"core/DataTypes.h\"");
    let _ = writeln!(s, "#include \"core/Macros.h\"");
    let _ = writeln!(s, "#include \"{}.h\"", class_name);
    let _ = writeln!(s);
    write_macros(&mut s, target);
    open_namespaces(&mut s, namespace);
    write_internal(&mut s, [info])?;

    let _ = writeln!(s, "{}::~{}()", class_name, class_name);
    let _ = writeln!(s, "{{");
    let cleanup = twin_cache_cleanup(info);
    if !cleanup.is_empty() {
        let _ = writeln!(s, "{}", indent(&cleanup, 4));
    }
    let _ = writeln!(s, "}}");
    let _ = writeln!(s);

    let _ = writeln!(s, "void {}::operator()( IBlock * block )", class_name);
    let _ = writeln!(s, "{{");
    let _ = writeln!(s, "{}", indent(&extraction, 4));
    let _ = writeln!(s);
    let _ = writeln!(s, "{}", indent(&generate_call(info, &whole)?, 4));
    if !swaps.is_empty() {
        let _ = writeln!(s, "{}", indent(&swaps, 4));
    }
    let _ = writeln!(s, "}}");
    let _ = writeln!(s);

    match layout {
        SweepLayout::Whole => {
            let _ = writeln!(
                s,
                "void {}::runOnCellInterval( IBlock * block, const CellInterval & localCellInterval, cell_idx_t ghostLayers )",
                class_name
            );
            let _ = writeln!(s, "{{");
            let _ = writeln!(s, "{}", indent(&extraction, 4));
            let _ = writeln!(s);
            let _ = writeln!(
                s,
                "    CellInterval bb( 0, 0, 0, cell_idx_c({f}->xSize()) - 1, cell_idx_c({f}->ySize()) - 1, cell_idx_c({f}->zSize()) - 1 );",
                f = bounds_field
            );
            let _ = writeln!(s, "    bb.expand( ghostLayers );");
            let _ = writeln!(s, "    CellInterval ci = localCellInterval;");
            let _ = writeln!(s, "    ci.intersect( bb );");
            let _ = writeln!(s, "    if( ci.empty() )");
            let _ = writeln!(s, "        return;");
            let _ = writeln!(s);
            let _ = writeln!(s, "{}", indent(&generate_call(info, &sub)?, 4));
            if !swaps.is_empty() {
                let _ = writeln!(s, "{}", indent(&swaps, 4));
            }
            let _ = writeln!(s, "}}");
        }
        SweepLayout::InnerOuter => {
            let inner = with_stream(
                MarshalOptions::new(Region::CellInterval("inner".to_string())).with_member_scalars(),
                stream,
            );
            let _ = writeln!(s, "void {}::inner( IBlock * block )", class_name);
            let _ = writeln!(s, "{{");
            let _ = writeln!(s, "{}", indent(&extraction, 4));
            let _ = writeln!(s);
            let _ = writeln!(s, "    CellInterval inner = {}->xyzSize();", bounds_field);
            let _ = writeln!(s, "    inner.expand( -1 );");
            let _ = writeln!(s);
            let _ = writeln!(s, "{}", indent(&generate_call(info, &inner)?, 4));
            let _ = writeln!(s, "}}");
            let _ = writeln!(s);

            // Layers share constant-memory symbols; they run in stream order.
            let _ = writeln!(s, "void {}::outer( IBlock * block )", class_name);
            let _ = writeln!(s, "{{");
            let _ = writeln!(s, "{}", indent(&extraction, 4));
            let _ = writeln!(s);
            let _ = writeln!(s, "{}", indent(&outer_layer_setup(&bounds_field), 4));
            let _ = writeln!(s);
            let _ = writeln!(s, "    for( const auto & ci : {} )", OUTER_LAYERS_MEMBER);
            let _ = writeln!(s, "    {{");
            let _ = writeln!(s, "{}", indent(&generate_call(info, &sub)?, 8));
            let _ = writeln!(s, "    }}");
            if !swaps.is_empty() {
                let _ = writeln!(s, "{}", indent(&swaps, 4));
            }
            let _ = writeln!(s, "}}");
        }
    }
    close_namespaces(&mut s, namespace);

    info!(class = class_name, %target, ?layout, "rendered sweep");
    Ok(Artifacts {
        header: h,
        source: s,
    })
}

fn with_stream(opts: MarshalOptions, stream: Option<&str>) -> MarshalOptions {
    match stream {
        Some(s) => opts.with_stream(s),
        None => opts,
    }
}

// ── Pack info ───────────────────────────────────────────────────────────────

pub fn render_pack_info<K: Kernel>(
    pack_info: &PackInfo<K>,
    class_name: &str,
    namespace: &str,
    provenance: &Provenance,
) -> Result<Artifacts, GenError> {
    let fused = &pack_info.fused;
    let target = fused.kernel().target();
    let gpu = target == Target::Gpu;
    let dtype = pack_info.dtype;
    let slice_field = pack_info
        .fields
        .first()
        .ok_or(GenError::EmptySpec)?
        .clone();

    let stream_param = if gpu { ", cudaStream_t stream" } else { "" };
    let ctor_params = constructor_parameters(fused);
    let init_list = constructor_initializer_list(fused);

    // header
    let mut h = String::new();
    let _ = writeln!(h, "{}", provenance.banner());
    let _ = writeln!(h, "#pragma once");
    let _ = writeln!(h);
    let _ = writeln!(h, "#include \"stencil/Directions.h\"");
    let _ = writeln!(h, "#include \"core/cell/CellInterval.h\"");
    let _ = writeln!(h, "#include \"core/DataTypes.h\"");
    let _ = writeln!(h, "{}", field_include(target));
    let _ = writeln!(h, "#include \"domain_decomposition/IBlock.h\"");
    if gpu {
        let _ = writeln!(h, "#include \"cuda/communication/GeneratedGPUPackInfo.h\"");
    } else {
        let _ = writeln!(h, "#include \"communication/UniformPackInfo.h\"");
    }
    let _ = writeln!(h);
    open_namespaces(&mut h, namespace);
    let base = if gpu {
        "::walberla::cuda::GeneratedGPUPackInfo"
    } else {
        "::walberla::communication::UniformPackInfo"
    };
    let _ = writeln!(h, "class {} : public {}", class_name, base);
    let _ = writeln!(h, "{{");
    let _ = writeln!(h, "public:");
    let _ = writeln!(h, "    {}( {} )", class_name, ctor_params);
    if !init_list.is_empty() {
        let _ = writeln!(h, "        : {}", init_list);
    }
    let _ = writeln!(h, "    {{}}");
    let _ = writeln!(h, "    virtual ~{}() {{}}", class_name);
    let _ = writeln!(h);
    if !gpu {
        let _ = writeln!(h, "    bool constantDataExchange() const {{ return true; }}");
        let _ = writeln!(h, "    bool threadsafeReceiving()  const {{ return true; }}");
        let _ = writeln!(h);
        let _ = writeln!(h, "    void unpackData(IBlock * receiver, stencil::Direction dir, mpi::RecvBuffer & buffer)");
        let _ = writeln!(h, "    {{");
        let _ = writeln!(h, "        const auto dataSize = size(stencil::inverseDir[dir], receiver);");
        let _ = writeln!(h, "        unpack(dir, buffer.skip(dataSize), receiver);");
        let _ = writeln!(h, "    }}");
        let _ = writeln!(h);
        let _ = writeln!(h, "    void communicateLocal(const IBlock * sender, IBlock * receiver, stencil::Direction dir)");
        let _ = writeln!(h, "    {{");
        let _ = writeln!(h, "        mpi::SendBuffer sBuffer;");
        let _ = writeln!(h, "        packData( sender, dir, sBuffer );");
        let _ = writeln!(h, "        mpi::RecvBuffer rBuffer( sBuffer );");
        let _ = writeln!(h, "        unpackData( receiver, stencil::inverseDir[dir], rBuffer );");
        let _ = writeln!(h, "    }}");
        let _ = writeln!(h);
    }
    let _ = writeln!(h, "    void pack  (stencil::Direction dir, unsigned char * buffer, IBlock * block{}) const;", stream_param);
    let _ = writeln!(h, "    void unpack(stencil::Direction dir, unsigned char * buffer, IBlock * block{}) const;", stream_param);
    let _ = writeln!(h, "    void packAll(unsigned char * buffer, IBlock * block{}) const;", stream_param);
    let _ = writeln!(h, "    // dir is the send direction; a receiver passes stencil::inverseDir[dir]");
    let _ = writeln!(h, "    uint_t size  (stencil::Direction dir, IBlock * block) const;");
    let _ = writeln!(h, "    uint_t sizeAll(IBlock * block) const;");
    let _ = writeln!(h);
    let _ = writeln!(h, "private:");
    if !gpu {
        let _ = writeln!(h, "    void packDataImpl(const IBlock * sender, stencil::Direction dir, mpi::SendBuffer & outBuffer) const");
        let _ = writeln!(h, "    {{");
        let _ = writeln!(h, "        const auto dataSize = size(dir, const_cast<IBlock*>(sender));");
        let _ = writeln!(h, "        pack(dir, outBuffer.forward(dataSize), const_cast<IBlock*>(sender));");
        let _ = writeln!(h, "    }}");
        let _ = writeln!(h);
    }
    let m = members(fused);
    if !m.is_empty() {
        let _ = writeln!(h, "{}", indent(&m, 4));
    }
    let _ = writeln!(h, "}};");
    close_namespaces(&mut h, namespace);

    // source
    let stream = gpu.then_some("stream");
    let slice = with_stream(
        MarshalOptions::new(Region::CellInterval("ci".to_string())).with_member_scalars(),
        stream,
    );
    let extraction = field_extraction(fused, target)?;
    let buffer_cast = format!(
        "{dt} * {b} = reinterpret_cast<{dt} *>(byte_buffer);",
        dt = dtype,
        b = BUFFER_VARIABLE
    );

    let mut s = String::new();
    let _ = writeln!(s, "{}", provenance.banner());
    let _ = writeln!(s, "#include \"stencil/Directions.h\"");
    let _ = writeln!(s, "#include \"core/cell/CellInterval.h\"");
    let _ = writeln!(s, "#include \"core/DataTypes.h\"");
    let _ = writeln!(s, "#include \"core/Macros.h\"");
    let _ = writeln!(s, "#include \"{}.h\"", class_name);
    let _ = writeln!(s);
    write_macros(&mut s, target);
    open_namespaces(&mut s, namespace);
    let _ = writeln!(s, "using walberla::cell::CellInterval;");
    let _ = writeln!(s, "using walberla::stencil::Direction;");
    let _ = writeln!(s);
    write_internal(
        &mut s,
        pack_info
            .groups
            .iter()
            .flat_map(|g| [&g.pack, &g.unpack])
            .chain(std::iter::once(fused)),
    )?;

    // pack
    let _ = writeln!(
        s,
        "void {}::pack(Direction dir, unsigned char * byte_buffer, IBlock * block{}) const",
        class_name, stream_param
    );
    let _ = writeln!(s, "{{");
    let _ = writeln!(s, "    {}", buffer_cast);
    let _ = writeln!(s);
    let _ = writeln!(s, "{}", indent(&extraction, 4));
    let _ = writeln!(s, "    CellInterval ci;");
    let _ = writeln!(s, "    {}->getSliceBeforeGhostLayer(dir, ci, 1, false);", slice_field);
    let _ = writeln!(s);
    let _ = writeln!(s, "    switch( dir )");
    let _ = writeln!(s, "    {{");
    for g in &pack_info.groups {
        write_case(&mut s, &g.group.directions(), &generate_call(&g.pack, &slice)?);
    }
    let _ = writeln!(s, "        default:");
    let _ = writeln!(s, "            WALBERLA_ASSERT(false);");
    let _ = writeln!(s, "    }}");
    let _ = writeln!(s, "}}");
    let _ = writeln!(s);

    // unpack: the sender packed for the direction pointing at this block
    let _ = writeln!(
        s,
        "void {}::unpack(Direction dir, unsigned char * byte_buffer, IBlock * block{}) const",
        class_name, stream_param
    );
    let _ = writeln!(s, "{{");
    let _ = writeln!(s, "    {}", buffer_cast);
    let _ = writeln!(s);
    let _ = writeln!(s, "{}", indent(&extraction, 4));
    let _ = writeln!(s, "    CellInterval ci;");
    let _ = writeln!(s, "    {}->getGhostRegion(dir, ci, 1, false);", slice_field);
    let _ = writeln!(s, "    auto communicationDirection = stencil::inverseDir[dir];");
    let _ = writeln!(s);
    let _ = writeln!(s, "    switch( communicationDirection )");
    let _ = writeln!(s, "    {{");
    for g in &pack_info.groups {
        write_case(&mut s, &g.group.directions(), &generate_call(&g.unpack, &slice)?);
    }
    let _ = writeln!(s, "        default:");
    let _ = writeln!(s, "            WALBERLA_ASSERT(false);");
    let _ = writeln!(s, "    }}");
    let _ = writeln!(s, "}}");
    let _ = writeln!(s);

    // packAll
    let _ = writeln!(
        s,
        "void {}::packAll(unsigned char * byte_buffer, IBlock * block{}) const",
        class_name, stream_param
    );
    let _ = writeln!(s, "{{");
    let _ = writeln!(s, "    {}", buffer_cast);
    let _ = writeln!(s);
    let _ = writeln!(s, "{}", indent(&extraction, 4));
    let _ = writeln!(s, "    {}", interior_interval(&slice_field));
    let _ = writeln!(s);
    let _ = writeln!(s, "{}", indent(&generate_call(fused, &slice)?, 4));
    let _ = writeln!(s, "}}");
    let _ = writeln!(s);

    // size: keyed like pack, so sender and receiver agree on the byte count
    let field_decl = slice_field_extraction(pack_info, &slice_field, target)?;
    let _ = writeln!(s, "uint_t {}::size(Direction dir, IBlock * block) const", class_name);
    let _ = writeln!(s, "{{");
    let _ = writeln!(s, "    {}", field_decl);
    let _ = writeln!(s, "    CellInterval ci;");
    let _ = writeln!(s, "    {}->getGhostRegion(dir, ci, 1, false);", slice_field);
    let _ = writeln!(s);
    let _ = writeln!(s, "    uint_t elementsPerCell = 0;");
    let _ = writeln!(s, "    switch( dir )");
    let _ = writeln!(s, "    {{");
    for g in &pack_info.groups {
        write_case(
            &mut s,
            &g.group.directions(),
            &format!("elementsPerCell = {};", g.elements_per_cell),
        );
    }
    let _ = writeln!(s, "        default:");
    let _ = writeln!(s, "            elementsPerCell = 0;");
    let _ = writeln!(s, "    }}");
    let _ = writeln!(s, "    return ci.numCells() * elementsPerCell * sizeof( {} );", dtype);
    let _ = writeln!(s, "}}");
    let _ = writeln!(s);

    // sizeAll
    let _ = writeln!(s, "uint_t {}::sizeAll(IBlock * block) const", class_name);
    let _ = writeln!(s, "{{");
    let _ = writeln!(s, "    {}", field_decl);
    let _ = writeln!(s, "    {}", interior_interval(&slice_field));
    let _ = writeln!(
        s,
        "    return ci.numCells() * {} * sizeof( {} );",
        pack_info.fused_elements_per_cell, dtype
    );
    let _ = writeln!(s, "}}");
    close_namespaces(&mut s, namespace);

    info!(class = class_name, %target, groups = pack_info.groups.len(), "rendered pack info");
    Ok(Artifacts {
        header: h,
        source: s,
    })
}

fn write_case(out: &mut String, directions: &[Direction], body: &str) {
    for d in directions {
        let _ = writeln!(out, "        case stencil::{}:", d);
    }
    let _ = writeln!(out, "        {{");
    let _ = writeln!(out, "{}", indent(body, 12));
    let _ = writeln!(out, "            break;");
    let _ = writeln!(out, "        }}");
}

fn slice_field_extraction<K: Kernel>(
    pack_info: &PackInfo<K>,
    name: &str,
    target: Target,
) -> Result<String, GenError> {
    let field: &Field = pack_info
        .fused
        .field(name)
        .ok_or_else(|| GenError::config(format!("field '{}' is not packed", name)))?;
    Ok(format!(
        "auto {} = block->getData< {} >({}ID);",
        name,
        field_type(field, target),
        name
    ))
}
