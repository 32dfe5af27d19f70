// Integration tests: full generation from .sgen script text to artifacts.
//
// Uses the library API (analyze → register → render) without touching the
// filesystem. Checks the rendered classes for the structural elements the
// host framework relies on, and byte-identical output across runs.

use sgen::context::GenerationContext;
use sgen::direction::{inverse_direction, offset_to_direction, Direction};
use sgen::error::GenError;
use sgen::pipeline::generate_script;

const JACOBI: &str = "\
# 7-point Jacobi smoother with its halo exchange
field src: double
field src_tmp: double
param omega
param h = 0.25
kernel jacobi {
    src_tmp = omega * h * (src[1,0,0] + src[-1,0,0] + src[0,1,0] + src[0,-1,0] + src[0,0,1] + src[0,0,-1])
}
sweep JacobiSweep(jacobi) swap(src, src_tmp) varying(omega)
packinfo JacobiComm from jacobi pull
";

const LBM_GPU: &str = "\
field pdfs: float[19]
packinfo PdfComm for pdfs directions(N, S, E, W) target gpu namespace lbm
";

fn artifact<'a>(files: &'a [(String, String)], name: &str) -> &'a str {
    files
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, c)| c.as_str())
        .unwrap_or_else(|| panic!("no artifact {name}"))
}

#[test]
fn jacobi_sweep_and_pack_info() {
    let files = generate_script(JACOBI, &GenerationContext::default()).unwrap();
    let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["JacobiSweep.h", "JacobiSweep.cpp", "JacobiComm.h", "JacobiComm.cpp"]
    );

    let header = artifact(&files, "JacobiSweep.h");
    assert!(header.starts_with("// Generated by sgen "));
    assert!(header.contains("namespace walberla {\nnamespace sgen {"));
    assert!(header.contains("    JacobiSweep( BlockDataID srcID_, double omega_ )"));
    assert!(header.contains("std::map< GhostLayerField< double, 1 > *, GhostLayerField< double, 1 > * > cache_src_;"));

    let source = artifact(&files, "JacobiSweep.cpp");
    assert!(source.contains("static FUNC_PREFIX void jacobisweep("));
    // Concrete parameters are folded into the kernel.
    assert!(source.contains("0.25"));
    assert!(source.contains("src->swapDataPointers(src_tmp);"));
    assert!(source.contains("for( auto & entry : cache_src_ )"));

    let comm = artifact(&files, "JacobiComm.cpp");
    for key in ["W", "E", "S", "N", "B", "T"] {
        assert!(comm.contains(&format!("static FUNC_PREFIX void pack_{}(", key)), "pack_{key}");
        assert!(comm.contains(&format!("static FUNC_PREFIX void unpack_{}(", key)), "unpack_{key}");
    }
    assert!(comm.contains("static FUNC_PREFIX void pack_ALL("));
    assert!(comm.contains("switch( communicationDirection )"));
    assert!(comm.contains("auto communicationDirection = stencil::inverseDir[dir];"));
}

#[test]
fn accelerator_pack_info_for_a_field() {
    let files = generate_script(LBM_GPU, &GenerationContext::default()).unwrap();
    let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["PdfComm.h", "PdfComm.cu"]);

    let header = artifact(&files, "PdfComm.h");
    assert!(header.contains("namespace lbm {"));
    assert!(header.contains("GeneratedGPUPackInfo"));
    assert!(header.contains("cudaStream_t stream"));

    let source = artifact(&files, "PdfComm.cu");
    assert!(source.contains("#define FUNC_PREFIX __global__"));
    assert!(source.contains("static FUNC_PREFIX void pack_N_S_E_W("));
    assert!(source.contains("cudaMemcpyToSymbolAsync"));
    assert!(source.contains("float * buffer = reinterpret_cast<float *>(byte_buffer);"));
    // One declaration per constant-memory symbol in the translation unit.
    let decl = source
        .lines()
        .find(|l| l.starts_with("__constant__ int64_t _stride_pdfs"))
        .expect("stride symbol declared");
    assert_eq!(source.matches(decl).count(), 1);
}

#[test]
fn single_precision_context_changes_element_type() {
    let ctx = GenerationContext {
        double_accuracy: false,
        ..GenerationContext::default()
    };
    let files = generate_script(JACOBI, &ctx).unwrap();
    let header = artifact(&files, "JacobiSweep.h");
    // Declared fields keep their own type; varying scalars follow the context.
    assert!(header.contains("GhostLayerField< double, 1 >"));
    assert!(header.contains("float omega;"));
}

#[test]
fn generation_is_byte_identical_across_runs() {
    let ctx = GenerationContext::default();
    assert_eq!(
        generate_script(JACOBI, &ctx).unwrap(),
        generate_script(JACOBI, &ctx).unwrap()
    );
}

#[test]
fn concrete_varying_parameter_is_a_configuration_error() {
    let script = JACOBI.replace("varying(omega)", "varying(h)");
    let err = generate_script(&script, &GenerationContext::default()).unwrap_err();
    assert!(matches!(err, GenError::Configuration(_)), "{err}");
}

#[test]
fn mixed_types_surface_as_generation_errors() {
    let script = "\
field a: double
field b: float
field out: double
kernel k {
    out = a[1,0,0] + b[0,1,0]
}
packinfo Mixed from k
";
    let err = generate_script(script, &GenerationContext::default()).unwrap_err();
    assert!(matches!(err, GenError::MixedType { .. }));
}

/// Body of the generated member function `Class::name(...)`.
fn function_body<'a>(source: &'a str, signature: &str) -> &'a str {
    let start = source
        .find(signature)
        .unwrap_or_else(|| panic!("no function {signature}"));
    let rest = &source[start..];
    let end = rest.find("\n}\n").map(|e| e + 3).unwrap_or(rest.len());
    &rest[..end]
}

/// `case stencil::X:` labels of a switch body, with the first statement of
/// each case block.
fn cases(body: &str) -> Vec<(Direction, String)> {
    let mut out = Vec::new();
    let mut pending = Vec::new();
    let mut lines = body.lines().map(str::trim).peekable();
    while let Some(line) = lines.next() {
        if let Some(name) = line.strip_prefix("case stencil::").and_then(|l| l.strip_suffix(':')) {
            pending.push(name.parse::<Direction>().unwrap());
        } else if line == "{" && !pending.is_empty() {
            let first = lines.next().unwrap_or_default().to_string();
            out.extend(pending.drain(..).map(|d| (d, first.clone())));
        }
    }
    out
}

fn inverse(d: Direction) -> Direction {
    offset_to_direction(inverse_direction(d.offset())).unwrap()
}

#[test]
fn receiver_sizes_its_buffer_with_the_senders_key() {
    let script = "\
field src: double
field dst: double
kernel shift {
    dst = src[1,0,0] + src[1,1,0]
}
packinfo Comm from shift
";
    let files = generate_script(script, &GenerationContext::default()).unwrap();
    let header = artifact(&files, "Comm.h");
    let source = artifact(&files, "Comm.cpp");

    assert!(header.contains("const auto dataSize = size(stencil::inverseDir[dir], receiver);"));
    assert!(!header.contains("size(dir, receiver)"));

    let pack = cases(function_body(source, "::pack(Direction dir"));
    let unpack = cases(function_body(source, "::unpack(Direction dir"));
    let size = cases(function_body(source, "::size(Direction dir"));
    assert!(!pack.is_empty());

    // Groups exist only on the west and south side, so keying the receiver
    // by its raw receive direction would miss every case.
    for (send, _) in &pack {
        let receive = inverse(*send);
        let key = inverse(receive);
        assert!(pack.iter().all(|(d, _)| *d != receive), "spec is symmetric in {send}");

        let sent = size.iter().find(|(d, _)| *d == *send).map(|(_, s)| s.clone());
        let received = size.iter().find(|(d, _)| *d == key).map(|(_, s)| s.clone());
        assert_eq!(sent, received, "size for {send}");
        assert!(sent.is_some_and(|s| s != "elementsPerCell = 0;"));
        assert!(unpack.iter().any(|(d, _)| *d == key), "no unpack case for {key}");
    }
}

#[test]
fn inner_outer_sweep_splits_the_interior() {
    let script = JACOBI.replace("varying(omega)", "varying(omega) inner_outer");
    let files = generate_script(&script, &GenerationContext::default()).unwrap();

    let header = artifact(&files, "JacobiSweep.h");
    assert!(header.contains("    void inner( IBlock * block );"));
    assert!(header.contains("    void outer( IBlock * block );"));
    assert!(header.contains("std::vector< CellInterval > outerLayers_;"));
    assert!(!header.contains("runOnCellInterval"));

    let source = artifact(&files, "JacobiSweep.cpp");
    let inner = function_body(source, "::inner( IBlock * block )");
    assert!(inner.contains("CellInterval inner = src->xyzSize();"));
    assert!(inner.contains("inner.expand( -1 );"));
    assert!(inner.contains("src->dataAt(inner.xMin()"), "{inner}");
    assert!(!inner.contains("swapDataPointers"));

    let outer = function_body(source, "::outer( IBlock * block )");
    assert_eq!(outer.matches("outerLayers_.push_back( ci );").count(), 6);
    assert!(outer.contains("for( const auto & ci : outerLayers_ )"));
    assert!(outer.contains("internal::jacobisweep("));
    // The swap runs once, after every layer.
    let call = outer.rfind("internal::jacobisweep(").unwrap();
    let swap = outer.find("src->swapDataPointers(src_tmp);").unwrap();
    assert!(call < swap);
    assert_eq!(outer.matches("swapDataPointers").count(), 1);
}

#[test]
fn accelerator_inner_outer_sweep_launches_layers_on_its_stream() {
    let script = "\
field f: double
field f_tmp: double
kernel smooth {
    f_tmp = f[1,0,0] + f[-1,0,0]
}
sweep Smooth(smooth) swap(f, f_tmp) inner_outer target gpu
";
    let files = generate_script(script, &GenerationContext::default()).unwrap();
    let header = artifact(&files, "Smooth.h");
    assert!(header.contains("cudaStream_t stream;"));
    let source = artifact(&files, "Smooth.cu");
    let outer = function_body(source, "::outer( IBlock * block )");
    assert!(outer.contains("<<<_grid, _block, 0, stream>>>"));
    let inner = function_body(source, "::inner( IBlock * block )");
    assert!(inner.contains("<<<_grid, _block, 0, stream>>>"));
}
