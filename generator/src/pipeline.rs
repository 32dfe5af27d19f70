// pipeline.rs — Script front end and request orchestration
//
// Runs the front end (lex, parse, resolve) over a generation script, then
// turns every resolved request into a build registration whose callback
// synthesizes the kernels and renders the header/source pair.
//
// Preconditions: none.
// Postconditions: registrations exist only for a script without error-level
//                 diagnostics; accelerator requests are skipped when the
//                 context disables them.
// Failure modes: front-end diagnostics (reported, not raised); `GenError`
//                from synthesis or rendering when a callback runs.
// Side effects: none (logs skipped requests at info level).

use std::fmt::Write as _;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::context::{default_compile_params, GenerationContext};
use crate::diag::Diagnostic;
use crate::emit::{render_pack_info, render_sweep, Artifacts, SweepLayout};
use crate::error::GenError;
use crate::loop_kernel::LoopKernelCompiler;
use crate::pack_spec::PackSpecBuilder;
use crate::packinfo::generate_pack_info;
use crate::registry::BuildRegistry;
use crate::resolve::{PackSourceRef, Request, ResolvedScript};
use crate::sweep::{generate_sweep, SweepRequest};

// ── Provenance ─────────────────────────────────────────────────────────────

/// Identifies the inputs an artifact was rendered from.
///
/// `source_hash`: SHA-256 of the raw script text.
/// `context_fingerprint`: SHA-256 of the compact JSON form of the context.
/// `generator_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub context_fingerprint: [u8; 32],
    pub generator_version: &'static str,
}

impl Provenance {
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    pub fn context_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.context_fingerprint)
    }

    /// Comment block opening every artifact.
    pub fn banner(&self) -> String {
        format!(
            "// Generated by sgen {}. Do not edit.\n// script sha256:  {}\n// context sha256: {}\n",
            self.generator_version,
            self.source_hash_hex(),
            self.context_fingerprint_hex(),
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

pub fn compute_provenance(source: &str, ctx: &GenerationContext) -> Provenance {
    // Field order of the derived serializer is fixed, so the JSON is canonical.
    let canonical = serde_json::to_string(ctx).unwrap_or_default();
    Provenance {
        source_hash: sha256(source.as_bytes()),
        context_fingerprint: sha256(canonical.as_bytes()),
        generator_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Front end ──────────────────────────────────────────────────────────────

/// Outcome of the front end. `resolved` is `None` when any error-level
/// diagnostic was produced.
#[derive(Debug)]
pub struct FrontEnd {
    pub resolved: Option<ResolvedScript>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FrontEnd {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

pub fn analyze(source: &str) -> FrontEnd {
    let parsed = crate::parser::parse(source);
    let mut diagnostics = parsed.diagnostics;
    let script = match parsed.script {
        Some(s) if !diagnostics.iter().any(Diagnostic::is_error) => s,
        _ => {
            return FrontEnd {
                resolved: None,
                diagnostics,
            }
        }
    };
    debug!(statements = script.statements.len(), "parsed script");

    let result = crate::resolve::resolve(&script);
    diagnostics.extend(result.diagnostics);
    let resolved = if diagnostics.iter().any(Diagnostic::is_error) {
        None
    } else {
        debug!(
            fields = result.resolved.fields.len(),
            kernels = result.resolved.kernels.len(),
            requests = result.resolved.requests.len(),
            "resolved script"
        );
        Some(result.resolved)
    };
    FrontEnd {
        resolved,
        diagnostics,
    }
}

// ── Requests ───────────────────────────────────────────────────────────────

/// `{Class}.h` plus `{Class}.cpp` or `{Class}.cu`.
pub fn output_files(request: &Request) -> Vec<String> {
    let class = request.class_name();
    vec![
        format!("{}.h", class),
        format!("{}.{}", class, request.target().source_extension()),
    ]
}

/// Register one callback per request the context supports.
pub fn register_requests<'a>(
    registry: &mut BuildRegistry<'a>,
    script: &'a ResolvedScript,
    ctx: &'a GenerationContext,
    provenance: &'a Provenance,
) -> Result<(), GenError> {
    for request in &script.requests {
        if !ctx.supports(request.target()) {
            info!(
                class = request.class_name(),
                target = %request.target(),
                "skipping request: accelerator generation is disabled"
            );
            continue;
        }
        registry.register(
            output_files(request),
            Box::new(move || {
                generate_request(script, request, ctx, provenance).map(Artifacts::into_vec)
            }),
        )?;
    }
    Ok(())
}

/// Synthesize and render one request.
pub fn generate_request(
    script: &ResolvedScript,
    request: &Request,
    ctx: &GenerationContext,
    provenance: &Provenance,
) -> Result<Artifacts, GenError> {
    let params = default_compile_params(ctx, request.target());
    let compiler = LoopKernelCompiler::new();
    let namespace = request.namespace().unwrap_or(&ctx.namespace);

    match request {
        Request::Sweep(s) => {
            let kernel = script
                .kernels
                .get(&s.kernel)
                .ok_or_else(|| GenError::config(format!("unknown kernel '{}'", s.kernel)))?;
            let sweep = SweepRequest {
                class_name: s.class_name.clone(),
                assignments: kernel.assignments.clone(),
                constants: script
                    .constants()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
                field_swaps: s.swaps.clone(),
                varying: s.varying.clone(),
            };
            let info = generate_sweep(&sweep, &compiler, &params)?;
            let layout = if s.inner_outer {
                SweepLayout::InnerOuter
            } else {
                SweepLayout::Whole
            };
            render_sweep(&info, &s.class_name, namespace, layout, provenance)
        }
        Request::PackInfo(p) => {
            let spec = match &p.source {
                PackSourceRef::Kernel(name) => {
                    let kernel = script
                        .kernels
                        .get(name)
                        .ok_or_else(|| GenError::config(format!("unknown kernel '{}'", name)))?;
                    PackSpecBuilder::from_kernel(&kernel.assignments, p.kind)?
                }
                PackSourceRef::Field(name) => {
                    let field = script
                        .fields
                        .get(name)
                        .ok_or_else(|| GenError::config(format!("unknown field '{}'", name)))?;
                    PackSpecBuilder::for_field(field, p.directions.as_deref())?
                }
            };
            let info = generate_pack_info(&spec, &compiler, &params)?;
            render_pack_info(&info, &p.class_name, namespace, provenance)
        }
    }
}

/// Front end plus rendering of every supported request, without touching
/// the filesystem. Returns `(file name, content)` pairs.
pub fn generate_script(
    source: &str,
    ctx: &GenerationContext,
) -> Result<Vec<(String, String)>, GenError> {
    let front = analyze(source);
    let count = front.error_count();
    let Some(script) = front.resolved else {
        return Err(GenError::Script { count });
    };
    let provenance = compute_provenance(source, ctx);
    let mut registry = BuildRegistry::new();
    register_requests(&mut registry, &script, ctx, &provenance)?;
    registry.render()
}

// ── Tests ──────────────────────────────────────────────────────────────────
