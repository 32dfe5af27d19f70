// resolve.rs — Name resolution for generation scripts
//
// Walks the parsed AST, builds the symbol tables for fields, parameters and
// kernels, lowers kernel bodies to symbolic assignments and checks every
// generation request against those tables.
//
// Preconditions: `script` is a well-formed AST from the parser.
// Postconditions: returns resolution tables plus all accumulated diagnostics.
//                 Tables only contain entries that resolved cleanly.
// Failure modes: unknown names, duplicate definitions, bad indices and
//                inconsistent request options produce `Diagnostic` entries.
//                Resolution continues past errors.
// Side effects: none.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::{self, AccessExpr, BinaryOp, Ident, RequestOption, Span, StatementKind};
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::direction::{Direction, Offset};
use crate::field::{shape_product, Assignment, BinOp, DType, Expr as SymExpr, Field, FieldAccess};
use crate::kernel::{FieldSwap, Target};
use crate::pack_spec::StencilKind;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ResolveResult {
    pub resolved: ResolvedScript,
    pub diagnostics: Vec<Diagnostic>,
}

/// Symbol tables and requests in declaration order.
#[derive(Debug, Default)]
pub struct ResolvedScript {
    pub fields: IndexMap<String, Field>,
    pub params: IndexMap<String, ParamEntry>,
    pub kernels: IndexMap<String, KernelEntry>,
    pub requests: Vec<Request>,
}

impl ResolvedScript {
    /// Parameters with a concrete value.
    pub fn constants(&self) -> impl Iterator<Item = (&str, f64)> {
        self.params
            .iter()
            .filter_map(|(name, p)| p.value.map(|v| (name.as_str(), v)))
    }
}

#[derive(Debug, Clone)]
pub struct ParamEntry {
    pub value: Option<f64>,
    pub name_span: Span,
}

#[derive(Debug, Clone)]
pub struct KernelEntry {
    pub assignments: Vec<Assignment>,
    pub name_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Sweep(SweepEntry),
    PackInfo(PackInfoEntry),
}

impl Request {
    pub fn class_name(&self) -> &str {
        match self {
            Request::Sweep(s) => &s.class_name,
            Request::PackInfo(p) => &p.class_name,
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Request::Sweep(s) => s.target,
            Request::PackInfo(p) => p.target,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Request::Sweep(s) => s.namespace.as_deref(),
            Request::PackInfo(p) => p.namespace.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    pub class_name: String,
    pub kernel: String,
    pub target: Target,
    pub namespace: Option<String>,
    pub swaps: Vec<FieldSwap>,
    pub varying: Vec<String>,
    /// Render separate `inner`/`outer` entry points.
    pub inner_outer: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackSourceRef {
    Kernel(String),
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackInfoEntry {
    pub class_name: String,
    pub source: PackSourceRef,
    pub target: Target,
    pub namespace: Option<String>,
    pub kind: StencilKind,
    /// Explicit direction subset; `None` means every communication direction.
    pub directions: Option<Vec<Direction>>,
    pub span: Span,
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn resolve(script: &ast::Script) -> ResolveResult {
    let mut ctx = ResolveCtx::default();

    // Pass 1: fields and parameters (kernels may reference later declarations)
    ctx.collect_symbols(script);

    // Pass 2: kernel bodies
    ctx.resolve_kernels(script);

    // Pass 3: requests
    ctx.resolve_requests(script);

    ResolveResult {
        resolved: ctx.resolved,
        diagnostics: ctx.diagnostics,
    }
}

// ── Internal context ────────────────────────────────────────────────────────

#[derive(Default)]
struct ResolveCtx {
    resolved: ResolvedScript,
    diagnostics: Vec<Diagnostic>,
    /// Declaration site of every field and parameter name.
    symbol_spans: HashMap<String, Span>,
}

impl ResolveCtx {
    fn error(&mut self, code: DiagCode, span: Span, message: String) {
        self.diagnostics.push(Diagnostic::error(code, span, message));
    }

    fn duplicate(&mut self, what: &str, ident: &Ident, first: Span) {
        self.diagnostics.push(
            Diagnostic::error(
                codes::E0202,
                ident.span,
                format!("duplicate {} '{}'", what, ident.name),
            )
            .with_related(first, "first defined here"),
        );
    }

    // ── Pass 1: fields and parameters ───────────────────────────────────

    fn collect_symbols(&mut self, script: &ast::Script) {
        for stmt in &script.statements {
            match &stmt.kind {
                StatementKind::Field(f) => self.collect_field(f),
                StatementKind::Param(p) => {
                    if let Some(&first) = self.symbol_spans.get(&p.name.name) {
                        self.duplicate("name", &p.name, first);
                        continue;
                    }
                    self.symbol_spans.insert(p.name.name.clone(), p.name.span);
                    self.resolved.params.insert(
                        p.name.name.clone(),
                        ParamEntry {
                            value: p.value.map(|(v, _)| v),
                            name_span: p.name.span,
                        },
                    );
                }
                StatementKind::Kernel(_) | StatementKind::Sweep(_) | StatementKind::PackInfo(_) => {}
            }
        }
    }

    fn collect_field(&mut self, f: &ast::FieldStmt) {
        if let Some(&first) = self.symbol_spans.get(&f.name.name) {
            self.duplicate("name", &f.name, first);
            return;
        }
        self.symbol_spans.insert(f.name.name.clone(), f.name.span);

        let Some(dtype) = DType::parse(&f.dtype.name) else {
            self.diagnostics.push(
                Diagnostic::error(
                    codes::E0203,
                    f.dtype.span,
                    format!("unknown element type '{}'", f.dtype.name),
                )
                .with_hint("expected one of: double, float, int32, int64"),
            );
            return;
        };

        let mut shape = Vec::with_capacity(f.index_shape.len());
        for &(extent, span) in &f.index_shape {
            if extent == 0 {
                self.error(
                    codes::E0215,
                    span,
                    format!("index extent of field '{}' must be positive", f.name.name),
                );
                return;
            }
            let extent = usize::try_from(extent).ok();
            match extent.and_then(|e| shape_product(&shape)?.checked_mul(e).map(|_| e)) {
                Some(e) => shape.push(e),
                None => {
                    self.error(
                        codes::E0215,
                        span,
                        format!("field '{}' stores too many values per cell", f.name.name),
                    );
                    return;
                }
            }
        }

        self.resolved.fields.insert(
            f.name.name.clone(),
            Field::new(f.name.name.clone(), dtype).with_index_shape(shape),
        );
    }

    // ── Pass 2: kernel bodies ───────────────────────────────────────────

    fn resolve_kernels(&mut self, script: &ast::Script) {
        for stmt in &script.statements {
            let StatementKind::Kernel(k) = &stmt.kind else {
                continue;
            };
            if let Some(first) = self.resolved.kernels.get(&k.name.name) {
                let first = first.name_span;
                self.duplicate("kernel", &k.name, first);
                continue;
            }
            if k.assignments.is_empty() {
                self.error(
                    codes::E0212,
                    k.name.span,
                    format!("kernel '{}' has no assignments", k.name.name),
                );
                continue;
            }

            let errors_before = self.diagnostics.len();
            let mut assignments = Vec::with_capacity(k.assignments.len());
            for a in &k.assignments {
                let lhs = self.resolve_write(&a.lhs);
                let rhs = self.resolve_expr(&a.rhs);
                if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                    assignments.push(Assignment::new(lhs, rhs));
                }
            }
            if self.diagnostics.len() == errors_before {
                self.resolved.kernels.insert(
                    k.name.name.clone(),
                    KernelEntry {
                        assignments,
                        name_span: k.name.span,
                    },
                );
            }
        }
    }

    fn resolve_write(&mut self, access: &AccessExpr) -> Option<FieldAccess> {
        if !self.resolved.fields.contains_key(&access.name.name)
            && self.resolved.params.contains_key(&access.name.name)
        {
            self.error(
                codes::E0213,
                access.name.span,
                format!("cannot assign to parameter '{}'", access.name.name),
            );
            return None;
        }
        self.resolve_field_access(access)
    }

    fn resolve_expr(&mut self, expr: &ast::Expr) -> Option<SymExpr> {
        match expr {
            ast::Expr::Number(v, _) => Some(SymExpr::Number(*v)),
            ast::Expr::Neg(inner, _) => self
                .resolve_expr(inner)
                .map(|e| SymExpr::Neg(Box::new(e))),
            ast::Expr::Binary(op, lhs, rhs, _) => {
                // Resolve both sides so every error is reported.
                let l = self.resolve_expr(lhs);
                let r = self.resolve_expr(rhs);
                let op = match op {
                    BinaryOp::Add => BinOp::Add,
                    BinaryOp::Sub => BinOp::Sub,
                    BinaryOp::Mul => BinOp::Mul,
                    BinaryOp::Div => BinOp::Div,
                };
                Some(SymExpr::binary(op, l?, r?))
            }
            ast::Expr::Access(access) => self.resolve_read(access),
        }
    }

    /// A bare name is a field's center value when such a field exists,
    /// otherwise a parameter.
    fn resolve_read(&mut self, access: &AccessExpr) -> Option<SymExpr> {
        let name = &access.name.name;
        if self.resolved.fields.contains_key(name) {
            return self.resolve_field_access(access).map(SymExpr::Access);
        }
        if self.resolved.params.contains_key(name) {
            if access.offset.is_some() || access.index.is_some() {
                self.error(
                    codes::E0207,
                    access.span,
                    format!("parameter '{}' cannot be indexed", name),
                );
                return None;
            }
            return Some(SymExpr::Symbol(name.clone()));
        }
        self.unknown_symbol(&access.name);
        None
    }

    fn unknown_symbol(&mut self, ident: &Ident) {
        // Declarations that failed to resolve were already reported.
        if self.symbol_spans.contains_key(&ident.name) {
            return;
        }
        self.diagnostics.push(
            Diagnostic::error(
                codes::E0201,
                ident.span,
                format!("unknown field or parameter '{}'", ident.name),
            )
            .with_hint(format!(
                "declare it with `field {}: double` or `param {}`",
                ident.name, ident.name
            )),
        );
    }

    fn resolve_field_access(&mut self, access: &AccessExpr) -> Option<FieldAccess> {
        let Some(field) = self.resolved.fields.get(&access.name.name).cloned() else {
            self.unknown_symbol(&access.name);
            return None;
        };

        let offset = match access.offset {
            None => Offset::ZERO,
            Some(([x, y, z], span)) => {
                match (i32::try_from(x), i32::try_from(y), i32::try_from(z)) {
                    (Ok(x), Ok(y), Ok(z)) => Offset::new(x, y, z),
                    _ => {
                        self.error(codes::E0206, span, "offset component out of range".into());
                        return None;
                    }
                }
            }
        };

        let (index, index_span) = match &access.index {
            Some((idx, span)) => (idx.clone(), *span),
            None => (Vec::new(), access.span),
        };
        if index.len() != field.index_dimensions() {
            self.error(
                codes::E0207,
                index_span,
                format!(
                    "field '{}' takes {} index value(s), got {}",
                    field.name,
                    field.index_dimensions(),
                    index.len()
                ),
            );
            return None;
        }
        let mut resolved_index = Vec::with_capacity(index.len());
        for (i, (&value, &extent)) in index.iter().zip(&field.index_shape).enumerate() {
            if value as usize >= extent {
                self.error(
                    codes::E0206,
                    index_span,
                    format!(
                        "index {} of field '{}' is {} but the extent is {}",
                        i, field.name, value, extent
                    ),
                );
                return None;
            }
            resolved_index.push(value as usize);
        }

        Some(field.at(offset, resolved_index))
    }

    // ── Pass 3: requests ────────────────────────────────────────────────

    fn resolve_requests(&mut self, script: &ast::Script) {
        let mut classes: HashMap<String, Span> = HashMap::new();
        for stmt in &script.statements {
            let class_name = match &stmt.kind {
                StatementKind::Sweep(s) => &s.class_name,
                StatementKind::PackInfo(p) => &p.class_name,
                _ => continue,
            };
            if let Some(&first) = classes.get(&class_name.name) {
                self.duplicate("class", class_name, first);
                continue;
            }
            classes.insert(class_name.name.clone(), class_name.span);

            let request = match &stmt.kind {
                StatementKind::Sweep(s) => self.resolve_sweep(s, stmt.span).map(Request::Sweep),
                StatementKind::PackInfo(p) => {
                    self.resolve_packinfo(p, stmt.span).map(Request::PackInfo)
                }
                _ => None,
            };
            if let Some(request) = request {
                self.resolved.requests.push(request);
            }
        }
    }

    fn resolve_sweep(&mut self, s: &ast::SweepStmt, span: Span) -> Option<SweepEntry> {
        let errors_before = self.diagnostics.len();
        let common = self.resolve_common_options(&s.options);
        let mut swaps = Vec::new();
        let mut varying = Vec::new();
        let mut inner_outer = false;

        for option in &s.options {
            match option {
                RequestOption::Swap(a, b, span) => {
                    if let Some(swap) = self.resolve_swap(a, b, *span, &swaps) {
                        swaps.push(swap);
                    }
                }
                RequestOption::Varying(names) => {
                    for n in names {
                        if !self.resolved.params.contains_key(&n.name) {
                            self.diagnostics.push(Diagnostic::error(
                                codes::E0201,
                                n.span,
                                format!("unknown parameter '{}'", n.name),
                            ));
                        } else if !varying.contains(&n.name) {
                            varying.push(n.name.clone());
                        }
                    }
                }
                RequestOption::InnerOuter(span) => {
                    if inner_outer {
                        self.error(codes::E0214, *span, "inner_outer given twice".into());
                    }
                    inner_outer = true;
                }
                RequestOption::Directions(_, span) | RequestOption::Kind(_, span) => {
                    self.error(
                        codes::E0211,
                        *span,
                        "option is only valid for packinfo requests".into(),
                    );
                }
                RequestOption::Target(_) | RequestOption::Namespace(_) => {}
            }
        }

        if !self.resolved.kernels.contains_key(&s.kernel.name) {
            self.unknown_kernel(&s.kernel);
        }

        if self.diagnostics.len() != errors_before {
            return None;
        }
        Some(SweepEntry {
            class_name: s.class_name.name.clone(),
            kernel: s.kernel.name.clone(),
            target: common.target,
            namespace: common.namespace,
            swaps,
            varying,
            inner_outer,
            span,
        })
    }

    fn resolve_swap(
        &mut self,
        a: &Ident,
        b: &Ident,
        span: Span,
        earlier: &[FieldSwap],
    ) -> Option<FieldSwap> {
        let (Some(fa), Some(fb)) = (
            self.resolved.fields.get(&a.name).cloned(),
            self.resolved.fields.get(&b.name).cloned(),
        ) else {
            for ident in [a, b] {
                if !self.resolved.fields.contains_key(&ident.name) {
                    self.unknown_symbol(ident);
                }
            }
            return None;
        };
        if fa.name == fb.name {
            self.error(
                codes::E0209,
                span,
                format!("field '{}' cannot be swapped with itself", fa.name),
            );
            return None;
        }
        if fa.dtype != fb.dtype || fa.index_shape != fb.index_shape {
            self.diagnostics.push(
                Diagnostic::error(
                    codes::E0209,
                    span,
                    format!(
                        "swap partners '{}' and '{}' differ in element type or index shape",
                        fa.name, fb.name
                    ),
                )
                .with_hint("declare the temporary exactly like the field it replaces"),
            );
            return None;
        }
        for name in [&fa.name, &fb.name] {
            if earlier.iter().any(|s| &s.field == name || &s.temporary == name) {
                self.error(
                    codes::E0210,
                    span,
                    format!("field '{}' takes part in more than one swap", name),
                );
                return None;
            }
        }
        Some(FieldSwap {
            field: fa.name,
            temporary: fb.name,
        })
    }

    fn resolve_packinfo(&mut self, p: &ast::PackInfoStmt, span: Span) -> Option<PackInfoEntry> {
        let errors_before = self.diagnostics.len();
        let common = self.resolve_common_options(&p.options);
        let mut kind: Option<StencilKind> = None;
        let mut directions: Option<Vec<Direction>> = None;

        let source = match &p.source {
            ast::PackSource::Kernel(k) => {
                if !self.resolved.kernels.contains_key(&k.name) {
                    self.unknown_kernel(k);
                }
                PackSourceRef::Kernel(k.name.clone())
            }
            ast::PackSource::Field(f) => {
                if !self.resolved.fields.contains_key(&f.name) {
                    self.unknown_symbol(f);
                }
                PackSourceRef::Field(f.name.clone())
            }
        };

        for option in &p.options {
            match option {
                RequestOption::Kind(k, span) => {
                    if matches!(source, PackSourceRef::Field(_)) {
                        self.error(
                            codes::E0211,
                            *span,
                            "stencil kind only applies to packinfo requests derived from a kernel"
                                .into(),
                        );
                    } else if kind.is_some() {
                        self.error(codes::E0214, *span, "stencil kind given twice".into());
                    } else {
                        kind = Some(match k {
                            ast::StencilKindKw::Pull => StencilKind::Pull,
                            ast::StencilKindKw::Push => StencilKind::Push,
                        });
                    }
                }
                RequestOption::Directions(names, span) => {
                    if matches!(source, PackSourceRef::Kernel(_)) {
                        self.error(
                            codes::E0211,
                            *span,
                            "directions only apply to packinfo requests for a field".into(),
                        );
                    } else if directions.is_some() {
                        self.error(codes::E0214, *span, "directions given twice".into());
                    } else {
                        directions = Some(self.resolve_directions(names));
                    }
                }
                RequestOption::Swap(_, _, span) => {
                    self.error(
                        codes::E0211,
                        *span,
                        "swap is only valid for sweep requests".into(),
                    );
                }
                RequestOption::Varying(names) => {
                    let span = names.first().map(|n| n.span).unwrap_or(span);
                    self.error(
                        codes::E0211,
                        span,
                        "varying is only valid for sweep requests".into(),
                    );
                }
                RequestOption::InnerOuter(span) => {
                    self.error(
                        codes::E0211,
                        *span,
                        "inner_outer is only valid for sweep requests".into(),
                    );
                }
                RequestOption::Target(_) | RequestOption::Namespace(_) => {}
            }
        }

        if self.diagnostics.len() != errors_before {
            return None;
        }
        Some(PackInfoEntry {
            class_name: p.class_name.name.clone(),
            source,
            target: common.target,
            namespace: common.namespace,
            kind: kind.unwrap_or_default(),
            directions,
            span,
        })
    }

    fn resolve_directions(&mut self, names: &[Ident]) -> Vec<Direction> {
        let mut out = Vec::with_capacity(names.len());
        for n in names {
            match n.name.parse::<Direction>() {
                Ok(Direction::C) => self.error(
                    codes::E0205,
                    n.span,
                    "the center 'C' is not a communication direction".into(),
                ),
                Ok(d) => {
                    if !out.contains(&d) {
                        out.push(d);
                    }
                }
                Err(message) => self.diagnostics.push(
                    Diagnostic::error(codes::E0205, n.span, message)
                        .with_hint("directions are written like N, S, TNE, BW"),
                ),
            }
        }
        out
    }

    fn unknown_kernel(&mut self, ident: &Ident) {
        self.error(
            codes::E0208,
            ident.span,
            format!("unknown kernel '{}'", ident.name),
        );
    }

    /// Target and namespace, shared by both request kinds.
    fn resolve_common_options(&mut self, options: &[RequestOption]) -> CommonOptions {
        let mut target: Option<Target> = None;
        let mut namespace: Option<String> = None;
        for option in options {
            match option {
                RequestOption::Target(t) => {
                    if target.is_some() {
                        self.error(codes::E0214, t.span, "target given twice".into());
                        continue;
                    }
                    match Target::parse(&t.name) {
                        Some(parsed) => target = Some(parsed),
                        None => self.diagnostics.push(
                            Diagnostic::error(
                                codes::E0204,
                                t.span,
                                format!("unknown target '{}'", t.name),
                            )
                            .with_hint("expected 'cpu' or 'gpu'"),
                        ),
                    }
                }
                RequestOption::Namespace(ns) => {
                    if namespace.is_some() {
                        self.error(codes::E0214, ns.span, "namespace given twice".into());
                    } else {
                        namespace = Some(ns.name.clone());
                    }
                }
                _ => {}
            }
        }
        CommonOptions {
            target: target.unwrap_or(Target::Cpu),
            namespace,
        }
    }
}

struct CommonOptions {
    target: Target,
    namespace: Option<String>,
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolve_source(source: &str) -> ResolveResult {
        let parsed = parse(source);
        assert!(
            parsed.diagnostics.is_empty(),
            "parse errors: {:?}",
            parsed.diagnostics
        );
        resolve(&parsed.script.expect("parse failed"))
    }

    fn resolve_ok(source: &str) -> ResolvedScript {
        let result = resolve_source(source);
        assert!(
            result.diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            result.diagnostics
        );
        result.resolved
    }

    fn codes_of(source: &str) -> Vec<DiagCode> {
        resolve_source(source)
            .diagnostics
            .into_iter()
            .filter_map(|d| d.code)
            .collect()
    }

    const JACOBI: &str = "\
field src: double
field src_tmp: double
param omega
param dt = 0.5
kernel jacobi {
  src_tmp = omega * (src[1,0,0] + src[-1,0,0]) * dt
}
sweep Jacobi(jacobi) target cpu swap(src, src_tmp) varying(omega)
packinfo JacobiComm from jacobi pull target gpu
";

    #[test]
    fn resolves_tables_and_requests() {
        let r = resolve_ok(JACOBI);
        assert_eq!(r.fields.len(), 2);
        assert_eq!(r.params["dt"].value, Some(0.5));
        assert_eq!(r.constants().collect::<Vec<_>>(), vec![("dt", 0.5)]);

        let kernel = &r.kernels["jacobi"];
        assert_eq!(kernel.assignments.len(), 1);
        assert_eq!(kernel.assignments[0].lhs.to_string(), "src_tmp_C");
        let reads: Vec<String> = kernel.assignments[0]
            .reads()
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(reads, vec!["src_E", "src_W"]);

        assert_eq!(r.requests.len(), 2);
        let Request::Sweep(s) = &r.requests[0] else {
            panic!("expected sweep");
        };
        assert_eq!(s.swaps, vec![FieldSwap { field: "src".into(), temporary: "src_tmp".into() }]);
        assert_eq!(s.varying, vec!["omega"]);
        assert_eq!(r.requests[1].target(), Target::Gpu);
    }

    #[test]
    fn indexed_field_access() {
        let r = resolve_ok("field pdfs: double[19]\nfield out: double\nkernel k {\n  out = pdfs[0,1,0](2)\n}\n");
        let reads = r.kernels["k"].assignments[0].reads();
        assert_eq!(reads[0].index, vec![2]);
        assert_eq!(reads[0].offset, Offset::new(0, 1, 0));
    }

    #[test]
    fn unknown_name_is_reported() {
        assert_eq!(codes_of("field a: double\nkernel k {\n  a = b\n}"), vec![codes::E0201]);
    }

    #[test]
    fn duplicate_names_are_reported() {
        assert_eq!(codes_of("field a: double\nparam a"), vec![codes::E0202]);
        assert_eq!(
            codes_of("field a: double\nkernel k {\n a = 1\n}\nsweep K(k)\nsweep K(k)"),
            vec![codes::E0202]
        );
    }

    #[test]
    fn bad_element_type_and_target() {
        assert_eq!(codes_of("field a: complex"), vec![codes::E0203]);
        assert_eq!(
            codes_of("field a: double\nkernel k {\n a = 1\n}\nsweep K(k) target fpga"),
            vec![codes::E0204]
        );
    }

    #[test]
    fn index_checks() {
        assert_eq!(
            codes_of("field p: double[3]\nfield o: double\nkernel k {\n o = p(3)\n}"),
            vec![codes::E0206]
        );
        assert_eq!(
            codes_of("field p: double[3]\nfield o: double\nkernel k {\n o = p\n}"),
            vec![codes::E0207]
        );
    }

    #[test]
    fn swap_checks() {
        assert_eq!(
            codes_of("field a: double\nfield b: float\nkernel k {\n b = a\n}\nsweep K(k) swap(a, b)"),
            vec![codes::E0209]
        );
        assert_eq!(
            codes_of(
                "field a: double\nfield b: double\nfield c: double\nkernel k {\n b = a\n}\nsweep K(k) swap(a, b) swap(a, c)"
            ),
            vec![codes::E0210]
        );
    }

    #[test]
    fn directions_are_resolved() {
        let r = resolve_ok("field pdfs: double[19]\npackinfo P for pdfs directions(N, S, N)");
        let Request::PackInfo(p) = &r.requests[0] else {
            panic!("expected packinfo");
        };
        assert_eq!(p.directions, Some(vec![Direction::N, Direction::S]));
        assert_eq!(codes_of("field a: double\npackinfo P for a directions(UP)"), vec![codes::E0205]);
        assert_eq!(codes_of("field a: double\npackinfo P for a directions(C)"), vec![codes::E0205]);
    }

    #[test]
    fn option_placement() {
        assert_eq!(codes_of("field a: double\npackinfo P for a push"), vec![codes::E0211]);
        assert_eq!(
            codes_of("field a: double\nkernel k {\n a = 1\n}\nsweep K(k) target cpu target gpu"),
            vec![codes::E0214]
        );
        assert_eq!(codes_of("packinfo P from nothing"), vec![codes::E0208]);
    }

    #[test]
    fn oversized_index_shape_is_rejected() {
        assert_eq!(
            codes_of("field t: double[4294967296, 4294967296, 4294967296]"),
            vec![codes::E0215]
        );
        assert_eq!(codes_of("field t: double[0]"), vec![codes::E0215]);
        assert_eq!(resolve_ok("field t: double[3, 3]").fields["t"].values_per_cell(), 9);
    }

    #[test]
    fn inner_outer_is_a_sweep_option() {
        let r = resolve_ok("field a: double\nfield b: double\nkernel k {\n b = a[1,0,0]\n}\nsweep K(k) inner_outer");
        let Request::Sweep(s) = &r.requests[0] else {
            panic!("expected sweep");
        };
        assert!(s.inner_outer);
        assert_eq!(
            codes_of("field a: double\nkernel k {\n a = 1\n}\nsweep K(k) inner_outer inner_outer"),
            vec![codes::E0214]
        );
        assert_eq!(codes_of("field a: double\npackinfo P for a inner_outer"), vec![codes::E0211]);
    }

    #[test]
    fn parameters_are_not_assignable() {
        assert_eq!(codes_of("param a\nkernel k {\n a = 1\n}"), vec![codes::E0213]);
    }
}
