// AST node types for .sgen generation scripts.
//
// Every node carries a `SimpleSpan` for error reporting in resolution.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete script: a sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Field(FieldStmt),
    Param(ParamStmt),
    Kernel(KernelStmt),
    Sweep(SweepStmt),
    PackInfo(PackInfoStmt),
}

// ── field_stmt: 'field' IDENT ':' IDENT ('[' INT (',' INT)* ']')? ──

#[derive(Debug, Clone, PartialEq)]
pub struct FieldStmt {
    pub name: Ident,
    pub dtype: Ident,
    pub index_shape: Vec<(u64, Span)>,
}

// ── param_stmt: 'param' IDENT ('=' signed_number)? ──

#[derive(Debug, Clone, PartialEq)]
pub struct ParamStmt {
    pub name: Ident,
    pub value: Option<(f64, Span)>,
}

// ── kernel_stmt: 'kernel' IDENT '{' assignment* '}' ──

#[derive(Debug, Clone, PartialEq)]
pub struct KernelStmt {
    pub name: Ident,
    pub assignments: Vec<AssignStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub lhs: AccessExpr,
    pub rhs: Expr,
    pub span: Span,
}

/// `name`, `name[dx,dy,dz]`, `name(i, ...)` or both.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessExpr {
    pub name: Ident,
    pub offset: Option<([i64; 3], Span)>,
    pub index: Option<(Vec<u64>, Span)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Access(AccessExpr),
    Number(f64, Span),
    Neg(Box<Expr>, Span),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Access(a) => a.span,
            Expr::Number(_, s) | Expr::Neg(_, s) | Expr::Binary(_, _, _, s) => *s,
        }
    }
}

// ── Requests ──

/// Clauses shared by every request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOption {
    Target(Ident),
    Namespace(Ident),
    Swap(Ident, Ident, Span),
    Varying(Vec<Ident>),
    Directions(Vec<Ident>, Span),
    Kind(StencilKindKw, Span),
    /// Split the sweep into inner and outer parts.
    InnerOuter(Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilKindKw {
    Pull,
    Push,
}

// ── sweep_stmt: 'sweep' IDENT '(' IDENT ')' option* ──
//
// Sweep-only options: swap, varying, inner_outer.

#[derive(Debug, Clone, PartialEq)]
pub struct SweepStmt {
    pub class_name: Ident,
    pub kernel: Ident,
    pub options: Vec<RequestOption>,
}

// ── packinfo_stmt: 'packinfo' IDENT ('from' | 'for') IDENT option* ──

#[derive(Debug, Clone, PartialEq)]
pub enum PackSource {
    Kernel(Ident),
    Field(Ident),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackInfoStmt {
    pub class_name: Ident,
    pub source: PackSource,
    pub options: Vec<RequestOption>,
}
