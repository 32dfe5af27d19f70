// field.rs — Symbolic fields, accesses and assignments
//
// The symbolic input of generation: fields with an element type and an index
// shape, accesses to a field at an offset and component, and the assignment
// lists handed to the kernel compiler.
//
// Preconditions: none (data-only module plus small visitors).
// Postconditions: `FieldAccess`'s `Display` form is canonical; it is the
//                 sort and dedup key for pack-term sequences.
// Failure modes: none.
// Side effects: none.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::direction::{offset_to_direction, Offset};

// ── Element type ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
}

impl DType {
    /// C++ spelling of the type.
    pub fn c_name(self) -> &'static str {
        match self {
            DType::Float32 => "float",
            DType::Float64 => "double",
            DType::Int32 => "int32_t",
            DType::Int64 => "int64_t",
        }
    }

    pub fn parse(s: &str) -> Option<DType> {
        match s {
            "float" | "float32" => Some(DType::Float32),
            "double" | "float64" => Some(DType::Float64),
            "int32" | "int32_t" => Some(DType::Int32),
            "int64" | "int64_t" => Some(DType::Int64),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

// ── Field ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Block-local field with three spatial dimensions and ghost layers.
    Generic,
    /// Flat communication buffer (one spatial dimension, no ghost layers).
    Buffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub dtype: DType,
    /// Shape of the per-cell index space; empty for one value per cell.
    pub index_shape: Vec<usize>,
    pub kind: FieldKind,
}

/// Product of an index shape, `None` on overflow.
pub fn shape_product(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &e| acc.checked_mul(e))
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Field {
            name: name.into(),
            dtype,
            index_shape: Vec::new(),
            kind: FieldKind::Generic,
        }
    }

    pub fn with_index_shape(mut self, shape: Vec<usize>) -> Self {
        self.index_shape = shape;
        self
    }

    /// Synthetic buffer pseudo-field holding `len` values per cell.
    pub fn buffer(dtype: DType, len: usize) -> Self {
        Field {
            name: "buffer".to_string(),
            dtype,
            index_shape: vec![len],
            kind: FieldKind::Buffer,
        }
    }

    pub fn is_buffer(&self) -> bool {
        self.kind == FieldKind::Buffer
    }

    pub fn spatial_dimensions(&self) -> usize {
        match self.kind {
            FieldKind::Generic => 3,
            FieldKind::Buffer => 1,
        }
    }

    pub fn index_dimensions(&self) -> usize {
        self.index_shape.len()
    }

    /// Number of values stored per cell (product of the index shape).
    /// Saturates; scripts are checked with `shape_product` before a field
    /// is built.
    pub fn values_per_cell(&self) -> usize {
        self.index_shape.iter().fold(1, |acc, &e| acc.saturating_mul(e))
    }

    /// True when the field has a component axis in memory.
    pub fn has_components(&self) -> bool {
        self.values_per_cell() > 1
    }

    pub fn at(&self, offset: Offset, index: Vec<usize>) -> FieldAccess {
        FieldAccess {
            field: self.clone(),
            offset,
            index,
        }
    }

    pub fn center(&self, index: Vec<usize>) -> FieldAccess {
        self.at(Offset::ZERO, index)
    }

    /// Center accesses to every element of the index space, in row-major order.
    pub fn all_index_accesses(&self) -> Vec<FieldAccess> {
        let mut indices: Vec<Vec<usize>> = vec![Vec::new()];
        for &extent in &self.index_shape {
            indices = indices
                .into_iter()
                .flat_map(|prefix| {
                    (0..extent).map(move |i| {
                        let mut idx = prefix.clone();
                        idx.push(i);
                        idx
                    })
                })
                .collect();
        }
        indices.into_iter().map(|idx| self.center(idx)).collect()
    }
}

// ── Field access ────────────────────────────────────────────────────────────

/// One read or write of a field at `offset`, component `index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldAccess {
    pub field: Field,
    pub offset: Offset,
    pub index: Vec<usize>,
}

impl FieldAccess {
    /// The same component at the center cell.
    pub fn to_center(&self) -> FieldAccess {
        FieldAccess {
            field: self.field.clone(),
            offset: Offset::ZERO,
            index: self.index.clone(),
        }
    }

    pub fn is_center(&self) -> bool {
        self.offset.is_zero()
    }

    /// Linear component number within the cell (row-major over the index shape).
    pub fn linear_index(&self) -> usize {
        let mut linear = 0;
        for (i, &extent) in self.field.index_shape.iter().enumerate() {
            linear = linear * extent + self.index.get(i).copied().unwrap_or(0);
        }
        linear
    }

    pub fn canonical_name(&self) -> String {
        self.to_string()
    }
}

/// Canonical form: `name_DIR` followed by `^i` or `^(i,j)` for indexed
/// fields, e.g. `src_C`, `pdfs_TNE^3`, `tensor_C^(1,2)`.
impl fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match offset_to_direction(self.offset) {
            Ok(dir) => write!(f, "{}_{}", self.field.name, dir)?,
            Err(_) => {
                let [x, y, z] = self.offset.components();
                write!(f, "{}_[{},{},{}]", self.field.name, x, y, z)?
            }
        }
        match self.index.as_slice() {
            [] => Ok(()),
            [i] => write!(f, "^{}", i),
            many => {
                let parts: Vec<String> = many.iter().map(|i| i.to_string()).collect();
                write!(f, "^({})", parts.join(","))
            }
        }
    }
}

// ── Expressions and assignments ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Access(FieldAccess),
    Symbol(String),
    Number(f64),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn collect_accesses(&self, out: &mut Vec<FieldAccess>) {
        match self {
            Expr::Access(a) => out.push(a.clone()),
            Expr::Symbol(_) | Expr::Number(_) => {}
            Expr::Neg(e) => e.collect_accesses(out),
            Expr::Binary(_, l, r) => {
                l.collect_accesses(out);
                r.collect_accesses(out);
            }
        }
    }

    pub fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Symbol(s) => {
                out.insert(s.clone());
            }
            Expr::Access(_) | Expr::Number(_) => {}
            Expr::Neg(e) => e.collect_symbols(out),
            Expr::Binary(_, l, r) => {
                l.collect_symbols(out);
                r.collect_symbols(out);
            }
        }
    }

    /// Replace symbols bound in `values` by number literals.
    pub fn substitute(&self, values: &HashMap<String, f64>) -> Expr {
        match self {
            Expr::Symbol(s) => match values.get(s) {
                Some(v) => Expr::Number(*v),
                None => self.clone(),
            },
            Expr::Access(_) | Expr::Number(_) => self.clone(),
            Expr::Neg(e) => Expr::Neg(Box::new(e.substitute(values))),
            Expr::Binary(op, l, r) => Expr::binary(*op, l.substitute(values), r.substitute(values)),
        }
    }

    /// Render as a fully parenthesized C expression. Accesses are printed by
    /// `access`, which owns the memory addressing scheme.
    pub fn to_c(&self, dtype: DType, access: &dyn Fn(&FieldAccess) -> String) -> String {
        match self {
            Expr::Access(a) => access(a),
            Expr::Symbol(s) => s.clone(),
            Expr::Number(v) => c_literal(*v, dtype),
            Expr::Neg(e) => format!("-({})", e.to_c(dtype, access)),
            Expr::Binary(op, l, r) => format!(
                "({} {} {})",
                l.to_c(dtype, access),
                op.symbol(),
                r.to_c(dtype, access)
            ),
        }
    }
}

/// C literal for `value` in the given element type.
pub fn c_literal(value: f64, dtype: DType) -> String {
    match dtype {
        DType::Float64 => format!("{:?}", value),
        DType::Float32 => format!("{:?}f", value),
        DType::Int32 | DType::Int64 => format!("{}", value as i64),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub lhs: FieldAccess,
    pub rhs: Expr,
}

impl Assignment {
    pub fn new(lhs: FieldAccess, rhs: Expr) -> Self {
        Assignment { lhs, rhs }
    }

    pub fn reads(&self) -> Vec<FieldAccess> {
        let mut out = Vec::new();
        self.rhs.collect_accesses(&mut out);
        out
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
