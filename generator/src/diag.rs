// diag.rs — Script diagnostics
//
// Diagnostic types shared by the parser and the resolver, the stable code
// table, and rendering with `path:line:col` locations.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0102`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // ── Syntax (E01xx) ──
    pub const E0101: DiagCode = DiagCode("E0101"); // unexpected character
    pub const E0102: DiagCode = DiagCode("E0102"); // syntax error

    // ── Resolution (E02xx) ──
    pub const E0201: DiagCode = DiagCode("E0201"); // unknown name
    pub const E0202: DiagCode = DiagCode("E0202"); // duplicate definition
    pub const E0203: DiagCode = DiagCode("E0203"); // unknown element type
    pub const E0204: DiagCode = DiagCode("E0204"); // unknown target
    pub const E0205: DiagCode = DiagCode("E0205"); // unknown direction
    pub const E0206: DiagCode = DiagCode("E0206"); // index out of range
    pub const E0207: DiagCode = DiagCode("E0207"); // wrong number of indices
    pub const E0208: DiagCode = DiagCode("E0208"); // unknown kernel
    pub const E0209: DiagCode = DiagCode("E0209"); // swap partners differ
    pub const E0210: DiagCode = DiagCode("E0210"); // field swapped more than once
    pub const E0211: DiagCode = DiagCode("E0211"); // option not valid here
    pub const E0212: DiagCode = DiagCode("E0212"); // kernel without assignments
    pub const E0213: DiagCode = DiagCode("E0213"); // assignment target is not a field
    pub const E0214: DiagCode = DiagCode("E0214"); // option given twice
    pub const E0215: DiagCode = DiagCode("E0215"); // invalid index extent
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint or related spans.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message).with_code(code)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }

    /// Render with a `path:line:col` prefix computed from `source`.
    pub fn render(&self, path: &str, source: &str) -> String {
        let (line, col) = line_col(source, self.span.start);
        let mut out = format!("{}:{}:{}: {}", path, line, col, self);
        for related in &self.related_spans {
            let (l, c) = line_col(source, related.span.start);
            out.push_str(&format!("\n  note: {} ({}:{}:{})", related.label, path, l, c));
        }
        out
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
