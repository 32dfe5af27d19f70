// Lexer for .sgen generation scripts.
//
// Tokenizes field, parameter and kernel declarations plus generation
// requests. Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Script token types.
///
/// Identifiers carry no value; use the span to retrieve the text from the
/// source. Direction names, element types and targets are identifiers and
/// are interpreted during resolution.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("field")]
    Field,
    #[token("param")]
    Param,
    #[token("kernel")]
    Kernel,
    #[token("sweep")]
    Sweep,
    #[token("packinfo")]
    PackInfo,
    #[token("from")]
    From,
    #[token("for")]
    For,
    #[token("target")]
    Target,
    #[token("swap")]
    Swap,
    #[token("varying")]
    Varying,
    #[token("namespace")]
    Namespace,
    #[token("directions")]
    Directions,
    #[token("pull")]
    Pull,
    #[token("push")]
    Push,
    #[token("inner_outer")]
    InnerOuter,

    // ── Symbols ──
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    // ── Literals ──
    //
    // Signs are separate tokens so `a-1` lexes as a subtraction.
    /// Integer literal (offsets, indices, index extents).
    #[regex(r"[0-9]+", parse_int)]
    Int(u64),

    /// Floating-point literal with a fraction or an exponent.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+", parse_number)]
    Number(f64),

    // ── Identifier ──
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Structure ──
    /// One or more newlines (statement terminator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Field => write!(f, "field"),
            Token::Param => write!(f, "param"),
            Token::Kernel => write!(f, "kernel"),
            Token::Sweep => write!(f, "sweep"),
            Token::PackInfo => write!(f, "packinfo"),
            Token::From => write!(f, "from"),
            Token::For => write!(f, "for"),
            Token::Target => write!(f, "target"),
            Token::Swap => write!(f, "swap"),
            Token::Varying => write!(f, "varying"),
            Token::Namespace => write!(f, "namespace"),
            Token::Directions => write!(f, "directions"),
            Token::Pull => write!(f, "pull"),
            Token::Push => write!(f, "push"),
            Token::InnerOuter => write!(f, "inner_outer"),
            Token::Colon => write!(f, ":"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Number(v) => write!(f, "{v}"),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    lex.slice().parse().ok()
}

fn parse_number(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

// ── Public API ──

/// Lex a generation script into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
