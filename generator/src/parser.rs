// Parser for .sgen generation scripts.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators; arithmetic in kernel bodies is parsed with the usual
// precedence (unary minus, then `*` `/`, then `+` `-`, all left-associative).
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus diagnostics for every lex and parse error.
// Failure modes: syntax errors produce E01xx diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub script: Option<Script>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a generation script. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = script_parser(source);
    let (script, parse_errors) = parser.parse(stream).into_output_errors();

    let mut diagnostics: Vec<Diagnostic> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Diagnostic::new(DiagLevel::Error, span, e.message).with_code(codes::E0101)
        })
        .collect();
    diagnostics.extend(parse_errors.into_iter().map(|e| {
        Diagnostic::new(DiagLevel::Error, *e.span(), e.to_string()).with_code(codes::E0102)
    }));

    ParseResult {
        script,
        diagnostics,
    }
}

// ── Main parser builder ──
//
// All grammar rules are built inside `script_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn script_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Script, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Newlines ──

    let nl = just(Token::Newline).repeated().ignored();

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start..span.end].to_string(),
            span,
        }
    });

    // ── Literals ──

    let int = select! { Token::Int(v) => v };

    let spanned_int = select! { Token::Int(v) = e => (v, e.span()) };

    let signed_int = just(Token::Minus)
        .or_not()
        .then(int.clone())
        .map(|(neg, v)| if neg.is_some() { -(v as i64) } else { v as i64 });

    let signed_number = just(Token::Minus)
        .or_not()
        .then(select! {
            Token::Number(v) => v,
            Token::Int(v) => v as f64,
        })
        .map_with(|(neg, v), e| (if neg.is_some() { -v } else { v }, e.span()));

    // ── Access: name ('[' dx ',' dy ',' dz ']')? ('(' i (',' j)* ')')? ──

    let offset = signed_int
        .clone()
        .then_ignore(just(Token::Comma))
        .then(signed_int.clone())
        .then_ignore(just(Token::Comma))
        .then(signed_int)
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .map_with(|((x, y), z), e| ([x, y, z], e.span()));

    let index = int
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map_with(|idx, e| (idx, e.span()));

    let access = ident
        .clone()
        .then(offset.or_not())
        .then(index.or_not())
        .map_with(|((name, offset), index), e| AccessExpr {
            name,
            offset,
            index,
            span: e.span(),
        });

    // ── Expression ──

    let expr = recursive(|expr| {
        let atom = choice((
            select! {
                Token::Number(v) = e => Expr::Number(v, e.span()),
                Token::Int(v) = e => Expr::Number(v as f64, e.span()),
            },
            access.clone().map(Expr::Access),
            expr.delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let unary = just(Token::Minus)
            .map_with(|_, e| e.span())
            .repeated()
            .foldr(atom, |op: SimpleSpan, rhs: Expr| {
                let span: SimpleSpan = (op.start..rhs.span().end).into();
                Expr::Neg(Box::new(rhs), span)
            });

        let binary = |op: BinaryOp, lhs: Expr, rhs: Expr| {
            let span: SimpleSpan = (lhs.span().start..rhs.span().end).into();
            Expr::Binary(op, Box::new(lhs), Box::new(rhs), span)
        };

        let product = unary.clone().foldl(
            choice((
                just(Token::Star).to(BinaryOp::Mul),
                just(Token::Slash).to(BinaryOp::Div),
            ))
            .then(unary)
            .repeated(),
            move |lhs, (op, rhs)| binary(op, lhs, rhs),
        );

        product.clone().foldl(
            choice((
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            ))
            .then(product)
            .repeated(),
            move |lhs, (op, rhs)| binary(op, lhs, rhs),
        )
    });

    // ── Statements ──

    let field_stmt = just(Token::Field)
        .ignore_then(ident.clone())
        .then_ignore(just(Token::Colon))
        .then(ident.clone())
        .then(
            spanned_int
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .or_not(),
        )
        .map(|((name, dtype), shape)| {
            StatementKind::Field(FieldStmt {
                name,
                dtype,
                index_shape: shape.unwrap_or_default(),
            })
        });

    let param_stmt = just(Token::Param)
        .ignore_then(ident.clone())
        .then(just(Token::Equals).ignore_then(signed_number).or_not())
        .map(|(name, value)| StatementKind::Param(ParamStmt { name, value }));

    let assignment = access
        .then_ignore(just(Token::Equals))
        .then(expr)
        .map_with(|(lhs, rhs), e| AssignStmt {
            lhs,
            rhs,
            span: e.span(),
        });

    let kernel_stmt = just(Token::Kernel)
        .ignore_then(ident.clone())
        .then(
            nl.clone()
                .ignore_then(
                    assignment
                        .separated_by(just(Token::Newline).repeated().at_least(1))
                        .allow_trailing()
                        .collect::<Vec<_>>(),
                )
                .then_ignore(nl.clone())
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, assignments)| StatementKind::Kernel(KernelStmt { name, assignments }));

    // ── Request options ──

    let ident_list = ident
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let option = choice((
        just(Token::Target)
            .ignore_then(ident.clone())
            .map(RequestOption::Target),
        just(Token::Namespace)
            .ignore_then(ident.clone())
            .map(RequestOption::Namespace),
        just(Token::Swap)
            .ignore_then(
                ident
                    .clone()
                    .then_ignore(just(Token::Comma))
                    .then(ident.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map_with(|(a, b), e| RequestOption::Swap(a, b, e.span())),
        just(Token::Varying)
            .ignore_then(ident_list.clone())
            .map(RequestOption::Varying),
        just(Token::Directions)
            .ignore_then(ident_list)
            .map_with(|dirs, e| RequestOption::Directions(dirs, e.span())),
        choice((
            just(Token::Pull).to(StencilKindKw::Pull),
            just(Token::Push).to(StencilKindKw::Push),
        ))
        .map_with(|kind, e| RequestOption::Kind(kind, e.span())),
        just(Token::InnerOuter).map_with(|_, e| RequestOption::InnerOuter(e.span())),
    ));

    let options = option.repeated().collect::<Vec<_>>();

    let sweep_stmt = just(Token::Sweep)
        .ignore_then(ident.clone())
        .then(
            ident
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(options.clone())
        .map(|((class_name, kernel), options)| {
            StatementKind::Sweep(SweepStmt {
                class_name,
                kernel,
                options,
            })
        });

    let pack_source = choice((
        just(Token::From)
            .ignore_then(ident.clone())
            .map(PackSource::Kernel),
        just(Token::For)
            .ignore_then(ident.clone())
            .map(PackSource::Field),
    ));

    let packinfo_stmt = just(Token::PackInfo)
        .ignore_then(ident)
        .then(pack_source)
        .then(options)
        .map(|((class_name, source), options)| {
            StatementKind::PackInfo(PackInfoStmt {
                class_name,
                source,
                options,
            })
        });

    // ── Statement dispatch ──

    let statement = choice((field_stmt, param_stmt, kernel_stmt, sweep_stmt, packinfo_stmt))
        .map_with(|kind, e| Statement {
            kind,
            span: e.span(),
        });

    // ── Script ──

    nl.clone()
        .ignore_then(
            statement
                .separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(move |statements, e| Script {
            statements,
            span: e.span(),
        })
}

// ── Tests ──
