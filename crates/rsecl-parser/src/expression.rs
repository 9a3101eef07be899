//! Rule expression parser using a pest PEG grammar + Pratt parser.
//!
//! Parses expressions like:
//! - `exec.file.name == "nc" && exec.argv in ["-e", "-c"]`
//! - `open.file.path =~ "/etc/*" && !process.ancestors.file.name in ["dpkg", "rpm"]`
//! - `any(process.ancestors.file.name == "sshd") && process.uid == 0`
//! - `connect.addr.ip in [10.0.0.0/8, 192.168.0.0/16] && connect.addr.port != 443`

use std::sync::LazyLock;
use std::time::Duration;

use ipnet::IpNet;
use pest::Parser;
use pest::error::{InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{CompareOp, Expr, Literal, Quantifier};
use crate::error::{ParseError, Result};

// ---------------------------------------------------------------------------
// Pest parser (generated from secl.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/secl.pest"]
struct SeclParser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
});

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a rule expression into an AST.
///
/// # Examples
///
/// ```
/// use rsecl_parser::parse_expression;
///
/// let expr = parse_expression(r#"exec.file.name == "nc" && process.uid == 0"#).unwrap();
/// println!("{expr}");
/// ```
pub fn parse_expression(input: &str) -> Result<Expr> {
    let mut pairs = SeclParser::parse(Rule::expression, input).map_err(syntax_error)?;

    // expression = { SOI ~ expr ~ EOI }
    let expr_pair = pairs
        .next()
        .and_then(|p| p.into_inner().find(|p| p.as_rule() == Rule::expr))
        .ok_or_else(|| error_at(input, 0, "empty expression"))?;

    parse_expr(expr_pair)
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

fn parse_expr(pair: Pair<'_, Rule>) -> Result<Expr> {
    PRATT
        .map_primary(|primary| match primary.as_rule() {
            Rule::comparison => parse_comparison(primary),
            Rule::expr => parse_expr(primary),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => Ok(Expr::Not(Box::new(rhs?))),
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => Ok(merge_binary(BoolOp::And, lhs?, rhs?)),
            Rule::or_op => Ok(merge_binary(BoolOp::Or, lhs?, rhs?)),
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

#[derive(Clone, Copy, PartialEq)]
enum BoolOp {
    And,
    Or,
}

/// Flatten nested binary operators of the same kind.
/// `a && (b && c)` → `And[a, b, c]` instead of `And[a, And[b, c]]`.
fn merge_binary(op: BoolOp, lhs: Expr, rhs: Expr) -> Expr {
    let mut args = Vec::new();
    for side in [lhs, rhs] {
        match (op, side) {
            (BoolOp::And, Expr::And(children)) | (BoolOp::Or, Expr::Or(children)) => {
                args.extend(children)
            }
            (_, other) => args.push(other),
        }
    }
    match op {
        BoolOp::And => Expr::And(args),
        BoolOp::Or => Expr::Or(args),
    }
}

fn parse_comparison(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let Some(first) = inner.next() else {
        unreachable!("comparison must have an operand");
    };
    let lhs = parse_operand(first)?;

    let Some(op_pair) = inner.next() else {
        return Ok(lhs);
    };
    let op = match op_pair.as_rule() {
        Rule::eq_op => CompareOp::Eq,
        Rule::ne_op => CompareOp::Ne,
        Rule::lt_op => CompareOp::Lt,
        Rule::le_op => CompareOp::Le,
        Rule::gt_op => CompareOp::Gt,
        Rule::ge_op => CompareOp::Ge,
        Rule::match_op => CompareOp::Match,
        Rule::not_match_op => CompareOp::NotMatch,
        Rule::in_op => CompareOp::In,
        Rule::not_in_op => CompareOp::NotIn,
        other => unreachable!("unexpected comparison operator: {other:?}"),
    };
    let Some(rhs_pair) = inner.next() else {
        unreachable!("comparison operator must have a right operand");
    };
    let rhs = parse_operand(rhs_pair)?;

    Ok(Expr::Compare {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn parse_operand(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::field => Ok(Expr::Field(pair.as_str().to_string())),
        Rule::call => parse_call(pair),
        _ => Ok(Expr::Literal(parse_literal(pair)?)),
    }
}

fn parse_call(pair: Pair<'_, Rule>) -> Result<Expr> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let name = match inner.next() {
        Some(p) if p.as_rule() == Rule::ident => p.as_str().to_string(),
        _ => unreachable!("call must start with an identifier"),
    };
    let args = inner.map(parse_expr).collect::<Result<Vec<_>>>()?;

    let quantifier = match name.as_str() {
        "any" => Quantifier::Any,
        "all" => Quantifier::All,
        _ => return Ok(Expr::Call { name, args }),
    };

    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(body), None, None) => Ok(Expr::Quantified {
            quantifier,
            iterator: None,
            body: Box::new(body),
        }),
        (Some(Expr::Field(iterator)), Some(body), None) => Ok(Expr::Quantified {
            quantifier,
            iterator: Some(iterator),
            body: Box::new(body),
        }),
        _ => Err(error_at(
            span.get_input(),
            span.start(),
            &format!("'{name}' expects (expression) or (iterator, expression)"),
        )),
    }
}

fn parse_literal(pair: Pair<'_, Rule>) -> Result<Literal> {
    let span = pair.as_span();
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::boolean => Ok(Literal::Bool(text == "true")),
        Rule::number => parse_number(text)
            .map(Literal::Int)
            .ok_or_else(|| error_at(span.get_input(), span.start(), "integer out of range")),
        Rule::duration => parse_duration(text)
            .map(Literal::Duration)
            .ok_or_else(|| error_at(span.get_input(), span.start(), "duration out of range")),
        Rule::ip => parse_ip(text).map(Literal::Ip).ok_or_else(|| {
            error_at(
                span.get_input(),
                span.start(),
                &format!("invalid IP address or network '{text}'"),
            )
        }),
        Rule::string => Ok(Literal::Str(unescape(inner_str(pair)))),
        Rule::pattern => Ok(Literal::Pattern(unescape(inner_str(pair)))),
        // Regex bodies keep their backslashes; only `\"` is unescaped.
        Rule::regex => Ok(Literal::Regex(inner_str(pair).replace("\\\"", "\""))),
        Rule::array => {
            let items = pair
                .into_inner()
                .map(parse_literal)
                .collect::<Result<Vec<_>>>()?;
            if items.iter().any(|i| matches!(i, Literal::Array(_))) {
                return Err(error_at(
                    span.get_input(),
                    span.start(),
                    "nested arrays are not supported",
                ));
            }
            Ok(Literal::Array(items))
        }
        other => unreachable!("unexpected literal rule: {other:?}"),
    }
}

fn inner_str<'a>(pair: Pair<'a, Rule>) -> &'a str {
    pair.into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or_default()
}

/// Resolve `\"` and `\\`. Any other backslash sequence is kept verbatim so
/// Windows-style paths survive unchanged.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('"' | '\\')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn parse_duration(text: &str) -> Option<Duration> {
    let split = text.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = text.split_at(split);
    let n: u64 = digits.parse().ok()?;
    let nanos_per_unit: u64 = match unit {
        "ns" => 1,
        "us" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    };
    let nanos = n.checked_mul(nanos_per_unit)?;
    // Durations compare against nanosecond integer fields, so they must fit in i64.
    i64::try_from(nanos).ok()?;
    Some(Duration::from_nanos(nanos))
}

fn parse_ip(text: &str) -> Option<IpNet> {
    if text.contains('/') {
        text.parse::<IpNet>().ok()
    } else {
        text.parse::<std::net::IpAddr>().ok().map(IpNet::from)
    }
}

fn syntax_error(err: pest::error::Error<Rule>) -> ParseError {
    let err = err.renamed_rules(rule_display_name);
    let offset = match err.location {
        InputLocation::Pos(p) => p,
        InputLocation::Span((start, _)) => start,
    };
    let (line, column) = match err.line_col {
        LineColLocation::Pos(lc) => lc,
        LineColLocation::Span(lc, _) => lc,
    };
    ParseError::Syntax {
        message: err.variant.message().into_owned(),
        offset,
        line,
        column,
    }
}

fn rule_display_name(rule: &Rule) -> String {
    match rule {
        Rule::or_op => "'||'".into(),
        Rule::and_op => "'&&'".into(),
        Rule::not_op => "'!'".into(),
        Rule::eq_op => "'=='".into(),
        Rule::ne_op => "'!='".into(),
        Rule::match_op => "'=~'".into(),
        Rule::not_match_op => "'!~'".into(),
        Rule::le_op => "'<='".into(),
        Rule::ge_op => "'>='".into(),
        Rule::lt_op => "'<'".into(),
        Rule::gt_op => "'>'".into(),
        Rule::in_op => "'in'".into(),
        Rule::not_in_op => "'not in'".into(),
        Rule::EOI => "end of expression".into(),
        other => format!("{other:?}"),
    }
}

/// Build a syntax error for an AST-level problem at `offset` in `input`.
fn error_at(input: &str, offset: usize, message: &str) -> ParseError {
    let before = &input[..offset.min(input.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    ParseError::Syntax {
        message: message.to_string(),
        offset,
        line,
        column,
    }
}

// =============================================================================
// Tests
// =============================================================================
