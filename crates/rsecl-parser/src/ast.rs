//! AST types for rule expressions.
//!
//! The parser produces these without consulting any schema: field references
//! stay opaque dotted names until the binder resolves them.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

// =============================================================================
// Operators
// =============================================================================

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `=~`: glob pattern or regex match.
    Match,
    /// `!~`
    NotMatch,
    In,
    NotIn,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Match => "=~",
            CompareOp::NotMatch => "!~",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }

    /// The operator obtained by swapping the operands (`a < b` ⇔ `b > a`).
    ///
    /// Returns `None` for operators that are not symmetric under a swap
    /// (pattern matching and membership).
    pub fn swapped(&self) -> Option<CompareOp> {
        match self {
            CompareOp::Eq => Some(CompareOp::Eq),
            CompareOp::Ne => Some(CompareOp::Ne),
            CompareOp::Lt => Some(CompareOp::Gt),
            CompareOp::Le => Some(CompareOp::Ge),
            CompareOp::Gt => Some(CompareOp::Lt),
            CompareOp::Ge => Some(CompareOp::Le),
            CompareOp::Match | CompareOp::NotMatch | CompareOp::In | CompareOp::NotIn => None,
        }
    }

    /// Whether this is one of the ordering operators `<`, `<=`, `>`, `>=`.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge
        )
    }

    /// Whether the operator is the negated form of another (`!=`, `!~`, `not in`).
    pub fn is_negated(&self) -> bool {
        matches!(self, CompareOp::Ne | CompareOp::NotMatch | CompareOp::NotIn)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantifier over the elements of an array-valued field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantifier {
    /// Holds if the body holds for at least one element (false when empty).
    #[default]
    Any,
    /// Holds if the body holds for every element (true when empty).
    All,
}

impl Quantifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantifier::Any => "any",
            Quantifier::All => "all",
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Literals
// =============================================================================

/// A literal value as written in rule text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Duration(Duration),
    Str(String),
    /// Glob pattern `~"..."`; `*` matches any run of characters.
    Pattern(String),
    /// Regular expression `r"..."`.
    Regex(String),
    /// IP address or network. A bare address is a host network (`/32`, `/128`).
    Ip(IpNet),
    Array(Vec<Literal>),
}

impl Literal {
    /// Short human-readable name of the literal's type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Duration(_) => "duration",
            Literal::Str(_) => "string",
            Literal::Pattern(_) => "pattern",
            Literal::Regex(_) => "regex",
            Literal::Ip(_) => "ip",
            Literal::Array(_) => "array",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Duration(d) => write!(f, "{}ns", d.as_nanos()),
            Literal::Str(s) => write!(f, "\"{}\"", escape(s)),
            Literal::Pattern(s) => write!(f, "~\"{}\"", escape(s)),
            Literal::Regex(s) => write!(f, "r\"{}\"", s.replace('"', "\\\"")),
            Literal::Ip(net) => write!(f, "{net}"),
            Literal::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// =============================================================================
// Expressions
// =============================================================================

/// A parsed rule expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Conjunction; same-kind chains are flattened (`a && (b && c)` → `And[a, b, c]`).
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A dotted field reference or macro identifier.
    Field(String),
    Literal(Literal),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `any(body)` / `all(body)` or the explicit `any(iterator, body)` form.
    Quantified {
        quantifier: Quantifier,
        iterator: Option<String>,
        body: Box<Expr>,
    },
}

impl Expr {
    /// Every name referenced as a field (or macro) anywhere in the expression,
    /// including explicit quantifier iterator names.
    pub fn referenced_names(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::And(children) | Expr::Or(children) => {
                for c in children {
                    c.collect_names(out);
                }
            }
            Expr::Not(inner) => inner.collect_names(out),
            Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Expr::Field(name) => {
                out.insert(name.as_str());
            }
            Expr::Literal(_) => {}
            Expr::Call { args, .. } => {
                for a in args {
                    a.collect_names(out);
                }
            }
            Expr::Quantified { iterator, body, .. } => {
                if let Some(it) = iterator {
                    out.insert(it.as_str());
                }
                body.collect_names(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(children) => write_joined(f, children, " && "),
            Expr::Or(children) => write_joined(f, children, " || "),
            Expr::Not(inner) => match inner.as_ref() {
                Expr::And(_) | Expr::Or(_) | Expr::Compare { .. } => write!(f, "!({inner})"),
                _ => write!(f, "!{inner}"),
            },
            Expr::Compare { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Expr::Field(name) => f.write_str(name),
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Expr::Quantified {
                quantifier,
                iterator,
                body,
            } => match iterator {
                Some(it) => write!(f, "{quantifier}({it}, {body})"),
                None => write!(f, "{quantifier}({body})"),
            },
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Expr], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match child {
            Expr::And(_) | Expr::Or(_) => write!(f, "({child})")?,
            _ => write!(f, "{child}")?,
        }
    }
    Ok(())
}
