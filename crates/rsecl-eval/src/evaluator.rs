//! Compiled evaluator trees.
//!
//! An [`Evaluator`] is immutable once built; all per-call state lives in the
//! [`Context`]. Evaluation returns `None` when a field is absent on the
//! event, and a boolean node treats that as `false`.

use std::fmt;

use rsecl_parser::{CompareOp, Quantifier};

use crate::context::Context;
use crate::functions::{BinaryFn, TernaryFn, UnaryFn};
use crate::iterator::{LenFn, quantify};
use crate::matcher::CompiledMatcher;
use crate::model::Getter;
use crate::value::{Value, ValueKind};

/// A node of a compiled rule.
pub struct Evaluator<E> {
    pub(crate) kind: ValueKind,
    pub(crate) weight: u32,
    /// Bit `r` is set when the result depends on register `r`.
    pub(crate) registers: u32,
    /// Hoisted out of an enclosing quantifier.
    pub(crate) partial: bool,
    pub(crate) node: Node<E>,
}

pub(crate) enum Node<E> {
    Const(Value<'static>),
    Field {
        name: String,
        getter: Getter<E>,
        register: Option<usize>,
    },
    Not(Box<Evaluator<E>>),
    And(Vec<Evaluator<E>>),
    Or(Vec<Evaluator<E>>),
    Match {
        operand: Box<Evaluator<E>>,
        matcher: CompiledMatcher,
        negate: bool,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Evaluator<E>>,
        rhs: Box<Evaluator<E>>,
    },
    Call {
        name: String,
        call: Call<E>,
    },
    Quantifier {
        quantifier: Quantifier,
        iterator: String,
        len: LenFn<E>,
        register: usize,
        body: Box<Evaluator<E>>,
    },
}

pub(crate) enum Call<E> {
    Unary(UnaryFn, Box<Evaluator<E>>),
    Binary(BinaryFn, Box<Evaluator<E>>, Box<Evaluator<E>>),
    Ternary(
        TernaryFn,
        Box<Evaluator<E>>,
        Box<Evaluator<E>>,
        Box<Evaluator<E>>,
    ),
}

impl<E> Evaluator<E> {
    pub(crate) fn new(kind: ValueKind, weight: u32, registers: u32, node: Node<E>) -> Self {
        Evaluator {
            kind,
            weight,
            registers,
            partial: false,
            node,
        }
    }

    pub(crate) fn constant(value: Value<'static>) -> Self {
        Evaluator::new(value.kind(), 0, 0, Node::Const(value))
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Registers this node reads, as a bit mask.
    pub fn registers(&self) -> u32 {
        self.registers
    }

    pub fn depends_on(&self, register: usize) -> bool {
        register < 32 && self.registers & (1 << register) != 0
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn eval<'a>(&'a self, ctx: &mut Context<'a, E>) -> Option<Value<'a>> {
        match &self.node {
            Node::Const(v) => Some(v.reborrow()),

            Node::Field {
                getter, register, ..
            } => {
                let index = match register {
                    Some(r) => Some(ctx.register(*r)?),
                    None => None,
                };
                getter(ctx.event(), index)
            }

            Node::Not(inner) => Some(Value::Bool(!inner.eval_bool(ctx))),
            Node::And(children) => Some(Value::Bool(children.iter().all(|c| c.eval_bool(ctx)))),
            Node::Or(children) => Some(Value::Bool(children.iter().any(|c| c.eval_bool(ctx)))),

            Node::Match {
                operand,
                matcher,
                negate,
            } => {
                let value = operand.eval(ctx)?;
                Some(Value::Bool(matcher.matches(&value) != *negate))
            }

            Node::Compare { op, lhs, rhs } => {
                let l = lhs.eval(ctx)?;
                let r = rhs.eval(ctx)?;
                Some(Value::Bool(compare_values(*op, &l, &r)))
            }

            Node::Call { call, .. } => match call {
                Call::Unary(f, a) => f(a.eval(ctx)?),
                Call::Binary(f, a, b) => {
                    let a = a.eval(ctx)?;
                    f(a, b.eval(ctx)?)
                }
                Call::Ternary(f, a, b, c) => {
                    let a = a.eval(ctx)?;
                    let b = b.eval(ctx)?;
                    f(a, b, c.eval(ctx)?)
                }
            },

            Node::Quantifier {
                quantifier,
                len,
                register,
                body,
                ..
            } => Some(Value::Bool(quantify(
                *quantifier,
                *len,
                *register,
                body,
                ctx,
            ))),
        }
    }

    /// Evaluate as a predicate; anything but `true` is false.
    pub fn eval_bool<'a>(&'a self, ctx: &mut Context<'a, E>) -> bool {
        matches!(self.eval(ctx), Some(Value::Bool(true)))
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().map(Evaluator::size).sum::<usize>()
    }

    pub(crate) fn children(&self) -> Box<dyn Iterator<Item = &Evaluator<E>> + '_> {
        match &self.node {
            Node::Const(_) | Node::Field { .. } => Box::new(std::iter::empty()),
            Node::Not(inner) => Box::new(std::iter::once(inner.as_ref())),
            Node::And(children) | Node::Or(children) => Box::new(children.iter()),
            Node::Match { operand, .. } => Box::new(std::iter::once(operand.as_ref())),
            Node::Compare { lhs, rhs, .. } => Box::new([lhs.as_ref(), rhs.as_ref()].into_iter()),
            Node::Call { call, .. } => match call {
                Call::Unary(_, a) => Box::new(std::iter::once(a.as_ref())),
                Call::Binary(_, a, b) => Box::new([a.as_ref(), b.as_ref()].into_iter()),
                Call::Ternary(_, a, b, c) => {
                    Box::new([a.as_ref(), b.as_ref(), c.as_ref()].into_iter())
                }
            },
            Node::Quantifier { body, .. } => Box::new(std::iter::once(body.as_ref())),
        }
    }
}

/// Compare two dynamically computed values. Kinds were checked at compile
/// time; string arrays compare existentially.
fn compare_values(op: CompareOp, lhs: &Value<'_>, rhs: &Value<'_>) -> bool {
    match op {
        CompareOp::Eq => values_equal(lhs, rhs),
        CompareOp::Ne => !values_equal(lhs, rhs),
        CompareOp::Lt => matches!((lhs, rhs), (Value::Int(a), Value::Int(b)) if a < b),
        CompareOp::Le => matches!((lhs, rhs), (Value::Int(a), Value::Int(b)) if a <= b),
        CompareOp::Gt => matches!((lhs, rhs), (Value::Int(a), Value::Int(b)) if a > b),
        CompareOp::Ge => matches!((lhs, rhs), (Value::Int(a), Value::Int(b)) if a >= b),
        CompareOp::In => contained_in(lhs, rhs),
        CompareOp::NotIn => !contained_in(lhs, rhs),
        // Pattern operands are always literals and compile to matchers.
        CompareOp::Match | CompareOp::NotMatch => false,
    }
}

fn values_equal(lhs: &Value<'_>, rhs: &Value<'_>) -> bool {
    match (lhs, rhs) {
        (Value::StrArray(items), Value::Str(s)) | (Value::Str(s), Value::StrArray(items)) => {
            items.iter().any(|i| **i == **s)
        }
        (Value::StrArray(a), Value::StrArray(b)) => a.iter().any(|x| b.contains(x)),
        (a, b) => a == b,
    }
}

fn contained_in(lhs: &Value<'_>, rhs: &Value<'_>) -> bool {
    match (lhs, rhs) {
        (Value::Str(s), Value::StrArray(items)) => items.iter().any(|i| **i == **s),
        (Value::StrArray(a), Value::StrArray(b)) => a.iter().any(|x| b.contains(x)),
        _ => false,
    }
}

impl<E> fmt::Debug for Evaluator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Evaluator");
        d.field("kind", &self.kind).field("weight", &self.weight);
        if self.partial {
            d.field("partial", &true);
        }
        match &self.node {
            Node::Const(v) => d.field("const", v),
            Node::Field { name, register, .. } => {
                d.field("field", name).field("register", register)
            }
            Node::Not(inner) => d.field("not", inner),
            Node::And(children) => d.field("and", children),
            Node::Or(children) => d.field("or", children),
            Node::Match {
                operand,
                matcher,
                negate,
            } => d
                .field("operand", operand)
                .field("matcher", matcher)
                .field("negate", negate),
            Node::Compare { op, lhs, rhs } => {
                d.field("op", op).field("lhs", lhs).field("rhs", rhs)
            }
            Node::Call { name, call } => {
                d.field("call", name);
                match call {
                    Call::Unary(_, a) => d.field("args", &[a]),
                    Call::Binary(_, a, b) => d.field("args", &[a, b]),
                    Call::Ternary(_, a, b, c) => d.field("args", &[a, b, c]),
                }
            }
            Node::Quantifier {
                quantifier,
                iterator,
                register,
                body,
                ..
            } => d
                .field("quantifier", quantifier)
                .field("iterator", iterator)
                .field("register", register)
                .field("body", body),
        };
        d.finish()
    }
}
