//! Function registry for calls inside rule expressions.
//!
//! A function name maps to one or more overloads selected by the static
//! kinds of the arguments at compile time. Implementations are plain
//! function pointers specialized by arity, so a call costs one indirect jump.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EvalError, Result};
use crate::model::FUNCTION_WEIGHT;
use crate::value::{Value, ValueKind};

pub type UnaryFn = for<'a> fn(Value<'a>) -> Option<Value<'a>>;
pub type BinaryFn = for<'a> fn(Value<'a>, Value<'a>) -> Option<Value<'a>>;
pub type TernaryFn = for<'a> fn(Value<'a>, Value<'a>, Value<'a>) -> Option<Value<'a>>;

/// A function implementation. Returning `None` makes the enclosing
/// predicate false, like an absent field.
#[derive(Clone, Copy)]
pub enum Callable {
    Unary(UnaryFn),
    Binary(BinaryFn),
    Ternary(TernaryFn),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Unary(_) => 1,
            Callable::Binary(_) => 2,
            Callable::Ternary(_) => 3,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable/{}", self.arity())
    }
}

/// One signature of a function.
#[derive(Debug, Clone)]
pub struct Overload {
    pub params: Vec<ValueKind>,
    pub returns: ValueKind,
    pub weight: u32,
    pub callable: Callable,
}

impl Overload {
    pub fn new(params: &[ValueKind], returns: ValueKind, callable: Callable) -> Self {
        Overload {
            params: params.to_vec(),
            returns,
            weight: FUNCTION_WEIGHT,
            callable,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    fn signature(&self, name: &str) -> String {
        let params: Vec<&str> = self.params.iter().map(ValueKind::as_str).collect();
        format!("{name}({}) -> {}", params.join(", "), self.returns)
    }
}

/// Registry of callable functions.
#[derive(Debug, Clone)]
pub struct Functions {
    table: BTreeMap<String, Vec<Overload>>,
}

impl Default for Functions {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Functions {
    /// A registry with no functions.
    pub fn empty() -> Self {
        Functions {
            table: BTreeMap::new(),
        }
    }

    /// The standard functions.
    pub fn builtin() -> Self {
        use ValueKind::{Bool, Int, Str, StrArray};

        let mut f = Self::empty();
        f.register("length", Overload::new(&[Str], Int, Callable::Unary(length)));
        f.register(
            "length",
            Overload::new(&[StrArray], Int, Callable::Unary(length)),
        );
        f.register("basename", Overload::new(&[Str], Str, Callable::Unary(basename)));
        f.register("dirname", Overload::new(&[Str], Str, Callable::Unary(dirname)));
        f.register("lower", Overload::new(&[Str], Str, Callable::Unary(lower)));
        f.register("upper", Overload::new(&[Str], Str, Callable::Unary(upper)));
        f.register(
            "substring",
            Overload::new(&[Str, Int, Int], Str, Callable::Ternary(substring)),
        );
        f.register(
            "contains",
            Overload::new(&[Str, Str], Bool, Callable::Binary(contains)),
        );
        f.register(
            "starts_with",
            Overload::new(&[Str, Str], Bool, Callable::Binary(starts_with)),
        );
        f.register(
            "ends_with",
            Overload::new(&[Str, Str], Bool, Callable::Binary(ends_with)),
        );
        f
    }

    /// Add an overload. Overloads registered later for the same parameter
    /// kinds shadow earlier ones.
    pub fn register(&mut self, name: impl Into<String>, overload: Overload) {
        let overloads = self.table.entry(name.into()).or_default();
        overloads.retain(|o| o.params != overload.params);
        overloads.push(overload);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Select the overload of `name` accepting `args`.
    pub fn resolve(&self, name: &str, args: &[ValueKind]) -> Result<&Overload> {
        let overloads = self
            .table
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        overloads
            .iter()
            .find(|o| o.params == args && o.params.len() == o.callable.arity())
            .ok_or_else(|| {
                let expected: Vec<String> = overloads.iter().map(|o| o.signature(name)).collect();
                let found: Vec<&str> = args.iter().map(ValueKind::as_str).collect();
                EvalError::mismatch(
                    name,
                    expected.join(" | "),
                    format!("({})", found.join(", ")),
                )
            })
    }
}

// =============================================================================
// Built-ins
// =============================================================================

/// Slice a string that may be borrowed from the event without copying.
fn map_str<'a>(s: Cow<'a, str>, f: fn(&str) -> &str) -> Cow<'a, str> {
    match s {
        Cow::Borrowed(b) => Cow::Borrowed(f(b)),
        Cow::Owned(o) => Cow::Owned(f(&o).to_string()),
    }
}

fn length<'a>(v: Value<'a>) -> Option<Value<'a>> {
    let n = match v {
        Value::Str(s) => s.chars().count(),
        Value::StrArray(items) => items.len(),
        _ => return None,
    };
    i64::try_from(n).ok().map(Value::Int)
}

fn basename_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "" } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn dirname_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(i) => &trimmed[..i],
        None if path.starts_with('/') => "/",
        None => ".",
    }
}

fn basename<'a>(v: Value<'a>) -> Option<Value<'a>> {
    match v {
        Value::Str(s) => Some(Value::Str(map_str(s, basename_of))),
        _ => None,
    }
}

fn dirname<'a>(v: Value<'a>) -> Option<Value<'a>> {
    match v {
        Value::Str(s) => Some(Value::Str(map_str(s, dirname_of))),
        _ => None,
    }
}

fn lower<'a>(v: Value<'a>) -> Option<Value<'a>> {
    match v {
        Value::Str(s) => Some(Value::from(s.to_lowercase())),
        _ => None,
    }
}

fn upper<'a>(v: Value<'a>) -> Option<Value<'a>> {
    match v {
        Value::Str(s) => Some(Value::from(s.to_uppercase())),
        _ => None,
    }
}

/// `substring(s, start, len)` over characters; out-of-range bounds are
/// clamped, negative ones fail.
fn substring<'a>(s: Value<'a>, start: Value<'a>, len: Value<'a>) -> Option<Value<'a>> {
    let (Value::Str(s), Value::Int(start), Value::Int(len)) = (s, start, len) else {
        return None;
    };
    let start = usize::try_from(start).ok()?;
    let len = usize::try_from(len).ok()?;
    Some(Value::from(s.chars().skip(start).take(len).collect::<String>()))
}

fn str_pair<'a, 'b>(a: &'b Value<'a>, b: &'b Value<'a>) -> Option<(&'b str, &'b str)> {
    Some((a.as_str()?, b.as_str()?))
}

fn contains<'a>(a: Value<'a>, b: Value<'a>) -> Option<Value<'a>> {
    str_pair(&a, &b).map(|(a, b)| Value::Bool(a.contains(b)))
}

fn starts_with<'a>(a: Value<'a>, b: Value<'a>) -> Option<Value<'a>> {
    str_pair(&a, &b).map(|(a, b)| Value::Bool(a.starts_with(b)))
}

fn ends_with<'a>(a: Value<'a>, b: Value<'a>) -> Option<Value<'a>> {
    str_pair(&a, &b).map(|(a, b)| Value::Bool(a.ends_with(b)))
}
