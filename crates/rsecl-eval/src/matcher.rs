//! Compiled matchers for comparisons against constants.
//!
//! When one side of a comparison is a literal, the compiler builds a
//! `CompiledMatcher` once at rule load time (string sets hashed, globs and
//! regexes compiled). At evaluation time `matches()` tests a field value
//! without allocating.

use std::borrow::Cow;
use std::collections::HashSet;

use ipnet::IpNet;
use regex::Regex;

use crate::model::{IN_ARRAY_WEIGHT, OPERATOR_WEIGHT, PATTERN_WEIGHT};
use crate::value::Value;

/// A pre-compiled matcher for a single value comparison.
///
/// A string array value matches when any of its elements matches.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    // -- String matchers --
    /// Exact string equality.
    Exact(String),

    /// Membership in a set of strings.
    Set(HashSet<String>),

    /// Glob pattern, compiled to an anchored regex.
    Pattern(Regex),

    /// User-supplied regular expression (unanchored).
    Regex(Regex),

    // -- Numeric --
    IntEq(i64),
    IntGt(i64),
    IntGte(i64),
    IntLt(i64),
    IntLte(i64),
    IntSet(HashSet<i64>),

    // -- Network --
    /// Address inside a network; a host network matches one address.
    Cidr(IpNet),

    BoolEq(bool),

    // -- Composite --
    /// Match if ANY child matches (OR).
    AnyOf(Vec<CompiledMatcher>),
}

impl CompiledMatcher {
    /// Check if this matcher matches a value read from an event.
    pub fn matches(&self, value: &Value<'_>) -> bool {
        if let Value::StrArray(items) = value {
            return items
                .iter()
                .any(|s| self.matches(&Value::Str(Cow::Borrowed(s.as_str()))));
        }

        match (self, value) {
            (CompiledMatcher::AnyOf(matchers), v) => matchers.iter().any(|m| m.matches(v)),

            (CompiledMatcher::Exact(expected), Value::Str(s)) => **s == **expected,
            (CompiledMatcher::Set(set), Value::Str(s)) => set.contains(&**s),
            (CompiledMatcher::Pattern(re) | CompiledMatcher::Regex(re), Value::Str(s)) => {
                re.is_match(s)
            }

            (CompiledMatcher::IntEq(n), Value::Int(v)) => v == n,
            (CompiledMatcher::IntGt(n), Value::Int(v)) => v > n,
            (CompiledMatcher::IntGte(n), Value::Int(v)) => v >= n,
            (CompiledMatcher::IntLt(n), Value::Int(v)) => v < n,
            (CompiledMatcher::IntLte(n), Value::Int(v)) => v <= n,
            (CompiledMatcher::IntSet(set), Value::Int(v)) => set.contains(v),

            (CompiledMatcher::Cidr(net), Value::Ip(ip)) => net.contains(ip),
            (CompiledMatcher::BoolEq(expected), Value::Bool(b)) => b == expected,

            _ => false,
        }
    }

    /// Static cost of running this matcher.
    pub fn weight(&self) -> u32 {
        match self {
            CompiledMatcher::Set(_) | CompiledMatcher::IntSet(_) => IN_ARRAY_WEIGHT,
            CompiledMatcher::Pattern(_) | CompiledMatcher::Regex(_) => PATTERN_WEIGHT,
            CompiledMatcher::AnyOf(matchers) => matchers.iter().map(Self::weight).sum(),
            _ => OPERATOR_WEIGHT,
        }
    }
}

/// Convert a glob pattern to an anchored regex: `*` matches any run of
/// characters, everything else is literal.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for (i, part) in pattern.split('*').enumerate() {
        if i > 0 {
            out.push_str(".*");
        }
        out.push_str(&regex::escape(part));
    }
    out.push('$');
    out
}

/// Compile a glob pattern.
pub fn compile_glob(pattern: &str) -> Result<CompiledMatcher, regex::Error> {
    Regex::new(&glob_to_regex(pattern)).map(CompiledMatcher::Pattern)
}
