//! Compilation and evaluation error types.

use thiserror::Error;

/// Errors that can occur while building a model or compiling a rule.
///
/// Evaluation itself never fails: a field that cannot be read on a given
/// event makes the enclosing predicate false.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A name is neither a macro nor a field of the model.
    #[error("unknown field: {0}")]
    FieldNotFound(String),

    /// The name does not designate an iterator, or a quantifier body
    /// references no iterable field.
    #[error("no iterator available for '{0}'")]
    IteratorNotSupported(String),

    /// A quantifier body references several unbound iterators and none was
    /// named explicitly.
    #[error("ambiguous iterator, candidates: {}", .0.join(", "))]
    AmbiguousIterator(Vec<String>),

    #[error("type mismatch on '{field}': expected {expected}, found {found}")]
    ValueTypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field is read-only: {0}")]
    ReadOnlyField(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// More quantifiers in one rule than the context has registers.
    #[error("rule needs more than {0} registers")]
    TooManyRegisters(usize),

    /// A macro expands into itself; the chain is listed in expansion order.
    #[error("macro cycle: {}", .0.join(" -> "))]
    MacroCycle(Vec<String>),

    #[error("duplicate field or iterator: {0}")]
    DuplicateField(String),

    #[error("duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("duplicate macro id: {0}")]
    DuplicateMacro(String),

    /// A parser error propagated during compilation.
    #[error("parser error: {0}")]
    Parser(#[from] rsecl_parser::ParseError),
}

impl EvalError {
    pub(crate) fn mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        EvalError::ValueTypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// A rule (or macro) rejected while loading a policy set.
#[derive(Debug, Error)]
#[error("rule '{rule_id}': {source}")]
pub struct CompileError {
    pub rule_id: String,
    #[source]
    pub source: EvalError,
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EvalError>;
