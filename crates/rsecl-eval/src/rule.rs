//! Compiled rules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rsecl_parser::Quantifier;

use crate::context::Context;
use crate::evaluator::Evaluator;
use crate::model::EventScope;

/// A rule compiled against a model: a boolean evaluator tree plus the
/// metadata the dispatcher needs.
pub struct Rule<E> {
    pub(crate) id: String,
    pub(crate) expression: String,
    pub(crate) description: Option<String>,
    pub(crate) tags: BTreeMap<String, String>,
    pub(crate) quantifier: Quantifier,
    pub(crate) scope: EventScope,
    pub(crate) used_fields: BTreeSet<String>,
    pub(crate) registers: usize,
    pub(crate) evaluator: Evaluator<E>,
}

impl<E> Rule<E> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source text of the rule.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Quantifier applied to iterable fields referenced outside an explicit
    /// quantifier.
    pub fn quantifier(&self) -> Quantifier {
        self.quantifier
    }

    /// Event types the rule can match; [`EventScope::Any`] when it only
    /// references fields common to every event.
    pub fn event_types(&self) -> &EventScope {
        &self.scope
    }

    pub fn applies_to(&self, event_type: &str) -> bool {
        self.scope.includes(event_type)
    }

    /// Model fields referenced by the rule, macros expanded.
    pub fn used_fields(&self) -> &BTreeSet<String> {
        &self.used_fields
    }

    /// Number of registers the rule's quantifiers occupy.
    pub fn register_count(&self) -> usize {
        self.registers
    }

    pub fn evaluator(&self) -> &Evaluator<E> {
        &self.evaluator
    }

    /// Evaluate against an event using the caller's context.
    pub fn evaluate<'a>(&'a self, ctx: &mut Context<'a, E>) -> bool {
        self.evaluator.eval_bool(ctx)
    }

    /// Evaluate against an event with a fresh context. Does not check the
    /// event type.
    pub fn matches(&self, event: &E) -> bool {
        let mut ctx = Context::new(event);
        self.evaluate(&mut ctx)
    }
}

impl<E> fmt::Debug for Rule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("event_types", &self.scope)
            .field("used_fields", &self.used_fields)
            .field("registers", &self.registers)
            .field("evaluator", &self.evaluator)
            .finish()
    }
}

impl<E> fmt::Display for Rule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.expression)
    }
}
