//! Iterators over repeated event sub-structures and the quantifier loop.
//!
//! An iterator (e.g. `process.ancestors`) only knows how many elements an
//! event carries. Fields bound to it take the element index from a register
//! of the [`Context`], so a quantifier evaluates its body once per element by
//! rebinding its register.

use rsecl_parser::Quantifier;

use crate::context::Context;
use crate::evaluator::Evaluator;
use crate::model::EventScope;

/// Number of elements of the sub-structure on an event.
pub type LenFn<E> = fn(&E) -> usize;

/// A stateless element-sequence factory for one array-valued sub-structure.
pub struct FieldIterator<E> {
    name: String,
    scope: EventScope,
    len: LenFn<E>,
}

impl<E> FieldIterator<E> {
    pub fn new(name: impl Into<String>, len: LenFn<E>) -> Self {
        FieldIterator {
            name: name.into(),
            scope: EventScope::Any,
            len,
        }
    }

    /// Attach the iterator to an event type.
    pub fn event_type(mut self, event_type: &str) -> Self {
        self.scope.insert(event_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &EventScope {
        &self.scope
    }

    pub fn len_fn(&self) -> LenFn<E> {
        self.len
    }

    /// A fresh element sequence for `event`.
    pub fn elements(&self, event: &E) -> Elements {
        Elements::new((self.len)(event))
    }
}

impl<E> Clone for FieldIterator<E> {
    fn clone(&self) -> Self {
        FieldIterator {
            name: self.name.clone(),
            scope: self.scope.clone(),
            len: self.len,
        }
    }
}

impl<E> std::fmt::Debug for FieldIterator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldIterator")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Lazy, finite sequence of element indices.
#[derive(Debug, Clone)]
pub struct Elements {
    next: usize,
    len: usize,
}

impl Elements {
    pub fn new(len: usize) -> Self {
        Elements { next: 0, len }
    }
}

impl Iterator for Elements {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next < self.len {
            self.next += 1;
            Some(self.next - 1)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Elements {}

/// Evaluate `body` once per element, with `register` bound to the element.
///
/// `any` stops at the first true element, `all` at the first false one. With
/// no elements `any` is false and `all` is true. The register's previous
/// binding is restored before returning.
pub(crate) fn quantify<'a, E>(
    quantifier: Quantifier,
    len: LenFn<E>,
    register: usize,
    body: &'a Evaluator<E>,
    ctx: &mut Context<'a, E>,
) -> bool {
    let elements = Elements::new(len(ctx.event()));
    let saved = ctx.bind(register, None);

    let mut result = quantifier == Quantifier::All;
    for index in elements {
        ctx.bind(register, Some(index));
        let hit = body.eval_bool(ctx);
        match quantifier {
            Quantifier::Any if hit => {
                result = true;
                break;
            }
            Quantifier::All if !hit => {
                result = false;
                break;
            }
            _ => {}
        }
    }

    ctx.bind(register, saved);
    result
}
