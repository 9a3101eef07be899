//! Compile parsed rule expressions into evaluator trees bound to a model.
//!
//! The compiler resolves every name (macro first, then model field), checks
//! operand kinds, turns comparisons against constants into pre-built
//! [`CompiledMatcher`]s and assigns each node a static weight. Boolean
//! operands are then reordered cheapest first.
//!
//! ## Quantifiers and registers
//!
//! Every quantifier owns a register for as long as its body is being
//! compiled, allocated in nesting order; once the quantifier closes, its
//! register is free for the next sibling. A rule therefore needs as many
//! registers as its deepest quantifier nesting, at most [`MAX_REGISTERS`].
//! A field bound to an iterator reads the element selected by the
//! register of the innermost quantifier over that iterator. When no such
//! quantifier encloses the field, the smallest enclosing predicate is wrapped
//! in an implicit one (`any` unless the rule asks for `all`), and every
//! reference to that iterator inside the predicate shares the element.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use rsecl_parser::{
    CompareOp, Expr, Literal, MacroBody, MacroDefinition, Quantifier, RuleDefinition,
    parse_expression,
};

use crate::context::MAX_REGISTERS;
use crate::error::{EvalError, Result};
use crate::evaluator::{Call, Evaluator, Node};
use crate::functions::{Callable, Functions};
use crate::matcher::{CompiledMatcher, compile_glob};
use crate::model::{EventScope, ITERATOR_WEIGHT, Model, OPERATOR_WEIGHT};
use crate::rule::Rule;
use crate::value::{Value, ValueKind};

// =============================================================================
// Options and macros
// =============================================================================

/// Compiler configuration.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Quantifier wrapped around predicates that reference an iterable field
    /// outside an explicit `any(...)` / `all(...)`. A rule's own
    /// `quantifier` setting takes precedence.
    pub default_quantifier: Quantifier,
    /// Sort `&&` / `||` operands by weight, cheapest first.
    pub reorder_by_weight: bool,
    pub functions: Arc<Functions>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            default_quantifier: Quantifier::Any,
            reorder_by_weight: true,
            functions: Arc::new(Functions::builtin()),
        }
    }
}

#[derive(Debug, Clone)]
enum Macro {
    Values(Literal),
    Expression(Expr),
}

/// Named constants and sub-expressions referenced by bare id in rules.
#[derive(Debug, Clone, Default)]
pub struct Macros {
    table: HashMap<String, Macro>,
}

impl Macros {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list macro; behaves as an array literal.
    pub fn insert_values(&mut self, id: impl Into<String>, values: Literal) -> Result<()> {
        self.insert(id.into(), Macro::Values(values))
    }

    /// An expression macro; inlined where referenced.
    pub fn insert_expression(&mut self, id: impl Into<String>, expr: Expr) -> Result<()> {
        self.insert(id.into(), Macro::Expression(expr))
    }

    /// Add a macro from a policy document, parsing its expression.
    pub fn insert_definition(&mut self, def: &MacroDefinition) -> Result<()> {
        match def.body()? {
            MacroBody::Expression(text) => {
                let expr = parse_expression(text)?;
                self.insert_expression(def.id.clone(), expr)
            }
            MacroBody::Values(values) => self.insert_values(def.id.clone(), values),
        }
    }

    fn insert(&mut self, id: String, body: Macro) -> Result<()> {
        if self.table.contains_key(&id) {
            return Err(EvalError::DuplicateMacro(id));
        }
        self.table.insert(id, body);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn values(&self, id: &str) -> Option<&Literal> {
        match self.table.get(id) {
            Some(Macro::Values(lit)) => Some(lit),
            _ => None,
        }
    }

    fn expression(&self, id: &str) -> Option<&Expr> {
        match self.table.get(id) {
            Some(Macro::Expression(expr)) => Some(expr),
            _ => None,
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Compiles rules against one model, macro table and option set.
pub struct Compiler<'c, E> {
    model: &'c Model<E>,
    macros: &'c Macros,
    options: &'c CompileOptions,
}

impl<'c, E> Compiler<'c, E> {
    pub fn new(model: &'c Model<E>, macros: &'c Macros, options: &'c CompileOptions) -> Self {
        Compiler {
            model,
            macros,
            options,
        }
    }

    /// Parse and compile a policy rule, carrying over its metadata.
    pub fn compile_rule(&self, def: &RuleDefinition) -> Result<Rule<E>> {
        let text = def.source()?;
        let expr = parse_expression(text)?;
        let mut rule = self.compile_expr(&def.id, &expr, def.quantifier)?;
        rule.expression = text.to_string();
        rule.description = def.description.clone();
        rule.tags = def.tags.clone();
        Ok(rule)
    }

    /// Compile a parsed expression. `quantifier` overrides the default
    /// implicit quantifier for this rule.
    pub fn compile_expr(
        &self,
        id: &str,
        expr: &Expr,
        quantifier: Option<Quantifier>,
    ) -> Result<Rule<E>> {
        let implicit = quantifier.unwrap_or(self.options.default_quantifier);
        let mut binder = Binder::new(self, implicit);
        let evaluator = binder.compile_bool(expr)?;

        let scope = if binder.event_types.is_empty() {
            EventScope::Any
        } else {
            EventScope::Only(binder.event_types)
        };
        log::debug!(
            "compiled rule '{id}': weight {}, {} registers, event types {scope}",
            evaluator.weight(),
            binder.max_registers,
        );

        Ok(Rule {
            id: id.to_string(),
            expression: expr.to_string(),
            description: None,
            tags: BTreeMap::new(),
            quantifier: implicit,
            scope,
            used_fields: binder.used_fields,
            registers: binder.max_registers,
            evaluator,
        })
    }
}

/// Compile an expression with default options and no macros.
pub fn compile<E>(expr: &Expr, model: &Model<E>) -> Result<Rule<E>> {
    let macros = Macros::new();
    let options = CompileOptions::default();
    Compiler::new(model, &macros, &options).compile_expr("", expr, None)
}

/// Parse and compile rule text with default options and no macros.
pub fn compile_expression<E>(id: &str, text: &str, model: &Model<E>) -> Result<Rule<E>> {
    let expr = parse_expression(text)?;
    let macros = Macros::new();
    let options = CompileOptions::default();
    Compiler::new(model, &macros, &options).compile_expr(id, &expr, None)
}

// =============================================================================
// Binder
// =============================================================================

#[derive(Debug, Clone)]
struct Binding {
    iterator: String,
    register: usize,
}

/// Per-rule compilation state.
struct Binder<'c, E> {
    model: &'c Model<E>,
    macros: &'c Macros,
    options: &'c CompileOptions,
    implicit: Quantifier,
    /// First free register; quantifiers release theirs when they close.
    next_register: usize,
    max_registers: usize,
    /// Quantifiers enclosing the node being compiled, innermost last.
    bound: Vec<Binding>,
    /// Implicit quantifiers opened by each enclosing predicate.
    pending: Vec<Vec<Binding>>,
    /// Expression macros being expanded, for cycle detection.
    expanding: Vec<String>,
    event_types: BTreeSet<String>,
    used_fields: BTreeSet<String>,
}

impl<'c, E> Binder<'c, E> {
    fn new(compiler: &Compiler<'c, E>, implicit: Quantifier) -> Self {
        Binder {
            model: compiler.model,
            macros: compiler.macros,
            options: compiler.options,
            implicit,
            next_register: 0,
            max_registers: 0,
            bound: Vec::new(),
            pending: Vec::new(),
            expanding: Vec::new(),
            event_types: BTreeSet::new(),
            used_fields: BTreeSet::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Boolean structure
    // -------------------------------------------------------------------------

    fn compile_bool(&mut self, expr: &Expr) -> Result<Evaluator<E>> {
        match expr {
            Expr::And(children) => self.compile_logical(children, true),
            Expr::Or(children) => self.compile_logical(children, false),
            Expr::Not(inner) => {
                let inner = self.compile_bool(inner)?;
                Ok(Evaluator::new(
                    ValueKind::Bool,
                    inner.weight.saturating_add(OPERATOR_WEIGHT),
                    inner.registers,
                    Node::Not(Box::new(inner)),
                ))
            }
            Expr::Quantified {
                quantifier,
                iterator,
                body,
            } => self.compile_quantifier(*quantifier, iterator.as_deref(), body),
            Expr::Field(name) if self.macros.expression(name).is_some() => self.expand_macro(name),
            _ => self.compile_predicate(expr),
        }
    }

    fn compile_logical(&mut self, children: &[Expr], conjunction: bool) -> Result<Evaluator<E>> {
        let mut compiled = children
            .iter()
            .map(|c| self.compile_bool(c))
            .collect::<Result<Vec<_>>>()?;
        if self.options.reorder_by_weight {
            compiled.sort_by_key(Evaluator::weight);
        }
        Ok(logical(compiled, conjunction))
    }

    /// Compile a leaf predicate and close the implicit quantifiers it opened.
    fn compile_predicate(&mut self, expr: &Expr) -> Result<Evaluator<E>> {
        let base = self.next_register;
        self.pending.push(Vec::new());
        let result = self.compile_value(expr);
        let frame = self.pending.pop().unwrap_or_default();

        let mut evaluator = result?;
        if evaluator.kind != ValueKind::Bool {
            return Err(EvalError::mismatch(
                expr.to_string(),
                ValueKind::Bool.as_str(),
                evaluator.kind.as_str(),
            ));
        }
        // First allocated is outermost.
        for binding in frame.into_iter().rev() {
            evaluator = self.quantifier_node(self.implicit, binding, evaluator)?;
        }
        self.next_register = base;
        Ok(evaluator)
    }

    fn expand_macro(&mut self, name: &str) -> Result<Evaluator<E>> {
        if self.expanding.iter().any(|m| m == name) {
            let mut chain = self.expanding.clone();
            chain.push(name.to_string());
            return Err(EvalError::MacroCycle(chain));
        }
        let macros = self.macros;
        let body = macros
            .expression(name)
            .ok_or_else(|| EvalError::FieldNotFound(name.to_string()))?;

        self.expanding.push(name.to_string());
        let result = self.compile_bool(body);
        self.expanding.pop();
        result
    }

    // -------------------------------------------------------------------------
    // Quantifiers
    // -------------------------------------------------------------------------

    fn compile_quantifier(
        &mut self,
        quantifier: Quantifier,
        iterator: Option<&str>,
        body: &Expr,
    ) -> Result<Evaluator<E>> {
        let iterator = match iterator {
            Some(name) => self.model.iterator_for(name)?.name().to_string(),
            None => {
                let mut found = BTreeSet::new();
                self.collect_iterators(body, &mut found, &mut Vec::new());
                let (bound, mut unbound): (BTreeSet<_>, BTreeSet<_>) =
                    found.into_iter().partition(|it| self.is_bound(it));
                if unbound.len() > 1 {
                    return Err(EvalError::AmbiguousIterator(unbound.into_iter().collect()));
                }
                match unbound.pop_first() {
                    Some(iterator) => iterator,
                    // Only already bound iterators: rebind the innermost.
                    None => self
                        .bound
                        .iter()
                        .rev()
                        .find(|b| bound.contains(&b.iterator))
                        .map(|b| b.iterator.clone())
                        .ok_or_else(|| EvalError::IteratorNotSupported(body.to_string()))?,
                }
            }
        };

        let base = self.next_register;
        let register = self.allocate_register()?;
        let binding = Binding { iterator, register };
        self.bound.push(binding.clone());
        let body = self.compile_bool(body);
        self.bound.pop();
        self.next_register = base;

        self.quantifier_node(quantifier, binding, body?)
    }

    /// Build the loop node. For `any` over a conjunction, conjuncts that do
    /// not read the loop register are evaluated once, before the loop.
    /// The iterator's event scope joins the rule's.
    fn quantifier_node(
        &mut self,
        quantifier: Quantifier,
        binding: Binding,
        body: Evaluator<E>,
    ) -> Result<Evaluator<E>> {
        let model = self.model;
        let it = model
            .iterator(&binding.iterator)
            .ok_or_else(|| EvalError::IteratorNotSupported(binding.iterator.clone()))?;
        let len = it.len_fn();
        if let EventScope::Only(types) = it.scope() {
            self.event_types.extend(types.iter().cloned());
        }

        let (mut hoisted, body) = if quantifier == Quantifier::Any {
            split_invariant(binding.register, body)
        } else {
            (Vec::new(), body)
        };

        let bit = 1u32 << binding.register;
        let node = Evaluator::new(
            ValueKind::Bool,
            body.weight.saturating_add(ITERATOR_WEIGHT),
            body.registers & !bit,
            Node::Quantifier {
                quantifier,
                iterator: binding.iterator,
                len,
                register: binding.register,
                body: Box::new(body),
            },
        );

        if hoisted.is_empty() {
            return Ok(node);
        }
        hoisted.push(node);
        Ok(logical(hoisted, true))
    }

    fn allocate_register(&mut self) -> Result<usize> {
        if self.next_register >= MAX_REGISTERS {
            return Err(EvalError::TooManyRegisters(MAX_REGISTERS));
        }
        self.next_register += 1;
        self.max_registers = self.max_registers.max(self.next_register);
        Ok(self.next_register - 1)
    }

    fn is_bound(&self, iterator: &str) -> bool {
        self.bound.iter().any(|b| b.iterator == iterator)
    }

    /// Register holding the current element of `iterator`, opening an
    /// implicit quantifier on the current predicate when none is bound.
    fn register_for(&mut self, iterator: &str) -> Result<usize> {
        if let Some(b) = self.bound.iter().rev().find(|b| b.iterator == iterator) {
            return Ok(b.register);
        }
        if let Some(b) = self
            .pending
            .last()
            .and_then(|frame| frame.iter().find(|b| b.iterator == iterator))
        {
            return Ok(b.register);
        }
        if self.pending.is_empty() {
            return Err(EvalError::IteratorNotSupported(iterator.to_string()));
        }
        let register = self.allocate_register()?;
        if let Some(frame) = self.pending.last_mut() {
            frame.push(Binding {
                iterator: iterator.to_string(),
                register,
            });
        }
        Ok(register)
    }

    /// Iterators referenced by `expr`, bound or not. Nested quantifiers bind
    /// their own iterator and are not searched.
    fn collect_iterators(
        &self,
        expr: &Expr,
        out: &mut BTreeSet<String>,
        visiting: &mut Vec<String>,
    ) {
        match expr {
            Expr::And(children) | Expr::Or(children) => {
                for c in children {
                    self.collect_iterators(c, out, visiting);
                }
            }
            Expr::Not(inner) => self.collect_iterators(inner, out, visiting),
            Expr::Compare { lhs, rhs, .. } => {
                self.collect_iterators(lhs, out, visiting);
                self.collect_iterators(rhs, out, visiting);
            }
            Expr::Call { args, .. } => {
                for a in args {
                    self.collect_iterators(a, out, visiting);
                }
            }
            Expr::Literal(_) | Expr::Quantified { .. } => {}
            Expr::Field(name) => {
                if let Some(body) = self.macros.expression(name) {
                    if !visiting.contains(name) {
                        visiting.push(name.clone());
                        self.collect_iterators(body, out, visiting);
                        visiting.pop();
                    }
                    return;
                }
                if let Ok(field) = self.model.resolve(name)
                    && let Some(it) = field.iterator_name()
                {
                    out.insert(it.to_string());
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    fn compile_value(&mut self, expr: &Expr) -> Result<Evaluator<E>> {
        match expr {
            Expr::Literal(lit) => compile_literal(lit),
            Expr::Field(name) => self.compile_name(name),
            Expr::Call { name, args } => self.compile_call(name, args),
            Expr::Compare { op, lhs, rhs } => self.compile_compare(*op, lhs, rhs),
            Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::Quantified { .. } => {
                self.compile_bool(expr)
            }
        }
    }

    fn compile_name(&mut self, name: &str) -> Result<Evaluator<E>> {
        let macros = self.macros;
        if let Some(values) = macros.values(name) {
            return compile_literal(values);
        }
        if macros.expression(name).is_some() {
            return self.expand_macro(name);
        }

        let model = self.model;
        let field = model.resolve(name)?;
        let register = match field.iterator_name() {
            Some(it) => Some(self.register_for(it)?),
            None => None,
        };

        self.used_fields.insert(name.to_string());
        if let EventScope::Only(types) = field.scope() {
            self.event_types.extend(types.iter().cloned());
        }

        Ok(Evaluator::new(
            field.kind(),
            field.cost(),
            register.map_or(0, |r| 1 << r),
            Node::Field {
                name: name.to_string(),
                getter: field.getter(),
                register,
            },
        ))
    }

    fn compile_call(&mut self, name: &str, args: &[Expr]) -> Result<Evaluator<E>> {
        let compiled = args
            .iter()
            .map(|a| self.compile_value(a))
            .collect::<Result<Vec<_>>>()?;
        let kinds: Vec<ValueKind> = compiled.iter().map(Evaluator::kind).collect();

        let options = self.options;
        let overload = options.functions.resolve(name, &kinds)?;
        let weight = sum_weights(&compiled).saturating_add(overload.weight);
        let registers = compiled.iter().fold(0, |m, c| m | c.registers);

        let call = match overload.callable {
            Callable::Unary(f) => {
                let [a] = take_args(name, compiled)?;
                Call::Unary(f, Box::new(a))
            }
            Callable::Binary(f) => {
                let [a, b] = take_args(name, compiled)?;
                Call::Binary(f, Box::new(a), Box::new(b))
            }
            Callable::Ternary(f) => {
                let [a, b, c] = take_args(name, compiled)?;
                Call::Ternary(f, Box::new(a), Box::new(b), Box::new(c))
            }
        };

        Ok(Evaluator::new(
            overload.returns,
            weight,
            registers,
            Node::Call {
                name: name.to_string(),
                call,
            },
        ))
    }

    /// A literal, or a list macro standing for one.
    fn constant_of(&self, expr: &Expr) -> Option<Literal> {
        match expr {
            Expr::Literal(lit) => Some(lit.clone()),
            Expr::Field(name) => self.macros.values(name).cloned(),
            _ => None,
        }
    }

    fn compile_compare(&mut self, op: CompareOp, lhs: &Expr, rhs: &Expr) -> Result<Evaluator<E>> {
        // Literal on the left: `0 == process.uid` -> `process.uid == 0`.
        let (op, lhs, rhs) = match op.swapped() {
            Some(swapped)
                if self.constant_of(lhs).is_some() && self.constant_of(rhs).is_none() =>
            {
                (swapped, rhs, lhs)
            }
            _ => (op, lhs, rhs),
        };

        if let Some(constant) = self.constant_of(rhs) {
            let operand = self.compile_value(lhs)?;
            let matcher = build_matcher(op, operand.kind, &constant, &lhs.to_string())?;
            return Ok(Evaluator::new(
                ValueKind::Bool,
                operand.weight.saturating_add(matcher.weight()),
                operand.registers,
                Node::Match {
                    operand: Box::new(operand),
                    matcher,
                    negate: op.is_negated(),
                },
            ));
        }

        let l = self.compile_value(lhs)?;
        let r = self.compile_value(rhs)?;
        check_dynamic(op, &l, &r, lhs, rhs)?;
        Ok(Evaluator::new(
            ValueKind::Bool,
            l.weight
                .saturating_add(r.weight)
                .saturating_add(OPERATOR_WEIGHT),
            l.registers | r.registers,
            Node::Compare {
                op,
                lhs: Box::new(l),
                rhs: Box::new(r),
            },
        ))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn sum_weights<E>(children: &[Evaluator<E>]) -> u32 {
    children
        .iter()
        .fold(0u32, |acc, c| acc.saturating_add(c.weight))
}

fn logical<E>(mut children: Vec<Evaluator<E>>, conjunction: bool) -> Evaluator<E> {
    if children.len() == 1
        && let Some(only) = children.pop()
    {
        return only;
    }
    let weight = sum_weights(&children).saturating_add(OPERATOR_WEIGHT);
    let registers = children.iter().fold(0, |m, c| m | c.registers);
    let node = if conjunction {
        Node::And(children)
    } else {
        Node::Or(children)
    };
    Evaluator::new(ValueKind::Bool, weight, registers, node)
}

/// Separate the conjuncts of `body` that do not read `register`. Returns the
/// hoisted conjuncts (flagged partial) and what remains inside the loop.
fn split_invariant<E>(register: usize, body: Evaluator<E>) -> (Vec<Evaluator<E>>, Evaluator<E>) {
    let Evaluator {
        kind,
        weight,
        registers,
        partial,
        node,
    } = body;
    match node {
        Node::And(children)
            if children.iter().any(|c| c.depends_on(register))
                && children.iter().any(|c| !c.depends_on(register)) =>
        {
            let (dependent, mut invariant): (Vec<_>, Vec<_>) =
                children.into_iter().partition(|c| c.depends_on(register));
            for c in &mut invariant {
                c.partial = true;
            }
            (invariant, logical(dependent, true))
        }
        node => (
            Vec::new(),
            Evaluator {
                kind,
                weight,
                registers,
                partial,
                node,
            },
        ),
    }
}

fn take_args<E, const N: usize>(name: &str, args: Vec<Evaluator<E>>) -> Result<[Evaluator<E>; N]> {
    <[Evaluator<E>; N]>::try_from(args).map_err(|args| {
        EvalError::mismatch(
            name,
            format!("{N} arguments"),
            format!("{} arguments", args.len()),
        )
    })
}

fn int_of(lit: &Literal) -> Option<i64> {
    match lit {
        Literal::Int(n) => Some(*n),
        Literal::Duration(d) => i64::try_from(d.as_nanos()).ok(),
        _ => None,
    }
}

/// Runtime value of a literal used as an operand.
fn literal_value(lit: &Literal) -> Option<Value<'static>> {
    match lit {
        Literal::Bool(b) => Some(Value::Bool(*b)),
        Literal::Int(_) | Literal::Duration(_) => int_of(lit).map(Value::Int),
        Literal::Str(s) => Some(Value::from(s.clone())),
        Literal::Ip(net) if net.prefix_len() == net.max_prefix_len() => Some(Value::Ip(net.addr())),
        Literal::Array(items) => items
            .iter()
            .map(|item| match item {
                Literal::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect::<Option<Vec<String>>>()
            .map(Value::from),
        Literal::Ip(_) | Literal::Pattern(_) | Literal::Regex(_) => None,
    }
}

fn compile_literal<E>(lit: &Literal) -> Result<Evaluator<E>> {
    literal_value(lit)
        .map(Evaluator::constant)
        .ok_or_else(|| {
            EvalError::mismatch(
                lit.to_string(),
                "bool, int, string, string array or ip address",
                lit.type_name(),
            )
        })
}

/// Matcher for `==` / `!=` against a single literal; `None` when the kinds
/// do not fit.
fn scalar_matcher(kind: ValueKind, lit: &Literal) -> Result<Option<CompiledMatcher>> {
    let matcher = match (kind, lit) {
        (ValueKind::Str | ValueKind::StrArray, Literal::Str(s)) => CompiledMatcher::Exact(s.clone()),
        (ValueKind::Str | ValueKind::StrArray, Literal::Pattern(p)) => compile_glob(p)?,
        (ValueKind::Str | ValueKind::StrArray, Literal::Regex(r)) => {
            CompiledMatcher::Regex(Regex::new(r)?)
        }
        (ValueKind::Int, Literal::Int(_) | Literal::Duration(_)) => match int_of(lit) {
            Some(n) => CompiledMatcher::IntEq(n),
            None => return Ok(None),
        },
        (ValueKind::Bool, Literal::Bool(b)) => CompiledMatcher::BoolEq(*b),
        (ValueKind::Ip, Literal::Ip(net)) => CompiledMatcher::Cidr(*net),
        _ => return Ok(None),
    };
    Ok(Some(matcher))
}

fn build_matcher(
    op: CompareOp,
    kind: ValueKind,
    lit: &Literal,
    subject: &str,
) -> Result<CompiledMatcher> {
    match op {
        CompareOp::Eq | CompareOp::Ne => scalar_matcher(kind, lit)?
            .ok_or_else(|| EvalError::mismatch(subject, kind.as_str(), lit.type_name())),

        CompareOp::Match | CompareOp::NotMatch => {
            if !kind.is_string() {
                return Err(EvalError::mismatch(subject, "string", kind.as_str()));
            }
            match lit {
                Literal::Str(p) | Literal::Pattern(p) => Ok(compile_glob(p)?),
                Literal::Regex(r) => Ok(CompiledMatcher::Regex(Regex::new(r)?)),
                other => Err(EvalError::mismatch(
                    subject,
                    "pattern or regex",
                    other.type_name(),
                )),
            }
        }

        CompareOp::In | CompareOp::NotIn => {
            let items = match lit {
                Literal::Array(items) => items.as_slice(),
                other => std::slice::from_ref(other),
            };
            set_matcher(kind, items, subject)
        }

        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            if kind != ValueKind::Int {
                return Err(EvalError::mismatch(subject, "int", kind.as_str()));
            }
            let n = int_of(lit)
                .ok_or_else(|| EvalError::mismatch(subject, "int", lit.type_name()))?;
            Ok(match op {
                CompareOp::Lt => CompiledMatcher::IntLt(n),
                CompareOp::Le => CompiledMatcher::IntLte(n),
                CompareOp::Gt => CompiledMatcher::IntGt(n),
                _ => CompiledMatcher::IntGte(n),
            })
        }
    }
}

/// Matcher for `in` / `not in`: plain strings and integers are hashed,
/// patterns, regexes and networks are tried in turn.
fn set_matcher(kind: ValueKind, items: &[Literal], subject: &str) -> Result<CompiledMatcher> {
    let mut strings = HashSet::new();
    let mut ints = HashSet::new();
    let mut others = Vec::new();

    for item in items {
        match (kind, item) {
            (ValueKind::Str | ValueKind::StrArray, Literal::Str(s)) => {
                strings.insert(s.clone());
            }
            (ValueKind::Int, Literal::Int(_) | Literal::Duration(_)) => {
                let n = int_of(item)
                    .ok_or_else(|| EvalError::mismatch(subject, "int", item.type_name()))?;
                ints.insert(n);
            }
            _ => {
                let matcher = scalar_matcher(kind, item)?.ok_or_else(|| {
                    EvalError::mismatch(subject, format!("{kind} values"), item.type_name())
                })?;
                others.push(matcher);
            }
        }
    }

    let mut matchers = Vec::with_capacity(others.len() + 2);
    if !strings.is_empty() {
        matchers.push(CompiledMatcher::Set(strings));
    }
    if !ints.is_empty() {
        matchers.push(CompiledMatcher::IntSet(ints));
    }
    matchers.extend(others);

    if matchers.len() == 1
        && let Some(only) = matchers.pop()
    {
        return Ok(only);
    }
    Ok(CompiledMatcher::AnyOf(matchers))
}

fn check_dynamic<E>(
    op: CompareOp,
    l: &Evaluator<E>,
    r: &Evaluator<E>,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<()> {
    let (lk, rk) = (l.kind, r.kind);
    let failure = match op {
        CompareOp::Eq | CompareOp::Ne => {
            (lk != rk && !(lk.is_string() && rk.is_string())).then(|| (rhs, lk.as_str(), rk))
        }
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            if lk != ValueKind::Int {
                Some((lhs, "int", lk))
            } else {
                (rk != ValueKind::Int).then(|| (rhs, "int", rk))
            }
        }
        CompareOp::In | CompareOp::NotIn => {
            if !lk.is_string() {
                Some((lhs, "string", lk))
            } else {
                (rk != ValueKind::StrArray).then(|| (rhs, "string[]", rk))
            }
        }
        CompareOp::Match | CompareOp::NotMatch => Some((rhs, "pattern or regex literal", rk)),
    };
    match failure {
        Some((operand, expected, found)) => Err(EvalError::mismatch(
            operand.to_string(),
            expected,
            found.as_str(),
        )),
        None => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Property tests
// =============================================================================
