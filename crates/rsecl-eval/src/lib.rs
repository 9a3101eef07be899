//! # rsecl-eval
//!
//! Compiler and evaluator for rsecl security rules.
//!
//! This crate consumes the AST produced by [`rsecl_parser`], binds it to a
//! [`Model`] describing the fields of a concrete event type, and evaluates
//! the result against events using a compile-then-evaluate model.
//!
//! ## Architecture
//!
//! - **Model**: fields and iterators registered with plain function-pointer
//!   accessors, so name resolution happens once at compile time.
//! - **Compiler**: type checks every comparison, builds matchers for
//!   constants, wraps iterable fields in quantifiers and orders boolean
//!   operands by static weight.
//! - **Evaluation**: one [`Context`] per call holds the event and the
//!   quantifier registers; an absent field makes its predicate false.
//! - **Dispatch**: a [`RuleSet`] indexes rules by event type; an [`Engine`]
//!   publishes rule sets as immutable generations.
//!
//! ## Quick Start
//!
//! ```rust
//! use rsecl_eval::{Event, Field, FieldIterator, Model, Value, ValueKind, compile_expression};
//!
//! struct Exec {
//!     name: String,
//!     ancestors: Vec<String>,
//! }
//!
//! impl Event for Exec {
//!     fn event_type(&self) -> &str {
//!         "exec"
//!     }
//! }
//!
//! let model = Model::builder()
//!     .iterator(FieldIterator::new("process.ancestors", |e: &Exec| e.ancestors.len()))
//!     .field(
//!         Field::<Exec>::new("exec.name", ValueKind::Str, |e, _| {
//!             Some(Value::from(e.name.as_str()))
//!         })
//!         .event_type("exec"),
//!     )
//!     .field(
//!         Field::<Exec>::new("process.ancestors.name", ValueKind::Str, |e, i| {
//!             e.ancestors.get(i?).map(|a| Value::from(a.as_str()))
//!         })
//!         .iterator("process.ancestors"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let rule = compile_expression(
//!     "shell-from-sshd",
//!     r#"exec.name in ["sh", "bash"] && process.ancestors.name == "sshd""#,
//!     &model,
//! )
//! .unwrap();
//!
//! let event = Exec {
//!     name: "bash".into(),
//!     ancestors: vec!["sshd".into(), "systemd".into()],
//! };
//! assert!(rule.matches(&event));
//! assert!(rule.applies_to("exec"));
//! ```

pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod functions;
pub mod iterator;
pub mod matcher;
pub mod model;
pub mod result;
pub mod rule;
pub mod store;
pub mod value;

#[cfg(test)]
mod fixtures;

// Re-export the most commonly used types and functions at crate root
pub use compiler::{CompileOptions, Compiler, Macros, compile, compile_expression};
pub use context::{Context, MAX_REGISTERS};
pub use engine::{Engine, EngineState};
pub use error::{CompileError, EvalError, Result};
pub use evaluator::Evaluator;
pub use event::{Event, WILDCARD};
pub use functions::{Callable, Functions, Overload};
pub use iterator::FieldIterator;
pub use matcher::CompiledMatcher;
pub use model::{
    EventScope, FUNCTION_WEIGHT, Field, Getter, HANDLER_WEIGHT, IN_ARRAY_WEIGHT, ITERATOR_WEIGHT,
    Model, ModelBuilder, OPERATOR_WEIGHT, PATTERN_WEIGHT, Setter,
};
pub use result::{FieldMatch, MatchResult};
pub use rule::Rule;
pub use store::{LoadReport, RuleSet, RuleSetBuilder};
pub use value::{Value, ValueKind};
