//! # rsecl-parser
//!
//! Parser for the rsecl security rule language and its policy documents.
//!
//! This crate turns rule text into a strongly-typed AST without consulting any
//! field schema; binding field names to accessors is the evaluator's job.
//!
//! - **Expressions**: comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`), pattern
//!   matching (`=~`, `!~`), membership (`in`, `not in`), boolean combinators
//!   (`&&`, `||`, `!` and their keyword forms), function calls and the
//!   `any(...)` / `all(...)` quantifiers
//! - **Literals**: integers, strings, glob patterns `~"..."`, regexes `r"..."`,
//!   durations (`10s`, `5m`), IP addresses and CIDRs, arrays
//! - **Policies**: YAML documents grouping named rules, macros and tags
//!
//! ## Architecture
//!
//! - **PEG grammar** ([`pest`]) with Pratt parsing for operator precedence
//!   (`!` > `&&` > `||`)
//! - **serde_yaml** for policy documents
//!
//! ## Quick Start
//!
//! ```rust
//! use rsecl_parser::{Expr, parse_expression};
//!
//! let expr = parse_expression(r#"exec.file.name == "nc" && !async"#).unwrap();
//! assert!(matches!(expr, Expr::And(_)));
//! ```
//!
//! ## Syntax errors
//!
//! ```rust
//! use rsecl_parser::{ParseError, parse_expression};
//!
//! let err = parse_expression("exec.file.name ==").unwrap_err();
//! assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
//! ```

pub mod ast;
pub mod error;
pub mod expression;
pub mod policy;

pub use ast::{CompareOp, Expr, Literal, Quantifier};
pub use error::{ParseError, Result};
pub use expression::parse_expression;
pub use policy::{
    MacroBody, MacroDefinition, MacroValue, Policy, PolicySet, RuleDefinition, load_policies,
    parse_policy_directory, parse_policy_file, parse_policy_yaml,
};
