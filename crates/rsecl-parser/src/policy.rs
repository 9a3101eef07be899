//! Policy documents: named rules and macros loaded from YAML.
//!
//! A policy file holds one YAML document:
//!
//! ```yaml
//! version: "1"
//! macros:
//!   - id: shells
//!     values: ["bash", "sh"]
//! rules:
//!   - id: shell_exec
//!     expression: exec.file.name in shells
//!     tags:
//!       severity: high
//! ```
//!
//! Expressions are kept as text here; they are parsed when the rule set is
//! compiled so that a syntax error rejects only the rule that carries it.
//! Entries are read leniently for the same reason: a rule without an id or
//! expression, or a macro with two bodies, is rejected on its own by
//! [`RuleDefinition::source`] and [`MacroDefinition::body`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::{Literal, Quantifier};
use crate::error::{ParseError, Result};

/// One rule as written in a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form tags copied into every finding produced by the rule.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Quantifier applied to array-valued fields referenced outside an
    /// explicit `any(...)` / `all(...)`. Defaults to the compiler setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantifier: Option<Quantifier>,
    #[serde(default)]
    pub disabled: bool,
}

/// A reusable macro: either a list of values or a sub-expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<MacroValue>>,
}

/// A scalar inside a `values` macro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MacroValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl MacroValue {
    pub fn to_literal(&self) -> Literal {
        match self {
            MacroValue::Bool(b) => Literal::Bool(*b),
            MacroValue::Int(n) => Literal::Int(*n),
            MacroValue::Str(s) => Literal::Str(s.clone()),
        }
    }
}

/// The body of a macro after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroBody<'a> {
    Expression(&'a str),
    Values(Literal),
}

impl RuleDefinition {
    /// The rule's expression text. Fails when the rule has no id or no
    /// expression.
    pub fn source(&self) -> Result<&str> {
        if self.id.trim().is_empty() {
            return Err(ParseError::InvalidPolicy("rule has an empty id".into()));
        }
        match self.expression.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ParseError::InvalidPolicy(format!(
                "rule '{}' has no expression",
                self.id
            ))),
        }
    }
}

impl MacroDefinition {
    /// The macro body; exactly one of `expression` / `values` must be set
    /// and the id must be a plain identifier.
    pub fn body(&self) -> Result<MacroBody<'_>> {
        if self.id.trim().is_empty() || self.id.contains('.') {
            return Err(ParseError::InvalidPolicy(format!(
                "invalid macro id '{}'",
                self.id
            )));
        }
        match (&self.expression, &self.values) {
            (Some(expr), None) => Ok(MacroBody::Expression(expr)),
            (None, Some(values)) => Ok(MacroBody::Values(Literal::Array(
                values.iter().map(MacroValue::to_literal).collect(),
            ))),
            _ => Err(ParseError::InvalidPolicy(format!(
                "macro '{}' must define exactly one of 'expression' or 'values'",
                self.id
            ))),
        }
    }
}

/// A single policy document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Source name (file stem, or the name passed to [`parse_policy_yaml`]).
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub macros: Vec<MacroDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// A set of policies loaded together, plus per-file load errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PolicySet {
    pub policies: Vec<Policy>,
    /// Files that could not be loaded at all. Rule-level errors are reported
    /// by the compiler instead.
    pub errors: Vec<String>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Iterate over every rule of every policy.
    pub fn rules(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.policies.iter().flat_map(|p| p.rules.iter())
    }

    /// Iterate over every macro of every policy.
    pub fn macros(&self) -> impl Iterator<Item = &MacroDefinition> {
        self.policies.iter().flat_map(|p| p.macros.iter())
    }

    pub fn rule_count(&self) -> usize {
        self.policies.iter().map(|p| p.rules.len()).sum()
    }
}

impl From<Policy> for PolicySet {
    fn from(policy: Policy) -> Self {
        PolicySet {
            policies: vec![policy],
            errors: Vec::new(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Parse a policy document from a YAML string.
///
/// Only a document that is not a policy mapping fails here; malformed
/// entries are kept and rejected individually when compiled.
pub fn parse_policy_yaml(name: &str, yaml: &str) -> Result<Policy> {
    let mut policy: Policy = serde_yaml::from_str(yaml)?;
    policy.name = name.to_string();
    Ok(policy)
}

/// Parse a single policy file. The policy is named after the file stem.
pub fn parse_policy_file(path: &Path) -> Result<Policy> {
    let content = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("policy");
    parse_policy_yaml(name, &content)
}

/// Parse all policy files in a directory (recursive), collecting per-file
/// errors instead of failing.
pub fn parse_policy_directory(dir: &Path) -> Result<PolicySet> {
    let mut set = PolicySet::new();

    fn walk(dir: &Path, set: &mut PolicySet) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Deterministic load order across platforms.
        entries.sort();
        for path in entries {
            if path.is_dir() {
                walk(&path, set)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
                match parse_policy_file(&path) {
                    Ok(policy) => set.push(policy),
                    Err(e) => {
                        log::warn!("skipping policy file {}: {e}", path.display());
                        set.errors.push(format!("{}: {e}", path.display()));
                    }
                }
            }
        }
        Ok(())
    }

    walk(dir, &mut set)?;
    Ok(set)
}

/// Load a policy file or a directory of policy files.
pub fn load_policies(path: &Path) -> Result<PolicySet> {
    if path.is_dir() {
        parse_policy_directory(path)
    } else {
        parse_policy_file(path).map(PolicySet::from)
    }
}

// =============================================================================
// Tests
// =============================================================================
