//! Rule store and dispatcher for one generation of compiled rules.

use std::collections::HashMap;
use std::sync::Arc;

use rsecl_parser::PolicySet;

use crate::compiler::{CompileOptions, Compiler, Macros};
use crate::context::Context;
use crate::error::{CompileError, EvalError, Result};
use crate::event::Event;
use crate::model::{EventScope, Model};
use crate::result::{FieldMatch, MatchResult};
use crate::rule::Rule;
use crate::value::Value;

/// Compiled rules indexed by event type.
///
/// A rule scoped to several event types is indexed under each of them;
/// rules that read only universal fields are kept apart and evaluated for
/// every event.
pub struct RuleSet<E> {
    model: Arc<Model<E>>,
    pub(crate) generation: u64,
    rules: Vec<Arc<Rule<E>>>,
    by_type: HashMap<String, Vec<Arc<Rule<E>>>>,
    wildcard: Vec<Arc<Rule<E>>>,
    index: HashMap<String, usize>,
}

impl<E> RuleSet<E> {
    pub fn new(model: Arc<Model<E>>) -> Self {
        RuleSet {
            model,
            generation: 0,
            rules: Vec::new(),
            by_type: HashMap::new(),
            wildcard: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a compiled rule. Rule ids are unique within a set.
    pub fn add(&mut self, rule: Rule<E>) -> Result<()> {
        if self.index.contains_key(rule.id()) {
            return Err(EvalError::DuplicateRule(rule.id().to_string()));
        }
        let rule = Arc::new(rule);
        match rule.event_types() {
            EventScope::Any => self.wildcard.push(Arc::clone(&rule)),
            EventScope::Only(types) => {
                for event_type in types {
                    self.by_type
                        .entry(event_type.clone())
                        .or_default()
                        .push(Arc::clone(&rule));
                }
            }
        }
        self.index.insert(rule.id().to_string(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Rule<E>>> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    pub fn rules(&self) -> &[Arc<Rule<E>>] {
        &self.rules
    }

    pub fn model(&self) -> &Arc<Model<E>> {
        &self.model
    }

    /// Generation number assigned when the set was published, 0 before.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules to evaluate for an event of `event_type`: those indexed under
    /// the type, then the wildcard rules.
    pub fn candidates<'s>(
        &'s self,
        event_type: &str,
    ) -> impl Iterator<Item = &'s Arc<Rule<E>>> + use<'s, E> {
        self.by_type
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .chain(self.wildcard.iter())
    }
}

impl<E: Event> RuleSet<E> {
    /// Evaluate every applicable rule against `event`. Each rule gets a fresh
    /// context; a rule that cannot read a field simply does not match.
    pub fn dispatch(&self, event: &E) -> Vec<MatchResult> {
        let event_type = event.event_type();
        let mut matches = Vec::new();
        for rule in self.candidates(event_type) {
            let mut ctx = Context::new(event);
            if rule.evaluate(&mut ctx) {
                log::trace!("rule '{}' matched {event_type} event", rule.id());
                matches.push(self.match_result(rule, event));
            }
        }
        matches
    }

    /// Evaluate one rule by id, ignoring its event types. `None` if no rule
    /// has that id.
    pub fn evaluate_rule(&self, id: &str, event: &E) -> Option<bool> {
        self.get(id).map(|rule| rule.matches(event))
    }

    fn match_result(&self, rule: &Rule<E>, event: &E) -> MatchResult {
        let matched_fields = rule
            .used_fields()
            .iter()
            .filter_map(|name| {
                let field = self.model.resolve(name).ok()?;
                let value = if field.is_iterable() {
                    let values = self.model.field_values(event, name).ok()?;
                    serde_json::Value::Array(values.iter().map(Value::to_json).collect())
                } else {
                    self.model.field_value(event, name).ok()??.to_json()
                };
                Some(FieldMatch {
                    field: name.clone(),
                    value,
                })
            })
            .collect();

        MatchResult {
            rule_id: rule.id().to_string(),
            event_type: event.event_type().to_string(),
            tags: rule.tags().clone(),
            matched_fields,
        }
    }
}

impl<E> std::fmt::Debug for RuleSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("generation", &self.generation)
            .field("rules", &self.rules.len())
            .field("event_types", &self.by_type.keys().collect::<Vec<_>>())
            .field("wildcard", &self.wildcard.len())
            .finish()
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Outcome of compiling a policy set.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    /// Rules marked `disabled`.
    pub skipped: usize,
    /// Rejected rules and macros. Each only excludes itself.
    pub errors: Vec<CompileError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compiles policy sets into [`RuleSet`]s against a shared model.
pub struct RuleSetBuilder<E> {
    model: Arc<Model<E>>,
    options: CompileOptions,
    macros: Macros,
}

impl<E> RuleSetBuilder<E> {
    pub fn new(model: Arc<Model<E>>) -> Self {
        RuleSetBuilder {
            model,
            options: CompileOptions::default(),
            macros: Macros::new(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Macros available to every policy, in addition to the policies' own.
    pub fn with_macros(mut self, macros: Macros) -> Self {
        self.macros = macros;
        self
    }

    /// Compile every enabled rule of `policies`. Rules that fail to compile
    /// are reported and left out; the rest are loaded.
    pub fn build(&self, policies: &PolicySet) -> (RuleSet<E>, LoadReport) {
        let mut report = LoadReport::default();

        let mut macros = self.macros.clone();
        for (index, def) in policies.macros().enumerate() {
            if let Err(source) = macros.insert_definition(def) {
                let key = entry_key(&def.id, index);
                log::warn!("rejected macro '{key}': {source}");
                report.errors.push(CompileError {
                    rule_id: key,
                    source,
                });
            }
        }

        let compiler = Compiler::new(&*self.model, &macros, &self.options);
        let mut set = RuleSet::new(Arc::clone(&self.model));
        for (index, def) in policies.rules().enumerate() {
            if def.disabled {
                log::debug!("skipping disabled rule '{}'", entry_key(&def.id, index));
                report.skipped += 1;
                continue;
            }
            match compiler.compile_rule(def).and_then(|rule| set.add(rule)) {
                Ok(()) => report.loaded += 1,
                Err(source) => {
                    let key = entry_key(&def.id, index);
                    log::warn!("rejected rule '{key}': {source}");
                    report.errors.push(CompileError {
                        rule_id: key,
                        source,
                    });
                }
            }
        }

        log::debug!(
            "compiled {} rules ({} skipped, {} rejected)",
            report.loaded,
            report.skipped,
            report.errors.len()
        );
        (set, report)
    }
}

/// Report key of a policy entry: its id, or `#<n>` (1-based) when it has none.
fn entry_key(id: &str, index: usize) -> String {
    if id.trim().is_empty() {
        format!("#{}", index + 1)
    } else {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_expression;
    use crate::fixtures::{TestEvent, model};
    use rsecl_parser::parse_policy_yaml;

    fn set_of(rules: &[(&str, &str)]) -> RuleSet<TestEvent> {
        let model = Arc::new(model());
        let mut set = RuleSet::new(Arc::clone(&model));
        for (id, text) in rules {
            set.add(compile_expression(id, text, &model).unwrap()).unwrap();
        }
        set
    }

    fn ids(matches: &[MatchResult]) -> Vec<&str> {
        matches.iter().map(|m| m.rule_id.as_str()).collect()
    }

    #[test]
    fn test_dispatch_routes_by_event_type() {
        let set = set_of(&[
            ("nc", r#"exec.name == "nc""#),
            ("shadow", r#"open.path == "/etc/shadow""#),
            ("root", "process.uid == 0"),
        ]);
        assert_eq!(set.candidates("exec").count(), 2);
        assert_eq!(set.candidates("open").count(), 2);
        assert_eq!(set.candidates("connect").count(), 1);

        let matches = set.dispatch(&TestEvent::exec("nc"));
        assert_eq!(ids(&matches), vec!["nc", "root"]);
        let matches = set.dispatch(&TestEvent::open("/etc/shadow").with_uid(1));
        assert_eq!(ids(&matches), vec!["shadow"]);
    }

    #[test]
    fn test_multi_type_rule_indexed_under_each_type() {
        let set = set_of(&[(
            "either",
            r#"exec.name == "nc" || open.path == "/etc/shadow""#,
        )]);
        assert_eq!(set.dispatch(&TestEvent::exec("nc")).len(), 1);
        assert_eq!(set.dispatch(&TestEvent::open("/etc/shadow")).len(), 1);
        assert!(set.dispatch(&TestEvent::connect("1.2.3.4")).is_empty());
    }

    #[test]
    fn test_duplicate_rule_id() {
        let model = Arc::new(model());
        let mut set = RuleSet::new(Arc::clone(&model));
        set.add(compile_expression("a", "async", &model).unwrap()).unwrap();
        let err = set
            .add(compile_expression("a", "!async", &model).unwrap())
            .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateRule(id) if id == "a"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_matched_fields() {
        let set = set_of(&[(
            "r",
            r#"exec.name == "nc" && process.ancestors.name == "sshd""#,
        )]);
        let event = TestEvent::exec("nc")
            .with_ancestor("bash", 0)
            .with_ancestor("sshd", 0);
        let matches = set.dispatch(&event);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.event_type, "exec");
        assert_eq!(m.field("exec.name"), Some(&serde_json::json!("nc")));
        assert_eq!(
            m.field("process.ancestors.name"),
            Some(&serde_json::json!(["bash", "sshd"]))
        );
    }

    #[test]
    fn test_evaluate_rule_by_id() {
        let set = set_of(&[("nc", r#"exec.name == "nc""#)]);
        assert_eq!(set.evaluate_rule("nc", &TestEvent::exec("nc")), Some(true));
        assert_eq!(set.evaluate_rule("nope", &TestEvent::exec("nc")), None);
    }

    #[test]
    fn test_builder_partial_failure() {
        let yaml = r#"
macros:
  - id: shells
    values: [bash, sh]
  - id: broken
    expression: "exec.name =="
rules:
  - id: shell
    expression: exec.name in shells
    tags:
      severity: low
  - id: typo
    expression: exec.nmae == "nc"
  - id: off
    expression: async
    disabled: true
  - id: shell
    expression: async
"#;
        let policy = parse_policy_yaml("test", yaml).unwrap();
        let policies = PolicySet::from(policy);
        let (set, report) = RuleSetBuilder::new(Arc::new(model())).build(&policies);

        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 1);
        let rejected: Vec<&str> = report.errors.iter().map(|e| e.rule_id.as_str()).collect();
        assert_eq!(rejected, vec!["broken", "typo", "shell"]);
        assert!(matches!(report.errors[1].source, EvalError::FieldNotFound(_)));
        assert!(matches!(report.errors[2].source, EvalError::DuplicateRule(_)));

        let matches = set.dispatch(&TestEvent::exec("sh"));
        assert_eq!(ids(&matches), vec!["shell"]);
        assert_eq!(matches[0].tags.get("severity").map(String::as_str), Some("low"));
    }

    fn build_yaml(yaml: &str) -> (RuleSet<TestEvent>, LoadReport) {
        let policy = parse_policy_yaml("test", yaml).unwrap();
        RuleSetBuilder::new(Arc::new(model())).build(&PolicySet::from(policy))
    }

    #[test]
    fn test_rule_without_id_is_rejected_alone() {
        let (set, report) = build_yaml(
            r#"
rules:
  - id: netcat
    expression: exec.name == "nc"
  - id: ""
    expression: async
"#,
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_id, "#2");
        assert!(matches!(report.errors[0].source, EvalError::Parser(_)));
        assert_eq!(ids(&set.dispatch(&TestEvent::exec("nc"))), vec!["netcat"]);
    }

    #[test]
    fn test_rule_without_expression_is_rejected_alone() {
        let (set, report) = build_yaml(
            r#"
rules:
  - id: unfinished
  - id: netcat
    expression: exec.name == "nc"
"#,
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_id, "unfinished");
        assert!(
            report.errors[0]
                .to_string()
                .contains("rule 'unfinished' has no expression")
        );
        assert_eq!(ids(&set.dispatch(&TestEvent::exec("nc"))), vec!["netcat"]);
    }

    #[test]
    fn test_macro_with_two_bodies_is_rejected_alone() {
        let (set, report) = build_yaml(
            r#"
macros:
  - id: both
    expression: async
    values: [nc]
rules:
  - id: netcat
    expression: exec.name == "nc"
"#,
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_id, "both");
        assert!(matches!(report.errors[0].source, EvalError::Parser(_)));
        assert_eq!(ids(&set.dispatch(&TestEvent::exec("nc"))), vec!["netcat"]);
    }
}
