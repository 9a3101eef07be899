#![allow(dead_code)]

use std::sync::Arc;

use rsecl_eval::{Engine, LoadReport, MatchResult, Model, RuleSet, RuleSetBuilder};
use rsecl_model::SecurityEvent;
use rsecl_parser::parse_policy_yaml;
use serde_json::Value;

pub fn model() -> Arc<Model<SecurityEvent>> {
    Arc::new(rsecl_model::model().unwrap())
}

pub fn load(yaml: &str) -> (RuleSet<SecurityEvent>, LoadReport) {
    let policy = parse_policy_yaml("test", yaml).unwrap();
    RuleSetBuilder::new(model()).build(&policy.into())
}

pub fn engine_from_yaml(yaml: &str) -> Engine<SecurityEvent> {
    let (set, report) = load(yaml);
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    Engine::new(set)
}

pub fn event(json: Value) -> SecurityEvent {
    SecurityEvent::from_value(json).unwrap()
}

pub fn eval(yaml: &str, json: Value) -> Vec<MatchResult> {
    engine_from_yaml(yaml).dispatch(&event(json))
}

pub fn rule_ids(matches: &[MatchResult]) -> Vec<&str> {
    matches.iter().map(|m| m.rule_id.as_str()).collect()
}
