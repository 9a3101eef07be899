#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;

use rsecl_eval::{
    CompileOptions, Event, Field, FieldIterator, LoadReport, Model, RuleSet, RuleSetBuilder, Value,
    ValueKind,
};
use rsecl_parser::parse_policy_yaml;

/// A socket or exec event with a chain of parent processes.
#[derive(Debug, Clone, Default)]
pub struct NetEvent {
    pub kind: &'static str,
    pub comm: String,
    pub argv: Vec<String>,
    pub dport: Option<i64>,
    pub daddr: Option<IpAddr>,
    pub parents: Vec<(String, i64)>,
}

impl NetEvent {
    pub fn connect(comm: &str, daddr: &str, dport: i64) -> Self {
        NetEvent {
            kind: "connect",
            comm: comm.into(),
            daddr: daddr.parse().ok(),
            dport: Some(dport),
            ..Default::default()
        }
    }

    pub fn exec(comm: &str, argv: &[&str]) -> Self {
        NetEvent {
            kind: "exec",
            comm: comm.into(),
            argv: argv.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn parent(mut self, comm: &str, uid: i64) -> Self {
        self.parents.push((comm.into(), uid));
        self
    }
}

impl Event for NetEvent {
    fn event_type(&self) -> &str {
        self.kind
    }
}

type F = Field<NetEvent>;

pub fn model() -> Model<NetEvent> {
    Model::builder()
        .iterator(FieldIterator::new("process.parents", |e: &NetEvent| {
            e.parents.len()
        }))
        .fields([
            F::new("process.comm", ValueKind::Str, |e, _| {
                Some(Value::from(e.comm.as_str()))
            }),
            F::new("exec.argv", ValueKind::StrArray, |e, _| {
                Some(Value::from(e.argv.as_slice()))
            })
            .event_type("exec"),
            F::new("connect.port", ValueKind::Int, |e, _| e.dport.map(Value::Int))
                .event_type("connect"),
            F::new("connect.addr", ValueKind::Ip, |e, _| e.daddr.map(Value::Ip))
                .event_type("connect"),
            F::new("process.parents.comm", ValueKind::Str, |e, i| {
                let (comm, _) = e.parents.get(i?)?;
                Some(Value::from(comm.as_str()))
            })
            .iterator("process.parents"),
            F::new("process.parents.uid", ValueKind::Int, |e, i| {
                let (_, uid) = e.parents.get(i?)?;
                Some(Value::Int(*uid))
            })
            .iterator("process.parents"),
        ])
        .build()
        .unwrap()
}

pub fn load(yaml: &str) -> (RuleSet<NetEvent>, LoadReport) {
    load_with(yaml, CompileOptions::default())
}

pub fn load_with(yaml: &str, options: CompileOptions) -> (RuleSet<NetEvent>, LoadReport) {
    let policy = parse_policy_yaml("test", yaml).unwrap();
    RuleSetBuilder::new(Arc::new(model()))
        .with_options(options)
        .build(&policy.into())
}

/// Load a policy that must compile cleanly.
pub fn rules(yaml: &str) -> RuleSet<NetEvent> {
    let (set, report) = load(yaml);
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    set
}

pub fn matched(set: &RuleSet<NetEvent>, event: &NetEvent) -> Vec<String> {
    set.dispatch(event).into_iter().map(|m| m.rule_id).collect()
}
