//! Small event type and model shared by unit tests.

use std::net::IpAddr;

use crate::event::Event;
use crate::iterator::FieldIterator;
use crate::model::{Field, HANDLER_WEIGHT, Model};
use crate::value::{Value, ValueKind};

#[derive(Debug, Clone, Default)]
pub struct Ancestor {
    pub name: String,
    pub uid: i64,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TestEvent {
    pub kind: String,
    pub is_async: bool,
    pub name: String,
    pub args: Vec<String>,
    pub path: Option<String>,
    pub uid: i64,
    pub ip: Option<IpAddr>,
    pub ancestors: Vec<Ancestor>,
    pub mounts: Vec<String>,
}

impl TestEvent {
    pub fn exec(name: &str) -> Self {
        TestEvent {
            kind: "exec".into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn open(path: &str) -> Self {
        TestEvent {
            kind: "open".into(),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn connect(ip: &str) -> Self {
        TestEvent {
            kind: "connect".into(),
            ip: ip.parse().ok(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_uid(mut self, uid: i64) -> Self {
        self.uid = uid;
        self
    }

    pub fn with_ancestor(mut self, name: &str, uid: i64) -> Self {
        self.ancestors.push(Ancestor {
            name: name.into(),
            uid,
            args: Vec::new(),
        });
        self
    }

    pub fn with_mount(mut self, source: &str) -> Self {
        self.mounts.push(source.into());
        self
    }
}

impl Event for TestEvent {
    fn event_type(&self) -> &str {
        &self.kind
    }

    fn is_async(&self) -> bool {
        self.is_async
    }
}

type F = Field<TestEvent>;

pub fn model() -> Model<TestEvent> {
    Model::builder()
        .iterator(FieldIterator::new("process.ancestors", |e: &TestEvent| {
            e.ancestors.len()
        }))
        .iterator(FieldIterator::new("process.mounts", |e: &TestEvent| {
            e.mounts.len()
        }))
        .fields([
            F::new("exec.name", ValueKind::Str, |e, _| {
                Some(Value::from(e.name.as_str()))
            })
            .event_type("exec"),
            F::new("exec.args", ValueKind::StrArray, |e, _| {
                Some(Value::from(e.args.as_slice()))
            })
            .event_type("exec"),
            F::new("open.path", ValueKind::Str, |e, _| {
                e.path.as_deref().map(Value::from)
            })
            .event_type("open"),
            F::new("connect.ip", ValueKind::Ip, |e, _| e.ip.map(Value::Ip)).event_type("connect"),
            F::new("process.uid", ValueKind::Int, |e, _| Some(Value::Int(e.uid))).setter(
                |e, v| {
                    if let Value::Int(n) = v {
                        e.uid = n;
                    }
                },
            ),
            F::new("process.name", ValueKind::Str, |e, _| {
                Some(Value::from(e.name.as_str()))
            })
            .weight(HANDLER_WEIGHT),
            F::new("async", ValueKind::Bool, |e, _| Some(Value::Bool(e.is_async))),
            F::new("process.ancestors.name", ValueKind::Str, |e, i| {
                let a = e.ancestors.get(i?)?;
                Some(Value::from(a.name.as_str()))
            })
            .iterator("process.ancestors"),
            F::new("process.ancestors.uid", ValueKind::Int, |e, i| {
                let a = e.ancestors.get(i?)?;
                Some(Value::Int(a.uid))
            })
            .iterator("process.ancestors"),
            F::new("process.ancestors.args", ValueKind::StrArray, |e, i| {
                let a = e.ancestors.get(i?)?;
                Some(Value::from(a.args.as_slice()))
            })
            .iterator("process.ancestors"),
            F::new("process.mounts.source", ValueKind::Str, |e, i| {
                let m = e.mounts.get(i?)?;
                Some(Value::from(m.as_str()))
            })
            .iterator("process.mounts"),
        ])
        .build()
        .expect("fixture model is valid")
}
