//! # rsecl-model
//!
//! Reference security event schema for the rsecl engine.
//!
//! [`SecurityEvent`] is a serde-deserializable event with a process context
//! (including its ancestor chain) and one sub-structure per event type:
//! `exec`, `open` or `connect`. [`model`] builds the matching field table so
//! rules can be compiled and dispatched against these events.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rsecl_eval::{Engine, RuleSetBuilder};
//! use rsecl_model::SecurityEvent;
//! use rsecl_parser::parse_policy_yaml;
//!
//! let model = Arc::new(rsecl_model::model().unwrap());
//! let policy = parse_policy_yaml("demo", r#"
//! rules:
//!   - id: nc-from-web
//!     expression: exec.file.name == "nc" && process.ancestors.file.name == "nginx"
//! "#).unwrap();
//! let (rules, report) = RuleSetBuilder::new(model).build(&policy.into());
//! assert!(report.is_clean());
//!
//! let engine = Engine::new(rules);
//! let event = SecurityEvent::from_json(r#"{
//!     "type": "exec",
//!     "process": {"comm": "sh", "ancestors": [{"file": {"path": "/usr/sbin/nginx"}}]},
//!     "exec": {"file": {"path": "/usr/bin/nc"}}
//! }"#).unwrap();
//! assert_eq!(engine.dispatch(&event)[0].rule_id, "nc-from-web");
//! ```

pub mod event;
pub mod fields;

pub use event::{
    Ancestor, CONNECT, Connect, Container, EVENT_TYPES, EXEC, Exec, FileInfo, OPEN, Open, Process,
    SecurityEvent, SocketAddr,
};
pub use fields::{ANCESTORS, model};
