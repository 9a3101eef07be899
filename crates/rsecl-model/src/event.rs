//! The security event carried through the engine.
//!
//! Events arrive as JSON objects tagged with their `type`. The process
//! context is present on every event; the sub-structure named by the type
//! (`exec`, `open`, `connect`) is present on events of that type only.

use std::net::IpAddr;

use rsecl_eval::Event;
use serde::{Deserialize, Serialize};

pub const EXEC: &str = "exec";
pub const OPEN: &str = "open";
pub const CONNECT: &str = "connect";

/// Event types this schema defines.
pub const EVENT_TYPES: &[&str] = &[EXEC, OPEN, CONNECT];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub process: Process,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<Exec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Open>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<Connect>,
}

impl SecurityEvent {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

impl Event for SecurityEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn is_async(&self) -> bool {
        self.is_async
    }
}

/// A file on disk. `name` defaults to the last component of `path`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>) -> Self {
        FileInfo {
            path: path.into(),
            name: None,
        }
    }

    pub fn name(&self) -> &str {
        match &self.name {
            Some(name) => name.as_str(),
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

/// The process that triggered the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Process {
    pub pid: i64,
    pub ppid: i64,
    pub uid: i64,
    pub gid: i64,
    pub user: String,
    pub comm: String,
    pub file: FileInfo,
    pub argv: Vec<String>,
    pub envs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    pub is_thread: bool,
    /// Parent first, then its parent, up to the root of the tree.
    pub ancestors: Vec<Ancestor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ancestor {
    pub pid: i64,
    pub uid: i64,
    pub user: String,
    pub comm: String,
    pub file: FileInfo,
    pub argv: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Exec {
    pub file: FileInfo,
    pub argv: Vec<String>,
    pub envs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Open {
    pub file: FileInfo,
    pub flags: i64,
    pub mode: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connect {
    pub addr: SocketAddr,
    #[serde(default)]
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketAddr {
    pub ip: IpAddr,
    #[serde(default)]
    pub port: i64,
}
