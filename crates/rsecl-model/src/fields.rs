//! Field accessor table for [`SecurityEvent`].
//!
//! One entry per field. Getters borrow from the event; fields of a
//! sub-structure absent on the event read as `None`.

use rsecl_eval::{
    Field, FieldIterator, HANDLER_WEIGHT, Model, ModelBuilder, Result, Value, ValueKind,
};

use crate::event::{CONNECT, EXEC, OPEN, SecurityEvent};

type F = Field<SecurityEvent>;

/// Iterator over the ancestors of the event's process.
pub const ANCESTORS: &str = "process.ancestors";

/// Build the model for [`SecurityEvent`].
pub fn model() -> Result<Model<SecurityEvent>> {
    let builder = Model::builder().iterator(FieldIterator::new(ANCESTORS, |e: &SecurityEvent| {
        e.process.ancestors.len()
    }));
    let builder = process_fields(builder);
    let builder = ancestor_fields(builder);
    let builder = exec_fields(builder);
    let builder = open_fields(builder);
    let builder = connect_fields(builder);
    builder.build()
}

fn process_fields(builder: ModelBuilder<SecurityEvent>) -> ModelBuilder<SecurityEvent> {
    builder.fields([
        F::new("async", ValueKind::Bool, |e, _| Some(Value::Bool(e.is_async))),
        F::new("process.pid", ValueKind::Int, |e, _| {
            Some(Value::Int(e.process.pid))
        }),
        F::new("process.ppid", ValueKind::Int, |e, _| {
            Some(Value::Int(e.process.ppid))
        }),
        F::new("process.uid", ValueKind::Int, |e, _| {
            Some(Value::Int(e.process.uid))
        })
        .setter(|e, v| {
            if let Value::Int(uid) = v {
                e.process.uid = uid;
            }
        }),
        F::new("process.gid", ValueKind::Int, |e, _| {
            Some(Value::Int(e.process.gid))
        }),
        F::new("process.user", ValueKind::Str, |e, _| {
            Some(Value::from(e.process.user.as_str()))
        })
        .setter(|e, v| {
            if let Value::Str(user) = v {
                e.process.user = user.into_owned();
            }
        }),
        F::new("process.comm", ValueKind::Str, |e, _| {
            Some(Value::from(e.process.comm.as_str()))
        })
        .setter(|e, v| {
            if let Value::Str(comm) = v {
                e.process.comm = comm.into_owned();
            }
        }),
        F::new("process.file.path", ValueKind::Str, |e, _| {
            Some(Value::from(e.process.file.path.as_str()))
        })
        .setter(|e, v| {
            if let Value::Str(path) = v {
                e.process.file.path = path.into_owned();
            }
        }),
        F::new("process.file.name", ValueKind::Str, |e, _| {
            Some(Value::from(e.process.file.name()))
        })
        .weight(HANDLER_WEIGHT),
        F::new("process.argv", ValueKind::StrArray, |e, _| {
            Some(Value::from(e.process.argv.as_slice()))
        }),
        F::new("process.envs", ValueKind::StrArray, |e, _| {
            Some(Value::from(e.process.envs.as_slice()))
        }),
        F::new("process.container.id", ValueKind::Str, |e, _| {
            e.process
                .container
                .as_ref()
                .map(|c| Value::from(c.id.as_str()))
        })
        .weight(HANDLER_WEIGHT),
        F::new("process.is_thread", ValueKind::Bool, |e, _| {
            Some(Value::Bool(e.process.is_thread))
        }),
    ])
}

fn ancestor_fields(builder: ModelBuilder<SecurityEvent>) -> ModelBuilder<SecurityEvent> {
    builder.fields([
        F::new("process.ancestors.pid", ValueKind::Int, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::Int(a.pid))
        })
        .iterator(ANCESTORS),
        F::new("process.ancestors.uid", ValueKind::Int, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::Int(a.uid))
        })
        .iterator(ANCESTORS),
        F::new("process.ancestors.user", ValueKind::Str, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::from(a.user.as_str()))
        })
        .iterator(ANCESTORS),
        F::new("process.ancestors.comm", ValueKind::Str, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::from(a.comm.as_str()))
        })
        .iterator(ANCESTORS),
        F::new("process.ancestors.file.path", ValueKind::Str, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::from(a.file.path.as_str()))
        })
        .iterator(ANCESTORS),
        F::new("process.ancestors.file.name", ValueKind::Str, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::from(a.file.name()))
        })
        .iterator(ANCESTORS)
        .weight(HANDLER_WEIGHT),
        F::new("process.ancestors.argv", ValueKind::StrArray, |e, i| {
            let a = e.process.ancestors.get(i?)?;
            Some(Value::from(a.argv.as_slice()))
        })
        .iterator(ANCESTORS),
    ])
}

fn exec_fields(builder: ModelBuilder<SecurityEvent>) -> ModelBuilder<SecurityEvent> {
    builder.fields([
        F::new("exec.file.path", ValueKind::Str, |e, _| {
            e.exec.as_ref().map(|x| Value::from(x.file.path.as_str()))
        })
        .event_type(EXEC),
        F::new("exec.file.name", ValueKind::Str, |e, _| {
            e.exec.as_ref().map(|x| Value::from(x.file.name()))
        })
        .event_type(EXEC)
        .weight(HANDLER_WEIGHT),
        F::new("exec.argv", ValueKind::StrArray, |e, _| {
            e.exec.as_ref().map(|x| Value::from(x.argv.as_slice()))
        })
        .event_type(EXEC),
        F::new("exec.argv0", ValueKind::Str, |e, _| {
            let x = e.exec.as_ref()?;
            x.argv.first().map(|a| Value::from(a.as_str()))
        })
        .event_type(EXEC),
        // Arguments after argv[0].
        F::new("exec.args", ValueKind::StrArray, |e, _| {
            let x = e.exec.as_ref()?;
            Some(Value::from(x.argv.get(1..).unwrap_or_default()))
        })
        .event_type(EXEC),
        F::new("exec.envs", ValueKind::StrArray, |e, _| {
            e.exec.as_ref().map(|x| Value::from(x.envs.as_slice()))
        })
        .event_type(EXEC),
    ])
}

fn open_fields(builder: ModelBuilder<SecurityEvent>) -> ModelBuilder<SecurityEvent> {
    builder.fields([
        F::new("open.file.path", ValueKind::Str, |e, _| {
            e.open.as_ref().map(|o| Value::from(o.file.path.as_str()))
        })
        .event_type(OPEN),
        F::new("open.file.name", ValueKind::Str, |e, _| {
            e.open.as_ref().map(|o| Value::from(o.file.name()))
        })
        .event_type(OPEN)
        .weight(HANDLER_WEIGHT),
        F::new("open.flags", ValueKind::Int, |e, _| {
            e.open.as_ref().map(|o| Value::Int(o.flags))
        })
        .event_type(OPEN),
        F::new("open.mode", ValueKind::Int, |e, _| {
            e.open.as_ref().map(|o| Value::Int(o.mode))
        })
        .event_type(OPEN),
    ])
}

fn connect_fields(builder: ModelBuilder<SecurityEvent>) -> ModelBuilder<SecurityEvent> {
    builder.fields([
        F::new("connect.addr.ip", ValueKind::Ip, |e, _| {
            e.connect.as_ref().map(|c| Value::Ip(c.addr.ip))
        })
        .event_type(CONNECT),
        F::new("connect.addr.port", ValueKind::Int, |e, _| {
            e.connect.as_ref().map(|c| Value::Int(c.addr.port))
        })
        .event_type(CONNECT),
        F::new("connect.protocol", ValueKind::Str, |e, _| {
            e.connect.as_ref().map(|c| Value::from(c.protocol.as_str()))
        })
        .event_type(CONNECT),
    ])
}
