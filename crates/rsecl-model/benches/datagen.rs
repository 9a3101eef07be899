//! Synthetic policies and events for dispatch benchmarks.
//!
//! All generators are seeded for reproducibility.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rsecl_model::{
    Ancestor, Connect, Exec, FileInfo, Open, Process, SecurityEvent, SocketAddr,
};

const SEED: u64 = 0xDEAD_BEEF_CAFE;

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

const BINARIES: &[&str] = &[
    "nc", "ncat", "bash", "sh", "python3", "curl", "wget", "sshd", "nginx", "cron", "systemd",
    "sudo", "perl", "socat",
];

const PATHS: &[&str] = &[
    "/etc/shadow",
    "/etc/passwd",
    "/etc/sudoers",
    "/tmp/x",
    "/var/log/auth.log",
    "/root/.ssh/authorized_keys",
    "/proc/self/mem",
];

const PORTS: &[i64] = &[22, 53, 80, 443, 1337, 4444, 8080, 31337];

fn exec_predicate(rng: &mut StdRng) -> String {
    let bin = BINARIES.choose(rng).unwrap();
    match rng.gen_range(0..5) {
        0 => format!("exec.file.name == \"{bin}\""),
        1 => format!(
            "exec.file.name in [\"{bin}\", \"{}\"]",
            BINARIES.choose(rng).unwrap()
        ),
        2 => format!("exec.file.path =~ ~\"*/{bin}\""),
        3 => format!("process.ancestors.file.name == \"{bin}\""),
        _ => "\"-c\" in exec.args".to_string(),
    }
}

fn open_predicate(rng: &mut StdRng) -> String {
    let path = PATHS.choose(rng).unwrap();
    match rng.gen_range(0..3) {
        0 => format!("open.file.path == \"{path}\""),
        1 => format!("open.file.path =~ r\"^{path}\""),
        _ => format!("open.flags > 0 && open.file.path == \"{path}\""),
    }
}

fn connect_predicate(rng: &mut StdRng) -> String {
    let port = PORTS.choose(rng).unwrap();
    match rng.gen_range(0..3) {
        0 => format!("connect.addr.port == {port}"),
        1 => format!("connect.addr.port in [{port}, {}]", PORTS.choose(rng).unwrap()),
        _ => "connect.addr.ip in [10.0.0.0/8, 192.168.0.0/16]".to_string(),
    }
}

fn process_predicate(rng: &mut StdRng) -> String {
    match rng.gen_range(0..3) {
        0 => format!("process.uid == {}", rng.gen_range(0..3) * 1000),
        1 => format!("process.comm == \"{}\"", BINARIES.choose(rng).unwrap()),
        _ => "all(process.ancestors.uid == 0)".to_string(),
    }
}

/// One rule expression scoped to a single event type, optionally combined
/// with a process predicate.
pub fn gen_expression(rng: &mut StdRng) -> String {
    let scoped = match rng.gen_range(0..3) {
        0 => exec_predicate(rng),
        1 => open_predicate(rng),
        _ => connect_predicate(rng),
    };
    if rng.gen_bool(0.5) {
        format!("{scoped} && {}", process_predicate(rng))
    } else {
        scoped
    }
}

/// A policy document with `n` rules.
pub fn gen_n_rules(n: usize) -> String {
    let mut rng = rng();
    let mut yaml = String::from("rules:\n");
    for i in 0..n {
        let expression = gen_expression(&mut rng).replace('\'', "''");
        yaml.push_str(&format!(
            "  - id: rule-{i:05}\n    expression: '{expression}'\n"
        ));
    }
    yaml
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

fn process(rng: &mut StdRng) -> Process {
    let depth = rng.gen_range(0..6);
    Process {
        pid: rng.gen_range(2..65_536),
        uid: rng.gen_range(0..3) * 1000,
        comm: BINARIES.choose(rng).unwrap().to_string(),
        file: FileInfo::new(format!("/usr/bin/{}", BINARIES.choose(rng).unwrap())),
        ancestors: (0..depth)
            .map(|_| {
                let bin = BINARIES.choose(rng).unwrap();
                Ancestor {
                    pid: rng.gen_range(1..65_536),
                    uid: rng.gen_range(0..2) * 1000,
                    comm: bin.to_string(),
                    file: FileInfo::new(format!("/usr/sbin/{bin}")),
                    ..Default::default()
                }
            })
            .collect(),
        ..Default::default()
    }
}

pub fn gen_events(n: usize) -> Vec<SecurityEvent> {
    let mut rng = rng();
    (0..n)
        .map(|_| {
            let process = process(&mut rng);
            match rng.gen_range(0..3) {
                0 => {
                    let bin = BINARIES.choose(&mut rng).unwrap();
                    SecurityEvent {
                        event_type: "exec".into(),
                        process,
                        exec: Some(Exec {
                            file: FileInfo::new(format!("/usr/bin/{bin}")),
                            argv: vec![bin.to_string(), "-c".into(), "id".into()],
                            envs: Vec::new(),
                        }),
                        ..Default::default()
                    }
                }
                1 => SecurityEvent {
                    event_type: "open".into(),
                    process,
                    open: Some(Open {
                        file: FileInfo::new(*PATHS.choose(&mut rng).unwrap()),
                        flags: rng.gen_range(0..4),
                        mode: 0o644,
                    }),
                    ..Default::default()
                },
                _ => SecurityEvent {
                    event_type: "connect".into(),
                    process,
                    connect: Some(Connect {
                        addr: SocketAddr {
                            ip: [rng.gen_range(1..224), rng.r#gen(), rng.r#gen(), rng.r#gen::<u8>()]
                                .into(),
                            port: *PORTS.choose(&mut rng).unwrap(),
                        },
                        protocol: "tcp".into(),
                    }),
                    ..Default::default()
                },
            }
        })
        .collect()
}
