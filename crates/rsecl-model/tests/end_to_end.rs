mod helpers;

use helpers::{engine_from_yaml, eval, event, load, rule_ids};
use rsecl_eval::EvalError;
use serde_json::json;

const POLICY: &str = r#"
name: linux-baseline
version: "1"
macros:
  - id: shells
    values: [sh, bash, dash, zsh]
  - id: web_servers
    values: [nginx, apache2, httpd]
  - id: sensitive_files
    values: [/etc/shadow, /etc/sudoers]
  - id: spawned_by_web_server
    expression: process.ancestors.file.name in web_servers
rules:
  - id: web-shell
    description: Shell spawned under a web server
    expression: exec.file.name in shells && spawned_by_web_server
    tags:
      severity: critical
      mitre: T1505.003
  - id: netcat-listen
    expression: exec.file.name in ["nc", "ncat", ~"netcat*"] && "-l" in exec.args
  - id: shadow-read
    expression: open.file.path in sensitive_files && process.uid != 0
  - id: reverse-shell
    expression: >
      connect.addr.port in [4444, 1337, 31337]
      && !(connect.addr.ip in [10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16])
  - id: root-lineage
    expression: all(process.ancestors.uid == 0) && process.uid != 0
  - id: containerized-shell
    expression: process.container.id != "" && process.comm in shells
    disabled: true
"#;

#[test]
fn policy_loads() {
    let (set, report) = load(POLICY);
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.loaded, 5);
    assert_eq!(report.skipped, 1);
    assert_eq!(set.len(), 5);
    assert_eq!(
        set.get("web-shell").and_then(|r| r.description()),
        Some("Shell spawned under a web server")
    );
}

#[test]
fn web_shell() {
    let matches = eval(
        POLICY,
        json!({
            "type": "exec",
            "process": {
                "uid": 33,
                "comm": "php-fpm",
                "ancestors": [
                    {"comm": "php-fpm", "file": {"path": "/usr/sbin/php-fpm"}, "uid": 33},
                    {"comm": "nginx", "file": {"path": "/usr/sbin/nginx"}}
                ]
            },
            "exec": {"file": {"path": "/bin/sh"}, "argv": ["sh", "-c", "id"]}
        }),
    );
    assert_eq!(rule_ids(&matches), vec!["web-shell"]);
    let m = &matches[0];
    assert_eq!(m.tags["severity"], "critical");
    assert_eq!(
        serde_json::to_value(&m.matched_fields).unwrap(),
        json!([
            {"field": "exec.file.name", "value": "sh"},
            {"field": "process.ancestors.file.name", "value": ["php-fpm", "nginx"]},
        ])
    );
}

#[test]
fn netcat_listener() {
    let nc = |path: &str, argv: serde_json::Value| {
        eval(
            POLICY,
            json!({
                "type": "exec",
                "process": {"uid": 1000, "ancestors": [{"uid": 1000}]},
                "exec": {"file": {"path": path}, "argv": argv}
            }),
        )
    };
    assert_eq!(
        rule_ids(&nc("/usr/bin/nc", json!(["nc", "-l", "-p", "9000"]))),
        vec!["netcat-listen"]
    );
    assert_eq!(
        rule_ids(&nc("/usr/bin/netcat.openbsd", json!(["netcat", "-l"]))),
        vec!["netcat-listen"]
    );
    // argv[0] is not an argument.
    assert!(nc("/usr/bin/nc", json!(["-l"])).is_empty());
}

#[test]
fn shadow_read_by_non_root() {
    let open = |uid: i64| {
        eval(
            POLICY,
            json!({"type": "open", "process": {"uid": uid, "ancestors": [{"uid": 5}]}, "open": {"file": {"path": "/etc/shadow"}}}),
        )
    };
    assert_eq!(rule_ids(&open(1000)), vec!["shadow-read"]);
    assert!(open(0).is_empty());
}

#[test]
fn reverse_shell_outside_private_ranges() {
    let connect = |ip: &str, port: i64| {
        eval(
            POLICY,
            json!({"type": "connect", "process": {"ancestors": [{"uid": 1}]}, "connect": {"addr": {"ip": ip, "port": port}}}),
        )
    };
    assert_eq!(rule_ids(&connect("203.0.113.7", 4444)), vec!["reverse-shell"]);
    assert!(connect("192.168.1.20", 4444).is_empty());
    assert!(connect("203.0.113.7", 443).is_empty());
    assert_eq!(rule_ids(&connect("2001:db8::1", 31337)), vec!["reverse-shell"]);
}

#[test]
fn universal_quantifier_over_lineage() {
    let lineage = |uids: &[i64]| {
        let ancestors: Vec<_> = uids.iter().map(|uid| json!({"uid": uid})).collect();
        eval(
            POLICY,
            json!({"type": "exec", "process": {"uid": 1000, "ancestors": ancestors}, "exec": {}}),
        )
    };
    assert_eq!(rule_ids(&lineage(&[0, 0])), vec!["root-lineage"]);
    assert!(lineage(&[0, 1000]).is_empty());
    // Vacuously true with no ancestors.
    assert_eq!(rule_ids(&lineage(&[])), vec!["root-lineage"]);
}

#[test]
fn unknown_event_type_only_runs_universal_rules() {
    let engine = engine_from_yaml(POLICY);
    let candidates: Vec<String> = engine
        .snapshot()
        .candidates("unlink")
        .map(|r| r.id().to_string())
        .collect();
    assert_eq!(candidates, vec!["root-lineage"]);

    let matches = engine.dispatch(&event(json!({"type": "unlink", "process": {"uid": 7}})));
    assert_eq!(rule_ids(&matches), vec!["root-lineage"]);
}

#[test]
fn any_over_empty_ancestors() {
    let yaml = r#"
rules:
  - id: any-x
    expression: any(process.ancestors.file.name == "x")
  - id: all-x
    expression: all(process.ancestors.file.name == "x")
"#;
    let matches = eval(yaml, json!({"type": "exec"}));
    assert_eq!(rule_ids(&matches), vec!["all-x"]);
}

#[test]
fn bad_rules_are_reported_with_their_id() {
    let (set, report) = load(
        r#"
rules:
  - id: fine
    expression: process.comm == "sh"
  - id: wrong-type
    expression: open.flags == "O_RDONLY"
  - id: unknown
    expression: exec.file.nmae == "nc"
"#,
    );
    assert_eq!(set.len(), 1);
    let errors: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        errors,
        vec![
            "rule 'wrong-type': type mismatch on 'open.flags': expected int, found string",
            "rule 'unknown': unknown field: exec.file.nmae",
        ]
    );
    assert!(matches!(
        report.errors[1].source,
        EvalError::FieldNotFound(_)
    ));
}
