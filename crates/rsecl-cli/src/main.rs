use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rsecl_eval::{CompileOptions, Engine, Model, RuleSetBuilder};
use rsecl_model::SecurityEvent;
use rsecl_parser::{PolicySet, Quantifier, load_policies, parse_expression};

#[derive(Parser)]
#[command(name = "rsecl")]
#[command(about = "Parse, validate, and evaluate rsecl security policies")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a rule expression and print the AST as JSON
    Parse {
        /// The expression to parse
        expr: String,

        /// Print JSON on a single line
        #[arg(short, long)]
        compact: bool,
    },

    /// Compile every rule of a policy file or directory and report errors
    Validate {
        /// Path to a policy YAML file or a directory of policies
        path: PathBuf,

        /// Quantifier for iterable fields outside any()/all()
        #[arg(short, long, value_parser = parse_quantifier)]
        quantifier: Option<Quantifier>,
    },

    /// List the fields of the security event model
    Fields {
        /// Only fields available on this event type
        #[arg(short, long)]
        event_type: Option<String>,
    },

    /// Evaluate events against policies
    ///
    /// Events are given as a single JSON string (--event) or as NDJSON
    /// (newline-delimited JSON) on stdin.
    Eval {
        /// Path to a policy YAML file or a directory of policies
        #[arg(short, long)]
        policy: PathBuf,

        /// A single event as a JSON string (if omitted, reads NDJSON from stdin)
        #[arg(short, long)]
        event: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Quantifier for iterable fields outside any()/all()
        #[arg(short, long, value_parser = parse_quantifier)]
        quantifier: Option<Quantifier>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse { expr, compact } => cmd_parse(&expr, !compact),
        Commands::Validate { path, quantifier } => cmd_validate(&path, quantifier),
        Commands::Fields { event_type } => cmd_fields(event_type.as_deref()),
        Commands::Eval {
            policy,
            event,
            pretty,
            quantifier,
        } => cmd_eval(&policy, event, pretty, quantifier),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_parse(expr: &str, pretty: bool) {
    match parse_expression(expr) {
        Ok(ast) => print_json(&ast, pretty),
        Err(e) => {
            eprintln!("Parse error: {e}");
            process::exit(1);
        }
    }
}

fn cmd_validate(path: &Path, quantifier: Option<Quantifier>) {
    let policies = load(path);
    let model = reference_model();
    let (rules, report) = RuleSetBuilder::new(model)
        .with_options(options(quantifier))
        .build(&policies);

    println!(
        "Loaded {} policies from {}",
        policies.policies.len(),
        path.display()
    );
    println!("  Rules compiled:    {}", report.loaded);
    println!("  Rules disabled:    {}", report.skipped);
    println!("  Rules rejected:    {}", report.errors.len());
    println!("  File errors:       {}", policies.errors.len());

    let universal = rules
        .rules()
        .iter()
        .filter(|r| r.event_types().is_any())
        .count();
    if universal > 0 {
        println!("  Universal rules:   {universal}");
    }

    if !report.is_clean() || !policies.errors.is_empty() {
        println!("\nErrors:");
        for err in &policies.errors {
            println!("  - {err}");
        }
        for err in &report.errors {
            println!("  - {err}");
        }
        process::exit(1);
    }
}

fn cmd_fields(event_type: Option<&str>) {
    let model = reference_model();
    let fields: Vec<_> = match event_type {
        Some(t) => model.all_fields(t),
        None => model.fields().collect(),
    };
    for field in fields {
        let mut line = format!(
            "{:<32} {:<9} {}",
            field.name(),
            field.kind().as_str(),
            field.scope()
        );
        if let Some(iterator) = field.iterator_name() {
            line.push_str(&format!(" (iterates {iterator})"));
        }
        println!("{}", line.trim_end());
    }
}

fn cmd_eval(path: &Path, event_json: Option<String>, pretty: bool, quantifier: Option<Quantifier>) {
    let policies = load(path);
    let (rules, report) = RuleSetBuilder::new(reference_model())
        .with_options(options(quantifier))
        .build(&policies);
    if !report.is_clean() {
        eprintln!("Warning: {} rules rejected", report.errors.len());
        for err in &report.errors {
            eprintln!("  - {err}");
        }
    }
    let engine = Engine::new(rules);

    eprintln!(
        "Loaded {} rules from {}",
        engine.snapshot().len(),
        path.display()
    );

    if let Some(json_str) = event_json {
        let event = match SecurityEvent::from_json(&json_str) {
            Ok(e) => e,
            Err(e) => {
                eprintln!("Invalid JSON event: {e}");
                process::exit(1);
            }
        };

        let matches = engine.dispatch(&event);
        if matches.is_empty() {
            eprintln!("No matches.");
        } else {
            for m in &matches {
                print_json(m, pretty);
            }
        }
    } else {
        let stdin = io::stdin();
        let mut line_num = 0u64;
        let mut match_count = 0u64;

        for line in stdin.lock().lines() {
            line_num += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Error reading line {line_num}: {e}");
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let event = match SecurityEvent::from_json(&line) {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("Invalid JSON on line {line_num}: {e}");
                    continue;
                }
            };

            for m in &engine.dispatch(&event) {
                match_count += 1;
                print_json(m, pretty);
            }
        }

        eprintln!("Processed {line_num} events, {match_count} matches.");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn reference_model() -> Arc<Model<SecurityEvent>> {
    match rsecl_model::model() {
        Ok(model) => Arc::new(model),
        Err(e) => {
            eprintln!("Error building event model: {e}");
            process::exit(1);
        }
    }
}

fn options(quantifier: Option<Quantifier>) -> CompileOptions {
    let mut options = CompileOptions::default();
    if let Some(q) = quantifier {
        options.default_quantifier = q;
    }
    options
}

fn parse_quantifier(s: &str) -> Result<Quantifier, String> {
    match s {
        "any" => Ok(Quantifier::Any),
        "all" => Ok(Quantifier::All),
        other => Err(format!("expected 'any' or 'all', got '{other}'")),
    }
}

fn load(path: &Path) -> PolicySet {
    let policies = match load_policies(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading policies from {}: {e}", path.display());
            process::exit(1);
        }
    };

    if !policies.errors.is_empty() {
        eprintln!(
            "Warning: {} policy files could not be loaded",
            policies.errors.len()
        );
    }

    policies
}

fn print_json(value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}
