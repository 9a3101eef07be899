//! Shared handle to the current rule generation.
//!
//! An [`Engine`] publishes compiled [`RuleSet`]s as immutable generations.
//! The current generation sits behind an atomic `Arc` pointer swap. Dispatch
//! loads a snapshot without taking a lock and evaluates against it, so a
//! reload never blocks or disturbs evaluations already in flight. Publishers
//! serialize among themselves so generation numbers follow the swap order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rsecl_parser::PolicySet;

use crate::compiler::CompileOptions;
use crate::event::Event;
use crate::model::Model;
use crate::result::MatchResult;
use crate::store::{LoadReport, RuleSet, RuleSetBuilder};

/// Whether a reload is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Active,
    /// A new generation is being compiled; dispatch still uses the current
    /// one.
    Swapping,
}

/// The rule engine: the current generation plus a generation counter.
///
/// Share it as `Arc<Engine<E>>`; every method takes `&self`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rsecl_eval::{Engine, Event, Field, Model, RuleSetBuilder, Value, ValueKind};
/// use rsecl_parser::parse_policy_yaml;
///
/// struct Exec { name: String }
///
/// impl Event for Exec {
///     fn event_type(&self) -> &str { "exec" }
/// }
///
/// let model = Arc::new(
///     Model::builder()
///         .field(
///             Field::<Exec>::new("exec.name", ValueKind::Str, |e, _| {
///                 Some(Value::from(e.name.as_str()))
///             })
///             .event_type("exec"),
///         )
///         .build()
///         .unwrap(),
/// );
///
/// let policy = parse_policy_yaml("demo", r#"
/// rules:
///   - id: netcat
///     expression: exec.name in ["nc", "ncat"]
/// "#).unwrap();
///
/// let (rules, report) = RuleSetBuilder::new(Arc::clone(&model)).build(&policy.into());
/// assert!(report.is_clean());
///
/// let engine = Engine::new(rules);
/// let matches = engine.dispatch(&Exec { name: "nc".into() });
/// assert_eq!(matches[0].rule_id, "netcat");
/// assert_eq!(engine.generation(), 1);
/// ```
pub struct Engine<E> {
    current: ArcSwap<RuleSet<E>>,
    generation: AtomicU64,
    publisher: Mutex<()>,
    reloading: AtomicUsize,
}

impl<E> Engine<E> {
    /// Start with `rule_set` as generation 1.
    pub fn new(mut rule_set: RuleSet<E>) -> Self {
        rule_set.generation = 1;
        Engine {
            current: ArcSwap::from_pointee(rule_set),
            generation: AtomicU64::new(1),
            publisher: Mutex::new(()),
            reloading: AtomicUsize::new(0),
        }
    }

    /// The current generation. Later publishes do not affect it.
    pub fn snapshot(&self) -> Arc<RuleSet<E>> {
        self.current.load_full()
    }

    /// Replace the current generation, returning the new generation number.
    pub fn publish(&self, mut rule_set: RuleSet<E>) -> u64 {
        let _publishing = self.publisher.lock();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        rule_set.generation = generation;
        log::debug!(
            "publishing rule generation {generation} ({} rules)",
            rule_set.len()
        );
        self.current.store(Arc::new(rule_set));
        generation
    }

    /// Compile `policies` against `model` and publish the result. The
    /// previous generation stays in service until the swap.
    pub fn reload(
        &self,
        policies: &PolicySet,
        model: Arc<Model<E>>,
        options: CompileOptions,
    ) -> LoadReport {
        let _guard = ReloadGuard::enter(&self.reloading);
        let (rule_set, report) = RuleSetBuilder::new(model)
            .with_options(options)
            .build(policies);
        for error in &report.errors {
            log::warn!("reload: {error}");
        }
        self.publish(rule_set);
        report
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn state(&self) -> EngineState {
        if self.reloading.load(Ordering::Acquire) > 0 {
            EngineState::Swapping
        } else {
            EngineState::Active
        }
    }
}

impl<E: Event> Engine<E> {
    /// Dispatch an event against one snapshot of the current generation.
    pub fn dispatch(&self, event: &E) -> Vec<MatchResult> {
        self.snapshot().dispatch(event)
    }
}

impl<E> std::fmt::Debug for Engine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish()
    }
}

/// Marks a reload in progress for as long as it lives.
struct ReloadGuard<'a>(&'a AtomicUsize);

impl<'a> ReloadGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        ReloadGuard(counter)
    }
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
