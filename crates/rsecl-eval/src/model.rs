//! The field model: which fields exist, their types and how to read them.
//!
//! A [`Model`] is the schema a rule is compiled against. Each [`Field`] owns
//! plain function pointers that read (and optionally write) the field on a
//! concrete event type, so binding a name at compile time is a table lookup
//! and evaluation involves no reflection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{EvalError, Result};
use crate::event::WILDCARD;
use crate::iterator::FieldIterator;
use crate::value::{Value, ValueKind};

// =============================================================================
// Weights
// =============================================================================

/// Reading a plain struct member.
pub const FUNCTION_WEIGHT: u32 = 5;
/// Surcharge of a set-membership test.
pub const IN_ARRAY_WEIGHT: u32 = 10;
/// Surcharge of a glob or regex match.
pub const PATTERN_WEIGHT: u32 = 20;
/// Reading a computed or resolved field.
pub const HANDLER_WEIGHT: u32 = 50;
/// Surcharge of a quantifier loop.
pub const ITERATOR_WEIGHT: u32 = 2000;
/// Surcharge of an operator node.
pub const OPERATOR_WEIGHT: u32 = 1;

// =============================================================================
// Field
// =============================================================================

/// Reads a field. The index is the current element when the field is bound
/// to an iterator, `None` otherwise. `None` means the field is absent on
/// this event.
pub type Getter<E> = for<'a> fn(&'a E, Option<usize>) -> Option<Value<'a>>;

/// Writes a field. Only called with a value of the field's kind.
pub type Setter<E> = fn(&mut E, Value<'_>);

/// Event types a field or iterator is meaningful for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventScope {
    /// Every event type (`"*"`).
    #[default]
    Any,
    Only(BTreeSet<String>),
}

impl EventScope {
    /// Add an event type. The first concrete type replaces the wildcard;
    /// inserting `"*"` makes the scope universal again.
    pub fn insert(&mut self, event_type: &str) {
        if event_type == WILDCARD {
            *self = EventScope::Any;
            return;
        }
        match self {
            EventScope::Any => {
                *self = EventScope::Only(BTreeSet::from([event_type.to_string()]));
            }
            EventScope::Only(types) => {
                types.insert(event_type.to_string());
            }
        }
    }

    pub fn includes(&self, event_type: &str) -> bool {
        match self {
            EventScope::Any => true,
            EventScope::Only(types) => types.contains(event_type),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, EventScope::Any)
    }
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventScope::Any => f.write_str(WILDCARD),
            EventScope::Only(types) => {
                let joined: Vec<&str> = types.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Immutable descriptor of one field.
pub struct Field<E> {
    name: String,
    kind: ValueKind,
    scope: EventScope,
    iterator: Option<String>,
    weight: u32,
    getter: Getter<E>,
    setter: Option<Setter<E>>,
}

impl<E> Field<E> {
    /// A universal, read-only field with [`FUNCTION_WEIGHT`].
    pub fn new(name: impl Into<String>, kind: ValueKind, getter: Getter<E>) -> Self {
        Field {
            name: name.into(),
            kind,
            scope: EventScope::Any,
            iterator: None,
            weight: FUNCTION_WEIGHT,
            getter,
            setter: None,
        }
    }

    pub fn event_type(mut self, event_type: &str) -> Self {
        self.scope.insert(event_type);
        self
    }

    /// Bind the field to an iterator; the getter then receives the element
    /// index.
    pub fn iterator(mut self, iterator: impl Into<String>) -> Self {
        self.iterator = Some(iterator.into());
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn setter(mut self, setter: Setter<E>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn scope(&self) -> &EventScope {
        &self.scope
    }

    pub fn iterator_name(&self) -> Option<&str> {
        self.iterator.as_deref()
    }

    pub fn is_iterable(&self) -> bool {
        self.iterator.is_some()
    }

    pub fn cost(&self) -> u32 {
        self.weight
    }

    pub fn getter(&self) -> Getter<E> {
        self.getter
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl<E> Clone for Field<E> {
    fn clone(&self) -> Self {
        Field {
            name: self.name.clone(),
            kind: self.kind,
            scope: self.scope.clone(),
            iterator: self.iterator.clone(),
            weight: self.weight,
            getter: self.getter,
            setter: self.setter,
        }
    }
}

impl<E> fmt::Debug for Field<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("iterator", &self.iterator)
            .field("weight", &self.weight)
            .finish()
    }
}

// =============================================================================
// Model
// =============================================================================

/// The full set of fields and iterators of one schema version.
pub struct Model<E> {
    fields: BTreeMap<String, Field<E>>,
    iterators: BTreeMap<String, FieldIterator<E>>,
}

impl<E> Model<E> {
    pub fn builder() -> ModelBuilder<E> {
        ModelBuilder::new()
    }

    /// Look up a field by its exact (case-sensitive) name.
    pub fn resolve(&self, name: &str) -> Result<&Field<E>> {
        self.fields
            .get(name)
            .ok_or_else(|| EvalError::FieldNotFound(name.to_string()))
    }

    pub fn event_type_of(&self, name: &str) -> Result<&EventScope> {
        self.resolve(name).map(Field::scope)
    }

    pub fn kind_of(&self, name: &str) -> Result<ValueKind> {
        self.resolve(name).map(Field::kind)
    }

    /// Iterator registered under exactly `name`.
    pub fn iterator(&self, name: &str) -> Option<&FieldIterator<E>> {
        self.iterators.get(name)
    }

    /// Iterator for an iterator root (`process.ancestors`) or for any field
    /// bound to one (`process.ancestors.file.name`).
    pub fn iterator_for(&self, name: &str) -> Result<&FieldIterator<E>> {
        if let Some(it) = self.iterators.get(name) {
            return Ok(it);
        }
        self.resolve(name)?
            .iterator_name()
            .and_then(|it| self.iterators.get(it))
            .ok_or_else(|| EvalError::IteratorNotSupported(name.to_string()))
    }

    /// Fields available on `event_type`, including universal ones, sorted
    /// by name.
    pub fn all_fields(&self, event_type: &str) -> Vec<&Field<E>> {
        self.fields
            .values()
            .filter(|f| f.scope.includes(event_type))
            .collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field<E>> {
        self.fields.values()
    }

    pub fn iterators(&self) -> impl Iterator<Item = &FieldIterator<E>> {
        self.iterators.values()
    }

    /// Every concrete event type mentioned by a field or iterator.
    pub fn event_types(&self) -> BTreeSet<&str> {
        let scopes = self
            .fields
            .values()
            .map(Field::scope)
            .chain(self.iterators.values().map(FieldIterator::scope));
        let mut out = BTreeSet::new();
        for scope in scopes {
            if let EventScope::Only(types) = scope {
                out.extend(types.iter().map(String::as_str));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // -------------------------------------------------------------------------
    // Runtime access
    // -------------------------------------------------------------------------

    /// Value of a scalar field, `None` when absent on this event.
    pub fn field_value<'a>(&self, event: &'a E, name: &str) -> Result<Option<Value<'a>>> {
        let field = self.resolve(name)?;
        if field.is_iterable() {
            return Err(EvalError::mismatch(name, "scalar field", "iterable field"));
        }
        Ok((field.getter)(event, None))
    }

    /// Values of a field across all elements of its iterator. A scalar field
    /// yields at most one value.
    pub fn field_values<'a>(&self, event: &'a E, name: &str) -> Result<Vec<Value<'a>>> {
        let field = self.resolve(name)?;
        match field.iterator_name() {
            None => Ok((field.getter)(event, None).into_iter().collect()),
            Some(_) => {
                let it = self.iterator_for(name)?;
                Ok(it
                    .elements(event)
                    .filter_map(|i| (field.getter)(event, Some(i)))
                    .collect())
            }
        }
    }

    /// Write a scalar field.
    pub fn set_field_value(&self, event: &mut E, name: &str, value: Value<'_>) -> Result<()> {
        let field = self.resolve(name)?;
        if value.kind() != field.kind {
            return Err(EvalError::mismatch(
                name,
                field.kind.as_str(),
                value.kind().as_str(),
            ));
        }
        let setter = field
            .setter
            .ok_or_else(|| EvalError::ReadOnlyField(name.to_string()))?;
        setter(event, value);
        Ok(())
    }
}

impl<E> fmt::Debug for Model<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("fields", &self.fields.len())
            .field("iterators", &self.iterators.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Incremental [`Model`] construction. Errors are reported by
/// [`build`](ModelBuilder::build).
pub struct ModelBuilder<E> {
    fields: BTreeMap<String, Field<E>>,
    iterators: BTreeMap<String, FieldIterator<E>>,
    errors: Vec<EvalError>,
}

impl<E> Default for ModelBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ModelBuilder<E> {
    pub fn new() -> Self {
        ModelBuilder {
            fields: BTreeMap::new(),
            iterators: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn iterator(mut self, iterator: FieldIterator<E>) -> Self {
        let name = iterator.name().to_string();
        if self.fields.contains_key(&name) || self.iterators.contains_key(&name) {
            self.errors.push(EvalError::DuplicateField(name));
        } else {
            self.iterators.insert(name, iterator);
        }
        self
    }

    pub fn field(mut self, field: Field<E>) -> Self {
        let name = field.name.clone();
        if self.fields.contains_key(&name) || self.iterators.contains_key(&name) {
            self.errors.push(EvalError::DuplicateField(name));
        } else {
            self.fields.insert(name, field);
        }
        self
    }

    pub fn fields(self, fields: impl IntoIterator<Item = Field<E>>) -> Self {
        fields.into_iter().fold(self, ModelBuilder::field)
    }

    /// Finish the model. Fails on the first duplicate name or on a field
    /// bound to an iterator that was never registered.
    pub fn build(mut self) -> Result<Model<E>> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        for field in self.fields.values() {
            if let Some(it) = &field.iterator
                && !self.iterators.contains_key(it)
            {
                return Err(EvalError::IteratorNotSupported(it.clone()));
            }
        }
        Ok(Model {
            fields: self.fields,
            iterators: self.iterators,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TestEvent, model};

    #[test]
    fn test_resolve() {
        let model = model();
        let field = model.resolve("exec.name").unwrap();
        assert_eq!(field.kind(), ValueKind::Str);
        assert!(field.scope().includes("exec"));
        assert!(!field.scope().includes("open"));
        assert!(matches!(
            model.resolve("exec.Name"),
            Err(EvalError::FieldNotFound(name)) if name == "exec.Name"
        ));
        assert_eq!(model.kind_of("process.uid").unwrap(), ValueKind::Int);
        assert!(model.event_type_of("process.uid").unwrap().is_any());
    }

    #[test]
    fn test_iterator_for() {
        let model = model();
        assert_eq!(
            model.iterator_for("process.ancestors").unwrap().name(),
            "process.ancestors"
        );
        assert_eq!(
            model.iterator_for("process.ancestors.name").unwrap().name(),
            "process.ancestors"
        );
        assert!(matches!(
            model.iterator_for("process.uid"),
            Err(EvalError::IteratorNotSupported(_))
        ));
    }

    #[test]
    fn test_all_fields_includes_universal() {
        let model = model();
        let exec: Vec<&str> = model.all_fields("exec").iter().map(|f| f.name()).collect();
        assert!(exec.contains(&"exec.name"));
        assert!(exec.contains(&"process.uid"));
        assert!(!exec.contains(&"open.path"));
        assert_eq!(
            model.event_types().into_iter().collect::<Vec<_>>(),
            vec!["connect", "exec", "open"]
        );
    }

    #[test]
    fn test_field_values_over_iterator() {
        let model = model();
        let event = TestEvent::exec("ls").with_ancestor("bash", 1000).with_ancestor("sshd", 0);
        let names = model.field_values(&event, "process.ancestors.name").unwrap();
        assert_eq!(names, vec![Value::from("bash"), Value::from("sshd")]);
        assert!(model.field_value(&event, "process.ancestors.name").is_err());
        assert_eq!(
            model.field_value(&event, "exec.name").unwrap(),
            Some(Value::from("ls"))
        );
        assert_eq!(model.field_value(&event, "open.path").unwrap(), None);
    }

    #[test]
    fn test_set_field_value() {
        let model = model();
        let mut event = TestEvent::exec("ls");
        model
            .set_field_value(&mut event, "process.uid", Value::Int(42))
            .unwrap();
        assert_eq!(event.uid, 42);

        let err = model
            .set_field_value(&mut event, "process.uid", Value::from("root"))
            .unwrap_err();
        assert!(matches!(err, EvalError::ValueTypeMismatch { .. }), "{err}");

        let err = model
            .set_field_value(&mut event, "exec.args", Value::from(Vec::<String>::new()))
            .unwrap_err();
        assert!(matches!(err, EvalError::ReadOnlyField(_)), "{err}");
    }

    #[test]
    fn test_builder_rejects_duplicates_and_unknown_iterators() {
        let dup = Model::<TestEvent>::builder()
            .field(Field::new("a", ValueKind::Int, |_, _| Some(Value::Int(1))))
            .field(Field::new("a", ValueKind::Int, |_, _| Some(Value::Int(2))))
            .build();
        assert!(matches!(dup, Err(EvalError::DuplicateField(n)) if n == "a"));

        let orphan = Model::<TestEvent>::builder()
            .field(Field::new("x.y", ValueKind::Int, |_, _| None).iterator("x"))
            .build();
        assert!(matches!(orphan, Err(EvalError::IteratorNotSupported(n)) if n == "x"));
    }
}
