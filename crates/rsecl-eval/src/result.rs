//! Match result types for rule dispatch.

use std::collections::BTreeMap;

use serde::Serialize;

/// The result of a rule matching an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub rule_id: String,
    /// Type of the event that matched.
    pub event_type: String,
    /// Tags from the matched rule.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Every field the rule reads, with its value on the event. Fields absent
    /// on the event are left out.
    pub matched_fields: Vec<FieldMatch>,
}

/// A field value captured from a matching event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub field: String,
    /// Array-valued fields are rendered as JSON arrays.
    pub value: serde_json::Value,
}

impl MatchResult {
    /// Value captured for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&serde_json::Value> {
        self.matched_fields
            .iter()
            .find(|m| m.field == field)
            .map(|m| &m.value)
    }
}
