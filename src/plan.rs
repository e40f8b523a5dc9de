//! Schema-driven planning.
//!
//! Given a resource [`Schema`], the prior state and the proposed
//! configuration, work out the state the apply step should produce: defaults
//! filled in, provider-owned attributes carried over, and the list of
//! attribute changes with a flag telling whether the change can be applied in
//! place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::Schema;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource has to be destroyed and created again.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Whether applying this plan would touch the resource at all.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Plan a resource change.
///
/// `proposed` is the configuration (or a full proposed state); `Value::Null`
/// plans a destroy.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let empty = Map::new();
    let prior_obj = prior.and_then(Value::as_object).unwrap_or(&empty);

    if proposed.is_null() {
        let changes = prior_obj
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
            .collect();
        return PlanResult {
            planned_state: Value::Null,
            changes,
            requires_replace: false,
        };
    }

    let proposed_obj = proposed.as_object().unwrap_or(&empty);
    let mut planned = Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.attributes {
        let configured = proposed_obj.get(name).filter(|v| !v.is_null());
        let value = if attr.flags.is_computed_only() {
            // Provider-owned: keep what the last apply recorded.
            prior_obj.get(name).cloned().unwrap_or(Value::Null)
        } else {
            configured
                .cloned()
                .or_else(|| attr.default.clone())
                .or_else(|| {
                    attr.flags
                        .computed
                        .then(|| prior_obj.get(name).cloned())
                        .flatten()
                })
                .unwrap_or(Value::Null)
        };

        if prior.is_none() {
            if !value.is_null() && !attr.flags.is_computed_only() {
                changes.push(AttributeChange::added(name.clone(), value.clone()));
            }
        } else if !attr.flags.is_computed_only() {
            let before = prior_obj.get(name).cloned().unwrap_or(Value::Null);
            if before != value {
                requires_replace |= attr.force_new;
                changes.push(AttributeChange::modified(name.clone(), before, value.clone()));
            }
        }

        planned.insert(name.clone(), value);
    }

    if requires_replace {
        // The replacement gets fresh provider-owned values.
        for (name, attr) in &schema.attributes {
            if attr.flags.is_computed_only() {
                planned.insert(name.clone(), Value::Null);
            }
        }
    }

    PlanResult {
        planned_state: Value::Object(planned),
        changes,
        requires_replace,
    }
}
