//! Field-level comparison of nodes. Identifiers never take part: two nodes
//! are equal when name, description, type and properties match.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{Node, NodeType, PropertyValue};

pub const NAME_FIELD: &str = "name";
pub const DESCRIPTION_FIELD: &str = "description";
pub const TYPE_FIELD: &str = "type";
pub const PROPERTY_PREFIX: &str = "property.";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Type(NodeType),
    Property(PropertyValue),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "\"{s}\""),
            FieldValue::Type(t) => write!(f, "{t}"),
            FieldValue::Property(p) => write!(f, "{p}"),
        }
    }
}

/// Before/after pair. `None` means the field has no value on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub before: Option<FieldValue>,
    pub after: Option<FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Keyed by field name or `property.<key>`.
    Fields(BTreeMap<String, Change>),
    /// One whole node is missing.
    Absent { missing: Side },
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        matches!(self, Diff::Fields(fields) if fields.is_empty())
    }

    pub fn len(&self) -> usize {
        match self {
            Diff::Fields(fields) => fields.len(),
            Diff::Absent { .. } => 1,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        match self {
            Diff::Fields(fields) => fields.get(key),
            Diff::Absent { .. } => None,
        }
    }

    /// One line per change, for logs and reports.
    pub fn describe(&self) -> Vec<String> {
        match self {
            Diff::Absent { missing: Side::Before } => vec!["node added".to_string()],
            Diff::Absent { missing: Side::After } => vec!["node removed".to_string()],
            Diff::Fields(fields) => fields
                .iter()
                .map(|(key, change)| format!("{} {} -> {}", key, show(&change.before), show(&change.after)))
                .collect(),
        }
    }
}

fn show(value: &Option<FieldValue>) -> String {
    value.as_ref().map_or_else(|| "none".to_string(), |v| v.to_string())
}

pub fn diff(before: Option<&Node>, after: Option<&Node>) -> Diff {
    match (before, after) {
        (None, None) => Diff::Fields(BTreeMap::new()),
        (None, Some(_)) => Diff::Absent { missing: Side::Before },
        (Some(_), None) => Diff::Absent { missing: Side::After },
        (Some(a), Some(b)) => Diff::Fields(diff_fields(a, b)),
    }
}

pub fn content_eq(a: &Node, b: &Node) -> bool {
    a.name == b.name
        && a.description == b.description
        && a.node_type == b.node_type
        && a.properties == b.properties
}

fn diff_fields(a: &Node, b: &Node) -> BTreeMap<String, Change> {
    let mut changes = BTreeMap::new();
    let mut text = |key: &str, x: &str, y: &str| {
        if x != y {
            changes.insert(
                key.to_string(),
                Change {
                    before: Some(FieldValue::Text(x.to_string())),
                    after: Some(FieldValue::Text(y.to_string())),
                },
            );
        }
    };
    text(NAME_FIELD, &a.name, &b.name);
    text(DESCRIPTION_FIELD, &a.description, &b.description);

    if a.node_type != b.node_type {
        changes.insert(
            TYPE_FIELD.to_string(),
            Change {
                before: Some(FieldValue::Type(a.node_type)),
                after: Some(FieldValue::Type(b.node_type)),
            },
        );
    }

    let keys: BTreeSet<&String> = a.properties.keys().chain(b.properties.keys()).collect();
    for key in keys {
        let x = a.properties.get(key);
        let y = b.properties.get(key);
        if x != y {
            changes.insert(
                format!("{PROPERTY_PREFIX}{key}"),
                Change {
                    before: x.cloned().map(FieldValue::Property),
                    after: y.cloned().map(FieldValue::Property),
                },
            );
        }
    }
    changes
}
