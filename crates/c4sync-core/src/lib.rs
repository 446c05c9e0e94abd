pub mod c4text;
pub mod descriptor;
pub mod diff;
pub mod error;
pub mod interchange;
pub mod rules;
pub mod settings;
pub mod source;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// --- Types ---

/// Architectural category of a node. Serialized with the notation's macro
/// names, which is also what the interchange document carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
pub enum NodeType {
    #[serde(rename = "Person")]
    Actor,
    #[serde(rename = "System")]
    InternalSystem,
    #[serde(rename = "System_Ext")]
    ExternalSystem,
    #[serde(rename = "SystemDb")]
    SystemWithPersistence,
    #[serde(rename = "System_Boundary")]
    Boundary,
}

impl NodeType {
    /// Type tag understood by the remote store. External systems share the
    /// `system` tag and are told apart by the `external` property.
    pub fn wire_tag(self) -> &'static str {
        match self {
            NodeType::Actor => "actor",
            NodeType::InternalSystem | NodeType::ExternalSystem => "system",
            NodeType::SystemWithPersistence => "store",
            NodeType::Boundary => "group",
        }
    }

    pub fn from_wire(tag: &str, external: bool) -> Option<NodeType> {
        match tag {
            "actor" => Some(NodeType::Actor),
            "system" if external => Some(NodeType::ExternalSystem),
            "system" => Some(NodeType::InternalSystem),
            "store" => Some(NodeType::SystemWithPersistence),
            "group" => Some(NodeType::Boundary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Actor => "Person",
            NodeType::InternalSystem => "System",
            NodeType::ExternalSystem => "System_Ext",
            NodeType::SystemWithPersistence => "SystemDb",
            NodeType::Boundary => "System_Boundary",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar property value.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Numbers compare by value, except that NaN equals NaN so every value is
/// equal to itself.
impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a == b,
            (PropertyValue::Number(a), PropertyValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (PropertyValue::Text(a), PropertyValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Property set on every external system.
pub const EXTERNAL_PROPERTY: &str = "external";
/// Wire-only property marking speculative nodes.
pub const SPECULATIVE_PROPERTY: &str = "speculative";
/// Package a descriptor-derived node belongs to.
pub const PACKAGE_PROPERTY: &str = "package";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    #[default]
    Primary,
    /// Declared in a not-yet-implemented design source.
    Speculative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default)]
    pub origin: Origin,
}

impl Node {
    /// Build a node. External systems always get `external: true`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        let mut properties = Properties::new();
        if node_type == NodeType::ExternalSystem {
            properties.insert(EXTERNAL_PROPERTY.to_string(), PropertyValue::Bool(true));
        }
        Node {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            node_type,
            properties,
            origin: Origin::Primary,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Remote-facing handle.
    pub fn handle(&self) -> String {
        slug(&self.id)
    }

    pub fn is_speculative(&self) -> bool {
        self.origin == Origin::Speculative
    }
}

/// A directed, labelled connection between two node handles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub handle: String,
    pub from: String,
    pub to: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// True for both halves of an expanded bidirectional relation.
    #[serde(default)]
    pub bidirectional: bool,
}

impl Edge {
    pub fn new(from: &str, to: &str, label: impl Into<String>) -> Self {
        let label = label.into();
        let from = slug(from);
        let to = slug(to);
        Edge {
            handle: make_edge_handle(&from, &to, &label, None),
            from,
            to,
            label,
            description: String::new(),
            bidirectional: false,
        }
    }

    /// Both halves of a bidirectional relation. The halves get distinct
    /// handles even when `a` and `b` are the same node.
    pub fn pair(a: &str, b: &str, label: impl Into<String>) -> (Edge, Edge) {
        let label = label.into();
        let (a, b) = (slug(a), slug(b));
        let half = |from: &str, to: &str, tag: &str| Edge {
            handle: make_edge_handle(from, to, &label, Some(tag)),
            from: from.to_string(),
            to: to.to_string(),
            label: label.clone(),
            description: String::new(),
            bidirectional: true,
        };
        (half(&a, &b, "fwd"), half(&b, &a, "rev"))
    }
}

/// Outcome of adding a node to a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insert {
    Added,
    /// Same raw identifier already declared; first declaration kept.
    Duplicate,
    /// A different raw identifier already owns this handle.
    SlugCollision { handle: String, existing: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub name: String,
    #[serde(rename = "type")]
    pub graph_type: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
    #[serde(skip)]
    by_handle: HashMap<String, usize>,
}

pub const DEFAULT_DIAGRAM_NAME: &str = "Imported Diagram";
pub const DEFAULT_DIAGRAM_TYPE: &str = "app-diagram";

impl Graph {
    pub fn new(name: impl Into<String>, graph_type: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            graph_type: graph_type.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            by_id: HashMap::new(),
            by_handle: HashMap::new(),
        }
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_by_handle(&self, handle: &str) -> Option<&Node> {
        self.by_handle.get(handle).map(|&i| &self.nodes[i])
    }

    pub fn contains_handle(&self, handle: &str) -> bool {
        self.by_handle.contains_key(handle)
    }

    pub fn insert_node(&mut self, node: Node) -> Insert {
        if self.by_id.contains_key(&node.id) {
            return Insert::Duplicate;
        }
        let handle = node.handle();
        if let Some(&existing) = self.by_handle.get(&handle) {
            return Insert::SlugCollision {
                handle,
                existing: self.nodes[existing].id.clone(),
            };
        }
        let index = self.nodes.len();
        self.by_id.insert(node.id.clone(), index);
        self.by_handle.insert(handle, index);
        self.nodes.push(node);
        Insert::Added
    }

    /// Append an edge. Returns false when an edge with the same handle exists.
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        if self.edges.iter().any(|e| e.handle == edge.handle) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Drop edges whose endpoints are not nodes of this graph.
    pub fn retain_resolved_edges(&mut self) -> Vec<Edge> {
        let (kept, dropped): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| self.by_handle.contains_key(&e.from) && self.by_handle.contains_key(&e.to));
        self.edges = kept;
        dropped
    }
}

// --- Identifiers ---

/// Lowercase the identifier and turn each space into a hyphen.
pub fn slug(id: &str) -> String {
    id.replace(' ', "-").to_lowercase()
}

/// Edge handle derived from its endpoints and raw label, plus a direction
/// tag for halves of a bidirectional relation. Components are escaped and
/// joined with `.`, so distinct inputs never share a handle.
pub fn make_edge_handle(from: &str, to: &str, label: &str, tag: Option<&str>) -> String {
    let mut handle = String::from("edge");
    for part in [Some(from), Some(to), Some(label), tag].into_iter().flatten() {
        handle.push('.');
        escape_component(part, &mut handle);
    }
    handle
}

/// Keeps ASCII alphanumerics and `-`; every other byte becomes `_xx`.
fn escape_component(part: &str, out: &mut String) {
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
}
