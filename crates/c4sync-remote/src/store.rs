//! The remote store seam and the payloads that cross it.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use c4sync_core::{Edge, Graph, Node, NodeType, Origin, Properties, PropertyValue, EXTERNAL_PROPERTY, SPECULATIVE_PROPERTY};

use crate::error::RemoteError;

/// Landscape and version a synchronization targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub landscape: String,
    pub version: String,
}

impl Scope {
    pub fn new(landscape: impl Into<String>, version: impl Into<String>) -> Self {
        Scope {
            landscape: landscape.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    DiagramGroups,
    Diagrams,
    Objects,
    Connections,
}

/// Deletion order of a wipe: containers before what they reference.
pub const WIPE_ORDER: [ResourceKind; 4] = [
    ResourceKind::DiagramGroups,
    ResourceKind::Diagrams,
    ResourceKind::Objects,
    ResourceKind::Connections,
];

impl ResourceKind {
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::DiagramGroups => "diagram-groups",
            ResourceKind::Diagrams => "diagrams",
            ResourceKind::Objects => "model/objects",
            ResourceKind::Connections => "model/connections",
        }
    }
}

/// One entry of a listing. Only `id` is guaranteed; model objects and
/// connections also carry their handle and content.
///
/// Listings also return diagrams and groups with fields this tool never
/// writes, so `null` text decodes as empty and non-scalar properties are
/// dropped instead of failing the whole listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, deserialize_with = "scalar_properties")]
    pub properties: Properties,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_properties<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let scalar = match value {
                Value::Bool(b) => PropertyValue::Bool(b),
                Value::Number(n) => PropertyValue::Number(n.as_f64()?),
                Value::String(s) => PropertyValue::Text(s),
                _ => return None,
            };
            Some((key, scalar))
        })
        .collect())
}

impl RemoteRecord {
    pub fn handle(&self) -> &str {
        self.handle_id.as_deref().unwrap_or(&self.id)
    }

    /// Read a model object back as a node. `None` for type tags this tool
    /// never writes.
    pub fn to_node(&self) -> Option<Node> {
        let mut properties = self.properties.clone();
        let external = properties.get(EXTERNAL_PROPERTY) == Some(&PropertyValue::Bool(true));
        let node_type = NodeType::from_wire(self.record_type.as_deref()?, external)?;
        let origin = match properties.remove(SPECULATIVE_PROPERTY) {
            Some(PropertyValue::Bool(true)) => Origin::Speculative,
            _ => Origin::Primary,
        };
        Some(Node {
            id: self.handle().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            node_type,
            properties,
            origin,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPayload {
    pub handle_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl ObjectPayload {
    pub fn from_node(node: &Node) -> Self {
        let mut properties = node.properties.clone();
        if node.node_type == NodeType::ExternalSystem {
            properties.insert(EXTERNAL_PROPERTY.to_string(), PropertyValue::Bool(true));
        }
        if node.is_speculative() {
            properties.insert(SPECULATIVE_PROPERTY.to_string(), PropertyValue::Bool(true));
        }
        ObjectPayload {
            handle_id: node.handle(),
            name: node.name.clone(),
            description: node.description.clone(),
            object_type: node.node_type.wire_tag().to_string(),
            properties,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPayload {
    pub handle_id: String,
    pub from_id: String,
    pub to_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ConnectionPayload {
    /// Payload pointing at the given endpoint ids.
    pub fn from_edge(edge: &Edge, from_id: &str, to_id: &str) -> Self {
        ConnectionPayload {
            handle_id: edge.handle.clone(),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            name: edge.label.clone(),
            description: edge.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub diagram_type: String,
    pub objects: Vec<ObjectPayload>,
    pub connections: Vec<ConnectionPayload>,
}

impl DiagramPayload {
    /// Diagram embedding every node and edge by handle.
    pub fn from_graph(graph: &Graph) -> Self {
        DiagramPayload {
            name: graph.name.clone(),
            diagram_type: graph.graph_type.clone(),
            objects: graph.nodes().iter().map(ObjectPayload::from_node).collect(),
            connections: graph
                .edges()
                .iter()
                .map(|e| ConnectionPayload::from_edge(e, &e.from, &e.to))
                .collect(),
        }
    }
}

/// Resource-oriented remote store. Every call is one request; callers issue
/// them one at a time.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn landscape_exists(&self, landscape: &str) -> Result<bool, RemoteError>;

    async fn version_exists(&self, scope: &Scope) -> Result<bool, RemoteError>;

    async fn list(&self, scope: &Scope, kind: ResourceKind) -> Result<Vec<RemoteRecord>, RemoteError>;

    async fn delete(&self, scope: &Scope, kind: ResourceKind, id: &str) -> Result<(), RemoteError>;

    /// Returns the id assigned by the store.
    async fn create_object(&self, scope: &Scope, object: &ObjectPayload) -> Result<String, RemoteError>;

    async fn update_object(&self, scope: &Scope, id: &str, object: &ObjectPayload) -> Result<(), RemoteError>;

    async fn create_connection(
        &self,
        scope: &Scope,
        connection: &ConnectionPayload,
    ) -> Result<String, RemoteError>;

    async fn create_diagram(&self, scope: &Scope, diagram: &DiagramPayload) -> Result<String, RemoteError>;
}
