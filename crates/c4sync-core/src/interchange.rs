//! The objects document written by `extract` and read by `upload`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::source::{read_source, JSON_EXTENSIONS};
use crate::{Graph, Node, NodeType, Origin, PropertyValue, PACKAGE_PROPERTY};

/// Conventional file name of the objects document.
pub const OBJECTS_FILE: &str = "icepanel_objects.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub landscape_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_id: String,
    /// Delete everything in the version before pushing.
    #[serde(default)]
    pub wipe: bool,
}

impl TargetConfig {
    pub fn is_unset(&self) -> bool {
        self.landscape_id.is_empty() && self.version_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub is_speculative: bool,
}

impl ObjectRecord {
    pub fn from_node(node: &Node) -> Self {
        let package = match node.properties.get(PACKAGE_PROPERTY) {
            Some(PropertyValue::Text(p)) => p.clone(),
            _ => String::new(),
        };
        ObjectRecord {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            node_type: node.node_type,
            package,
            is_speculative: node.is_speculative(),
        }
    }

    pub fn to_node(&self) -> Node {
        let origin = if self.is_speculative {
            Origin::Speculative
        } else {
            Origin::Primary
        };
        Node::new(&self.id, &self.name, self.node_type)
            .with_description(&self.description)
            .with_property(PACKAGE_PROPERTY, self.package.as_str())
            .with_origin(origin)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectsDocument {
    #[serde(default, skip_serializing_if = "TargetConfig::is_unset")]
    pub config: TargetConfig,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

impl ObjectsDocument {
    pub fn from_graph(graph: &Graph, config: TargetConfig) -> Self {
        ObjectsDocument {
            config,
            objects: graph.nodes().iter().map(ObjectRecord::from_node).collect(),
        }
    }

    /// Nodes in document order; repeated ids keep their first record.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new("Uploaded objects", "descriptor-set");
        for record in &self.objects {
            graph.insert_node(record.to_node());
        }
        graph
    }

    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self).map_err(|source| Error::Decode {
            what: "objects document",
            source,
        })?;
        out.push('\n');
        Ok(out)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| Error::Decode {
            what: "objects document",
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(&read_source(path, JSON_EXTENSIONS)?)
    }
}

/// JSON Schema of the objects document.
pub fn schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(ObjectsDocument)).unwrap_or_default()
}
