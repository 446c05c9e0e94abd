//! Service extraction from compiled protobuf descriptors.
//!
//! Input is a `FileDescriptorSet` in its protobuf JSON mapping, as written by
//! `buf build -o image.json`. Each package becomes one boundary node and each
//! service one system-family node, classified by [`Classifier`].

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::rules::Classifier;
use crate::source::{read_source, JSON_EXTENSIONS};
use crate::{Graph, Insert, Node, NodeType, Origin, PACKAGE_PROPERTY};

/// `FileDescriptorProto.service` field number, first element of a service's
/// source location path.
const SERVICE_FIELD: i32 = 6;

// --- Descriptor set (protobuf JSON mapping) ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDescriptorSet {
    #[serde(default)]
    pub file: Vec<FileDescriptorProto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptorProto {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub service: Vec<ServiceDescriptorProto>,
    #[serde(default, alias = "source_code_info")]
    pub source_code_info: Option<SourceCodeInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDescriptorProto {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceCodeInfo {
    #[serde(default)]
    pub location: Vec<Location>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub path: Vec<i32>,
    #[serde(default, alias = "leading_comments")]
    pub leading_comments: Option<String>,
}

// --- Flattened view ---

/// One compiled `.proto` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFile {
    pub path: String,
    pub package: String,
    pub services: Vec<ServiceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub leading_comment: String,
}

impl FileDescriptorProto {
    fn service_comment(&self, index: usize) -> String {
        let Some(info) = &self.source_code_info else {
            return String::new();
        };
        info.location
            .iter()
            .find(|l| l.path.len() == 2 && l.path[0] == SERVICE_FIELD && l.path[1] as usize == index)
            .and_then(|l| l.leading_comments.clone())
            .unwrap_or_default()
    }

    pub fn to_proto_file(&self) -> ProtoFile {
        ProtoFile {
            path: self.name.clone(),
            package: self.package.clone(),
            services: self
                .service
                .iter()
                .enumerate()
                .map(|(i, s)| ServiceDescriptor {
                    name: s.name.clone(),
                    leading_comment: self.service_comment(i),
                })
                .collect(),
        }
    }
}

pub fn parse_descriptor_set(raw: &str) -> Result<Vec<ProtoFile>> {
    let set: FileDescriptorSet = serde_json::from_str(raw).map_err(|source| Error::Decode {
        what: "descriptor set",
        source,
    })?;
    Ok(set.file.iter().map(FileDescriptorProto::to_proto_file).collect())
}

pub fn read_descriptor_set(path: &Path) -> Result<Vec<ProtoFile>> {
    let raw = read_source(path, JSON_EXTENSIONS)?;
    parse_descriptor_set(&raw)
}

// --- Extraction ---

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Files under this prefix are design-only and marked speculative.
    pub speculative_prefix: Option<String>,
    /// Files under these prefixes are imports, not part of the model.
    pub exclude_prefixes: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            speculative_prefix: None,
            exclude_prefixes: vec!["google/protobuf/".to_string()],
        }
    }
}

impl ExtractOptions {
    fn is_speculative(&self, path: &str) -> bool {
        self.speculative_prefix
            .as_deref()
            .is_some_and(|prefix| !prefix.is_empty() && path.starts_with(prefix))
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

pub fn boundary_id(package: &str) -> String {
    format!("boundary-{}", package)
}

pub fn service_id(service: &str) -> String {
    format!("service-{}", service)
}

/// Turn descriptor files into boundary and service nodes. No edges.
pub struct Extractor {
    classifier: Classifier,
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(classifier: Classifier, options: ExtractOptions) -> Self {
        Extractor { classifier, options }
    }

    pub fn extract(&self, files: &[ProtoFile]) -> Graph {
        let mut graph = Graph::new("Service descriptors", "descriptor-set");
        for file in files {
            if self.options.is_excluded(&file.path) {
                tracing::debug!(path = %file.path, "skipping excluded descriptor file");
                continue;
            }
            let origin = if self.options.is_speculative(&file.path) {
                Origin::Speculative
            } else {
                Origin::Primary
            };

            if !file.package.is_empty() {
                let boundary = Node::new(boundary_id(&file.package), &file.package, NodeType::Boundary)
                    .with_description(format!("Package: {}", file.package))
                    .with_property(PACKAGE_PROPERTY, file.package.as_str())
                    .with_origin(origin);
                insert(&mut graph, boundary);
            }

            for service in &file.services {
                let comment = service.leading_comment.trim();
                let node_type = self.classifier.classify(&service.name, comment);
                tracing::debug!(service = %service.name, %node_type, "classified service");
                let node = Node::new(service_id(&service.name), &service.name, node_type)
                    .with_description(comment)
                    .with_property(PACKAGE_PROPERTY, file.package.as_str())
                    .with_origin(origin);
                insert(&mut graph, node);
            }
        }
        graph
    }
}

fn insert(graph: &mut Graph, node: Node) {
    let id = node.id.clone();
    if let Insert::SlugCollision { handle, existing } = graph.insert_node(node) {
        tracing::warn!(id = %id, existing = %existing, handle = %handle, "descriptor identifier collides with an earlier one");
    }
}
