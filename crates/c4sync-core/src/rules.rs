//! Classification rules for services extracted from descriptors.
//!
//! The leading comment is consulted first; the service name only when the
//! comment gives no signal. Within each signal persistence terms are checked
//! before external terms. Anything unmatched is an internal system.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::source::{read_source, JSON_EXTENSIONS};
use crate::NodeType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierRules {
    /// Matched case-insensitively against the leading comment.
    pub comment_persistence_terms: Vec<String>,
    /// Matched case-insensitively against the leading comment.
    pub comment_external_terms: Vec<String>,
    /// Matched as case-sensitive substrings of the service name.
    pub name_persistence_patterns: Vec<String>,
    /// Matched as case-sensitive substrings of the service name.
    pub name_external_patterns: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        ClassifierRules {
            comment_persistence_terms: owned(&["database", "persistence", "storage", "repository"]),
            comment_external_terms: owned(&["external", "third-party", "integration", "external service"]),
            name_persistence_patterns: owned(&["Database", "DB", "Repository", "Storage", "Persistence"]),
            name_external_patterns: owned(&["External", "Ext", "ThirdParty", "Partner", "Provider"]),
        }
    }
}

impl ClassifierRules {
    /// Load rules from a JSON file; missing lists keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_source(path, JSON_EXTENSIONS)?;
        serde_json::from_str(&raw).map_err(|source| Error::Decode {
            what: "classifier rules",
            source,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ClassifierRules,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Classifier { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    pub fn classify(&self, service_name: &str, comment: &str) -> NodeType {
        self.classify_comment(comment)
            .unwrap_or_else(|| self.classify_name(service_name))
    }

    /// `None` when the comment carries no signal.
    pub fn classify_comment(&self, comment: &str) -> Option<NodeType> {
        let lower = comment.to_lowercase();
        let hit = |terms: &[String]| terms.iter().any(|t| lower.contains(&t.to_lowercase()));
        if hit(&self.rules.comment_persistence_terms) {
            Some(NodeType::SystemWithPersistence)
        } else if hit(&self.rules.comment_external_terms) {
            Some(NodeType::ExternalSystem)
        } else {
            None
        }
    }

    pub fn classify_name(&self, service_name: &str) -> NodeType {
        let hit = |patterns: &[String]| patterns.iter().any(|p| service_name.contains(p.as_str()));
        if hit(&self.rules.name_persistence_patterns) {
            NodeType::SystemWithPersistence
        } else if hit(&self.rules.name_external_patterns) {
            NodeType::ExternalSystem
        } else {
            NodeType::InternalSystem
        }
    }
}
