//! One-shot reconciliation of a local graph against the remote store.
//!
//! Every workflow runs its validation before the first mutating call and
//! stops at the first failure. Calls are issued one at a time in graph order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use c4sync_core::c4text::ParseReport;
use c4sync_core::diff::diff;
use c4sync_core::{Edge, Graph, Node};

use crate::error::{Result, SyncError, UnresolvedEndpoint};
use crate::store::{
    ConnectionPayload, DiagramPayload, ObjectPayload, RemoteRecord, RemoteStore, ResourceKind, Scope, WIPE_ORDER,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete everything in the scope before pushing.
    pub wipe: bool,
    pub connections: bool,
    pub diagram: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeReport {
    pub deleted: BTreeMap<ResourceKind, usize>,
}

impl WipeReport {
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Remote id of every pushed node, keyed by handle.
    pub ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionReport {
    pub created: usize,
    pub existing: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub wipe: Option<WipeReport>,
    pub objects: ObjectReport,
    pub connections: Option<ConnectionReport>,
    pub diagram: Option<String>,
}

/// Refuse to push a graph whose identifiers collided after slugging.
pub fn check_collisions(report: &ParseReport) -> Result<()> {
    match report.slug_collisions.first() {
        Some(c) => Err(SyncError::SlugCollision {
            id: c.id.clone(),
            existing: c.existing.clone(),
            handle: c.handle.clone(),
        }),
        None => Ok(()),
    }
}

pub struct Reconciler<'a> {
    store: &'a dyn RemoteStore,
    scope: Scope,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RemoteStore, scope: Scope) -> Self {
        Reconciler {
            store,
            scope,
            dry_run: false,
        }
    }

    /// In dry-run mode reads are issued and writes are only logged.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub async fn validate_scope(&self) -> Result<()> {
        tracing::info!(landscape = %self.scope.landscape, version = %self.scope.version, "validating scope");
        if !self.store.landscape_exists(&self.scope.landscape).await? {
            return Err(SyncError::LandscapeNotFound(self.scope.landscape.clone()));
        }
        if !self.store.version_exists(&self.scope).await? {
            return Err(SyncError::VersionNotFound {
                landscape: self.scope.landscape.clone(),
                version: self.scope.version.clone(),
            });
        }
        Ok(())
    }

    /// Delete every resource in the scope, kind by kind in [`WIPE_ORDER`].
    pub async fn wipe(&self) -> Result<WipeReport> {
        let mut report = WipeReport::default();
        for kind in WIPE_ORDER {
            let records = self.store.list(&self.scope, kind).await?;
            tracing::info!(kind = kind.path(), count = records.len(), "wiping");
            for record in &records {
                if self.dry_run {
                    tracing::warn!(kind = kind.path(), id = %record.id, "dry run: skipping delete");
                } else {
                    self.store.delete(&self.scope, kind, &record.id).await?;
                }
            }
            report.deleted.insert(kind, records.len());
        }
        Ok(report)
    }

    /// Create or update one remote object per node. Nodes whose remote
    /// counterpart already has the same content are skipped.
    pub async fn push_objects(&self, nodes: &[Node], skip_listing: bool) -> Result<ObjectReport> {
        tracing::info!(count = nodes.len(), "pushing objects");
        let remote: HashMap<String, RemoteRecord> = if skip_listing {
            HashMap::new()
        } else {
            self.store
                .list(&self.scope, ResourceKind::Objects)
                .await?
                .into_iter()
                .map(|r| (r.handle().to_string(), r))
                .collect()
        };

        let mut report = ObjectReport::default();
        for node in nodes {
            let payload = ObjectPayload::from_node(node);
            let handle = payload.handle_id.clone();
            let id = match remote.get(&handle) {
                None => {
                    report.created += 1;
                    self.create_object(&payload).await?
                }
                Some(record) => {
                    let changes = match record.to_node() {
                        Some(existing) => {
                            let mut lines = diff(Some(&existing), Some(node)).describe();
                            if existing.origin != node.origin {
                                lines.push(format!("origin {:?} -> {:?}", existing.origin, node.origin));
                            }
                            lines
                        }
                        None => vec![format!(
                            "type {} -> {}",
                            record.record_type.as_deref().unwrap_or("none"),
                            payload.object_type
                        )],
                    };
                    if changes.is_empty() {
                        tracing::debug!(handle = %handle, "unchanged");
                        report.unchanged += 1;
                    } else {
                        for line in &changes {
                            tracing::info!(handle = %handle, "{line}");
                        }
                        report.updated += 1;
                        self.update_object(&record.id, &payload).await?;
                    }
                    record.id.clone()
                }
            };
            report.ids.insert(handle, id);
        }
        tracing::info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            "objects done"
        );
        Ok(report)
    }

    /// Create the given connections. Every endpoint must already exist
    /// remotely (or in `known`, handle to id); otherwise nothing is created.
    pub async fn push_connections(
        &self,
        edges: &[Edge],
        known: &BTreeMap<String, String>,
    ) -> Result<ConnectionReport> {
        tracing::info!(count = edges.len(), "pushing connections");
        let mut ids: HashMap<String, String> = self
            .store
            .list(&self.scope, ResourceKind::Objects)
            .await?
            .into_iter()
            .map(|r| (r.handle().to_string(), r.id))
            .collect();
        for (handle, id) in known {
            ids.entry(handle.clone()).or_insert_with(|| id.clone());
        }

        let unresolved: Vec<UnresolvedEndpoint> = edges
            .iter()
            .flat_map(|e| [(e, &e.from), (e, &e.to)])
            .filter(|(_, endpoint)| !ids.contains_key(endpoint.as_str()))
            .map(|(e, endpoint)| UnresolvedEndpoint {
                edge: e.handle.clone(),
                endpoint: endpoint.clone(),
            })
            .collect();
        if !unresolved.is_empty() {
            return Err(SyncError::UnresolvedEndpoints(unresolved));
        }

        let existing: BTreeSet<String> = self
            .store
            .list(&self.scope, ResourceKind::Connections)
            .await?
            .iter()
            .map(|r| r.handle().to_string())
            .collect();

        let mut report = ConnectionReport::default();
        for edge in edges {
            if existing.contains(&edge.handle) {
                tracing::debug!(handle = %edge.handle, "connection exists");
                report.existing += 1;
                continue;
            }
            // Both endpoints were checked above.
            let (Some(from_id), Some(to_id)) = (ids.get(&edge.from), ids.get(&edge.to)) else {
                continue;
            };
            let payload = ConnectionPayload::from_edge(edge, from_id, to_id);
            if self.dry_run {
                tracing::warn!(handle = %payload.handle_id, "dry run: skipping connection create");
            } else {
                self.store.create_connection(&self.scope, &payload).await?;
            }
            report.created += 1;
        }
        tracing::info!(created = report.created, existing = report.existing, "connections done");
        Ok(report)
    }

    /// Validate the scope, then push the connections alone.
    pub async fn connect(&self, edges: &[Edge]) -> Result<ConnectionReport> {
        self.validate_scope().await?;
        self.push_connections(edges, &BTreeMap::new()).await
    }

    /// Create a diagram embedding the graph. `None` in dry-run mode.
    pub async fn push_diagram(&self, graph: &Graph) -> Result<Option<String>> {
        let payload = DiagramPayload::from_graph(graph);
        tracing::info!(name = %payload.name, "creating diagram");
        if self.dry_run {
            tracing::warn!(name = %payload.name, "dry run: skipping diagram create");
            return Ok(None);
        }
        let id = self.store.create_diagram(&self.scope, &payload).await?;
        Ok(Some(id))
    }

    /// Full pass: validate, optionally wipe, then objects, connections and
    /// diagram as requested.
    pub async fn sync(&self, graph: &Graph, options: &SyncOptions) -> Result<SyncReport> {
        self.validate_scope().await?;

        let mut report = SyncReport::default();
        if options.wipe {
            report.wipe = Some(self.wipe().await?);
        }
        // After a real wipe the scope is known to be empty.
        let skip_listing = options.wipe && !self.dry_run;
        report.objects = self.push_objects(graph.nodes(), skip_listing).await?;
        if options.connections {
            report.connections = Some(self.push_connections(graph.edges(), &report.objects.ids).await?);
        }
        if options.diagram {
            report.diagram = self.push_diagram(graph).await?;
        }
        Ok(report)
    }

    async fn create_object(&self, payload: &ObjectPayload) -> Result<String> {
        if self.dry_run {
            tracing::warn!(handle = %payload.handle_id, "dry run: skipping object create");
            return Ok(payload.handle_id.clone());
        }
        Ok(self.store.create_object(&self.scope, payload).await?)
    }

    async fn update_object(&self, id: &str, payload: &ObjectPayload) -> Result<()> {
        if self.dry_run {
            tracing::warn!(handle = %payload.handle_id, id, "dry run: skipping object update");
            return Ok(());
        }
        Ok(self.store.update_object(&self.scope, id, payload).await?)
    }
}
