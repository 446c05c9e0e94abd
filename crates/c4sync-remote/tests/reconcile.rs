use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use c4sync_core::c4text::parse_diagram;
use c4sync_core::{Graph, Node, NodeType, DEFAULT_DIAGRAM_TYPE};
use c4sync_remote::reconcile::{ObjectReport, SyncOptions};
use c4sync_remote::store::{ConnectionPayload, DiagramPayload, ObjectPayload, RemoteRecord};
use c4sync_remote::{Reconciler, RemoteError, RemoteStore, ResourceKind, Scope, SyncError};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    LandscapeExists,
    VersionExists,
    List(ResourceKind),
    Delete(ResourceKind, String),
    CreateObject(String),
    UpdateObject(String),
    CreateConnection(String),
    CreateDiagram(String),
}

impl Call {
    fn is_delete(&self) -> bool {
        matches!(self, Call::Delete(..))
    }

    fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Delete(..)
                | Call::CreateObject(_)
                | Call::UpdateObject(_)
                | Call::CreateConnection(_)
                | Call::CreateDiagram(_)
        )
    }
}

/// In-memory store recording every call it receives.
struct FakeStore {
    landscape: bool,
    version: bool,
    fail_delete: Option<String>,
    records: Mutex<HashMap<ResourceKind, Vec<RemoteRecord>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeStore {
    fn new() -> Self {
        FakeStore {
            landscape: true,
            version: true,
            fail_delete: None,
            records: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_records(self, kind: ResourceKind, records: Vec<RemoteRecord>) -> Self {
        self.records.lock().unwrap().insert(kind, records);
        self
    }

    fn with_object(self, node: &Node, id: &str) -> Self {
        let payload = ObjectPayload::from_node(node);
        let record = RemoteRecord {
            id: id.to_string(),
            handle_id: Some(payload.handle_id),
            name: payload.name,
            description: payload.description,
            record_type: Some(payload.object_type),
            properties: payload.properties,
        };
        self.records
            .lock()
            .unwrap()
            .entry(ResourceKind::Objects)
            .or_default()
            .push(record);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn add(&self, kind: ResourceKind, handle: &str) -> String {
        let mut records = self.records.lock().unwrap();
        let list = records.entry(kind).or_default();
        let id = format!("{}-{}", kind.path().replace('/', "-"), list.len() + 1);
        list.push(RemoteRecord {
            id: id.clone(),
            handle_id: Some(handle.to_string()),
            ..RemoteRecord::default()
        });
        id
    }
}

fn ids(prefix: &str, n: usize) -> Vec<RemoteRecord> {
    (1..=n)
        .map(|i| RemoteRecord {
            id: format!("{prefix}{i}"),
            ..RemoteRecord::default()
        })
        .collect()
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn landscape_exists(&self, _landscape: &str) -> Result<bool, RemoteError> {
        self.record(Call::LandscapeExists);
        Ok(self.landscape)
    }

    async fn version_exists(&self, _scope: &Scope) -> Result<bool, RemoteError> {
        self.record(Call::VersionExists);
        Ok(self.version)
    }

    async fn list(&self, _scope: &Scope, kind: ResourceKind) -> Result<Vec<RemoteRecord>, RemoteError> {
        self.record(Call::List(kind));
        Ok(self.records.lock().unwrap().get(&kind).cloned().unwrap_or_default())
    }

    async fn delete(&self, _scope: &Scope, kind: ResourceKind, id: &str) -> Result<(), RemoteError> {
        self.record(Call::Delete(kind, id.to_string()));
        if self.fail_delete.as_deref() == Some(id) {
            return Err(RemoteError::Status {
                method: "DELETE".into(),
                url: format!("fake/{}/{}", kind.path(), id),
                status: 500,
                body: "boom".into(),
            });
        }
        if let Some(list) = self.records.lock().unwrap().get_mut(&kind) {
            list.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn create_object(&self, _scope: &Scope, object: &ObjectPayload) -> Result<String, RemoteError> {
        self.record(Call::CreateObject(object.handle_id.clone()));
        Ok(self.add(ResourceKind::Objects, &object.handle_id))
    }

    async fn update_object(&self, _scope: &Scope, id: &str, _object: &ObjectPayload) -> Result<(), RemoteError> {
        self.record(Call::UpdateObject(id.to_string()));
        Ok(())
    }

    async fn create_connection(
        &self,
        _scope: &Scope,
        connection: &ConnectionPayload,
    ) -> Result<String, RemoteError> {
        self.record(Call::CreateConnection(connection.handle_id.clone()));
        Ok(self.add(ResourceKind::Connections, &connection.handle_id))
    }

    async fn create_diagram(&self, _scope: &Scope, diagram: &DiagramPayload) -> Result<String, RemoteError> {
        self.record(Call::CreateDiagram(diagram.name.clone()));
        Ok(self.add(ResourceKind::Diagrams, &diagram.name))
    }
}

fn scope() -> Scope {
    Scope::new("land1", "ver1")
}

const DIAGRAM: &str = r#"
Person(user, "User")
System(app, "Application")
SystemDb(db, "Database")
Rel(user, app, "Uses")
Rel(app, db, "Reads")
"#;

#[tokio::test]
async fn wipe_deletes_each_kind_in_order_before_any_create() {
    let store = FakeStore::new()
        .with_records(ResourceKind::DiagramGroups, ids("g", 1))
        .with_records(ResourceKind::Diagrams, ids("d", 2))
        .with_records(ResourceKind::Objects, ids("o", 2))
        .with_records(ResourceKind::Connections, ids("c", 1));
    let graph = parse_diagram(DIAGRAM).graph;
    let options = SyncOptions {
        wipe: true,
        connections: true,
        diagram: true,
    };

    let report = Reconciler::new(&store, scope()).sync(&graph, &options).await.unwrap();

    let calls = store.calls();
    let deleted_kinds: Vec<ResourceKind> = calls
        .iter()
        .filter_map(|c| match c {
            Call::Delete(kind, _) => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        deleted_kinds,
        vec![
            ResourceKind::DiagramGroups,
            ResourceKind::Diagrams,
            ResourceKind::Diagrams,
            ResourceKind::Objects,
            ResourceKind::Objects,
            ResourceKind::Connections,
        ]
    );
    let last_delete = calls.iter().rposition(Call::is_delete).unwrap();
    let first_create = calls
        .iter()
        .position(|c| c.is_write() && !c.is_delete())
        .unwrap();
    assert!(last_delete < first_create);

    let wipe = report.wipe.unwrap();
    assert_eq!(wipe.total(), 6);
    assert_eq!(report.objects.created, 3);
    assert_eq!(report.connections.unwrap().created, 2);
    assert!(report.diagram.is_some());
}

#[tokio::test]
async fn without_wipe_nothing_is_deleted() {
    let store = FakeStore::new().with_records(ResourceKind::Objects, ids("o", 3));
    let graph = parse_diagram(DIAGRAM).graph;

    Reconciler::new(&store, scope())
        .sync(&graph, &SyncOptions::default())
        .await
        .unwrap();

    assert!(!store.calls().iter().any(Call::is_delete));
}

#[tokio::test]
async fn missing_landscape_stops_before_any_other_call() {
    let mut store = FakeStore::new();
    store.landscape = false;
    let graph = parse_diagram(DIAGRAM).graph;
    let options = SyncOptions {
        wipe: true,
        connections: true,
        diagram: true,
    };

    let err = Reconciler::new(&store, scope()).sync(&graph, &options).await.unwrap_err();

    assert!(matches!(err, SyncError::LandscapeNotFound(ref l) if l == "land1"));
    assert!(err.is_validation());
    assert_eq!(store.calls(), vec![Call::LandscapeExists]);
}

#[tokio::test]
async fn missing_version_stops_before_any_other_call() {
    let mut store = FakeStore::new();
    store.version = false;
    let parsed = parse_diagram(DIAGRAM);

    let err = Reconciler::new(&store, scope())
        .connect(&parsed.relations())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::VersionNotFound { .. }));
    assert_eq!(store.calls(), vec![Call::LandscapeExists, Call::VersionExists]);
}

#[tokio::test]
async fn one_unresolved_endpoint_blocks_the_whole_batch() {
    let store = FakeStore::new()
        .with_object(&Node::new("user", "User", NodeType::Actor), "o1")
        .with_object(&Node::new("app", "Application", NodeType::InternalSystem), "o2");
    // db is declared locally but missing remotely.
    let parsed = parse_diagram(DIAGRAM);

    let err = Reconciler::new(&store, scope())
        .connect(&parsed.relations())
        .await
        .unwrap_err();

    match err {
        SyncError::UnresolvedEndpoints(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].endpoint, "db");
            assert_eq!(list[0].edge, "edge.app.db.Reads");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!store.calls().iter().any(|c| matches!(c, Call::CreateConnection(_))));
}

#[tokio::test]
async fn connect_accepts_endpoints_declared_only_remotely() {
    let store = FakeStore::new()
        .with_object(&Node::new("web", "Web", NodeType::InternalSystem), "o1")
        .with_object(&Node::new("Billing API", "Billing", NodeType::ExternalSystem), "o2");
    let parsed = parse_diagram("Rel(web, Billing API, \"Charges\")\n");
    assert!(parsed.graph.edges().is_empty());

    let report = Reconciler::new(&store, scope())
        .connect(&parsed.relations())
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert!(store
        .calls()
        .contains(&Call::CreateConnection("edge.web.billing-api.Charges".into())));
}

#[tokio::test]
async fn existing_connections_are_not_recreated() {
    let store = FakeStore::new()
        .with_object(&Node::new("a", "A", NodeType::Actor), "o1")
        .with_object(&Node::new("b", "B", NodeType::InternalSystem), "o2")
        .with_records(
            ResourceKind::Connections,
            vec![RemoteRecord {
                id: "c1".into(),
                handle_id: Some("edge.a.b.Uses.fwd".into()),
                ..RemoteRecord::default()
            }],
        );
    let parsed = parse_diagram("Person(a, \"A\")\nSystem(b, \"B\")\nBiRel(a, b, \"Uses\")\n");

    let report = Reconciler::new(&store, scope())
        .connect(&parsed.relations())
        .await
        .unwrap();

    assert_eq!(report.existing, 1);
    assert_eq!(report.created, 1);
    assert_eq!(
        store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::CreateConnection(_)))
            .collect::<Vec<_>>(),
        vec![Call::CreateConnection("edge.b.a.Uses.rev".into())]
    );
}

#[tokio::test]
async fn unchanged_objects_are_skipped_and_changed_ones_updated() {
    let same = Node::new("app", "Application", NodeType::InternalSystem);
    let before = Node::new("db", "Database", NodeType::SystemWithPersistence);
    let after = before.clone().with_description("primary store");
    let store = FakeStore::new().with_object(&same, "o1").with_object(&before, "o2");

    let mut graph = Graph::new("g", DEFAULT_DIAGRAM_TYPE);
    graph.insert_node(same);
    graph.insert_node(after);
    graph.insert_node(Node::new("user", "User", NodeType::Actor));

    let report = Reconciler::new(&store, scope())
        .push_objects(graph.nodes(), false)
        .await
        .unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.ids.get("app").map(String::as_str), Some("o1"));
    let writes: Vec<Call> = store.calls().into_iter().filter(Call::is_write).collect();
    assert_eq!(
        writes,
        vec![Call::UpdateObject("o2".into()), Call::CreateObject("user".into())]
    );
}

#[tokio::test]
async fn failed_delete_aborts_the_wipe() {
    let mut store = FakeStore::new()
        .with_records(ResourceKind::Diagrams, ids("d", 3))
        .with_records(ResourceKind::Objects, ids("o", 1));
    store.fail_delete = Some("d2".into());
    let graph = parse_diagram(DIAGRAM).graph;
    let options = SyncOptions {
        wipe: true,
        ..SyncOptions::default()
    };

    let err = Reconciler::new(&store, scope()).sync(&graph, &options).await.unwrap_err();

    assert!(matches!(err, SyncError::Remote(RemoteError::Status { status: 500, .. })));
    let calls = store.calls();
    assert_eq!(calls.last(), Some(&Call::Delete(ResourceKind::Diagrams, "d2".into())));
    assert!(!calls.contains(&Call::List(ResourceKind::Objects)));
    assert!(!calls.iter().any(|c| matches!(c, Call::CreateObject(_))));
}

#[tokio::test]
async fn dry_run_reads_but_never_writes() {
    let store = FakeStore::new()
        .with_records(ResourceKind::Diagrams, ids("d", 1))
        .with_object(&Node::new("user", "Old name", NodeType::Actor), "o1");
    let graph = parse_diagram(DIAGRAM).graph;
    let options = SyncOptions {
        wipe: true,
        connections: true,
        diagram: true,
    };

    let report = Reconciler::new(&store, scope())
        .dry_run(true)
        .sync(&graph, &options)
        .await
        .unwrap();

    let calls = store.calls();
    assert!(!calls.iter().any(Call::is_write));
    assert!(calls.contains(&Call::List(ResourceKind::Connections)));
    assert_eq!(
        report.objects,
        ObjectReport {
            created: 2,
            updated: 1,
            unchanged: 0,
            ids: BTreeMap::from([
                ("app".to_string(), "app".to_string()),
                ("db".to_string(), "db".to_string()),
                ("user".to_string(), "o1".to_string()),
            ]),
        }
    );
    assert_eq!(report.connections.unwrap().created, 2);
    assert_eq!(report.diagram, None);
}

#[tokio::test]
async fn connection_of_another_relation_does_not_hide_a_new_one() {
    let store = FakeStore::new()
        .with_object(&Node::new("a", "A", NodeType::InternalSystem), "o1")
        .with_object(&Node::new("b-c", "BC", NodeType::InternalSystem), "o2")
        .with_records(
            ResourceKind::Connections,
            vec![RemoteRecord {
                id: "c1".into(),
                handle_id: Some("edge.a-b.c.x".into()),
                ..RemoteRecord::default()
            }],
        );
    let parsed = parse_diagram("Rel(a, b-c, \"x\")\n");

    let report = Reconciler::new(&store, scope())
        .connect(&parsed.relations())
        .await
        .unwrap();

    assert_eq!(report.existing, 0);
    assert_eq!(report.created, 1);
    assert!(store
        .calls()
        .contains(&Call::CreateConnection("edge.a.b-c.x".into())));
}
