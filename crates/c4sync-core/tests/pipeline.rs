use std::fs;

use pretty_assertions::assert_eq;

use c4sync_core::c4text::{parse_diagram, read_diagram};
use c4sync_core::descriptor::{parse_descriptor_set, ExtractOptions, Extractor};
use c4sync_core::diff::{content_eq, diff};
use c4sync_core::interchange::{ObjectsDocument, TargetConfig};
use c4sync_core::rules::{Classifier, ClassifierRules};
use c4sync_core::{Error, NodeType, Origin};

const CONTEXT: &str = r#"C4Context
title Payments platform

%% people
Person(customer, "Customer", "Buys things")
System_Boundary(core, "Core") {
  System(Web Shop, "Web shop", "Storefront")
  SystemDb(orders, "Orders DB")
}
System_Ext(psp, "Payment provider")
UpdateLayoutConfig($c4ShapeInRow="3")
Rel(customer, Web Shop, "Browses", "HTTPS")
BiRel(Web Shop, psp, "Pays")
Rel(Web Shop, orders, "Stores")
Rel(Web Shop, ledger, "Posts")
"#;

#[test]
fn parsing_is_deterministic() {
    let a = parse_diagram(CONTEXT);
    let b = parse_diagram(CONTEXT);
    assert_eq!(a.graph, b.graph);
    assert_eq!(a.report, b.report);
}

#[test]
fn context_diagram_parses_leniently() {
    let parsed = parse_diagram(CONTEXT);

    let ids: Vec<&str> = parsed.graph.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["customer", "core", "Web Shop", "orders", "psp"]);

    let handles: Vec<&str> = parsed.graph.edges().iter().map(|e| e.handle.as_str()).collect();
    assert_eq!(
        handles,
        vec![
            "edge.customer.web-shop.Browses",
            "edge.web-shop.psp.Pays.fwd",
            "edge.psp.web-shop.Pays.rev",
            "edge.web-shop.orders.Stores",
        ]
    );

    // C4Context, title and UpdateLayoutConfig
    assert_eq!(parsed.report.skipped_lines, vec![1, 2, 11]);
    assert_eq!(parsed.report.unresolved_edges.len(), 1);
    assert_eq!(parsed.report.unresolved_edges[0].to, "ledger");
    assert_eq!(parsed.relations().len(), 5);
}

#[test]
fn reading_a_diagram_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("context.mmd");
    fs::write(&path, CONTEXT).unwrap();
    let parsed = read_diagram(&path).unwrap();
    assert_eq!(parsed.graph.nodes().len(), 5);

    let missing = read_diagram(&dir.path().join("missing.mmd")).unwrap_err();
    assert!(matches!(missing, Error::Read { .. }));
    assert!(missing.is_input());
}

const DESCRIPTORS: &str = r#"{
  "file": [
    {
      "name": "google/protobuf/empty.proto",
      "package": "google.protobuf"
    },
    {
      "name": "shop/orders.proto",
      "package": "shop",
      "service": [{"name": "OrderService"}, {"name": "InventoryDatabaseService"}],
      "sourceCodeInfo": {
        "location": [
          {"path": [6, 0], "leadingComments": " Handles orders.\n"},
          {"path": [6, 1, 2, 0], "leadingComments": " method comment\n"}
        ]
      }
    },
    {
      "name": "design/fraud.proto",
      "package": "risk",
      "service": [{"name": "FraudCheck"}],
      "sourceCodeInfo": {
        "location": [{"path": [6, 0], "leadingComments": " Calls an external scoring API.\n"}]
      }
    }
  ]
}"#;

#[test]
fn descriptors_extract_to_an_objects_document_and_back() {
    let files = parse_descriptor_set(DESCRIPTORS).unwrap();
    let extractor = Extractor::new(
        Classifier::default(),
        ExtractOptions {
            speculative_prefix: Some("design/".into()),
            ..ExtractOptions::default()
        },
    );
    let graph = extractor.extract(&files);

    let summary: Vec<(&str, NodeType, Origin)> = graph
        .nodes()
        .iter()
        .map(|n| (n.id.as_str(), n.node_type, n.origin))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("boundary-shop", NodeType::Boundary, Origin::Primary),
            ("service-OrderService", NodeType::InternalSystem, Origin::Primary),
            (
                "service-InventoryDatabaseService",
                NodeType::SystemWithPersistence,
                Origin::Primary
            ),
            ("boundary-risk", NodeType::Boundary, Origin::Speculative),
            ("service-FraudCheck", NodeType::ExternalSystem, Origin::Speculative),
        ]
    );
    assert_eq!(graph.nodes()[1].description, "Handles orders.");

    let config = TargetConfig {
        landscape_id: "land1".into(),
        version_id: "ver1".into(),
        wipe: true,
    };
    let doc = ObjectsDocument::from_graph(&graph, config.clone());
    let reread = ObjectsDocument::parse(&doc.to_json().unwrap()).unwrap();
    assert_eq!(reread.config, config);

    let uploaded = reread.to_graph();
    assert_eq!(uploaded.nodes().len(), graph.nodes().len());
    for (a, b) in uploaded.nodes().iter().zip(graph.nodes()) {
        assert!(diff(Some(a), Some(b)).is_empty(), "{} changed", a.id);
        assert!(content_eq(a, b));
        assert_eq!(a.origin, b.origin);
    }
}

#[test]
fn re_extraction_is_byte_identical() {
    let files = parse_descriptor_set(DESCRIPTORS).unwrap();
    let extractor = Extractor::new(Classifier::default(), ExtractOptions::default());
    let first = ObjectsDocument::from_graph(&extractor.extract(&files), TargetConfig::default());
    let second = ObjectsDocument::from_graph(&extractor.extract(&files), TargetConfig::default());
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn custom_rules_change_classification() {
    let rules: ClassifierRules = serde_json::from_str(r#"{"nameExternalPatterns": ["Order"]}"#).unwrap();
    let files = parse_descriptor_set(DESCRIPTORS).unwrap();
    let graph = Extractor::new(Classifier::new(rules), ExtractOptions::default()).extract(&files);
    let order = graph.node("service-OrderService").unwrap();
    assert_eq!(order.node_type, NodeType::ExternalSystem);
}
