use std::fs;
use std::path::Path;

use anyhow::Context;

use c4sync_core::c4text::{read_diagram, ParseReport, ParsedDiagram};
use c4sync_core::descriptor::{read_descriptor_set, ExtractOptions, Extractor};
use c4sync_core::interchange::{schema, ObjectsDocument, TargetConfig};
use c4sync_core::rules::{Classifier, ClassifierRules};
use c4sync_core::settings::Settings;
use c4sync_remote::reconcile::{ConnectionReport, SyncReport};
use c4sync_remote::{check_collisions, HttpStore, Reconciler, Scope, SyncError, SyncOptions};

use crate::Command;

pub async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Command::Diagram {
            file,
            target,
            name,
            wipe,
            dry_run,
        } => {
            let scope = require_scope(&target.landscape, &target.version)?;
            settings.require_token()?;
            let parsed = load_diagram(&file)?;
            let mut graph = parsed.graph;
            if let Some(name) = name {
                graph.name = name;
            }

            let store = HttpStore::new(settings)?;
            let options = SyncOptions {
                wipe,
                connections: true,
                diagram: true,
            };
            let report = Reconciler::new(&store, scope)
                .dry_run(dry_run)
                .sync(&graph, &options)
                .await?;
            print_sync(&report);
        }
        Command::Connect {
            file,
            target,
            dry_run,
        } => {
            let scope = require_scope(&target.landscape, &target.version)?;
            settings.require_token()?;
            let parsed = load_diagram(&file)?;

            let store = HttpStore::new(settings)?;
            let report = Reconciler::new(&store, scope)
                .dry_run(dry_run)
                .connect(&parsed.relations())
                .await?;
            print_connections(&report);
        }
        Command::Extract {
            descriptors,
            output,
            target,
            wipe,
            speculative_prefix,
            exclude,
            rules,
        } => {
            let rules = match rules {
                Some(path) => ClassifierRules::load(&path)?,
                None => ClassifierRules::default(),
            };
            let mut options = ExtractOptions {
                speculative_prefix,
                ..ExtractOptions::default()
            };
            options.exclude_prefixes.extend(exclude);

            let files = read_descriptor_set(&descriptors)?;
            let graph = Extractor::new(Classifier::new(rules), options).extract(&files);
            let config = TargetConfig {
                landscape_id: target.landscape.unwrap_or_default(),
                version_id: target.version.unwrap_or_default(),
                wipe,
            };
            let doc = ObjectsDocument::from_graph(&graph, config);
            fs::write(&output, doc.to_json()?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {} objects to {}", doc.objects.len(), output.display());
        }
        Command::Upload {
            file,
            target,
            dry_run,
        } => {
            settings.require_token()?;
            let doc = ObjectsDocument::read(&file)?;
            let landscape = target.landscape.or_else(|| non_empty(&doc.config.landscape_id));
            let version = target.version.or_else(|| non_empty(&doc.config.version_id));
            let scope = require_scope(&landscape, &version)?;
            let graph = doc.to_graph();

            let store = HttpStore::new(settings)?;
            let options = SyncOptions {
                wipe: doc.config.wipe,
                ..SyncOptions::default()
            };
            let report = Reconciler::new(&store, scope)
                .dry_run(dry_run)
                .sync(&graph, &options)
                .await?;
            print_sync(&report);
        }
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&schema())?);
        }
    }
    Ok(())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn require_scope(landscape: &Option<String>, version: &Option<String>) -> Result<Scope, SyncError> {
    match (landscape.as_deref(), version.as_deref()) {
        (Some(l), Some(v)) if !l.is_empty() && !v.is_empty() => Ok(Scope::new(l, v)),
        (None, _) | (Some(""), _) => Err(SyncError::Config("landscape id is required (--landscape)".into())),
        _ => Err(SyncError::Config("version id is required (--version-id)".into())),
    }
}

fn load_diagram(path: &Path) -> anyhow::Result<ParsedDiagram> {
    let parsed = read_diagram(path)?;
    log_report(&parsed.report);
    check_collisions(&parsed.report)?;
    Ok(parsed)
}

fn log_report(report: &ParseReport) {
    if report.skipped() > 0 {
        tracing::info!(count = report.skipped(), lines = ?report.skipped_lines, "skipped unrecognized lines");
    }
    if !report.unresolved_edges.is_empty() {
        tracing::info!(count = report.unresolved_edges.len(), "relations reference undeclared elements");
    }
}

fn print_sync(report: &SyncReport) {
    if let Some(wipe) = &report.wipe {
        println!("Deleted {} resources", wipe.total());
    }
    let o = &report.objects;
    println!(
        "Objects: {} created, {} updated, {} unchanged",
        o.created, o.updated, o.unchanged
    );
    if let Some(c) = &report.connections {
        print_connections(c);
    }
    if let Some(id) = &report.diagram {
        println!("Diagram: {id}");
    }
}

fn print_connections(report: &ConnectionReport) {
    println!(
        "Connections: {} created, {} already present",
        report.created, report.existing
    );
}
