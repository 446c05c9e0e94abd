//! Parser for the C4 system-context subset of the Mermaid notation.
//!
//! Recognized forms, one per line:
//!
//! ```text
//! Person(id, "Label", "Description")
//! System(id, "Label", "Description")
//! System_Ext(id, "Label", "Description")
//! SystemDb(id, "Label", "Description")
//! System_Boundary(id, "Label") {
//! }
//! Rel(from, to, "Label", "Description")
//! BiRel(from, to, "Label", "Description")
//! ```
//!
//! Descriptions are optional. Anything else is skipped and counted in the
//! [`ParseReport`]. Lines inside a boundary are ordinary top-level
//! declarations.

use std::path::Path;

use winnow::ascii::space0;
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::prelude::*;
use winnow::token::take_till;

use crate::source::{read_source, DIAGRAM_EXTENSIONS};
use crate::{Edge, Graph, Insert, Node, NodeType, Result, DEFAULT_DIAGRAM_NAME, DEFAULT_DIAGRAM_TYPE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugCollision {
    /// 1-based line of the rejected declaration.
    pub line: usize,
    pub id: String,
    pub existing: String,
    pub handle: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// 1-based numbers of lines that matched no recognized form.
    pub skipped_lines: Vec<usize>,
    pub slug_collisions: Vec<SlugCollision>,
    /// Relations dropped because an endpoint was never declared.
    pub unresolved_edges: Vec<Edge>,
}

impl ParseReport {
    pub fn skipped(&self) -> usize {
        self.skipped_lines.len()
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDiagram {
    pub graph: Graph,
    pub report: ParseReport,
}

impl ParsedDiagram {
    /// Every relation in the file, including those whose endpoints were not
    /// declared locally. Resolved relations come first.
    pub fn relations(&self) -> Vec<Edge> {
        self.graph
            .edges()
            .iter()
            .chain(&self.report.unresolved_edges)
            .cloned()
            .collect()
    }
}

/// Read and parse a `.mmd` file.
pub fn read_diagram(path: &Path) -> Result<ParsedDiagram> {
    let text = read_source(path, DIAGRAM_EXTENSIONS)?;
    Ok(parse_diagram(&text))
}

pub fn parse_diagram(text: &str) -> ParsedDiagram {
    parse_lines(text.lines())
}

/// Build a graph from notation lines. Never fails on content.
pub fn parse_lines<'a, I>(lines: I) -> ParsedDiagram
where
    I: IntoIterator<Item = &'a str>,
{
    let mut graph = Graph::new(DEFAULT_DIAGRAM_NAME, DEFAULT_DIAGRAM_TYPE);
    let mut report = ParseReport::default();

    for (index, raw) in lines.into_iter().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with("%%") {
            continue;
        }

        let mut rest = line;
        let stmt = match statement.parse_next(&mut rest) {
            Ok(stmt) => stmt,
            Err(_) => {
                tracing::debug!(line = line_no, text = line, "skipping unrecognized line");
                report.skipped_lines.push(line_no);
                continue;
            }
        };

        match stmt {
            Statement::Element {
                node_type,
                id,
                label,
                description,
            } => {
                let node = Node::new(id, label, node_type).with_description(description.unwrap_or_default());
                add_node(&mut graph, &mut report, node, line_no);
            }
            Statement::Boundary { id, label } => {
                add_node(&mut graph, &mut report, Node::new(id, label, NodeType::Boundary), line_no);
            }
            Statement::Relation {
                from,
                to,
                label,
                description,
                bidirectional,
            } => {
                let description = description.unwrap_or_default();
                if bidirectional {
                    let (mut forward, mut backward) = Edge::pair(&from, &to, label);
                    forward.description = description.clone();
                    backward.description = description;
                    add_edge(&mut graph, forward);
                    add_edge(&mut graph, backward);
                } else {
                    let mut edge = Edge::new(&from, &to, label);
                    edge.description = description;
                    add_edge(&mut graph, edge);
                }
            }
            Statement::CloseBoundary => {}
        }
    }

    report.unresolved_edges = graph.retain_resolved_edges();
    for edge in &report.unresolved_edges {
        tracing::warn!(
            from = %edge.from,
            to = %edge.to,
            label = %edge.label,
            "dropping relation with undeclared endpoint"
        );
    }

    ParsedDiagram { graph, report }
}

fn add_node(graph: &mut Graph, report: &mut ParseReport, node: Node, line: usize) {
    let id = node.id.clone();
    match graph.insert_node(node) {
        Insert::Added => {}
        Insert::Duplicate => {
            tracing::debug!(line, id = %id, "ignoring repeated declaration");
        }
        Insert::SlugCollision { handle, existing } => {
            tracing::warn!(line, id = %id, existing = %existing, handle = %handle, "identifier collides with an earlier declaration");
            report.slug_collisions.push(SlugCollision {
                line,
                id,
                existing,
                handle,
            });
        }
    }
}

fn add_edge(graph: &mut Graph, edge: Edge) {
    let handle = edge.handle.clone();
    if !graph.push_edge(edge) {
        tracing::debug!(handle = %handle, "ignoring repeated relation");
    }
}

// --- Grammar ---

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Element {
        node_type: NodeType,
        id: String,
        label: String,
        description: Option<String>,
    },
    Boundary {
        id: String,
        label: String,
    },
    Relation {
        from: String,
        to: String,
        label: String,
        description: Option<String>,
        bidirectional: bool,
    },
    CloseBoundary,
}

fn statement(input: &mut &str) -> winnow::Result<Statement> {
    alt((boundary, element, relation, close_boundary)).parse_next(input)
}

fn element(input: &mut &str) -> winnow::Result<Statement> {
    let node_type = alt((
        "Person(".value(NodeType::Actor),
        "System_Ext(".value(NodeType::ExternalSystem),
        "SystemDb(".value(NodeType::SystemWithPersistence),
        "System(".value(NodeType::InternalSystem),
    ))
    .parse_next(input)?;
    let id = identifier.parse_next(input)?;
    separator.parse_next(input)?;
    let label = quoted.parse_next(input)?;
    let description = opt(preceded(separator, quoted)).parse_next(input)?;
    closing.parse_next(input)?;
    Ok(Statement::Element {
        node_type,
        id,
        label,
        description,
    })
}

fn boundary(input: &mut &str) -> winnow::Result<Statement> {
    "System_Boundary(".parse_next(input)?;
    let id = identifier.parse_next(input)?;
    separator.parse_next(input)?;
    let label = quoted.parse_next(input)?;
    closing.parse_next(input)?;
    Ok(Statement::Boundary { id, label })
}

fn relation(input: &mut &str) -> winnow::Result<Statement> {
    let bidirectional = alt(("BiRel(".value(true), "Rel(".value(false))).parse_next(input)?;
    let from = identifier.parse_next(input)?;
    separator.parse_next(input)?;
    let to = identifier.parse_next(input)?;
    separator.parse_next(input)?;
    let label = quoted.parse_next(input)?;
    let description = opt(preceded(separator, quoted)).parse_next(input)?;
    closing.parse_next(input)?;
    Ok(Statement::Relation {
        from,
        to,
        label,
        description,
        bidirectional,
    })
}

fn close_boundary(input: &mut &str) -> winnow::Result<Statement> {
    '}'.value(Statement::CloseBoundary).parse_next(input)
}

fn identifier(input: &mut &str) -> winnow::Result<String> {
    take_till(1.., ',')
        .verify(|s: &str| !s.trim().is_empty())
        .map(|s: &str| s.trim().to_string())
        .parse_next(input)
}

fn quoted(input: &mut &str) -> winnow::Result<String> {
    delimited('"', take_till(1.., '"'), '"')
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

fn separator(input: &mut &str) -> winnow::Result<()> {
    (space0, ',', space0).void().parse_next(input)
}

fn closing(input: &mut &str) -> winnow::Result<()> {
    (space0, ')').void().parse_next(input)
}
