//! Export a discovered graph as DOT (Graphviz) or Mermaid flowchart text.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::str::FromStr;
use vpcmap_core::graph::{Edge, Graph, Node, NodeCategory};

/// Export format for graph visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Dot,
    Mermaid,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot" | "graphviz" => Ok(Self::Dot),
            "mermaid" | "mmd" => Ok(Self::Mermaid),
            other => Err(format!("unknown export format '{other}' (expected dot or mermaid)")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dot => "dot",
            Self::Mermaid => "mermaid",
        })
    }
}

fn dot_shape(category: NodeCategory) -> &'static str {
    match category {
        NodeCategory::Organization => "house",
        NodeCategory::Folder => "folder",
        NodeCategory::Project | NodeCategory::ExternalProject => "box",
        NodeCategory::Vpc | NodeCategory::ManagedVpc => "ellipse",
        NodeCategory::Subnet => "note",
        NodeCategory::Nat => "hexagon",
    }
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Write the graph in DOT syntax. Nodes of one level share a rank.
pub fn write_dot(graph: &Graph, out: &mut impl Write) -> fmt::Result {
    writeln!(out, "digraph \"organization_{}\" {{", graph.organization_id)?;
    writeln!(out, "  rankdir=TB;")?;
    writeln!(out, "  node [style=filled, fontsize=10];")?;
    writeln!(out)?;

    for node in &graph.nodes {
        let style = if node.category == NodeCategory::ExternalProject {
            "\"filled,dashed\""
        } else {
            "filled"
        };
        writeln!(
            out,
            "  \"{}\" [shape={}, style={}, fillcolor=\"{}\", label=\"{}\"];",
            dot_escape(&node.id),
            dot_shape(node.category),
            style,
            node.category.color(),
            dot_escape(&node.label)
        )?;
    }

    writeln!(out)?;
    for (level, ids) in levels(&graph.nodes) {
        let members: Vec<String> = ids.iter().map(|id| format!("\"{}\"", dot_escape(id))).collect();
        writeln!(out, "  {{ rank=same; {} }} // level {}", members.join("; "), level)?;
    }

    writeln!(out)?;
    for edge in &graph.edges {
        write_dot_edge(edge, out)?;
    }

    writeln!(out, "}}")
}

fn write_dot_edge(edge: &Edge, out: &mut impl Write) -> fmt::Result {
    let mut attrs = Vec::new();
    if let Some(style) = edge.style {
        if style.dashed {
            attrs.push("style=dashed".to_string());
        }
        // Relationship edges must not pull nodes out of their level.
        attrs.push("constraint=false".to_string());
    }
    if let Some(label) = &edge.label {
        attrs.push(format!("label=\"{}\"", dot_escape(label)));
    }
    if attrs.is_empty() {
        writeln!(
            out,
            "  \"{}\" -> \"{}\";",
            dot_escape(&edge.from),
            dot_escape(&edge.to)
        )
    } else {
        writeln!(
            out,
            "  \"{}\" -> \"{}\" [{}];",
            dot_escape(&edge.from),
            dot_escape(&edge.to),
            attrs.join(", ")
        )
    }
}

/// Node ids grouped by level, in level order.
fn levels(nodes: &[Node]) -> Vec<(u32, Vec<&str>)> {
    let mut grouped: std::collections::BTreeMap<u32, Vec<&str>> = std::collections::BTreeMap::new();
    for node in nodes {
        grouped.entry(node.level).or_default().push(&node.id);
    }
    grouped.into_iter().collect()
}

/// Export the graph as a DOT (Graphviz) string.
pub fn export_dot(graph: &Graph) -> String {
    let mut out = String::new();
    match write_dot(graph, &mut out) {
        Ok(()) => out,
        Err(fmt::Error) => String::new(),
    }
}

/// Positional Mermaid ids (`n0`, `n1`, …) in node order; the original id stays in the label.
///
/// Edge endpoints that are not nodes get ids after the last node so every endpoint is
/// declared once.
struct MermaidIds<'g> {
    index: HashMap<&'g str, usize>,
    unknown: Vec<&'g str>,
}

impl<'g> MermaidIds<'g> {
    fn new(graph: &'g Graph) -> Self {
        let mut index = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let next = index.len();
            index.entry(node.id.as_str()).or_insert(next);
        }
        let mut unknown = Vec::new();
        for edge in &graph.edges {
            for endpoint in [edge.from.as_str(), edge.to.as_str()] {
                if !index.contains_key(endpoint) {
                    index.insert(endpoint, index.len());
                    unknown.push(endpoint);
                }
            }
        }
        Self { index, unknown }
    }

    fn get(&self, id: &str) -> String {
        format!("n{}", self.index.get(id).copied().unwrap_or_default())
    }
}

fn mermaid_label(label: &str) -> String {
    label.replace('"', "#quot;").replace('\n', "<br/>")
}

/// Write the graph as a Mermaid flowchart.
pub fn write_mermaid(graph: &Graph, out: &mut impl Write) -> fmt::Result {
    writeln!(out, "flowchart TB")?;

    let mut categories: Vec<NodeCategory> = graph.nodes.iter().map(|n| n.category).collect();
    categories.sort();
    categories.dedup();
    for category in &categories {
        writeln!(
            out,
            "  classDef {} fill:{},stroke:#333;",
            category.as_str(),
            category.color()
        )?;
    }
    writeln!(out)?;

    let ids = MermaidIds::new(graph);
    for node in &graph.nodes {
        writeln!(
            out,
            "  {}[\"{}\"]:::{}",
            ids.get(&node.id),
            mermaid_label(&node.label),
            node.category.as_str()
        )?;
    }
    for id in &ids.unknown {
        writeln!(out, "  {}[\"{}\"]", ids.get(id), mermaid_label(id))?;
    }
    writeln!(out)?;

    for edge in &graph.edges {
        let src = ids.get(&edge.from);
        let tgt = ids.get(&edge.to);
        let arrow = if edge.style.is_some_and(|s| s.dashed) {
            "-.->"
        } else {
            "-->"
        };
        match &edge.label {
            Some(label) => writeln!(out, "  {src} {arrow}|{}| {tgt}", mermaid_label(label))?,
            None => writeln!(out, "  {src} {arrow} {tgt}")?,
        }
    }
    Ok(())
}

/// Export the graph as a Mermaid flowchart string.
pub fn export_mermaid(graph: &Graph) -> String {
    let mut out = String::new();
    match write_mermaid(graph, &mut out) {
        Ok(()) => out,
        Err(fmt::Error) => String::new(),
    }
}

/// Export the graph in the specified format.
pub fn export(graph: &Graph, format: ExportFormat) -> String {
    match format {
        ExportFormat::Dot => export_dot(graph),
        ExportFormat::Mermaid => export_mermaid(graph),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("DOT".parse::<ExportFormat>().unwrap(), ExportFormat::Dot);
        assert_eq!("mermaid".parse::<ExportFormat>().unwrap(), ExportFormat::Mermaid);
        assert!("svg".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_escaping() {
        assert_eq!(dot_escape("a\n\"b\""), "a\\n\\\"b\\\"");
        assert_eq!(mermaid_label("p1\nWeb"), "p1<br/>Web");
    }

    #[test]
    fn test_mermaid_ids_are_distinct_per_node() {
        let mut graph = Graph::new("100");
        graph.nodes = vec![
            Node::new("a-b_c", "a-b_c", 1, NodeCategory::Vpc),
            Node::new("a_b-c", "a_b-c", 1, NodeCategory::Vpc),
        ];
        graph.edges = vec![Edge::contains("a_b-c", "gone")];

        let ids = MermaidIds::new(&graph);
        assert_eq!(ids.get("a-b_c"), "n0");
        assert_eq!(ids.get("a_b-c"), "n1");
        assert_eq!(ids.get("gone"), "n2");
        assert_eq!(ids.unknown, vec!["gone"]);
    }
}
