//! Directed graph of file/tag/link nodes capturing document relationships.
//!
//! Nodes are keyed by a namespaced id (`file:<path>`, `tag:<name>`,
//! `link:<target>`); edges are keyed `<from>=><to>:<kind>` and carry an
//! integer weight incremented on repeated observation of the same
//! relationship. Removing a file node removes all edges incident to it;
//! tag/link nodes are retained so removal stays proportional to that
//! file's edges rather than the whole graph.
//!
//! Graph content comes from simple pattern extraction over markdown:
//! `[[wiki links]]` and `#tags`.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Tag,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// Relationship kind: `"link"` or `"tag"`.
    pub kind: String,
    pub weight: u32,
}

/// An edge in a [`GraphPreview`], weights summed across relationship kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewEdge {
    pub from: String,
    pub to: String,
    pub weight: u32,
}

/// Bounded 2-hop subgraph for UI-facing visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPreview {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<PreviewEdge>,
}

#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

/// The graph index.
///
/// `incident` maps node id -> keys of edges touching it, so file
/// removal and traversal never scan the whole edge set. It is derived
/// state, rebuilt when a snapshot is restored.
#[derive(Debug, Default)]
pub struct GraphIndex {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<String, GraphEdge>,
    incident: HashMap<String, HashSet<String>>,
}

/// Node id for a file path.
pub fn file_id(path: &str) -> String {
    format!("file:{path}")
}

fn edge_key(from: &str, to: &str, kind: &str) -> String {
    format!("{from}=>{to}:{kind}")
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.nodes.contains_key(&file_id(path))
    }

    pub fn edge_weight(&self, from: &str, to: &str, kind: &str) -> Option<u32> {
        self.edges.get(&edge_key(from, to, kind)).map(|e| e.weight)
    }

    /// Extract wiki links and tags from a markdown document and merge
    /// them into the graph. Repeated observation of a relationship
    /// increments the existing edge's weight instead of duplicating it.
    pub fn upsert_markdown_document(&mut self, path: &str, content: &str) {
        let from = file_id(path);
        self.ensure_node(&from, NodeKind::File, path);

        for target in extract_wiki_links(content) {
            let to = format!("link:{target}");
            self.ensure_node(&to, NodeKind::Link, &target);
            self.merge_edge(&from, &to, "link");
        }
        for tag in extract_tags(content) {
            let to = format!("tag:{tag}");
            self.ensure_node(&to, NodeKind::Tag, &tag);
            self.merge_edge(&from, &to, "tag");
        }
    }

    /// Remove a file node and every edge incident to it.
    ///
    /// Tag and link nodes stay behind even when orphaned. Returns
    /// whether the file node existed.
    pub fn remove_file(&mut self, path: &str) -> bool {
        let id = file_id(path);
        if self.nodes.remove(&id).is_none() {
            return false;
        }
        if let Some(keys) = self.incident.remove(&id) {
            for key in keys {
                if let Some(edge) = self.edges.remove(&key) {
                    let other = if edge.from == id { &edge.to } else { &edge.from };
                    if let Some(set) = self.incident.get_mut(other) {
                        set.remove(&key);
                    }
                }
            }
        }
        true
    }

    /// Breadth-first traversal outward from a file node, up to
    /// `max_hops`, returning only file paths reached (start excluded).
    pub fn related_file_paths(&self, path: &str, max_hops: usize) -> Vec<String> {
        let start = file_id(path);
        if !self.nodes.contains_key(&start) || max_hops == 0 {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(&start);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        queue.push_back((&start, 0));
        let mut found = Vec::new();

        while let Some((node, hops)) = queue.pop_front() {
            if hops == max_hops {
                continue;
            }
            for neighbor in self.neighbors(node) {
                if visited.insert(neighbor) {
                    if let Some(n) = self.nodes.get(neighbor) {
                        if n.kind == NodeKind::File {
                            found.push(n.label.clone());
                        }
                    }
                    queue.push_back((neighbor, hops + 1));
                }
            }
        }

        found
    }

    /// Build a bounded 2-hop subgraph around a file for visualization.
    ///
    /// First-hop neighbors are added before second-hop neighbors, capped
    /// at `max_nodes` total (including the start node). Edge weights are
    /// summed across relationship kinds. Read-only.
    pub fn preview(&self, path: &str, max_nodes: usize) -> GraphPreview {
        let start = file_id(path);
        let Some(start_node) = self.nodes.get(&start) else {
            return GraphPreview {
                nodes: Vec::new(),
                edges: Vec::new(),
            };
        };
        if max_nodes == 0 {
            return GraphPreview {
                nodes: Vec::new(),
                edges: Vec::new(),
            };
        }

        let mut included: Vec<&GraphNode> = vec![start_node];
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(&start);

        let mut first_hop: Vec<&str> = self.neighbors(&start).collect();
        first_hop.sort_unstable();
        let mut frontier = Vec::new();
        for id in first_hop {
            if included.len() >= max_nodes {
                break;
            }
            if seen.insert(id) {
                if let Some(n) = self.nodes.get(id) {
                    included.push(n);
                    frontier.push(id);
                }
            }
        }

        'outer: for hop_node in frontier {
            let mut second: Vec<&str> = self.neighbors(hop_node).collect();
            second.sort_unstable();
            for id in second {
                if included.len() >= max_nodes {
                    break 'outer;
                }
                if seen.insert(id) {
                    if let Some(n) = self.nodes.get(id) {
                        included.push(n);
                    }
                }
            }
        }

        // Edges between included nodes, weights summed across kinds.
        let mut weights: HashMap<(String, String), u32> = HashMap::new();
        for edge in self.edges.values() {
            if seen.contains(edge.from.as_str()) && seen.contains(edge.to.as_str()) {
                *weights
                    .entry((edge.from.clone(), edge.to.clone()))
                    .or_insert(0) += edge.weight;
            }
        }
        let mut edges: Vec<PreviewEdge> = weights
            .into_iter()
            .map(|((from, to), weight)| PreviewEdge { from, to, weight })
            .collect();
        edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

        GraphPreview {
            nodes: included.into_iter().cloned().collect(),
            edges,
        }
    }

    /// Serialize nodes and edges to a portable JSON snapshot.
    pub fn to_snapshot(&self) -> Result<String, EngineError> {
        let mut nodes: Vec<GraphNode> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<GraphEdge> = self.edges.values().cloned().collect();
        edges.sort_by(|a, b| edge_key(&a.from, &a.to, &a.kind).cmp(&edge_key(&b.from, &b.to, &b.kind)));

        serde_json::to_string(&GraphSnapshot { nodes, edges })
            .map_err(|e| EngineError::Persistence(format!("graph snapshot encode: {e}")))
    }

    /// Restore a graph from a snapshot, rebuilding incident sets.
    pub fn from_snapshot(snapshot: &str) -> Result<Self, EngineError> {
        let snap: GraphSnapshot = serde_json::from_str(snapshot)
            .map_err(|e| EngineError::Persistence(format!("graph snapshot decode: {e}")))?;

        let mut graph = GraphIndex::new();
        for node in snap.nodes {
            graph.nodes.insert(node.id.clone(), node);
        }
        for edge in snap.edges {
            let key = edge_key(&edge.from, &edge.to, &edge.kind);
            graph
                .incident
                .entry(edge.from.clone())
                .or_default()
                .insert(key.clone());
            graph
                .incident
                .entry(edge.to.clone())
                .or_default()
                .insert(key.clone());
            graph.edges.insert(key, edge);
        }
        Ok(graph)
    }

    fn ensure_node(&mut self, id: &str, kind: NodeKind, label: &str) {
        self.nodes.entry(id.to_string()).or_insert_with(|| GraphNode {
            id: id.to_string(),
            kind,
            label: label.to_string(),
        });
    }

    fn merge_edge(&mut self, from: &str, to: &str, kind: &str) {
        let key = edge_key(from, to, kind);
        if let Some(edge) = self.edges.get_mut(&key) {
            edge.weight += 1;
            return;
        }
        self.edges.insert(
            key.clone(),
            GraphEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: kind.to_string(),
                weight: 1,
            },
        );
        self.incident
            .entry(from.to_string())
            .or_default()
            .insert(key.clone());
        self.incident.entry(to.to_string()).or_default().insert(key);
    }

    /// Neighbors across both edge directions.
    fn neighbors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.incident
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |key| {
                let edge = self.edges.get(key)?;
                if edge.from == id {
                    Some(edge.to.as_str())
                } else {
                    Some(edge.from.as_str())
                }
            })
    }
}

/// Extract `[[wiki link]]` targets. Aliases (`[[target|alias]]`) and
/// heading anchors (`[[target#section]]`) resolve to the bare target.
pub fn extract_wiki_links(content: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = content;
    while let Some(open) = rest.find("[[") {
        rest = &rest[open + 2..];
        let Some(close) = rest.find("]]") else { break };
        let inner = &rest[..close];
        rest = &rest[close + 2..];
        let target = inner
            .split('|')
            .next()
            .unwrap_or("")
            .split('#')
            .next()
            .unwrap_or("")
            .trim();
        if !target.is_empty() {
            links.push(target.to_string());
        }
    }
    links
}

/// Extract `#tag` occurrences. A tag starts at the beginning of the
/// text or after whitespace and runs over alphanumerics, `-`, `_`, and
/// `/` (nested tags). Markdown headings (`# Title`) are not tags.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() {
                let c = bytes[end] as char;
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/' {
                    end += 1;
                } else {
                    break;
                }
            }
            if end > start {
                tags.push(content[start..end].to_string());
            }
            i = end;
        } else {
            i += 1;
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_links_and_tags() {
        let content = "See [[Other Note]] and [[target|alias]] plus [[page#section]].\n\
                       Tagged #rust and #projects/engine.\n# Heading is not a tag";
        assert_eq!(
            extract_wiki_links(content),
            vec!["Other Note", "target", "page"]
        );
        assert_eq!(extract_tags(content), vec!["rust", "projects/engine"]);
    }

    #[test]
    fn repeated_upsert_increments_weight_without_duplicating() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "link to [[B]]");
        graph.upsert_markdown_document("a.md", "link to [[B]]");

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_weight("file:a.md", "link:B", "link"), Some(2));
    }

    #[test]
    fn duplicate_link_in_one_document_accumulates() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "[[B]] then again [[B]]");
        assert_eq!(graph.edge_weight("file:a.md", "link:B", "link"), Some(2));
    }

    #[test]
    fn remove_file_drops_incident_edges_keeps_tag_nodes() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "#shared and [[B]]");
        graph.upsert_markdown_document("b.md", "#shared");

        assert!(graph.remove_file("a.md"));
        assert!(!graph.contains_file("a.md"));
        assert_eq!(graph.edge_weight("file:a.md", "tag:shared", "tag"), None);
        assert_eq!(graph.edge_weight("file:a.md", "link:B", "link"), None);
        // Shared tag node and b.md's edge survive.
        assert_eq!(graph.edge_weight("file:b.md", "tag:shared", "tag"), Some(1));
        assert!(graph.nodes.contains_key("tag:shared"));
        assert!(graph.nodes.contains_key("link:B"));
        assert!(!graph.remove_file("a.md"));
    }

    #[test]
    fn related_files_reached_through_shared_tag() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "#topic");
        graph.upsert_markdown_document("b.md", "#topic");
        graph.upsert_markdown_document("c.md", "#other");

        // One hop only reaches the tag node, no files.
        assert!(graph.related_file_paths("a.md", 1).is_empty());

        let related = graph.related_file_paths("a.md", 2);
        assert_eq!(related, vec!["b.md"]);
    }

    #[test]
    fn traversal_excludes_start_and_respects_hops() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "#t1");
        graph.upsert_markdown_document("b.md", "#t1 #t2");
        graph.upsert_markdown_document("c.md", "#t2");

        let two_hops = graph.related_file_paths("a.md", 2);
        assert_eq!(two_hops, vec!["b.md"]);

        let four_hops = graph.related_file_paths("a.md", 4);
        assert!(four_hops.contains(&"b.md".to_string()));
        assert!(four_hops.contains(&"c.md".to_string()));
        assert!(!four_hops.contains(&"a.md".to_string()));
    }

    #[test]
    fn preview_caps_nodes_and_sums_weights() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "[[B]] [[B]] #b");
        // Link and tag both named "B"/"b" stay distinct nodes; add more
        // neighbors to exercise the cap.
        graph.upsert_markdown_document("a.md", "[[C]] [[D]] [[E]]");

        let full = graph.preview("a.md", 50);
        assert!(full.nodes.len() >= 5);

        let capped = graph.preview("a.md", 3);
        assert_eq!(capped.nodes.len(), 3);
        assert_eq!(capped.nodes[0].id, "file:a.md");

        // Weight for a.md -> link:B summed across the two observations.
        let b_edge = full
            .edges
            .iter()
            .find(|e| e.from == "file:a.md" && e.to == "link:B")
            .unwrap();
        assert_eq!(b_edge.weight, 2);
    }

    #[test]
    fn preview_of_unknown_file_is_empty() {
        let graph = GraphIndex::new();
        let preview = graph.preview("missing.md", 10);
        assert!(preview.nodes.is_empty());
        assert!(preview.edges.is_empty());
    }

    #[test]
    fn snapshot_roundtrip_preserves_structure_and_traversal() {
        let mut graph = GraphIndex::new();
        graph.upsert_markdown_document("a.md", "#topic [[B]]");
        graph.upsert_markdown_document("b.md", "#topic");
        graph.upsert_markdown_document("a.md", "#topic [[B]]");

        let snapshot = graph.to_snapshot().unwrap();
        let restored = GraphIndex::from_snapshot(&snapshot).unwrap();

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
        assert_eq!(
            restored.edge_weight("file:a.md", "tag:topic", "tag"),
            Some(2)
        );
        assert_eq!(
            restored.related_file_paths("a.md", 2),
            graph.related_file_paths("a.md", 2)
        );
    }

    #[test]
    fn corrupt_snapshot_is_persistence_error() {
        let err = GraphIndex::from_snapshot("{").unwrap_err();
        assert_eq!(err.code(), "persistence");
    }
}
