//! Path hierarchy built from a flat list of sitemap URLs.
//!
//! Nodes live in an arena and refer to each other by index. Children are
//! always pushed after their parent, so a parent's id is smaller than any of
//! its descendants' ids; the enrichment and counting passes rely on that.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TreeError;

pub type NodeId = usize;

pub const ROOT: NodeId = 0;

pub const MODULE_BINDING: &str = "sitemapData";

/// Deepest path accepted, in segments below the root. Artifacts are checked
/// against the same bound so whatever `build` accepts also loads back.
pub const MAX_DEPTH: usize = 256;

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub url: Option<String>,
    pub computed_url: Option<String>,
    pub children: Vec<NodeId>,
    pub direct: usize,
    pub total: usize,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            computed_url: None,
            children: Vec::new(),
            direct: 0,
            total: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedUrl {
    pub index: usize,
    pub url: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct BuildReport {
    pub accepted: usize,
    pub skipped: Vec<SkippedUrl>,
}

/// Serialized shape of a node. `parent` and view state never appear here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportNode>,
}

#[derive(Clone, Debug)]
pub struct SiteTree {
    nodes: Vec<Node>,
    parent: Vec<Option<NodeId>>,
}

impl SiteTree {
    /// The root is named after the first parseable URL. Later URLs overwrite
    /// earlier ones on the same node.
    pub fn build<S: AsRef<str>>(urls: &[S]) -> Result<(Self, BuildReport), TreeError> {
        if urls.is_empty() {
            return Err(TreeError::NoUrls);
        }

        let mut report = BuildReport::default();
        let mut parsed = Vec::with_capacity(urls.len());
        for (index, raw) in urls.iter().enumerate() {
            let raw = raw.as_ref();
            let reason = match Url::parse(raw) {
                Ok(url) if path_segments(&url).count() <= MAX_DEPTH => {
                    parsed.push((raw, url));
                    continue;
                }
                Ok(_) => format!("path deeper than {MAX_DEPTH} segments"),
                Err(err) => err.to_string(),
            };
            warn!(index, url = raw, reason = %reason, "skipping URL");
            report.skipped.push(SkippedUrl {
                index,
                url: raw.to_string(),
                reason,
            });
        }

        let Some((_, first)) = parsed.first() else {
            return Err(TreeError::NoData {
                skipped: report.skipped.len(),
            });
        };
        let root_name = origin_name(first);
        let mut nodes = vec![Node::new(&root_name)];

        for (raw, url) in &parsed {
            if origin_name(url) != root_name {
                warn!(url = *raw, root = %root_name, "URL origin differs from the tree root");
            }
            let mut current = ROOT;
            for segment in path_segments(url) {
                current = match find_child(&nodes, current, segment) {
                    Some(child) => child,
                    None => push_child(&mut nodes, current, segment),
                };
            }
            if let Some(previous) = nodes[current].url.replace(raw.to_string()) {
                debug!(previous = %previous, url = *raw, "later URL replaces earlier one");
            }
        }
        report.accepted = parsed.len();

        let tree = Self::from_nodes(nodes);
        info!(
            accepted = report.accepted,
            skipped = report.skipped.len(),
            nodes = tree.len(),
            "built sitemap tree"
        );
        Ok((tree, report))
    }

    /// Accepts a data module (`const sitemapData = {...};`) or bare JSON.
    pub fn from_artifact(text: &str) -> Result<Self, TreeError> {
        let body = strip_module_wrapper(text.trim());
        // Root object, then one array and one object per level below it.
        if json_nesting(body) > 2 * MAX_DEPTH + 1 {
            return Err(TreeError::Artifact(format!(
                "tree deeper than {MAX_DEPTH} levels"
            )));
        }
        let mut de = serde_json::Deserializer::from_str(body);
        de.disable_recursion_limit();
        let root = ExportNode::deserialize(&mut de)
            .and_then(|root| de.end().map(|()| root))
            .map_err(|err| TreeError::Artifact(err.to_string()))?;
        Ok(Self::from_export(root))
    }

    pub fn from_export(root: ExportNode) -> Self {
        let mut nodes = Vec::new();
        flatten_export(root, &mut nodes);
        Self::from_nodes(nodes)
    }

    fn from_nodes(mut nodes: Vec<Node>) -> Self {
        enrich_with_computed_urls(&mut nodes);
        count_descendants(&mut nodes);
        let parent = build_parent_map(&nodes);
        Self { nodes, parent }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> &Node {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent[id]
    }

    pub fn effective_url(&self, id: NodeId) -> &str {
        let node = &self.nodes[id];
        node.url
            .as_deref()
            .or(node.computed_url.as_deref())
            .unwrap_or(&node.name)
    }

    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent[current] {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.path_from_root(id).len() - 1
    }

    pub fn export(&self) -> ExportNode {
        self.export_node(ROOT)
    }

    fn export_node(&self, id: NodeId) -> ExportNode {
        let node = &self.nodes[id];
        ExportNode {
            name: node.name.clone(),
            url: node.url.clone(),
            computed_url: node.computed_url.clone(),
            children: node
                .children
                .iter()
                .map(|&child| self.export_node(child))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export())
    }

    pub fn to_module(&self) -> serde_json::Result<String> {
        Ok(format!("const {MODULE_BINDING} = {};", self.to_json()?))
    }
}

fn origin_name(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    }
}

fn path_segments(url: &Url) -> impl Iterator<Item = &str> {
    url.path().split('/').filter(|segment| !segment.is_empty())
}

fn find_child(nodes: &[Node], parent: NodeId, name: &str) -> Option<NodeId> {
    nodes[parent]
        .children
        .iter()
        .copied()
        .find(|&child| nodes[child].name == name)
}

fn push_child(nodes: &mut Vec<Node>, parent: NodeId, name: &str) -> NodeId {
    let id = nodes.len();
    nodes.push(Node::new(name));
    nodes[parent].children.push(id);
    id
}

fn flatten_export(export: ExportNode, nodes: &mut Vec<Node>) -> NodeId {
    let id = nodes.len();
    let mut node = Node::new(&export.name);
    node.url = export.url;
    nodes.push(node);
    for child in export.children {
        let child_id = flatten_export(child, nodes);
        nodes[id].children.push(child_id);
    }
    id
}

fn join_segment(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

fn enrich_with_computed_urls(nodes: &mut [Node]) {
    if nodes.is_empty() {
        return;
    }
    let mut chain = vec![String::new(); nodes.len()];
    chain[ROOT] = nodes[ROOT].name.clone();
    for id in 0..nodes.len() {
        for &child in &nodes[id].children {
            chain[child] = join_segment(&chain[id], &nodes[child].name);
        }
        let node = &mut nodes[id];
        node.computed_url = match node.url {
            Some(_) => None,
            None => Some(std::mem::take(&mut chain[id])),
        };
    }
}

fn count_descendants(nodes: &mut [Node]) {
    for id in (0..nodes.len()).rev() {
        let total: usize = nodes[id]
            .children
            .iter()
            .map(|&child| 1 + nodes[child].total)
            .sum();
        let node = &mut nodes[id];
        node.direct = node.children.len();
        node.total = total;
    }
}

fn build_parent_map(nodes: &[Node]) -> Vec<Option<NodeId>> {
    let mut parent = vec![None; nodes.len()];
    for (idx, node) in nodes.iter().enumerate() {
        for &child in &node.children {
            parent[child] = Some(idx);
        }
    }
    parent
}

/// Deepest bracket nesting outside string literals.
fn json_nesting(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut in_string = false;
    let mut escaped = false;
    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn strip_module_wrapper(text: &str) -> &str {
    let declaration = ["const ", "let ", "var "]
        .iter()
        .find_map(|keyword| text.strip_prefix(keyword));
    let Some(rest) = declaration else {
        return text;
    };
    let Some((_, value)) = rest.split_once('=') else {
        return text;
    };
    value.trim().trim_end_matches(';').trim_end()
}
