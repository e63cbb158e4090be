//! Browsing state over a [`SiteTree`]. The tree itself is never mutated here.

use std::str::FromStr;

use tracing::debug;
use url::Url;

use crate::tree::{NodeId, ROOT, SiteTree};

/// Sticky per-node choice. `Unset` falls back to the depth default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollapseState {
    #[default]
    Unset,
    Expanded,
    Collapsed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewKind {
    #[default]
    Tree,
    Sunburst,
}

impl ViewKind {
    pub fn label(self) -> &'static str {
        match self {
            ViewKind::Tree => "tree",
            ViewKind::Sunburst => "sunburst",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ViewKind::Tree => ViewKind::Sunburst,
            ViewKind::Sunburst => ViewKind::Tree,
        }
    }

    pub fn supports_back_to_parent(self) -> bool {
        matches!(self, ViewKind::Tree)
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "tree" => Ok(ViewKind::Tree),
            "sunburst" => Ok(ViewKind::Sunburst),
            other => Err(format!("unknown view type: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    Click,
    BackToParent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleNode {
    pub id: NodeId,
    pub depth: usize,
}

#[derive(Clone, Debug)]
pub struct ViewState {
    current_root: NodeId,
    selected: Option<NodeId>,
    kind: ViewKind,
    collapse: Vec<CollapseState>,
    open: Vec<bool>,
}

impl ViewState {
    pub fn new(tree: &SiteTree, kind: ViewKind) -> Self {
        let mut view = Self {
            current_root: ROOT,
            selected: None,
            kind,
            collapse: vec![CollapseState::Unset; tree.len()],
            open: vec![false; tree.len()],
        };
        view.apply_default_collapse(tree);
        view
    }

    pub fn current_root(&self) -> NodeId {
        self.current_root
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn collapse_state(&self, id: NodeId) -> CollapseState {
        self.collapse[id]
    }

    /// The current root always shows its children; below it only explicitly
    /// expanded nodes do.
    pub fn apply_default_collapse(&mut self, tree: &SiteTree) {
        self.open[self.current_root] = true;
        let mut stack: Vec<NodeId> = tree.children(self.current_root).to_vec();
        while let Some(id) = stack.pop() {
            self.open[id] = self.collapse[id] == CollapseState::Expanded;
            stack.extend_from_slice(tree.children(id));
        }
    }

    pub fn view_children<'t>(&self, tree: &'t SiteTree, id: NodeId) -> &'t [NodeId] {
        if self.open[id] { tree.children(id) } else { &[] }
    }

    pub fn hidden_children<'t>(&self, tree: &'t SiteTree, id: NodeId) -> &'t [NodeId] {
        if self.open[id] { &[] } else { tree.children(id) }
    }

    /// Returns `false` for leaves.
    pub fn toggle_node(&mut self, tree: &SiteTree, id: NodeId) -> bool {
        if tree.node(id).direct == 0 {
            return false;
        }
        if self.open[id] {
            self.open[id] = false;
            self.collapse[id] = CollapseState::Collapsed;
        } else {
            self.open[id] = true;
            self.collapse[id] = CollapseState::Expanded;
        }
        debug!(node = id, state = ?self.collapse[id], "toggled node");
        true
    }

    pub fn select(&mut self, id: NodeId) {
        self.selected = Some(id);
    }

    pub fn set_root(&mut self, tree: &SiteTree, id: NodeId) -> bool {
        if id == self.current_root {
            return false;
        }
        debug!(from = self.current_root, to = id, "set root");
        self.move_root(tree, id);
        true
    }

    pub fn go_to_parent(&mut self, tree: &SiteTree) -> bool {
        let Some(parent) = tree.parent(self.current_root) else {
            return false;
        };
        debug!(from = self.current_root, to = parent, "go to parent");
        self.move_root(tree, parent);
        true
    }

    pub fn reset_root(&mut self, tree: &SiteTree) {
        debug!(from = self.current_root, "reset root");
        self.move_root(tree, ROOT);
    }

    pub fn set_kind(&mut self, tree: &SiteTree, kind: ViewKind) {
        self.kind = kind;
        self.apply_default_collapse(tree);
    }

    fn move_root(&mut self, tree: &SiteTree, id: NodeId) {
        self.current_root = id;
        self.selected = None;
        self.apply_default_collapse(tree);
    }

    /// Returns whether state changed.
    pub fn dispatch(&mut self, tree: &SiteTree, event: NodeEvent, id: NodeId) -> bool {
        match event {
            NodeEvent::BackToParent => {
                if !self.kind.supports_back_to_parent() || id != self.current_root {
                    return false;
                }
                self.go_to_parent(tree)
            }
            NodeEvent::Click => {
                if id == self.current_root {
                    return false;
                }
                self.select(id);
                self.toggle_node(tree, id);
                true
            }
        }
    }

    pub fn visible_nodes(&self, tree: &SiteTree) -> Vec<VisibleNode> {
        let mut out = Vec::new();
        self.walk_visible(tree, self.current_root, 0, &mut out);
        out
    }

    fn walk_visible(&self, tree: &SiteTree, id: NodeId, depth: usize, out: &mut Vec<VisibleNode>) {
        out.push(VisibleNode { id, depth });
        for &child in self.view_children(tree, id) {
            self.walk_visible(tree, child, depth + 1, out);
        }
    }

    pub fn node_count(&self, tree: &SiteTree) -> usize {
        tree.node(self.current_root).total + 1
    }
}

/// The displayed root shows its URL path instead of its segment name.
pub fn node_label(tree: &SiteTree, id: NodeId, is_view_root: bool) -> String {
    let node = tree.node(id);
    let mut label = node.name.clone();
    if is_view_root {
        if let Ok(url) = Url::parse(tree.effective_url(id)) {
            label = match url.path() {
                path if path.starts_with('/') => path.to_string(),
                path => format!("/{path}"),
            };
        }
    }
    if node.direct > 0 {
        format!("{label} ({}/{})", node.direct, node.total)
    } else {
        label
    }
}

pub fn selection_label(raw: &str) -> String {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            debug!(url = raw, error = %err, "selection label falls back to raw URL");
            return raw.to_string();
        }
    };
    let mut label = url.path().to_string();
    if let Some(query) = url.query() {
        label.push('?');
        label.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        label.push('#');
        label.push_str(fragment);
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    // root
    // ├── a (1)
    // │   ├── b (2)
    // │   │   └── c (3)
    // │   └── d (4)
    // └── e (5)
    fn sample_tree() -> SiteTree {
        SiteTree::build(&[
            "https://a.com/a/b/c",
            "https://a.com/a/d",
            "https://a.com/e",
        ])
        .expect("tree should build")
        .0
    }

    fn ids(rows: &[VisibleNode]) -> Vec<NodeId> {
        rows.iter().map(|row| row.id).collect()
    }

    #[test]
    fn default_collapse_hides_grandchildren() {
        let tree = sample_tree();
        let view = ViewState::new(&tree, ViewKind::Tree);

        assert_eq!(ids(&view.visible_nodes(&tree)), vec![ROOT, 1, 5]);
        assert_eq!(view.view_children(&tree, ROOT), &[1, 5]);
        assert!(view.view_children(&tree, 1).is_empty());
        assert_eq!(view.hidden_children(&tree, 1), &[2, 4]);
        assert_eq!(view.collapse_state(1), CollapseState::Unset);
    }

    #[test]
    fn only_one_of_view_and_hidden_children_is_filled() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.toggle_node(&tree, 1);

        for id in 0..tree.len() {
            let shown = view.view_children(&tree, id);
            let hidden = view.hidden_children(&tree, id);
            assert!(shown.is_empty() || hidden.is_empty());
            assert_eq!(shown.len() + hidden.len(), tree.node(id).direct);
        }
    }

    #[test]
    fn toggle_twice_restores_visibility_with_sticky_label() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        let before = view.visible_nodes(&tree);

        assert!(view.toggle_node(&tree, 1));
        assert_eq!(view.collapse_state(1), CollapseState::Expanded);
        assert_eq!(ids(&view.visible_nodes(&tree)), vec![ROOT, 1, 2, 4, 5]);

        assert!(view.toggle_node(&tree, 1));
        assert_eq!(view.collapse_state(1), CollapseState::Collapsed);
        assert_eq!(view.visible_nodes(&tree), before);
    }

    #[test]
    fn toggle_on_leaf_is_noop() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);

        assert!(!view.toggle_node(&tree, 5));
        assert_eq!(view.collapse_state(5), CollapseState::Unset);
    }

    #[test]
    fn expanded_state_survives_root_changes() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.toggle_node(&tree, 1);
        view.toggle_node(&tree, 2);

        view.set_root(&tree, 1);
        view.reset_root(&tree);

        assert_eq!(ids(&view.visible_nodes(&tree)), vec![ROOT, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn collapsed_root_child_stays_hidden_after_navigation() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.set_root(&tree, 1);
        assert_eq!(ids(&view.visible_nodes(&tree)), vec![1, 2, 4]);

        view.toggle_node(&tree, 2);
        view.toggle_node(&tree, 2);
        view.go_to_parent(&tree);
        view.set_root(&tree, 1);

        assert_eq!(ids(&view.visible_nodes(&tree)), vec![1, 2, 4]);
        assert_eq!(view.collapse_state(2), CollapseState::Collapsed);
    }

    #[test]
    fn former_root_collapses_when_it_becomes_a_child() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.set_root(&tree, 1);
        assert!(view.go_to_parent(&tree));

        assert_eq!(ids(&view.visible_nodes(&tree)), vec![ROOT, 1, 5]);
    }

    #[test]
    fn set_root_then_parent_restores_root() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);

        assert!(view.set_root(&tree, 1));
        assert_eq!(view.current_root(), 1);
        assert!(view.go_to_parent(&tree));
        assert_eq!(view.current_root(), ROOT);
    }

    #[test]
    fn set_root_to_current_root_is_rejected() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.select(1);

        assert!(!view.set_root(&tree, ROOT));
        assert_eq!(view.selected(), Some(1));
    }

    #[test]
    fn root_changes_clear_selection() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);

        view.select(2);
        view.set_root(&tree, 2);
        assert_eq!(view.selected(), None);

        view.select(3);
        view.go_to_parent(&tree);
        assert_eq!(view.selected(), None);
        assert_eq!(view.current_root(), 1);

        view.select(4);
        view.reset_root(&tree);
        assert_eq!(view.selected(), None);
        assert_eq!(view.current_root(), ROOT);
    }

    #[test]
    fn go_to_parent_at_tree_root_is_noop() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.select(1);

        assert!(!view.go_to_parent(&tree));
        assert_eq!(view.current_root(), ROOT);
        assert_eq!(view.selected(), Some(1));
    }

    #[test]
    fn select_does_not_move_root() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.select(4);

        assert_eq!(view.selected(), Some(4));
        assert_eq!(view.current_root(), ROOT);
    }

    #[test]
    fn click_selects_and_toggles() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);

        assert!(view.dispatch(&tree, NodeEvent::Click, 1));
        assert_eq!(view.selected(), Some(1));
        assert_eq!(view.collapse_state(1), CollapseState::Expanded);

        assert!(view.dispatch(&tree, NodeEvent::Click, 5));
        assert_eq!(view.selected(), Some(5));
        assert_eq!(view.collapse_state(5), CollapseState::Unset);
    }

    #[test]
    fn click_on_displayed_root_is_ignored() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);

        assert!(!view.dispatch(&tree, NodeEvent::Click, ROOT));
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn back_to_parent_only_from_tree_view_root() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        view.set_root(&tree, 2);

        assert!(!view.dispatch(&tree, NodeEvent::BackToParent, 3));
        assert!(view.dispatch(&tree, NodeEvent::BackToParent, 2));
        assert_eq!(view.current_root(), 1);

        view.set_kind(&tree, ViewKind::Sunburst);
        assert!(!view.dispatch(&tree, NodeEvent::BackToParent, 1));
        assert_eq!(view.current_root(), 1);
    }

    #[test]
    fn node_count_covers_displayed_subtree() {
        let tree = sample_tree();
        let mut view = ViewState::new(&tree, ViewKind::Tree);
        assert_eq!(view.node_count(&tree), tree.len());

        view.set_root(&tree, 1);
        assert_eq!(view.node_count(&tree), 4);
    }

    #[test]
    fn view_root_label_uses_url_path() {
        let tree = sample_tree();

        assert_eq!(node_label(&tree, ROOT, true), "/ (2/5)");
        assert_eq!(node_label(&tree, 1, true), "/a (2/3)");
        assert_eq!(node_label(&tree, 1, false), "a (2/3)");
        assert_eq!(node_label(&tree, 3, false), "c");
    }

    #[test]
    fn view_root_label_falls_back_to_name() {
        let tree = SiteTree::from_artifact(r#"{"name":"local","children":[{"name":"x"}]}"#)
            .expect("load json");

        assert_eq!(node_label(&tree, ROOT, true), "local (1/1)");
    }

    #[test]
    fn selection_label_keeps_query_and_fragment() {
        assert_eq!(
            selection_label("https://a.com/docs/page?lang=en#intro"),
            "/docs/page?lang=en#intro"
        );
        assert_eq!(selection_label("fr/docs"), "fr/docs");
    }

    #[test]
    fn view_kind_parses_case_insensitively() {
        assert_eq!("Sunburst".parse::<ViewKind>(), Ok(ViewKind::Sunburst));
        assert_eq!(" tree ".parse::<ViewKind>(), Ok(ViewKind::Tree));
        assert!("radial".parse::<ViewKind>().is_err());
    }
}
