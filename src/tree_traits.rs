/*
Text outline of a node tree via termtree.
Only loaded nodes are rendered: rendering never triggers a lazy load.
 */
use termtree::Tree as Outline;
use tracing::instrument;

use crate::domain::{NodeBehavior, NodeKey, Tree};

pub trait TreeNodeConvert {
    /// Every loaded node.
    fn to_tree_string(&self) -> Outline<String>;

    /// Visible nodes, descending only into expanded ones.
    fn to_visible_tree_string(&self) -> Outline<String>;
}

impl<B: NodeBehavior> TreeNodeConvert for Tree<B> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Outline<String> {
        match self.root_key() {
            Some(root) => build(self, root, false),
            None => Outline::new("Empty tree".to_string()),
        }
    }

    #[instrument(level = "debug", skip(self))]
    fn to_visible_tree_string(&self) -> Outline<String> {
        match self.root_key() {
            Some(root) => build(self, root, true),
            None => Outline::new("Empty tree".to_string()),
        }
    }
}

fn label<B: NodeBehavior>(tree: &Tree<B>, key: NodeKey) -> String {
    let Some(node) = tree.node(key) else {
        return String::new();
    };
    let attrs = node.attributes();
    let mut label = attrs.caption().to_string();
    if attrs.show_status() {
        if let Some(status) = attrs.status() {
            label.push_str(&format!(" [{}]", status));
        }
    }
    if attrs.is_disabled() {
        label.push_str(" (disabled)");
    }
    if tree.is_selected(key) {
        label.push_str(" *");
    }
    label
}

fn build<B: NodeBehavior>(tree: &Tree<B>, key: NodeKey, visible_only: bool) -> Outline<String> {
    let mut outline = Outline::new(label(tree, key));
    let Some(node) = tree.node(key) else {
        return outline;
    };
    if visible_only && !node.is_expanded() {
        return outline;
    }
    for &child in node.loaded_children() {
        let show = tree
            .node(child)
            .is_some_and(|c| !visible_only || c.attributes().is_visible());
        if show {
            outline.push(build(tree, child, visible_only));
        }
    }
    outline
}
