//! Tree nodes: identity, kind, display attributes and structural state.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use generational_arena::Index;
use uuid::Uuid;

use crate::domain::error::StructuralError;

/// Handle of a node inside a [`Tree`](crate::domain::Tree).
///
/// Keys are generational: a key of a removed or deleted node never
/// resolves again, even if its arena slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) Index);

/// Opaque unique node identity, used for equality and as path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Fresh random id (32 hex characters).
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Stable id derived from content, e.g. the key of the record a node represents.
    pub fn derived(base: &str, salt: &str) -> Self {
        let name = format!("{}:{}", salt, base);
        Self(
            Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
                .simple()
                .to_string(),
        )
    }

    /// Custom id. Must be non-empty and free of path separators.
    pub fn parse(value: &str) -> Result<Self, StructuralError> {
        let value = value.trim();
        if value.is_empty() || value.contains('/') {
            return Err(StructuralError::InvalidId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a node kind reacts to expand/collapse requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// Always rendered expanded
    Expanded,
    /// Follows the node's `expanded` attribute
    Toggle,
    /// Never expanded
    Collapsed,
}

/// Structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Has no parent, bound to exactly one tree
    Root,
    /// Has a parent and may have children
    Container,
    /// Has a parent, never has children
    Document,
}

impl NodeKind {
    pub fn requires_parent(self) -> bool {
        !matches!(self, NodeKind::Root)
    }

    pub fn allows_children(self) -> bool {
        !matches!(self, NodeKind::Document)
    }

    pub fn expand_mode(self) -> ExpandMode {
        match self {
            NodeKind::Root => ExpandMode::Expanded,
            NodeKind::Container => ExpandMode::Toggle,
            NodeKind::Document => ExpandMode::Collapsed,
        }
    }
}

/// Progress of the lazy child population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotAttempted,
    Loading,
    Loaded,
}

/// Display and state attributes of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub(crate) caption: String,
    pub(crate) title: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) show_status: bool,
    pub(crate) display_index: i32,
    pub(crate) visible: bool,
    pub(crate) disabled: bool,
    pub(crate) expanded: bool,
    pub(crate) tag: Option<String>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            caption: String::new(),
            title: None,
            status: None,
            show_status: false,
            display_index: 0,
            visible: true,
            disabled: false,
            expanded: false,
            tag: None,
        }
    }
}

impl Attributes {
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Title, empty string when unassigned
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn show_status(&self) -> bool {
        self.show_status
    }

    pub fn display_index(&self) -> i32 {
        self.display_index
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Subset copied by cloning: everything that does not depend on identity.
    pub(crate) fn cloned_for_copy(&self) -> Self {
        Self {
            caption: self.caption.clone(),
            title: self.title.clone(),
            display_index: self.display_index,
            visible: self.visible,
            disabled: self.disabled,
            tag: self.tag.clone(),
            ..Self::default()
        }
    }
}

/// Trim a text attribute, mapping blank input to `None`.
pub(crate) fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A node stored in a tree.
pub struct Node<B> {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) attrs: Attributes,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) load: LoadState,
    pub(crate) depth: u32,
    /// Checked out while one of the node's own hooks runs
    pub(crate) behavior: Option<B>,
}

impl<B> Node<B> {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    pub fn caption(&self) -> &str {
        &self.attrs.caption
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root && self.parent.is_none()
    }

    /// Children populated so far, without triggering a lazy load.
    pub fn loaded_children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn is_loaded(&self) -> bool {
        self.load == LoadState::Loaded
    }

    /// Nested load/mutation batches currently running on this node.
    pub fn reentrancy_depth(&self) -> u32 {
        self.depth
    }

    pub fn is_loading(&self) -> bool {
        self.depth > 0
    }

    /// Expanded state as seen by a view, honoring the kind's expand mode.
    pub fn is_expanded(&self) -> bool {
        match self.kind.expand_mode() {
            ExpandMode::Expanded => true,
            ExpandMode::Collapsed => false,
            ExpandMode::Toggle => self.attrs.expanded,
        }
    }

    pub fn behavior(&self) -> Option<&B> {
        self.behavior.as_ref()
    }
}

impl<B> PartialEq for Node<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<B> Eq for Node<B> {}

impl<B> Hash for Node<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<B> fmt::Debug for Node<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("caption", &self.attrs.caption)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("load", &self.load)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<B> fmt::Display for Node<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]", self.kind, self.attrs.caption)
    }
}

/// A node outside any tree.
///
/// Freshly constructed nodes, clones and removed nodes are detached. A
/// detached node may carry pre-populated children (e.g. a deserialized
/// root); they are linked when the node is attached.
pub struct DetachedNode<B> {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) attrs: Attributes,
    pub(crate) behavior: B,
    pub(crate) children: Vec<DetachedNode<B>>,
    pub(crate) loaded: bool,
}

impl<B> DetachedNode<B> {
    pub fn new(kind: NodeKind, caption: impl Into<String>, behavior: B) -> Self {
        let caption: String = caption.into();
        Self {
            id: NodeId::new(),
            kind,
            attrs: Attributes {
                caption: caption.trim().to_string(),
                ..Attributes::default()
            },
            behavior,
            children: Vec::new(),
            loaded: false,
        }
    }

    pub fn root(caption: impl Into<String>, behavior: B) -> Self {
        Self::new(NodeKind::Root, caption, behavior)
    }

    pub fn container(caption: impl Into<String>, behavior: B) -> Self {
        Self::new(NodeKind::Container, caption, behavior)
    }

    pub fn document(caption: impl Into<String>, behavior: B) -> Self {
        Self::new(NodeKind::Document, caption, behavior)
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_display_index(mut self, display_index: i32) -> Self {
        self.attrs.display_index = display_index;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.attrs.title = clean_text(Some(title));
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.attrs.status = clean_text(Some(status));
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.attrs.tag = clean_text(Some(tag));
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.attrs.visible = visible;
        self
    }

    /// Ignored for root nodes, which are never disabled.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.attrs.disabled = disabled && self.kind != NodeKind::Root;
        self
    }

    /// Pre-populate a child. The node counts as loaded once it has any.
    pub fn with_child(mut self, child: DetachedNode<B>) -> Self {
        self.children.push(child);
        self.loaded = true;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    pub fn caption(&self) -> &str {
        &self.attrs.caption
    }

    pub fn children(&self) -> &[DetachedNode<B>] {
        &self.children
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn into_behavior(self) -> B {
        self.behavior
    }
}

impl<B> PartialEq for DetachedNode<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<B> Eq for DetachedNode<B> {}

impl<B> Hash for DetachedNode<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<B> fmt::Debug for DetachedNode<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("caption", &self.attrs.caption)
            .field("children", &self.children)
            .finish()
    }
}
