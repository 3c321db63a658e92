//! The node tree: arena storage, root binding, lazy loading and structural mutation.
//!
//! The arena holds exactly the nodes reachable from the bound root. Removing a
//! node moves it out of the arena into a [`DetachedNode`]; deleting drops it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use generational_arena::Arena;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::behavior::{HookContext, NodeBehavior, RootFactory};
use crate::domain::error::{Action, Denial, StructuralError, TreeResult};
use crate::domain::events::{ListenerId, Notifier, Property, TreeEvent};
use crate::domain::node::{
    clean_text, Attributes, DetachedNode, LoadState, Node, NodeId, NodeKey, NodeKind,
};

/// Behavior switches of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Separator of path segments in `select_by_path` and `path_of`
    pub path_separator: char,
    /// Match path segments against node ids ignoring ASCII case
    pub case_insensitive_paths: bool,
    /// Expand the ancestors of a newly selected node
    pub expand_on_select: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            path_separator: '/',
            case_insensitive_paths: true,
            expand_on_select: true,
        }
    }
}

pub struct Tree<B: NodeBehavior> {
    pub(crate) arena: Arena<Node<B>>,
    pub(crate) root: Option<NodeKey>,
    pub(crate) selected: Option<NodeKey>,
    /// Nested selection changes in progress
    pub(crate) selecting_depth: u32,
    /// Selection at the start of the outermost selection change
    pub(crate) selection_origin: Option<NodeKey>,
    pub(crate) notifier: Notifier,
    pub(crate) options: TreeOptions,
    pub(crate) index: HashMap<NodeId, NodeKey>,
    root_factory: Option<Box<dyn RootFactory<B>>>,
}

impl<B: NodeBehavior> Default for Tree<B> {
    fn default() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            selected: None,
            selecting_depth: 0,
            selection_origin: None,
            notifier: Notifier::default(),
            options: TreeOptions::default(),
            index: HashMap::new(),
            root_factory: None,
        }
    }
}

impl<B: NodeBehavior> fmt::Debug for Tree<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("nodes", &self.arena.len())
            .field("root", &self.root)
            .field("selected", &self.selected)
            .field("selecting_depth", &self.selecting_depth)
            .field("options", &self.options)
            .field("notifier", &self.notifier)
            .finish()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl<B: NodeBehavior> Tree<B> {
    /// Tree whose root is created by `factory` on first access.
    pub fn new(factory: impl RootFactory<B> + 'static) -> Self {
        Self {
            root_factory: Some(Box::new(factory)),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_root_factory(&mut self, factory: impl RootFactory<B> + 'static) {
        self.root_factory = Some(Box::new(factory));
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&mut TreeEvent) + 'static) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Number of attached nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.arena.contains(key.0)
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node<B>> {
        self.arena.get(key.0)
    }

    /// All attached nodes, in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node<B>)> {
        self.arena.iter().map(|(idx, node)| (NodeKey(idx), node))
    }

    /// `None` while the node's own hook runs.
    pub fn behavior(&self, key: NodeKey) -> Option<&B> {
        self.arena.get(key.0).and_then(|n| n.behavior.as_ref())
    }

    pub fn behavior_mut(&mut self, key: NodeKey) -> Option<&mut B> {
        self.arena.get_mut(key.0).and_then(|n| n.behavior.as_mut())
    }

    pub(crate) fn get(&self, key: NodeKey) -> Result<&Node<B>, StructuralError> {
        self.arena
            .get(key.0)
            .ok_or(StructuralError::UnknownNode(key))
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Result<&mut Node<B>, StructuralError> {
        self.arena
            .get_mut(key.0)
            .ok_or(StructuralError::UnknownNode(key))
    }

    pub(crate) fn caption_of(&self, key: NodeKey) -> String {
        self.arena
            .get(key.0)
            .map(|n| n.attrs.caption.clone())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Root
    // ---------------------------------------------------------------------

    /// Bound root, without creating one.
    pub fn root_key(&self) -> Option<NodeKey> {
        self.root
    }

    /// Root node, created through the root factory on first access.
    #[instrument(level = "trace", skip(self))]
    pub fn root(&mut self) -> Option<NodeKey> {
        if self.root.is_some() {
            return self.root;
        }
        let factory = self.root_factory.as_mut()?;
        match factory.create_root() {
            Ok(node) => match self.bind_root(node) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "binding created root failed");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "root factory failed");
                None
            }
        }
    }

    /// Bind `root` and link any children it carries.
    #[instrument(level = "debug", skip(self, root), fields(root = %root.caption()))]
    pub fn bind_root(&mut self, root: DetachedNode<B>) -> TreeResult<NodeKey> {
        if self.root.is_some() {
            return Err(StructuralError::RootAlreadyBound.into());
        }
        if root.kind != NodeKind::Root {
            return Err(StructuralError::NotARoot {
                caption: root.attrs.caption.clone(),
            }
            .into());
        }
        self.validate_id(&root.id)?;
        let mut seen = HashSet::from([root.id.clone()]);
        for child in &root.children {
            self.validate_attachable(child, &mut seen)?;
        }
        let key = self.insert_detached(None, root);
        self.root = Some(key);
        debug!(nodes = self.arena.len(), "root bound");
        Ok(key)
    }

    /// Drop the root and everything below it; the next `root()` rebuilds.
    ///
    /// Children are deleted without permission checks. A refused unselect
    /// is overridden.
    #[instrument(level = "debug", skip(self))]
    pub fn reset_root(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        if self.selected.is_some() {
            if let Err(denial) = self.clear_selection() {
                debug!(%denial, "forcing selection clear");
                self.force_unselect();
            }
        }
        self.force_delete_children(root);
        self.purge(root);
        self.root = None;
        self.selected = None;
    }

    /// Unload the root's children but keep the root bound.
    ///
    /// Clears the selection (forced if refused), runs the factory's
    /// [`RootFactory::before_reset_content`] and unloads the children without
    /// hooks. The next child query repopulates the root.
    #[instrument(level = "debug", skip(self))]
    pub fn reset_root_content(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        if self.selected.is_some() {
            if let Err(denial) = self.clear_selection() {
                debug!(%denial, "forcing selection clear");
                self.force_unselect();
            }
        }
        if let Some(factory) = self.root_factory.as_mut() {
            if let Err(e) = factory.before_reset_content() {
                warn!(error = %e, "reset content hook failed, continuing");
            }
        }
        if let Err(e) = self.clear_children(root) {
            warn!(error = %e, "unloading root children failed");
        }
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Loaded node with the given id.
    pub fn find_by_id(&self, id: &str) -> Option<NodeKey> {
        self.index.get(id).copied()
    }

    /// First loaded node in pre-order whose tag matches, ignoring case.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeKey> {
        let root = self.root?;
        std::iter::once(root)
            .chain(self.descendants(root))
            .find(|&key| {
                self.arena
                    .get(key.0)
                    .and_then(|n| n.attrs.tag.as_deref())
                    .is_some_and(|t| t.eq_ignore_ascii_case(tag))
            })
    }

    /// Loaded descendants of `key` in pre-order, `key` excluded.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = match self.arena.get(key.0) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.get(current.0) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Parent first, root last.
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.arena.get(key.0).and_then(|n| n.parent);
        while let Some(k) = current {
            out.push(k);
            current = self.arena.get(k.0).and_then(|n| n.parent);
        }
        out
    }

    /// Whether `key` is `ancestor` or lies below it.
    pub fn in_subtree(&self, key: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.arena.get(k.0).and_then(|n| n.parent);
        }
        false
    }

    pub fn is_child_of(&self, child: NodeKey, parent: NodeKey) -> bool {
        self.arena
            .get(child.0)
            .is_some_and(|n| n.parent == Some(parent))
    }

    /// Separator-prefixed id path from the root, e.g. `/<root>/A/A1`.
    pub fn path_of(&self, key: NodeKey) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(key);
        while let Some(k) = current {
            let node = self.arena.get(k.0)?;
            segments.push(node.id.as_str());
            current = node.parent;
        }
        segments.reverse();
        let sep = self.options.path_separator.to_string();
        Some(format!("{}{}", sep, segments.join(&sep)))
    }

    // ---------------------------------------------------------------------
    // Lazy children
    // ---------------------------------------------------------------------

    /// Populate the children of `key` unless loaded, loading or inside a batch.
    ///
    /// A failing hook is logged; partially attached children are cleared and
    /// the next access retries.
    #[instrument(level = "trace", skip(self))]
    pub fn ensure_children_loaded(&mut self, key: NodeKey) -> TreeResult<()> {
        let node = self.get_mut(key)?;
        if node.load != LoadState::NotAttempted || node.depth > 0 {
            return Ok(());
        }
        if !node.kind.allows_children() {
            node.load = LoadState::Loaded;
            return Ok(());
        }
        if node.behavior.is_none() {
            return Ok(());
        }
        self.in_batch(key, |tree| {
            tree.set_load(key, LoadState::Loading);
            match tree.with_behavior(key, |behavior, ctx| behavior.populate_children(ctx)) {
                Some(Ok(())) => tree.set_load(key, LoadState::Loaded),
                Some(Err(e)) => {
                    warn!(node = %tree.caption_of(key), error = %e, "populating children failed");
                    if let Err(e) = tree.clear_children(key) {
                        debug!(error = %e, "clearing after failed load");
                    }
                    tree.set_load(key, LoadState::NotAttempted);
                }
                None => tree.set_load(key, LoadState::NotAttempted),
            }
        });
        Ok(())
    }

    pub fn children(&mut self, key: NodeKey) -> TreeResult<&[NodeKey]> {
        self.ensure_children_loaded(key)?;
        Ok(&self.get(key)?.children)
    }

    pub fn has_children(&mut self, key: NodeKey) -> TreeResult<bool> {
        Ok(!self.children(key)?.is_empty())
    }

    pub fn child_count(&mut self, key: NodeKey) -> TreeResult<usize> {
        Ok(self.children(key)?.len())
    }

    pub fn child_at(&mut self, key: NodeKey, position: usize) -> TreeResult<Option<NodeKey>> {
        Ok(self.children(key)?.get(position).copied())
    }

    pub fn index_of_child(&mut self, parent: NodeKey, child: NodeKey) -> TreeResult<Option<usize>> {
        Ok(self.children(parent)?.iter().position(|&c| c == child))
    }

    pub fn find_child(
        &mut self,
        parent: NodeKey,
        mut predicate: impl FnMut(&Node<B>) -> bool,
    ) -> TreeResult<Option<NodeKey>> {
        self.ensure_children_loaded(parent)?;
        let node = self.get(parent)?;
        Ok(node
            .children
            .iter()
            .copied()
            .find(|c| self.arena.get(c.0).is_some_and(&mut predicate)))
    }

    /// Unload the children of `key` without running their hooks.
    #[instrument(level = "debug", skip(self))]
    pub fn clear_children(&mut self, key: NodeKey) -> TreeResult<()> {
        let children = self.get(key)?.children.clone();
        if let Some(selected) = self.selected {
            if selected != key && self.in_subtree(selected, key) {
                self.force_unselect();
            }
        }
        if !children.is_empty() {
            self.in_batch(key, |tree| {
                for child in children {
                    tree.purge(child);
                }
            });
        }
        self.set_load(key, LoadState::NotAttempted);
        Ok(())
    }

    /// Clear and populate the children of `key` again.
    pub fn reload(&mut self, key: NodeKey) -> TreeResult<()> {
        self.clear_children(key)?;
        self.ensure_children_loaded(key)
    }

    pub(crate) fn set_load(&mut self, key: NodeKey, state: LoadState) {
        if let Some(node) = self.arena.get_mut(key.0) {
            node.load = state;
        }
    }

    // ---------------------------------------------------------------------
    // Batches
    // ---------------------------------------------------------------------

    pub(crate) fn begin_batch(&mut self, key: NodeKey) {
        if let Some(node) = self.arena.get_mut(key.0) {
            node.depth += 1;
        }
    }

    /// Ends a batch; content-changed fires when no batch is left on the node
    /// or any ancestor.
    pub(crate) fn end_batch(&mut self, key: NodeKey) {
        let Some(node) = self.arena.get_mut(key.0) else {
            return;
        };
        node.depth = node.depth.saturating_sub(1);
        if node.depth > 0 {
            return;
        }
        let mut current = node.parent;
        while let Some(k) = current {
            match self.arena.get(k.0) {
                Some(ancestor) if ancestor.depth > 0 => return,
                Some(ancestor) => current = ancestor.parent,
                None => break,
            }
        }
        self.notifier
            .emit(&mut TreeEvent::ContentChanged { source: key });
    }

    /// Run `f` inside a batch on `key`, coalescing content notifications.
    pub fn in_batch<R>(&mut self, key: NodeKey, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch(key);
        let result = f(self);
        self.end_batch(key);
        result
    }

    /// Check the behavior of `key` out of the arena and run `f` with tree access.
    ///
    /// `None` if the node is unknown or its behavior is already checked out.
    pub(crate) fn with_behavior<R>(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut B, &mut HookContext<'_, B>) -> R,
    ) -> Option<R> {
        let mut behavior = self.arena.get_mut(key.0)?.behavior.take()?;
        let result = {
            let mut ctx = HookContext::new(self, key);
            f(&mut behavior, &mut ctx)
        };
        if let Some(node) = self.arena.get_mut(key.0) {
            node.behavior = Some(behavior);
        }
        Some(result)
    }

    // ---------------------------------------------------------------------
    // Attach
    // ---------------------------------------------------------------------

    /// Attach `child` below `parent`.
    ///
    /// Returns `Ok(None)` if a node with the child's id is already a child of
    /// `parent`. Children stay stable-sorted by display index.
    #[instrument(level = "debug", skip(self, child), fields(child = %child.caption()))]
    pub fn add_child(
        &mut self,
        parent: NodeKey,
        child: DetachedNode<B>,
    ) -> TreeResult<Option<NodeKey>> {
        let parent_node = self.get(parent)?;
        if !parent_node.kind.allows_children() {
            return Err(StructuralError::ChildrenNotAllowed {
                caption: parent_node.attrs.caption.clone(),
            }
            .into());
        }
        if let Some(&existing) = self.index.get(&child.id) {
            if self.is_child_of(existing, parent) {
                debug!("already a child, ignoring");
                return Ok(None);
            }
        }
        self.validate_attachable(&child, &mut HashSet::new())?;
        let key = self.in_batch(parent, |tree| {
            let key = tree.insert_detached(Some(parent), child);
            if let Some(node) = tree.arena.get_mut(parent.0) {
                node.children.push(key);
            }
            tree.sort_children(parent);
            key
        });
        Ok(Some(key))
    }

    fn validate_attachable(
        &self,
        child: &DetachedNode<B>,
        seen: &mut HashSet<NodeId>,
    ) -> Result<(), StructuralError> {
        let caption = || child.attrs.caption.clone();
        if child.kind == NodeKind::Root {
            return Err(StructuralError::RootAsChild { caption: caption() });
        }
        if child.attrs.caption.is_empty() {
            return Err(StructuralError::MissingCaption);
        }
        self.validate_id(&child.id)?;
        if self.index.contains_key(&child.id) || !seen.insert(child.id.clone()) {
            return Err(StructuralError::AlreadyAttached { caption: caption() });
        }
        if !child.children.is_empty() && !child.kind.allows_children() {
            return Err(StructuralError::ChildrenNotAllowed { caption: caption() });
        }
        for grandchild in &child.children {
            self.validate_attachable(grandchild, seen)?;
        }
        Ok(())
    }

    /// Ids are path segments and must not contain the configured separator.
    fn validate_id(&self, id: &NodeId) -> Result<(), StructuralError> {
        if id.as_str().contains(self.options.path_separator) {
            return Err(StructuralError::InvalidId(id.to_string()));
        }
        Ok(())
    }

    /// Move a validated detached subtree into the arena.
    fn insert_detached(&mut self, parent: Option<NodeKey>, detached: DetachedNode<B>) -> NodeKey {
        let DetachedNode {
            id,
            kind,
            mut attrs,
            behavior,
            children,
            loaded,
        } = detached;
        if kind == NodeKind::Root {
            attrs.disabled = false;
        }
        let key = NodeKey(self.arena.insert(Node {
            id: id.clone(),
            kind,
            attrs,
            parent,
            children: Vec::with_capacity(children.len()),
            load: if loaded {
                LoadState::Loaded
            } else {
                LoadState::NotAttempted
            },
            depth: 0,
            behavior: Some(behavior),
        }));
        self.index.insert(id, key);
        for child in children {
            let child_key = self.insert_detached(Some(key), child);
            if let Some(node) = self.arena.get_mut(key.0) {
                node.children.push(child_key);
            }
        }
        self.sort_children(key);
        key
    }

    fn sort_children(&mut self, key: NodeKey) {
        let Some(node) = self.arena.get_mut(key.0) else {
            return;
        };
        let mut children = std::mem::take(&mut node.children);
        children.sort_by_key(|c| self.arena.get(c.0).map_or(0, |n| n.attrs.display_index));
        if let Some(node) = self.arena.get_mut(key.0) {
            node.children = children;
        }
    }

    // ---------------------------------------------------------------------
    // Remove / delete
    // ---------------------------------------------------------------------

    /// Whether `key` and its loaded subtree may be removed.
    pub fn check_remove(&self, key: NodeKey) -> Result<(), Denial> {
        self.check_mutation(key, Action::Remove)
    }

    /// Whether `key` and its loaded subtree may be deleted.
    pub fn check_delete(&self, key: NodeKey) -> Result<(), Denial> {
        self.check_mutation(key, Action::Delete)
    }

    pub fn check_unselect(&self, key: NodeKey) -> Result<(), Denial> {
        self.ask(key, Action::Unselect).map_err(|denial| match denial {
            Denial::Refused { caption, .. } => Denial::Unselect { caption },
            other => other,
        })
    }

    pub(crate) fn check_select(&self, key: NodeKey) -> Result<(), Denial> {
        let node = self.arena.get(key.0).ok_or(Denial::NotInTree)?;
        if node.attrs.disabled {
            return Err(Denial::Disabled {
                caption: node.attrs.caption.clone(),
            });
        }
        self.ask(key, Action::Select)
    }

    fn check_mutation(&self, key: NodeKey, action: Action) -> Result<(), Denial> {
        if !self.contains(key) {
            return Err(Denial::NotInTree);
        }
        if let Some(selected) = self.selected {
            if self.in_subtree(selected, key) {
                self.check_unselect(selected)?;
            }
        }
        self.check_cascade(key, action)
    }

    fn check_cascade(&self, key: NodeKey, action: Action) -> Result<(), Denial> {
        let node = self.arena.get(key.0).ok_or(Denial::NotInTree)?;
        if node.behavior.is_none() {
            return Err(Denial::Busy {
                caption: node.attrs.caption.clone(),
            });
        }
        self.ask(key, action)?;
        for &child in &node.children {
            self.check_cascade(child, action)?;
        }
        Ok(())
    }

    /// Ask the node's behavior for permission; a checked-out behavior allows.
    fn ask(&self, key: NodeKey, action: Action) -> Result<(), Denial> {
        let node = self.arena.get(key.0).ok_or(Denial::NotInTree)?;
        let Some(behavior) = node.behavior.as_ref() else {
            return Ok(());
        };
        let answer = match action {
            Action::Select => behavior.can_select(),
            Action::Unselect => behavior.can_unselect(),
            Action::Remove => behavior.can_remove(),
            Action::Delete => behavior.can_delete(),
        };
        match answer {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(node = %node, %action, "refused");
                Err(Denial::Refused {
                    caption: node.attrs.caption.clone(),
                    action,
                })
            }
            Err(e) => {
                warn!(node = %node, %action, error = %e, "permission check failed");
                Err(Denial::HookFailed {
                    caption: node.attrs.caption.clone(),
                    action,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Non-destructive removal of `child` after the remove cascade passed.
    ///
    /// The returned node keeps its attributes but not its children, which
    /// are removed along with it. Not-a-child is a no-op.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_child(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
    ) -> Result<Option<DetachedNode<B>>, Denial> {
        if !self.contains(parent) {
            return Err(Denial::NotInTree);
        }
        if !self.is_child_of(child, parent) {
            debug!("not a child, nothing to remove");
            return Ok(None);
        }
        self.check_mutation(child, Action::Remove)?;
        Ok(self.in_batch(parent, |tree| tree.dismantle(child, Action::Remove)))
    }

    /// Destructive removal of `child` after the delete cascade passed.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<bool, Denial> {
        if !self.contains(parent) {
            return Err(Denial::NotInTree);
        }
        if !self.is_child_of(child, parent) {
            debug!("not a child, nothing to delete");
            return Ok(false);
        }
        self.check_mutation(child, Action::Delete)?;
        self.in_batch(parent, |tree| drop(tree.dismantle(child, Action::Delete)));
        Ok(true)
    }

    /// [`remove_child`](Self::remove_child) for the child with `id`.
    pub fn remove_child_by_id(
        &mut self,
        parent: NodeKey,
        id: &str,
    ) -> Result<Option<DetachedNode<B>>, Denial> {
        match self.child_with_id(parent, id)? {
            Some(child) => self.remove_child(parent, child),
            None => Ok(None),
        }
    }

    /// [`remove_child`](Self::remove_child) for the child at `position`.
    pub fn remove_child_at(
        &mut self,
        parent: NodeKey,
        position: usize,
    ) -> Result<Option<DetachedNode<B>>, Denial> {
        match self.child_at(parent, position).map_err(|_| Denial::NotInTree)? {
            Some(child) => self.remove_child(parent, child),
            None => Ok(None),
        }
    }

    pub fn delete_child_by_id(&mut self, parent: NodeKey, id: &str) -> Result<bool, Denial> {
        match self.child_with_id(parent, id)? {
            Some(child) => self.delete_child(parent, child),
            None => Ok(false),
        }
    }

    pub fn delete_child_at(&mut self, parent: NodeKey, position: usize) -> Result<bool, Denial> {
        match self.child_at(parent, position).map_err(|_| Denial::NotInTree)? {
            Some(child) => self.delete_child(parent, child),
            None => Ok(false),
        }
    }

    fn child_with_id(&mut self, parent: NodeKey, id: &str) -> Result<Option<NodeKey>, Denial> {
        self.find_child(parent, |n| n.id().as_str() == id)
            .map_err(|_| Denial::NotInTree)
    }

    /// Remove all loaded children; any refusal leaves every child attached.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_children(&mut self, parent: NodeKey) -> Result<Vec<DetachedNode<B>>, Denial> {
        let children = self.arena.get(parent.0).ok_or(Denial::NotInTree)?.children.clone();
        for &child in &children {
            self.check_mutation(child, Action::Remove)?;
        }
        let removed: Vec<_> = self.in_batch(parent, |tree| {
            children
                .iter()
                .filter_map(|&c| tree.dismantle(c, Action::Remove))
                .collect()
        });
        self.set_load(parent, LoadState::Loaded);
        Ok(removed)
    }

    /// Delete all loaded children; any refusal leaves every child attached.
    ///
    /// The parent reloads its children on next access.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_children(&mut self, parent: NodeKey) -> Result<usize, Denial> {
        let children = self.arena.get(parent.0).ok_or(Denial::NotInTree)?.children.clone();
        for &child in &children {
            self.check_mutation(child, Action::Delete)?;
        }
        self.in_batch(parent, |tree| {
            for &child in &children {
                drop(tree.dismantle(child, Action::Delete));
            }
        });
        self.set_load(parent, LoadState::NotAttempted);
        Ok(children.len())
    }

    /// Delete all children without permission checks; hook errors are logged.
    pub(crate) fn force_delete_children(&mut self, parent: NodeKey) {
        let Some(node) = self.arena.get(parent.0) else {
            return;
        };
        let children = node.children.clone();
        if !children.is_empty() {
            self.in_batch(parent, |tree| {
                for child in children.into_iter().rev() {
                    drop(tree.dismantle(child, Action::Delete));
                }
            });
        }
        self.set_load(parent, LoadState::NotAttempted);
    }

    /// Unselect if needed, then tear down the subtree of `key`.
    fn dismantle(&mut self, key: NodeKey, action: Action) -> Option<DetachedNode<B>> {
        if let Some(selected) = self.selected {
            if self.in_subtree(selected, key) {
                self.force_unselect();
            }
        }
        self.teardown(key, action)
    }

    /// Depth-first: children first (last to first), then the node's own hook.
    fn teardown(&mut self, key: NodeKey, action: Action) -> Option<DetachedNode<B>> {
        let children = self.arena.get(key.0)?.children.clone();
        for child in children.into_iter().rev() {
            drop(self.teardown(child, action));
        }
        self.run_before(key, action);
        self.detach(key)
    }

    pub(crate) fn run_before(&mut self, key: NodeKey, action: Action) {
        let caption = self.caption_of(key);
        let Some(behavior) = self.behavior_mut(key) else {
            return;
        };
        let result = match action {
            Action::Remove => behavior.before_remove(),
            Action::Delete => behavior.before_delete(),
            Action::Unselect => behavior.before_unselect(),
            Action::Select => Ok(()),
        };
        if let Err(e) = result {
            warn!(node = %caption, %action, error = %e, "hook failed, continuing");
        }
    }

    /// Unlink `key` from its parent and move it out of the arena.
    fn detach(&mut self, key: NodeKey) -> Option<DetachedNode<B>> {
        let node = self.arena.remove(key.0)?;
        self.index.remove(&node.id);
        if let Some(parent) = node.parent.and_then(|p| self.arena.get_mut(p.0)) {
            parent.children.retain(|&c| c != key);
        }
        if self.root == Some(key) {
            self.root = None;
        }
        if self.selected == Some(key) {
            self.selected = None;
        }
        let Node {
            id,
            kind,
            attrs,
            behavior,
            ..
        } = node;
        Some(DetachedNode {
            id,
            kind,
            attrs,
            behavior: behavior?,
            children: Vec::new(),
            loaded: false,
        })
    }

    /// Drop the subtree of `key` without hooks.
    fn purge(&mut self, key: NodeKey) {
        let Some(node) = self.arena.get(key.0) else {
            return;
        };
        for child in node.children.clone() {
            self.purge(child);
        }
        drop(self.detach(key));
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    fn update_attribute(
        &mut self,
        key: NodeKey,
        property: Property,
        apply: impl FnOnce(&mut Attributes) -> bool,
    ) -> TreeResult<bool> {
        let node = self.get_mut(key)?;
        let changed = apply(&mut node.attrs);
        if changed {
            self.notifier
                .emit(&mut TreeEvent::PropertyChanged { node: key, property });
        }
        Ok(changed)
    }

    pub fn set_caption(&mut self, key: NodeKey, caption: &str) -> TreeResult<bool> {
        let caption = caption.trim();
        if caption.is_empty() {
            return Err(StructuralError::MissingCaption.into());
        }
        self.update_attribute(key, Property::Caption, |a| {
            replace(&mut a.caption, caption.to_string())
        })
    }

    pub fn set_title(&mut self, key: NodeKey, title: &str) -> TreeResult<bool> {
        self.update_attribute(key, Property::Title, |a| {
            replace(&mut a.title, clean_text(Some(title)))
        })
    }

    pub fn set_status(&mut self, key: NodeKey, status: &str) -> TreeResult<bool> {
        self.update_attribute(key, Property::Status, |a| {
            replace(&mut a.status, clean_text(Some(status)))
        })
    }

    pub fn set_show_status(&mut self, key: NodeKey, show: bool) -> TreeResult<bool> {
        self.update_attribute(key, Property::ShowStatus, |a| replace(&mut a.show_status, show))
    }

    pub fn set_tag(&mut self, key: NodeKey, tag: &str) -> TreeResult<bool> {
        self.update_attribute(key, Property::Tag, |a| replace(&mut a.tag, clean_text(Some(tag))))
    }

    pub fn set_visible(&mut self, key: NodeKey, visible: bool) -> TreeResult<bool> {
        self.update_attribute(key, Property::Visible, |a| replace(&mut a.visible, visible))
    }

    /// Ignored for the root.
    pub fn set_disabled(&mut self, key: NodeKey, disabled: bool) -> TreeResult<bool> {
        if self.get(key)?.kind == NodeKind::Root {
            return Ok(false);
        }
        self.update_attribute(key, Property::Disabled, |a| replace(&mut a.disabled, disabled))
    }

    /// Re-sorts the parent's children.
    pub fn set_display_index(&mut self, key: NodeKey, display_index: i32) -> TreeResult<bool> {
        let changed = self.update_attribute(key, Property::DisplayIndex, |a| {
            replace(&mut a.display_index, display_index)
        })?;
        if changed {
            if let Some(parent) = self.get(key)?.parent {
                self.sort_children(parent);
            }
        }
        Ok(changed)
    }

    /// Restore visibility, enabled and collapsed state and clear the batch
    /// depth, then run [`NodeBehavior::on_reset_state`].
    #[instrument(level = "debug", skip(self))]
    pub fn reset_state(&mut self, key: NodeKey) -> TreeResult<()> {
        self.set_visible(key, true)?;
        self.set_disabled(key, false)?;
        self.update_attribute(key, Property::Expanded, |a| replace(&mut a.expanded, false))?;
        self.get_mut(key)?.depth = 0;
        let caption = self.caption_of(key);
        if let Some(Err(e)) = self.behavior_mut(key).map(|b| b.on_reset_state()) {
            warn!(node = %caption, error = %e, "reset state hook failed");
        }
        Ok(())
    }

    /// Expanding opens all ancestors first; collapsing closes all loaded
    /// descendants. Only containers with children change state.
    #[instrument(level = "trace", skip(self))]
    pub fn set_expanded(&mut self, key: NodeKey, expanded: bool) -> TreeResult<()> {
        self.get(key)?;
        if expanded {
            for ancestor in self.ancestors(key).into_iter().rev() {
                self.expand_one(ancestor, true)?;
            }
        } else {
            for descendant in self.descendants(key).into_iter().rev() {
                self.expand_one(descendant, false)?;
            }
        }
        self.expand_one(key, expanded)
    }

    pub(crate) fn expand_one(&mut self, key: NodeKey, expanded: bool) -> TreeResult<()> {
        if self.get(key)?.kind != NodeKind::Container {
            return Ok(());
        }
        let has_children = if expanded {
            self.has_children(key)?
        } else {
            !self.get(key)?.children.is_empty()
        };
        if has_children {
            self.update_attribute(key, Property::Expanded, |a| replace(&mut a.expanded, expanded))?;
        }
        Ok(())
    }
}
