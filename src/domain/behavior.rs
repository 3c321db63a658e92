//! Per-variant node capabilities and the context handed to hooks.

use crate::domain::error::{HookError, TreeResult};
use crate::domain::node::{Attributes, DetachedNode, NodeKey};
use crate::domain::tree::Tree;

/// Capability interface every node variant implements.
///
/// Permission queries default to "allowed" and lifecycle hooks to no-ops.
/// A returned [`HookError`] never escapes the tree: it is logged and
/// degraded to "denied", "no children" or "continue cleanup".
pub trait NodeBehavior: Sized {
    /// Variant name; nodes only transfer onto nodes of the same variant.
    fn variant(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Fresh instance of the same variant, used when cloning a node.
    fn fresh(&self) -> Self;

    /// Attach this node's children through [`HookContext::attach_child`].
    fn populate_children(&mut self, _ctx: &mut HookContext<'_, Self>) -> Result<(), HookError> {
        Ok(())
    }

    fn can_select(&self) -> Result<bool, HookError> {
        Ok(true)
    }

    fn can_unselect(&self) -> Result<bool, HookError> {
        Ok(true)
    }

    fn can_remove(&self) -> Result<bool, HookError> {
        Ok(true)
    }

    fn can_delete(&self) -> Result<bool, HookError> {
        Ok(true)
    }

    fn before_unselect(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    fn before_remove(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// Destructive hook, e.g. deleting the backing record.
    fn before_delete(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    fn on_selected(&mut self, _ctx: &mut HookContext<'_, Self>) -> Result<(), HookError> {
        Ok(())
    }

    /// Reset custom state, called by [`Tree::reset_state`].
    fn on_reset_state(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// Copy variant state from `self` onto `target` before children are transferred.
    fn on_assign_to(&self, _target: &mut Self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Builds the root node of a tree on first access.
pub trait RootFactory<B> {
    fn create_root(&mut self) -> Result<DetachedNode<B>, HookError>;

    /// Called by [`Tree::reset_root_content`] after the selection is cleared
    /// and before the root's children are unloaded.
    fn before_reset_content(&mut self) -> Result<(), HookError> {
        Ok(())
    }
}

impl<B, F> RootFactory<B> for F
where
    F: FnMut() -> Result<DetachedNode<B>, HookError>,
{
    fn create_root(&mut self) -> Result<DetachedNode<B>, HookError> {
        self()
    }
}

/// Tree access for a hook running on node `key`.
///
/// The node's own behavior is checked out for the duration of the hook, so
/// nested permission queries on it answer with the default.
pub struct HookContext<'a, B: NodeBehavior> {
    tree: &'a mut Tree<B>,
    key: NodeKey,
}

impl<'a, B: NodeBehavior> HookContext<'a, B> {
    pub(crate) fn new(tree: &'a mut Tree<B>, key: NodeKey) -> Self {
        Self { tree, key }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn tree(&self) -> &Tree<B> {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<B> {
        self.tree
    }

    /// Attach `child` under the hook's node.
    ///
    /// Returns `None` when a child with the same id is already attached here.
    pub fn attach_child(&mut self, child: DetachedNode<B>) -> TreeResult<Option<NodeKey>> {
        self.tree.add_child(self.key, child)
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.tree.node(self.key).map(|n| n.attributes())
    }

    pub fn path(&self) -> Option<String> {
        self.tree.path_of(self.key)
    }
}
