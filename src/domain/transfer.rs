//! Clone-then-transfer deep copy with rollback on failure.

use tracing::{debug, instrument, warn};

use crate::domain::behavior::NodeBehavior;
use crate::domain::error::{Action, StructuralError, TransferError, TreeResult};
use crate::domain::node::{DetachedNode, LoadState, NodeId, NodeKey};
use crate::domain::tree::Tree;

impl<B: NodeBehavior> Tree<B> {
    /// Detached copy of `key` with a fresh id and no children.
    ///
    /// Copies caption, title, tag, display index, visibility and the
    /// disabled flag; the behavior comes from [`NodeBehavior::fresh`].
    pub fn clone_node(&self, key: NodeKey) -> TreeResult<DetachedNode<B>> {
        let node = self.get(key)?;
        let behavior = node.behavior.as_ref().ok_or_else(|| TransferError::Busy {
            caption: node.attrs.caption.clone(),
        })?;
        Ok(DetachedNode {
            id: NodeId::new(),
            kind: node.kind,
            attrs: node.attrs.cloned_for_copy(),
            behavior: behavior.fresh(),
            children: Vec::new(),
            loaded: false,
        })
    }

    /// Copy the state and loaded subtree of `source` onto `target`.
    ///
    /// On failure every child of `target` is deleted, its `before_delete` hook
    /// runs once and the original error is returned.
    #[instrument(level = "debug", skip(self))]
    pub fn assign_to(&mut self, source: NodeKey, target: NodeKey) -> TreeResult<()> {
        let source_node = self.get(source)?;
        let target_node = self.get(target)?;
        if source == target {
            return Err(TransferError::SameNode {
                caption: source_node.attrs.caption.clone(),
            }
            .into());
        }
        if self.in_subtree(target, source) {
            return Err(TransferError::TargetInsideSource {
                source_caption: source_node.attrs.caption.clone(),
                target: target_node.attrs.caption.clone(),
            }
            .into());
        }
        let busy = |caption: &str| TransferError::Busy {
            caption: caption.to_string(),
        };
        let source_variant = source_node
            .behavior
            .as_ref()
            .ok_or_else(|| busy(&source_node.attrs.caption))?
            .variant();
        let target_variant = target_node
            .behavior
            .as_ref()
            .ok_or_else(|| busy(&target_node.attrs.caption))?
            .variant();
        if source_variant != target_variant {
            return Err(TransferError::VariantMismatch {
                source_variant: source_variant.to_string(),
                target: target_variant.to_string(),
            }
            .into());
        }

        self.in_batch(target, |tree| {
            if let Err(e) = tree.transfer(source, target) {
                warn!(target = %tree.caption_of(target), error = %e, "assign failed, rolling back");
                tree.roll_back(target);
                return Err(e);
            }
            debug!(nodes = tree.len(), "assigned");
            Ok(())
        })
    }

    fn transfer(&mut self, source: NodeKey, target: NodeKey) -> TreeResult<()> {
        let (children, loaded) = {
            let (Some(source_node), Some(target_node)) = self.arena.get2_mut(source.0, target.0)
            else {
                return Err(StructuralError::UnknownNode(target).into());
            };
            let caption = source_node.attrs.caption.clone();
            let (Some(from), Some(onto)) =
                (source_node.behavior.as_ref(), target_node.behavior.as_mut())
            else {
                return Err(TransferError::Busy { caption }.into());
            };
            from.on_assign_to(onto)
                .map_err(|source| TransferError::Hook { caption, source })?;
            (
                source_node.children.clone(),
                source_node.load == LoadState::Loaded,
            )
        };

        for child in children {
            let copy = self.clone_node(child)?;
            if let Some(copy_key) = self.add_child(target, copy)? {
                self.transfer(child, copy_key)?;
            }
        }
        if loaded {
            self.set_load(target, LoadState::Loaded);
        }
        Ok(())
    }

    fn roll_back(&mut self, target: NodeKey) {
        self.force_delete_children(target);
        self.run_before(target, Action::Delete);
    }

    /// Replace the content of `target` with a deep copy of this tree.
    ///
    /// Copies keep the ids of their originals, so paths from this tree
    /// resolve in `target` too. If the transfer fails the target is left
    /// without a root.
    #[instrument(level = "debug", skip(self, target))]
    pub fn assign_tree_to(&mut self, target: &mut Tree<B>) -> TreeResult<NodeKey> {
        let source_root = self.root().ok_or(StructuralError::NoRoot)?;
        target.reset_root();
        let target_root = target.bind_root(self.copy_node(source_root)?)?;
        let source: &Tree<B> = self;
        let result = target.in_batch(target_root, |tree| {
            let result = tree.transfer_from(source, source_root, target_root);
            if let Err(e) = &result {
                warn!(error = %e, "tree assign failed, rolling back");
                tree.roll_back(target_root);
            }
            result
        });
        if let Err(e) = result {
            target.reset_root();
            return Err(e);
        }
        Ok(target_root)
    }

    /// Clone of `key` that keeps its id, for copies into another tree.
    fn copy_node(&self, key: NodeKey) -> TreeResult<DetachedNode<B>> {
        let id = self.get(key)?.id.clone();
        Ok(self.clone_node(key)?.with_id(id))
    }

    fn transfer_from(
        &mut self,
        source_tree: &Tree<B>,
        source: NodeKey,
        target: NodeKey,
    ) -> TreeResult<()> {
        let source_node = source_tree.get(source)?;
        let caption = source_node.attrs.caption.clone();
        let from = source_node.behavior.as_ref().ok_or_else(|| TransferError::Busy {
            caption: caption.clone(),
        })?;
        let target_caption = self.caption_of(target);
        let onto = self.behavior_mut(target).ok_or(TransferError::Busy {
            caption: target_caption,
        })?;
        from.on_assign_to(onto)
            .map_err(|source| TransferError::Hook { caption, source })?;

        for &child in &source_node.children {
            let copy = source_tree.copy_node(child)?;
            if let Some(copy_key) = self.add_child(target, copy)? {
                self.transfer_from(source_tree, child, copy_key)?;
            }
        }
        if source_node.load == LoadState::Loaded {
            self.set_load(target, LoadState::Loaded);
        }
        Ok(())
    }
}
