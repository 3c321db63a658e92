//! Single-selection state machine.
//!
//! A change runs: unselect check of the prior node, cancelable
//! `SelectionChanging`, prior `before_unselect`, commit, `on_selected`.
//! Changes triggered from hooks nest; `SelectionChanged` fires once when the
//! outermost change completes.

use tracing::{debug, instrument, warn};

use crate::domain::behavior::NodeBehavior;
use crate::domain::error::{Action, Denial};
use crate::domain::events::TreeEvent;
use crate::domain::node::NodeKey;
use crate::domain::tree::Tree;

fn segment_matches(id: &str, segment: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        id.eq_ignore_ascii_case(segment)
    } else {
        id == segment
    }
}

impl<B: NodeBehavior> Tree<B> {
    pub fn selected(&self) -> Option<NodeKey> {
        self.selected
    }

    pub fn is_selected(&self, key: NodeKey) -> bool {
        self.selected == Some(key)
    }

    /// Whether the selected node is `key` or lies below it.
    pub fn in_selected_path(&self, key: NodeKey) -> bool {
        self.selected.is_some_and(|s| self.in_subtree(s, key))
    }

    /// Whether a selection change is currently in progress.
    pub fn is_selecting(&self) -> bool {
        self.selecting_depth > 0
    }

    pub(crate) fn begin_selecting(&mut self) {
        if self.selecting_depth == 0 {
            self.selection_origin = self.selected;
        }
        self.selecting_depth += 1;
    }

    pub(crate) fn end_selecting(&mut self) {
        self.selecting_depth = self.selecting_depth.saturating_sub(1);
        if self.selecting_depth > 0 {
            return;
        }
        let prior = self.selection_origin.take();
        let current = self.selected;
        if prior != current {
            self.notifier
                .emit(&mut TreeEvent::SelectionChanged { prior, current });
        }
    }

    /// Select `key`. `Ok(false)` if it already is selected.
    #[instrument(level = "debug", skip(self))]
    pub fn select(&mut self, key: NodeKey) -> Result<bool, Denial> {
        if self.selected == Some(key) {
            return Ok(false);
        }
        self.check_select(key)?;
        self.change_selection(Some(key))?;
        Ok(true)
    }

    /// Clear the selection. `Ok(false)` if nothing was selected.
    #[instrument(level = "debug", skip(self))]
    pub fn clear_selection(&mut self) -> Result<bool, Denial> {
        if self.selected.is_none() {
            return Ok(false);
        }
        self.change_selection(None)?;
        Ok(true)
    }

    fn change_selection(&mut self, next: Option<NodeKey>) -> Result<(), Denial> {
        let prior = self.selected;
        if let Some(prior) = prior {
            self.check_unselect(prior)?;
        }
        if self.notifier.emit_changing(prior, next) {
            debug!(?prior, ?next, "selection change canceled");
            return Err(Denial::Canceled);
        }

        self.begin_selecting();
        if let Some(prior) = prior {
            self.run_before(prior, Action::Unselect);
        }
        self.selected = next;
        if let Some(next) = next {
            if self.options.expand_on_select {
                for ancestor in self.ancestors(next).into_iter().rev() {
                    if let Err(e) = self.expand_one(ancestor, true) {
                        debug!(error = %e, "expanding selection path");
                    }
                }
            }
            if let Some(Err(e)) = self.with_behavior(next, |b, ctx| b.on_selected(ctx)) {
                warn!(node = %self.caption_of(next), error = %e, "on_selected hook failed");
            }
        }
        self.end_selecting();
        Ok(())
    }

    /// Drop the selection without asking, used when the selected node goes away.
    pub(crate) fn force_unselect(&mut self) {
        let Some(prior) = self.selected else {
            return;
        };
        self.begin_selecting();
        self.run_before(prior, Action::Unselect);
        self.selected = None;
        self.end_selecting();
    }

    /// Resolve a separator-delimited id path, loading children along the way.
    ///
    /// A leading segment equal to the root id is optional. The empty path
    /// resolves to the root.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve_path(&mut self, path: &str) -> Option<NodeKey> {
        let root = self.root()?;
        let case_insensitive = self.options.case_insensitive_paths;
        let mut segments = path
            .split(self.options.path_separator)
            .filter(|s| !s.is_empty())
            .peekable();

        let root_id = self.node(root)?.id().as_str().to_string();
        if segments
            .peek()
            .is_some_and(|s| segment_matches(&root_id, s, case_insensitive))
        {
            segments.next();
        }

        let mut current = root;
        for segment in segments {
            match self.find_child(current, |n| {
                segment_matches(n.id().as_str(), segment, case_insensitive)
            }) {
                Ok(Some(child)) => current = child,
                Ok(None) | Err(_) => {
                    debug!(segment, "no child matches path segment");
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Select the node at `path`. `Ok(None)` if the path does not resolve.
    pub fn select_by_path(&mut self, path: &str) -> Result<Option<NodeKey>, Denial> {
        let Some(target) = self.resolve_path(path) else {
            return Ok(None);
        };
        self.select(target)?;
        Ok(Some(target))
    }

    /// Select a loaded node by id.
    pub fn select_by_id(&mut self, id: &str) -> Result<Option<NodeKey>, Denial> {
        let Some(target) = self.find_by_id(id) else {
            return Ok(None);
        };
        self.select(target)?;
        Ok(Some(target))
    }

    /// Select the first loaded node carrying `tag`.
    pub fn select_by_tag(&mut self, tag: &str) -> Result<Option<NodeKey>, Denial> {
        let Some(target) = self.find_by_tag(tag) else {
            return Ok(None);
        };
        self.select(target)?;
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_case_insensitive_match_when_comparing_segments_then_ignores_case() {
        assert!(segment_matches("Docs", "docs", true));
        assert!(!segment_matches("Docs", "docs", false));
        assert!(segment_matches("Docs", "Docs", false));
    }
}
