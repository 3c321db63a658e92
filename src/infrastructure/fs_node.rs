//! Directory-backed node behavior.
//!
//! Each load lists one directory level. Node ids derive from the path
//! relative to the tree root, so the same entry gets the same id across
//! reloads and an id path can be computed from a relative path alone.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::config::{FsOptions, Settings};
use crate::domain::{DetachedNode, HookContext, HookError, NodeBehavior, NodeId, Tree};
use crate::infrastructure::error::{InfraError, InfraResult};

const ID_SALT: &str = "fs";

/// A file or directory below the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    root: PathBuf,
    relative: PathBuf,
    is_dir: bool,
    options: FsOptions,
}

impl FsEntry {
    pub fn root(root: PathBuf, options: FsOptions) -> Self {
        Self {
            root,
            relative: PathBuf::new(),
            is_dir: true,
            options,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(&self.relative)
    }

    /// Path relative to the tree root; empty for the root itself.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn list(&self) -> Result<Vec<DirEntry>, HookError> {
        let directories_first = self.options.directories_first;
        let walker = WalkDir::new(self.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by(move |a, b| {
                let by_kind = if directories_first {
                    b.file_type().is_dir().cmp(&a.file_type().is_dir())
                } else {
                    Ordering::Equal
                };
                by_kind.then_with(|| a.file_name().cmp(b.file_name()))
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                HookError::from_source(format!("list {}", self.path().display()), e)
            })?;
            if !self.options.show_hidden && is_hidden(&entry) {
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn child_node(&self, entry: &DirEntry, display_index: i32) -> DetachedNode<FsEntry> {
        let relative = self.relative.join(entry.file_name());
        let child = FsEntry {
            root: self.root.clone(),
            relative: relative.clone(),
            is_dir: entry.file_type().is_dir(),
            options: self.options.clone(),
        };
        let caption = entry.file_name().to_string_lossy().to_string();
        let id = entry_id(&relative);
        let title = relative.display().to_string();
        let node = if child.is_dir {
            DetachedNode::container(caption, child)
        } else {
            DetachedNode::document(caption, child)
        };
        node.with_id(id)
            .with_title(&title)
            .with_display_index(display_index)
    }
}

impl NodeBehavior for FsEntry {
    fn variant(&self) -> &str {
        "fs"
    }

    fn fresh(&self) -> Self {
        FsEntry::root(self.root.clone(), self.options.clone())
    }

    #[instrument(level = "debug", skip(self, ctx), fields(path = %self.relative.display()))]
    fn populate_children(&mut self, ctx: &mut HookContext<'_, Self>) -> Result<(), HookError> {
        let entries = self.list()?;
        debug!(count = entries.len(), "listed entries");
        for (position, entry) in entries.iter().enumerate() {
            let child = self.child_node(entry, position as i32);
            ctx.attach_child(child)
                .map_err(|e| HookError::from_source(format!("attach {}", entry.path().display()), e))?;
        }
        Ok(())
    }

    /// Deleting would remove files; the tree is read-only.
    fn can_delete(&self) -> Result<bool, HookError> {
        Ok(false)
    }

    fn on_assign_to(&self, target: &mut Self) -> Result<(), HookError> {
        target.root = self.root.clone();
        target.relative = self.relative.clone();
        target.is_dir = self.is_dir;
        target.options = self.options.clone();
        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn normalized(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Node id of the entry at `relative` below the tree root.
pub fn entry_id(relative: &Path) -> NodeId {
    NodeId::derived(&normalized(relative), ID_SALT)
}

/// Id path for `select_by_path`, one derived id per path prefix.
pub fn id_path(relative: &Path, separator: char) -> String {
    let mut prefix = PathBuf::new();
    let mut path = String::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            prefix.push(part);
            path.push(separator);
            path.push_str(entry_id(&prefix).as_str());
        }
    }
    if path.is_empty() {
        path.push(separator);
    }
    path
}

/// Lazily loaded tree over the directory `root_dir`.
#[instrument(level = "debug", skip(settings))]
pub fn fs_tree(root_dir: &Path, settings: &Settings) -> InfraResult<Tree<FsEntry>> {
    let root = root_dir
        .canonicalize()
        .map_err(|e| InfraError::io(format!("resolve {}", root_dir.display()), e))?;
    if !root.is_dir() {
        return Err(InfraError::NotADirectory { path: root });
    }
    let caption = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());
    let options = settings.fs.clone();

    let tree = Tree::new(move || -> Result<DetachedNode<FsEntry>, HookError> {
        Ok(DetachedNode::root(caption.clone(), FsEntry::root(root.clone(), options.clone()))
            .with_id(entry_id(Path::new("")))
            .with_title(&root.display().to_string()))
    })
    .with_options(settings.tree.clone());
    Ok(tree)
}
