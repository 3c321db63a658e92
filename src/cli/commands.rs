//! Command dispatch for the `treeview` binary

use std::path::Path;

use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::Settings;
use crate::domain::{NodeBehavior, NodeKey, StructuralError, Tree, TreeError};
use crate::infrastructure::{fs_tree, id_path, FsEntry};
use crate::tree_traits::TreeNodeConvert;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Show { dir, depth }) => _show(dir, *depth, cli.config_dir.as_deref()),
        Some(Commands::Select { dir, path }) => _select(dir, path, cli.config_dir.as_deref()),
        Some(Commands::Config) => _config(cli.config_dir.as_deref()),
        None => {
            if cli.generator.is_some() {
                Ok(())
            } else {
                Err(CliError::Usage(
                    "no command given, see --help".to_string(),
                ))
            }
        }
    }
}

fn open_tree(dir: &Path, config_dir: Option<&Path>) -> CliResult<(Tree<FsEntry>, NodeKey)> {
    let settings = Settings::load(Some(config_dir.unwrap_or(dir)))?;
    let mut tree = fs_tree(dir, &settings)?;
    let root = tree
        .root()
        .ok_or(TreeError::from(StructuralError::NoRoot))?;
    Ok((tree, root))
}

/// Load `depth` levels below `key`.
pub fn load_levels<B: NodeBehavior>(
    tree: &mut Tree<B>,
    key: NodeKey,
    depth: usize,
) -> CliResult<()> {
    if depth == 0 {
        return Ok(());
    }
    let children = tree.children(key)?.to_vec();
    for child in children {
        load_levels(tree, child, depth - 1)?;
    }
    Ok(())
}

#[instrument(level = "debug")]
fn _show(dir: &Path, depth: usize, config_dir: Option<&Path>) -> CliResult<()> {
    let (mut tree, root) = open_tree(dir, config_dir)?;
    load_levels(&mut tree, root, depth)?;
    debug!(nodes = tree.len(), "loaded");
    output::info(&tree.to_tree_string());
    Ok(())
}

#[instrument(level = "debug")]
fn _select(dir: &Path, path: &Path, config_dir: Option<&Path>) -> CliResult<()> {
    let (mut tree, _) = open_tree(dir, config_dir)?;
    let ids = id_path(path, tree.options().path_separator);
    debug!(%ids, "resolving");
    let selected = tree
        .select_by_path(&ids)?
        .ok_or_else(|| CliError::NotFound {
            path: path.display().to_string(),
        })?;
    if !tree.options().expand_on_select {
        tree.set_expanded(selected, true)?;
    }
    output::header(&format!("selected {}", path.display()));
    output::info(&tree.to_visible_tree_string());
    Ok(())
}

fn _config(config_dir: Option<&Path>) -> CliResult<()> {
    let settings = Settings::load(config_dir)?;
    output::info(&settings.to_toml()?);
    Ok(())
}
