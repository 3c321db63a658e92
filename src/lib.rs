//! Hierarchical node tree with a single selection, lazily loaded children
//! and cascading permission checks for structural mutation.
//!
//! Layers:
//! - [`domain`]: nodes, the tree, selection and transfer protocols (no I/O)
//! - [`infrastructure`]: directory-backed node behavior
//! - [`cli`]: argument parsing and command dispatch for the `treeview` binary

pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
