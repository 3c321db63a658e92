//! Infrastructure layer: I/O-backed node behaviors
//!
//! This layer binds the domain tree to external data sources.

pub mod error;
pub mod fs_node;

pub use error::{InfraError, InfraResult};
pub use fs_node::{fs_tree, id_path, FsEntry};
