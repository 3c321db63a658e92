//! Domain layer: nodes, the tree and its selection and mutation protocols
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod behavior;
pub mod error;
pub mod events;
pub mod node;
mod selection;
mod transfer;
pub mod tree;

pub use behavior::{HookContext, NodeBehavior, RootFactory};
pub use error::{
    Action, Denial, HookError, StructuralError, TransferError, TreeError, TreeResult,
};
pub use events::{ListenerId, Property, SelectionChanging, TreeEvent};
pub use node::{Attributes, DetachedNode, ExpandMode, LoadState, Node, NodeId, NodeKey, NodeKind};
pub use tree::{Tree, TreeOptions};
