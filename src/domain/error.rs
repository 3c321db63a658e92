//! Domain-level errors and refusal reasons

use std::fmt;

use thiserror::Error;

use crate::domain::node::NodeKey;

/// Structural errors are precondition violations by the caller.
/// They indicate a broken invariant and are never degraded to a log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("node not found in tree: {0:?}")]
    UnknownNode(NodeKey),

    #[error("node caption must not be empty")]
    MissingCaption,

    #[error("invalid node id: {0:?}")]
    InvalidId(String),

    #[error("node {caption} already has a parent and cannot be attached again")]
    AlreadyAttached { caption: String },

    #[error("root node {caption} cannot be attached as a child")]
    RootAsChild { caption: String },

    #[error("node {caption} does not accept children")]
    ChildrenNotAllowed { caption: String },

    #[error("node {caption} is not a root node")]
    NotARoot { caption: String },

    #[error("tree already has a bound root")]
    RootAlreadyBound,

    #[error("tree has no root")]
    NoRoot,
}

/// Errors of the clone-then-transfer protocol.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("target variant {target} does not match source variant {source_variant}")]
    VariantMismatch { source_variant: String, target: String },

    #[error("cannot assign node {caption} to itself")]
    SameNode { caption: String },

    #[error("target {target} lies inside the subtree of source {source_caption}")]
    TargetInsideSource { source_caption: String, target: String },

    #[error("node {caption} is busy running one of its own hooks")]
    Busy { caption: String },

    #[error("transfer hook of {caption} failed")]
    Hook {
        caption: String,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Top-level error of tree operations.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl TreeError {
    /// Whether this is a caller-side invariant violation rather than a transfer failure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TreeError::Structural(_) | TreeError::Transfer(TransferError::Structural(_))
        )
    }
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Operational failure raised by a node or root hook.
///
/// These are recoverable: the tree logs them and treats them as
/// "permission denied", "no children" or "continue cleanup".
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HookError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it as the error source.
    pub fn from_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Permission-checked actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Select,
    Unselect,
    Remove,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Select => "select",
            Action::Unselect => "unselect",
            Action::Remove => "remove",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Why a selection change or a structural mutation did not happen.
///
/// A denial leaves the tree unchanged. It is a value for the caller to
/// surface, not an error of the tree itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("node is not part of this tree")]
    NotInTree,

    #[error("node {caption} is disabled")]
    Disabled { caption: String },

    #[error("selected node {caption} refuses to be unselected")]
    Unselect { caption: String },

    #[error("node {caption} refuses to {action}")]
    Refused { caption: String, action: Action },

    #[error("{action} check of node {caption} failed: {message}")]
    HookFailed {
        caption: String,
        action: Action,
        message: String,
    },

    #[error("node {caption} is busy running one of its own hooks")]
    Busy { caption: String },

    #[error("selection change was canceled by a listener")]
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_hook_error_with_source_when_displayed_then_keeps_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = HookError::from_source("read children", io);
        assert_eq!(err.to_string(), "read children");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn given_nested_structural_error_when_checking_tier_then_is_structural() {
        let err = TreeError::from(TransferError::from(StructuralError::MissingCaption));
        assert!(err.is_structural());
        let err = TreeError::from(TransferError::Busy {
            caption: "a".into(),
        });
        assert!(!err.is_structural());
    }

    #[test]
    fn given_refusal_when_displayed_then_names_action() {
        let denial = Denial::Refused {
            caption: "A1".into(),
            action: Action::Remove,
        };
        assert_eq!(denial.to_string(), "node A1 refuses to remove");
    }
}
