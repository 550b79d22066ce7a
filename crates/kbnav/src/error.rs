use crate::types::NodeId;
use thiserror::Error;

/// A row batch that cannot form a well-formed tree.
///
/// Raised by [`Tree::build`](crate::Tree::build). A failed build never
/// touches the tree that is currently active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("dataset is empty")]
    Empty,

    /// `row` is the 1-based position in load order.
    #[error("row {row} has no identifier")]
    MissingId { row: usize },

    #[error("duplicate identifier {id} at row {row}")]
    DuplicateId { id: NodeId, row: usize },

    #[error("node {id} references missing parent {parent}")]
    DanglingParent { id: NodeId, parent: NodeId },

    #[error("parent links form a cycle through node {id}")]
    Cycle { id: NodeId },
}

/// A lookup for a node id that is absent from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("node {0} not found")]
pub struct NotFound(pub NodeId);

/// Lookup failure against the tree store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No dataset has ever been loaded successfully.
    #[error("no data loaded")]
    Empty,

    #[error(transparent)]
    NotFound(#[from] NotFound),
}

/// Text that is not a well-formed node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id: {input:?}")]
pub struct ParseNodeIdError {
    input: String,
}

impl ParseNodeIdError {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Failure of the dataset collaborator.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The file does not have the expected shape (extension, columns, cells).
    #[error("unsupported file: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to reload the persisted dataset into the tree store.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
