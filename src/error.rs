use thiserror::Error;

/// Error returned by the checked (`try_*`) container operations.
///
/// The unchecked operations treat the same conditions as contract violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseError {
    #[error("index {index} is out of bounds for sparse size {sparse_size}")]
    IndexOutOfBounds { index: usize, sparse_size: usize },

    #[error("slot {0} holds no live element")]
    NotLive(usize),

    #[error("storage is full, capacity is fixed at {capacity}")]
    CapacityExceeded { capacity: usize },

    /// An element with an equal key already lives at this index.
    #[error("key already present at index {0}")]
    KeyExists(usize),
}

pub type SparseResult<T> = Result<T, SparseError>;
