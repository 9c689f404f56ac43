//! Error types for the board engine.
//!
//! Only loading is strict. Persistence failures are logged and never undo
//! local state; validation failures leave the state untouched.

use crate::storage::ApiError;
use crate::types::EntityKind;

/// Fetching a board failed. The previously loaded state is retained.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to fetch lists of board {board_id}: {source}")]
    Lists {
        board_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to fetch cards of list {list_id}: {source}")]
    Cards {
        list_id: String,
        #[source]
        source: ApiError,
    },
}

/// A single change-set item could not be saved.
#[derive(Debug, thiserror::Error)]
#[error("Failed to persist {kind} {id}: {source}")]
pub struct PersistError {
    pub kind: EntityKind,
    pub id: String,
    #[source]
    pub source: ApiError,
}

/// Malformed move or edit input. Never changes state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Drop has no destination")]
    NoDestination,

    #[error("Board {0} is not the loaded board")]
    UnknownBoard(String),

    #[error("List not found: {0}")]
    UnknownList(String),

    #[error("Card not found: {0}")]
    UnknownCard(String),

    #[error("Index {index} out of range for {parent_id} ({len} items)")]
    IndexOutOfRange {
        parent_id: String,
        index: usize,
        len: usize,
    },

    #[error("Dragged {expected} but found {found:?} at the source index")]
    StaleSource {
        expected: String,
        found: Option<String>,
    },

    #[error("Field {0} cannot be changed here")]
    ForbiddenField(&'static str),
}

/// An explicit board action (create, delete, edit) failed. Either the input
/// did not match the loaded board, or the store refused the call; in both
/// cases the local tree is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
