pub mod memory;

use async_trait::async_trait;

use crate::types::{Board, BoardList, Card, CardPatch, ListPatch, UserShort};

/// The remote store the engine reconciles with.
/// Implementations: MemoryApi (in-process), HttpBoardApi (sysovo-client).
///
/// Every update is field-sparse: fields absent from the patch must be left
/// untouched by the implementation.
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Boards visible to the current actor.
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError>;

    async fn create_board(&self, name: &str, description: Option<&str>)
        -> Result<Board, ApiError>;

    /// Delete a board together with its lists and cards.
    async fn delete_board(&self, board_id: &str) -> Result<(), ApiError>;

    async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), ApiError>;

    /// Every employee account, for bulk membership.
    async fn list_employees(&self) -> Result<Vec<UserShort>, ApiError>;

    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>, ApiError>;

    /// Create a list appended after the board's existing lists.
    async fn create_list(&self, board_id: &str, title: &str) -> Result<BoardList, ApiError>;

    async fn update_list(&self, list_id: &str, patch: &ListPatch) -> Result<BoardList, ApiError>;

    /// Delete a list and every card it holds.
    async fn delete_list(&self, list_id: &str) -> Result<(), ApiError>;

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>, ApiError>;

    /// Create a card appended after the list's existing cards.
    async fn create_card(&self, list_id: &str, title: &str) -> Result<Card, ApiError>;

    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<Card, ApiError>;

    async fn delete_card(&self, card_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: &str) -> Self {
        ApiError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}
