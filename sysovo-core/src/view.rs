//! The restricted "my tasks" view: an actor sees the boards they belong to
//! and, on them, only the cards assigned to them. The only edit they may make
//! is a status change.

use crate::error::ValidationError;
use crate::types::{Board, BoardList, BoardState, CardPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedView {
    pub actor_id: String,
}

impl AssignedView {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
        }
    }

    pub fn visible_boards<'a>(&self, boards: &'a [Board]) -> Vec<&'a Board> {
        boards
            .iter()
            .filter(|b| b.is_member(&self.actor_id))
            .collect()
    }

    /// Same lists, each holding only the actor's cards. Positions are left
    /// as they are in the full board.
    pub fn filter(&self, state: &BoardState) -> BoardState {
        BoardState::new(
            state.board_id.clone(),
            state
                .lists
                .iter()
                .map(|list| BoardList {
                    cards: list
                        .cards
                        .iter()
                        .filter(|c| c.is_assigned_to(&self.actor_id))
                        .cloned()
                        .collect(),
                    ..list.clone()
                })
                .collect(),
        )
    }

    /// Accept a patch only if it changes nothing but the status.
    pub fn authorize(&self, patch: &CardPatch) -> Result<(), ValidationError> {
        let mut touched = patch.moves_card().into_iter().chain(patch.edited_fields());
        match touched.find(|f| *f != "status") {
            Some(field) => Err(ValidationError::ForbiddenField(field)),
            None => Ok(()),
        }
    }
}
