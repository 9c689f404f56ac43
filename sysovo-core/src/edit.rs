//! Structural edits applied after the store confirms a create, delete or
//! field edit. Pure: each returns a new tree.
//!
//! Creates append at the end of the sibling sequence; deletes renumber the
//! remaining siblings. Deleting a list takes its cards with it, matching the
//! remote API.

use crate::error::ValidationError;
use crate::position::{next_position, renumber};
use crate::types::{BoardList, BoardState, Card, CardPatch};

pub fn append_list(state: &BoardState, list: BoardList) -> Result<BoardState, ValidationError> {
    if list.board_id != state.board_id {
        return Err(ValidationError::UnknownBoard(list.board_id));
    }
    let mut next = state.clone();
    let position = next_position(&next.lists);
    next.lists.push(BoardList {
        position,
        cards: Vec::new(),
        ..list
    });
    Ok(next)
}

pub fn append_card(state: &BoardState, card: Card) -> Result<BoardState, ValidationError> {
    let index = state
        .list_index(&card.list_id)
        .ok_or_else(|| ValidationError::UnknownList(card.list_id.clone()))?;
    let mut next = state.clone();
    let cards = &mut next.lists[index].cards;
    let position = next_position(cards.as_slice());
    cards.push(Card { position, ..card });
    Ok(next)
}

/// Remove a list and its cards, then renumber the remaining lists.
pub fn remove_list(state: &BoardState, list_id: &str) -> Result<BoardState, ValidationError> {
    let index = state
        .list_index(list_id)
        .ok_or_else(|| ValidationError::UnknownList(list_id.to_string()))?;
    let mut next = state.clone();
    next.lists.remove(index);
    renumber(&mut next.lists);
    Ok(next)
}

/// Remove a card, then renumber the rest of its list.
pub fn remove_card(state: &BoardState, card_id: &str) -> Result<BoardState, ValidationError> {
    let (li, ci) = state
        .find_card(card_id)
        .ok_or_else(|| ValidationError::UnknownCard(card_id.to_string()))?;
    let mut next = state.clone();
    next.lists[li].cards.remove(ci);
    renumber(&mut next.lists[li].cards);
    Ok(next)
}

/// Apply content edits (title, description, status, due date, assignee).
/// Placement fields are refused; moves go through the reorder engine.
pub fn apply_card_patch(
    state: &BoardState,
    card_id: &str,
    patch: &CardPatch,
) -> Result<BoardState, ValidationError> {
    if let Some(field) = patch.moves_card().first().copied() {
        return Err(ValidationError::ForbiddenField(field));
    }
    let (li, ci) = state
        .find_card(card_id)
        .ok_or_else(|| ValidationError::UnknownCard(card_id.to_string()))?;
    let mut next = state.clone();
    patch.apply_fields(&mut next.lists[li].cards[ci]);
    Ok(next)
}

/// Replace a card with the store's copy of it, keeping local placement.
pub fn refresh_card(state: &BoardState, card: Card) -> Result<BoardState, ValidationError> {
    let (li, ci) = state
        .find_card(&card.id)
        .ok_or_else(|| ValidationError::UnknownCard(card.id.clone()))?;
    let mut next = state.clone();
    let slot = &mut next.lists[li].cards[ci];
    *slot = Card {
        position: slot.position,
        list_id: slot.list_id.clone(),
        ..card
    };
    Ok(next)
}
