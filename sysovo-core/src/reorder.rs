//! Reorder engine: pure drag-and-drop transformation of a board tree.
//!
//! A drag names the dragged entity, where it was picked up and where it was
//! dropped. The engine removes the entity from its source sequence, inserts
//! it at the destination index, and renumbers every affected sequence:
//!
//! - List move: the board's lists
//! - Card move within one list: that list's cards
//! - Card move across lists: both lists' cards, with the card's `list_id`
//!   pointing at the destination list
//!
//! Dropping back on the pickup slot is a no-op. Malformed input (no
//! destination, unknown parent, index out of range, stale pickup) leaves the
//! state unchanged.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::position::{move_within, renumber, Ranked};
use crate::types::{BoardState, EntityKind};

/// A slot in a sibling sequence: the parent (board for lists, list for
/// cards) and the index within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropLocation {
    pub parent_id: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(parent_id: impl Into<String>, index: usize) -> Self {
        Self {
            parent_id: parent_id.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragEvent {
    pub kind: EntityKind,
    /// Id of the dragged entity; must match the entity at `source`.
    pub entity_id: String,
    pub source: DropLocation,
    /// `None` when the entity was dropped outside any drop zone.
    pub destination: Option<DropLocation>,
}

impl DragEvent {
    pub fn list(board_id: &str, list_id: &str, from: usize, to: usize) -> Self {
        Self {
            kind: EntityKind::List,
            entity_id: list_id.to_string(),
            source: DropLocation::new(board_id, from),
            destination: Some(DropLocation::new(board_id, to)),
        }
    }

    pub fn card(card_id: &str, from: (&str, usize), to: (&str, usize)) -> Self {
        Self {
            kind: EntityKind::Card,
            entity_id: card_id.to_string(),
            source: DropLocation::new(from.0, from.1),
            destination: Some(DropLocation::new(to.0, to.1)),
        }
    }

    /// The same pickup, released outside any drop zone.
    pub fn dropped_outside(mut self) -> Self {
        self.destination = None;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.destination.as_ref() == Some(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReorderOutcome {
    Applied(BoardState),
    Unchanged,
}

/// Apply a drag, returning the new tree. Any drag that is a no-op or is
/// malformed yields a tree equal to `state`.
pub fn reorder(state: &BoardState, drag: &DragEvent) -> BoardState {
    match try_reorder(state, drag) {
        Ok(ReorderOutcome::Applied(next)) => next,
        Ok(ReorderOutcome::Unchanged) => state.clone(),
        Err(e) => {
            log::debug!(
                target: "sysovo.reorder",
                "Ignoring drag of {} {}: {}",
                drag.kind,
                drag.entity_id,
                e
            );
            state.clone()
        }
    }
}

/// Apply a drag and report what happened.
pub fn try_reorder(state: &BoardState, drag: &DragEvent) -> Result<ReorderOutcome, ValidationError> {
    let destination = drag
        .destination
        .as_ref()
        .ok_or(ValidationError::NoDestination)?;
    match drag.kind {
        EntityKind::List => move_list(state, drag, destination),
        EntityKind::Card => move_card(state, drag, destination),
    }
}

fn move_list(
    state: &BoardState,
    drag: &DragEvent,
    destination: &DropLocation,
) -> Result<ReorderOutcome, ValidationError> {
    for parent in [&drag.source.parent_id, &destination.parent_id] {
        if *parent != state.board_id {
            return Err(ValidationError::UnknownBoard(parent.clone()));
        }
    }
    check_pickup(&state.lists, &drag.source, &drag.entity_id)?;
    check_slot(&destination.parent_id, destination.index, state.lists.len(), false)?;

    if destination.index == drag.source.index {
        return Ok(ReorderOutcome::Unchanged);
    }

    let mut next = state.clone();
    move_within(&mut next.lists, drag.source.index, destination.index);
    Ok(ReorderOutcome::Applied(next))
}

fn move_card(
    state: &BoardState,
    drag: &DragEvent,
    destination: &DropLocation,
) -> Result<ReorderOutcome, ValidationError> {
    let from = state
        .list_index(&drag.source.parent_id)
        .ok_or_else(|| ValidationError::UnknownList(drag.source.parent_id.clone()))?;
    // Lists outside the loaded board are unknown here, which also rules out
    // cross-board moves.
    let to = state
        .list_index(&destination.parent_id)
        .ok_or_else(|| ValidationError::UnknownList(destination.parent_id.clone()))?;
    check_pickup(&state.lists[from].cards, &drag.source, &drag.entity_id)?;

    if from == to {
        let len = state.lists[from].cards.len();
        check_slot(&destination.parent_id, destination.index, len, false)?;
        if destination.index == drag.source.index {
            return Ok(ReorderOutcome::Unchanged);
        }
        let mut next = state.clone();
        move_within(&mut next.lists[from].cards, drag.source.index, destination.index);
        return Ok(ReorderOutcome::Applied(next));
    }

    check_slot(
        &destination.parent_id,
        destination.index,
        state.lists[to].cards.len(),
        true,
    )?;

    let mut next = state.clone();
    let mut card = next.lists[from].cards.remove(drag.source.index);
    card.list_id = next.lists[to].id.clone();
    next.lists[to].cards.insert(destination.index, card);
    renumber(&mut next.lists[from].cards);
    renumber(&mut next.lists[to].cards);
    Ok(ReorderOutcome::Applied(next))
}

/// The source slot must exist and hold the dragged entity.
fn check_pickup<T: Ranked>(
    items: &[T],
    source: &DropLocation,
    entity_id: &str,
) -> Result<(), ValidationError> {
    match items.get(source.index) {
        Some(item) if item.id() == entity_id => Ok(()),
        Some(item) => Err(ValidationError::StaleSource {
            expected: entity_id.to_string(),
            found: Some(item.id().to_string()),
        }),
        None => Err(ValidationError::IndexOutOfRange {
            parent_id: source.parent_id.clone(),
            index: source.index,
            len: items.len(),
        }),
    }
}

/// A drop slot within a sequence of `len` items. Moving inside the same
/// sequence has `len` slots; inserting from elsewhere also has the slot
/// after the last item.
fn check_slot(
    parent_id: &str,
    index: usize,
    len: usize,
    from_elsewhere: bool,
) -> Result<(), ValidationError> {
    let slots = if from_elsewhere { len + 1 } else { len };
    if index >= slots {
        return Err(ValidationError::IndexOutOfRange {
            parent_id: parent_id.to_string(),
            index,
            len,
        });
    }
    Ok(())
}
