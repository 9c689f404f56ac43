//! One user's interaction with one open board.
//!
//! Drags follow `Idle -> Dragging -> LocalApplied -> Reconciling ->
//! Dispatched -> Idle` and never wait on the network: the new tree is in the
//! store before any persistence task is spawned, so the next drag always
//! starts from it. Explicit actions (create, delete, edit) are strict and
//! only touch the local tree once the store has accepted them.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::dispatch::{DispatchTicket, SyncDispatcher};
use crate::edit;
use crate::error::{ActionError, LoadError, ValidationError};
use crate::position::next_position;
use crate::reconcile::{reconcile, CardUpdate, ChangeSet, ListUpdate};
use crate::reorder::{try_reorder, DragEvent, ReorderOutcome};
use crate::storage::{ApiError, BoardApi};
use crate::store::LocalBoardStore;
use crate::types::{Board, BoardList, BoardState, Card, CardPatch, ListPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Dragging,
    LocalApplied,
    Reconciling,
    Dispatched,
}

/// An entity the store just created, as placed in the local tree, plus the
/// write that corrects the store's rank when it disagreed.
#[derive(Debug)]
pub struct Created<T> {
    pub entity: T,
    pub ticket: Option<DispatchTicket>,
}

pub struct BoardSession {
    api: Arc<dyn BoardApi>,
    store: LocalBoardStore,
    dispatcher: SyncDispatcher,
    phase: SyncPhase,
}

impl BoardSession {
    pub fn new(api: Arc<dyn BoardApi>) -> Self {
        Self {
            dispatcher: SyncDispatcher::new(Arc::clone(&api)),
            api,
            store: LocalBoardStore::new(),
            phase: SyncPhase::Idle,
        }
    }

    pub fn store(&self) -> &LocalBoardStore {
        &self.store
    }

    pub fn state(&self) -> &BoardState {
        self.store.current()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Load a board, replacing whatever was open. On failure the previously
    /// open board stays.
    pub async fn open(&mut self, board_id: &str) -> Result<(), LoadError> {
        self.store.load(self.api.as_ref(), board_id).await
    }

    /// Re-fetch the open board.
    pub async fn reload(&mut self) -> Result<(), LoadError> {
        let board_id = self.store.current().board_id.clone();
        self.store.load(self.api.as_ref(), &board_id).await
    }

    // ---- drag and drop ----

    /// A drag may start while earlier dispatches are still in flight.
    pub fn begin_drag(&mut self) {
        self.set_phase(SyncPhase::Dragging);
    }

    pub fn cancel_drag(&mut self) {
        self.set_phase(SyncPhase::Idle);
    }

    /// Apply a drop locally, then persist the changed ranks in the
    /// background. `None` when the drop changed nothing (no-op, dropped
    /// outside, or malformed).
    pub fn drop_drag(&mut self, drag: &DragEvent) -> Option<DispatchTicket> {
        let next = match try_reorder(self.store.current(), drag) {
            Ok(ReorderOutcome::Applied(next)) => next,
            Ok(ReorderOutcome::Unchanged) => {
                self.set_phase(SyncPhase::Idle);
                return None;
            }
            Err(e) => {
                log::debug!(
                    target: "sysovo.session",
                    "Drop of {} {} ignored: {}",
                    drag.kind,
                    drag.entity_id,
                    e
                );
                self.set_phase(SyncPhase::Idle);
                return None;
            }
        };
        self.commit(next)
    }

    fn commit(&mut self, next: BoardState) -> Option<DispatchTicket> {
        self.store.replace(next);
        self.set_phase(SyncPhase::LocalApplied);

        self.set_phase(SyncPhase::Reconciling);
        let changes = self
            .store
            .previous()
            .map(|before| reconcile(before, self.store.current()))
            .unwrap_or_default();

        let ticket = self.dispatch(changes);
        self.set_phase(SyncPhase::Idle);
        ticket
    }

    fn dispatch(&mut self, changes: ChangeSet) -> Option<DispatchTicket> {
        if changes.is_empty() {
            return None;
        }
        let ticket = self.dispatcher.dispatch(changes);
        self.set_phase(SyncPhase::Dispatched);
        self.set_phase(SyncPhase::Idle);
        Some(ticket)
    }

    fn set_phase(&mut self, phase: SyncPhase) {
        if self.phase != phase {
            log::trace!(target: "sysovo.session", "{:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    // ---- lists and cards ----

    /// Create a list at the end of the open board. If the store ranked it
    /// elsewhere, the local rank is written back.
    pub async fn create_list(&mut self, title: &str) -> Result<Created<BoardList>, ActionError> {
        let board_id = self.loaded_board_id()?;
        let stored = self.api.create_list(&board_id, title).await?;
        let position = next_position(&self.store.current().lists);
        let next = edit::append_list(self.store.current(), stored.clone())?;
        self.store.replace(next);

        let mut changes = ChangeSet::default();
        if stored.position != position {
            log::debug!(
                target: "sysovo.session",
                "Store ranked new list {} at {}, expected {}",
                stored.id,
                stored.position,
                position
            );
            changes.lists.push(ListUpdate {
                id: stored.id.clone(),
                patch: ListPatch::position(position),
            });
        }
        Ok(Created {
            entity: BoardList {
                position,
                cards: Vec::new(),
                ..stored
            },
            ticket: self.dispatch(changes),
        })
    }

    pub async fn create_card(
        &mut self,
        list_id: &str,
        title: &str,
    ) -> Result<Created<Card>, ActionError> {
        let siblings = match self.store.current().list(list_id) {
            Some(list) => next_position(&list.cards),
            None => return Err(ValidationError::UnknownList(list_id.to_string()).into()),
        };
        let stored = self.api.create_card(list_id, title).await?;
        let next = edit::append_card(self.store.current(), stored.clone())?;
        self.store.replace(next);

        let mut changes = ChangeSet::default();
        if stored.position != siblings {
            log::debug!(
                target: "sysovo.session",
                "Store ranked new card {} at {}, expected {}",
                stored.id,
                stored.position,
                siblings
            );
            changes.cards.push(CardUpdate {
                id: stored.id.clone(),
                patch: CardPatch::placement(siblings, &stored.list_id),
            });
        }
        Ok(Created {
            entity: Card {
                position: siblings,
                ..stored
            },
            ticket: self.dispatch(changes),
        })
    }

    /// Delete a list and its cards. The remaining lists are renumbered
    /// locally and their new ranks dispatched.
    pub async fn delete_list(
        &mut self,
        list_id: &str,
    ) -> Result<Option<DispatchTicket>, ActionError> {
        let next = edit::remove_list(self.store.current(), list_id)?;
        self.api.delete_list(list_id).await?;
        Ok(self.commit(next))
    }

    pub async fn delete_card(
        &mut self,
        card_id: &str,
    ) -> Result<Option<DispatchTicket>, ActionError> {
        let next = edit::remove_card(self.store.current(), card_id)?;
        self.api.delete_card(card_id).await?;
        Ok(self.commit(next))
    }

    /// Edit card content. Moves are refused here; they go through a drag.
    pub async fn update_card(
        &mut self,
        card_id: &str,
        patch: &CardPatch,
    ) -> Result<Card, ActionError> {
        edit::apply_card_patch(self.store.current(), card_id, patch)?;
        let card = self.api.update_card(card_id, patch).await?;
        let next = edit::refresh_card(self.store.current(), card.clone())?;
        self.store.replace(next);
        Ok(card)
    }

    fn loaded_board_id(&self) -> Result<String, ValidationError> {
        let state = self.store.current();
        if self.store.is_loaded() {
            Ok(state.board_id.clone())
        } else {
            Err(ValidationError::UnknownBoard(state.board_id.clone()))
        }
    }

    // ---- boards ----

    pub async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.api.list_boards().await
    }

    pub async fn create_board(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Board, ApiError> {
        self.api.create_board(name, description).await
    }

    /// Delete a board; if it is the open one, the local tree is dropped.
    pub async fn delete_board(&mut self, board_id: &str) -> Result<(), ApiError> {
        self.api.delete_board(board_id).await?;
        if self.store.current().board_id == board_id {
            self.store.clear();
        }
        Ok(())
    }

    pub async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.api.add_member(board_id, user_id).await
    }

    /// Add several users at once. Every call is made even if some fail;
    /// returns the number added or the first failure.
    pub async fn add_members(
        &self,
        board_id: &str,
        user_ids: &[String],
    ) -> Result<usize, ApiError> {
        let results = join_all(
            user_ids
                .iter()
                .map(|user_id| self.api.add_member(board_id, user_id)),
        )
        .await;

        let mut added = 0;
        let mut first_err = None;
        for (user_id, result) in user_ids.iter().zip(results) {
            match result {
                Ok(()) => added += 1,
                Err(e) => {
                    log::warn!(
                        target: "sysovo.session",
                        "Failed to add {} to board {}: {}",
                        user_id,
                        board_id,
                        e
                    );
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(added),
        }
    }

    /// Add every employee account to a board.
    pub async fn add_all_employees(&self, board_id: &str) -> Result<usize, ApiError> {
        let user_ids: Vec<String> = self
            .api
            .list_employees()
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        if user_ids.is_empty() {
            log::info!(target: "sysovo.session", "No employees to add to board {}", board_id);
        }
        self.add_members(board_id, &user_ids).await
    }
}
