//! In-process board store with the remote API's semantics.
//!
//! - Creates append at the end of the sibling sequence
//! - Updates are sparse, deletes cascade to children
//! - Monotonic version counter bumped on every write
//! - Failure injection per entity id, plus a global offline switch
//! - Optionally a fixed rank for created entities, like a server that
//!   ignores the existing siblings
//!
//! Ordering is the caller's concern: the store never renumbers siblings on
//! its own, exactly like the remote API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{ApiError, BoardApi};
use crate::types::*;

#[derive(Debug, Default)]
struct MemoryState {
    boards: Vec<Board>,
    lists: Vec<BoardList>,
    cards: Vec<Card>,
    employees: Vec<UserShort>,
}

pub struct MemoryApi {
    state: RwLock<MemoryState>,
    next_id: AtomicU64,
    version: AtomicU64,
    update_calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    create_position: Mutex<Option<usize>>,
}

impl Default for MemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryApi {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            next_id: AtomicU64::new(1),
            version: AtomicU64::new(0),
            update_calls: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            create_position: Mutex::new(None),
        }
    }

    /// Insert a board with its lists and cards as-is (positions included).
    /// Lists and cards are taken from `state`; `cards` vectors are flattened.
    pub fn seed(&self, board: Board, state: &BoardState) {
        let mut guard = self.write();
        for list in &state.lists {
            guard.cards.extend(list.cards.iter().cloned());
            guard.lists.push(BoardList {
                cards: Vec::new(),
                ..list.clone()
            });
        }
        guard.boards.push(board);
        self.bump();
    }

    pub fn add_employee(&self, employee: UserShort) {
        self.write().employees.push(employee);
        self.bump();
    }

    /// Give every list and card created from now on this rank instead of
    /// appending it. `None` restores appending.
    pub fn set_create_position(&self, position: Option<usize>) {
        *self
            .create_position
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = position;
    }

    fn created_rank(&self, siblings: usize) -> usize {
        let fixed = *self
            .create_position
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        fixed.unwrap_or(siblings)
    }

    /// Make every call naming `id` fail with `ApiError::Unavailable`.
    pub fn fail_on(&self, id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string());
    }

    pub fn recover(&self, id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of list/card update calls received so far.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Version counter, incremented on every successful write.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn list(&self, list_id: &str) -> Option<BoardList> {
        self.read().lists.iter().find(|l| l.id == list_id).cloned()
    }

    pub fn card(&self, card_id: &str) -> Option<Card> {
        self.read().cards.iter().find(|c| c.id == card_id).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn check(&self, ids: &[&str]) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("store is offline".to_string()));
        }
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        match ids.iter().find(|id| failing.contains(**id)) {
            Some(id) => Err(ApiError::Unavailable(format!("injected failure for {}", id))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BoardApi for MemoryApi {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.check(&[])?;
        Ok(self.read().boards.clone())
    }

    async fn create_board(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Board, ApiError> {
        self.check(&[])?;
        let board = Board {
            id: self.next_id("board"),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_by: None,
            members: Vec::new(),
        };
        self.write().boards.push(board.clone());
        self.bump();
        Ok(board)
    }

    async fn delete_board(&self, board_id: &str) -> Result<(), ApiError> {
        self.check(&[board_id])?;
        let mut state = self.write();
        let before = state.boards.len();
        state.boards.retain(|b| b.id != board_id);
        if state.boards.len() == before {
            return Err(ApiError::not_found("board", board_id));
        }
        let list_ids: HashSet<String> = state
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .map(|l| l.id.clone())
            .collect();
        state.lists.retain(|l| l.board_id != board_id);
        state.cards.retain(|c| !list_ids.contains(&c.list_id));
        drop(state);
        self.bump();
        Ok(())
    }

    async fn add_member(&self, board_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.check(&[board_id, user_id])?;
        let mut state = self.write();
        let board = state
            .boards
            .iter_mut()
            .find(|b| b.id == board_id)
            .ok_or_else(|| ApiError::not_found("board", board_id))?;
        if !board.is_member(user_id) {
            board.members.push(UserRef::Id(user_id.to_string()));
        }
        drop(state);
        self.bump();
        Ok(())
    }

    async fn list_employees(&self) -> Result<Vec<UserShort>, ApiError> {
        self.check(&[])?;
        Ok(self.read().employees.clone())
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>, ApiError> {
        self.check(&[board_id])?;
        let state = self.read();
        if !state.boards.iter().any(|b| b.id == board_id) {
            return Err(ApiError::not_found("board", board_id));
        }
        Ok(state
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .cloned()
            .collect())
    }

    async fn create_list(&self, board_id: &str, title: &str) -> Result<BoardList, ApiError> {
        self.check(&[board_id])?;
        let mut state = self.write();
        if !state.boards.iter().any(|b| b.id == board_id) {
            return Err(ApiError::not_found("board", board_id));
        }
        let list = BoardList {
            id: self.next_id("list"),
            title: title.to_string(),
            board_id: board_id.to_string(),
            position: self.created_rank(
                state.lists.iter().filter(|l| l.board_id == board_id).count(),
            ),
            cards: Vec::new(),
        };
        state.lists.push(list.clone());
        drop(state);
        self.bump();
        Ok(list)
    }

    async fn update_list(&self, list_id: &str, patch: &ListPatch) -> Result<BoardList, ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&[list_id])?;
        let mut state = self.write();
        let list = state
            .lists
            .iter_mut()
            .find(|l| l.id == list_id)
            .ok_or_else(|| ApiError::not_found("list", list_id))?;
        if let Some(position) = patch.position {
            list.position = position;
        }
        if let Some(title) = &patch.title {
            list.title = title.clone();
        }
        let updated = list.clone();
        drop(state);
        self.bump();
        Ok(updated)
    }

    async fn delete_list(&self, list_id: &str) -> Result<(), ApiError> {
        self.check(&[list_id])?;
        let mut state = self.write();
        let before = state.lists.len();
        state.lists.retain(|l| l.id != list_id);
        if state.lists.len() == before {
            return Err(ApiError::not_found("list", list_id));
        }
        state.cards.retain(|c| c.list_id != list_id);
        drop(state);
        self.bump();
        Ok(())
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>, ApiError> {
        self.check(&[list_id])?;
        let state = self.read();
        if !state.lists.iter().any(|l| l.id == list_id) {
            return Err(ApiError::not_found("list", list_id));
        }
        Ok(state
            .cards
            .iter()
            .filter(|c| c.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn create_card(&self, list_id: &str, title: &str) -> Result<Card, ApiError> {
        self.check(&[list_id])?;
        let mut state = self.write();
        if !state.lists.iter().any(|l| l.id == list_id) {
            return Err(ApiError::not_found("list", list_id));
        }
        let card = Card {
            id: self.next_id("card"),
            title: title.to_string(),
            description: None,
            list_id: list_id.to_string(),
            position: self.created_rank(
                state.cards.iter().filter(|c| c.list_id == list_id).count(),
            ),
            assigned_to: None,
            status: CardStatus::Pending,
            due_date: None,
        };
        state.cards.push(card.clone());
        drop(state);
        self.bump();
        Ok(card)
    }

    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<Card, ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&[card_id])?;
        let mut state = self.write();
        if let Some(list_id) = &patch.list_id {
            if !state.lists.iter().any(|l| &l.id == list_id) {
                return Err(ApiError::not_found("list", list_id));
            }
        }
        let card = state
            .cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or_else(|| ApiError::not_found("card", card_id))?;
        if let Some(position) = patch.position {
            card.position = position;
        }
        if let Some(list_id) = &patch.list_id {
            card.list_id = list_id.clone();
        }
        patch.apply_fields(card);
        let updated = card.clone();
        drop(state);
        self.bump();
        Ok(updated)
    }

    async fn delete_card(&self, card_id: &str) -> Result<(), ApiError> {
        self.check(&[card_id])?;
        let mut state = self.write();
        let before = state.cards.len();
        state.cards.retain(|c| c.id != card_id);
        if state.cards.len() == before {
            return Err(ApiError::not_found("card", card_id));
        }
        drop(state);
        self.bump();
        Ok(())
    }
}
